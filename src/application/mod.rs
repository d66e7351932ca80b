//! Application layer services implementing business logic.
//!
//! Services consume the [`crate::domain::repositories::CodeRepository`] trait
//! and are generic over it, so handlers run against PostgreSQL or the
//! in-memory registry and unit tests run against mocks.
//!
//! # Available Services
//!
//! - [`services::code_service::CodeService`] - Issuing, listing and deactivating codes
//! - [`services::resolver::Resolver`] - Inbound code resolution and redirect targets

pub mod services;
