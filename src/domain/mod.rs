//! Domain layer containing business entities and repository contracts.
//!
//! # Architecture
//!
//! - [`entities`] - Codes, namespaces and resource references
//! - [`repositories`] - Data access trait definitions
//! - [`errors`] - Registry and resolution error taxonomy
//!
//! # Design Principles
//!
//! - Domain layer has no dependencies on infrastructure or presentation layers
//! - Repository traits define contracts implemented by infrastructure layer
//! - Business logic is encapsulated in services (see [`crate::application::services`])
//!
//! # Resolution Flow
//!
//! 1. Catalog creates a chapter or shortens a URL
//! 2. [`crate::application::services::CodeService`] draws a value and reserves it
//!    via [`repositories::CodeRepository`], retrying on collision
//! 3. A scan hits `GET /scan/{code}` and the
//!    [`crate::application::services::Resolver`] performs one lookup
//! 4. The dispatcher turns the outcome into a 302, 400, 404 or 500

pub mod entities;
pub mod errors;
pub mod repositories;
