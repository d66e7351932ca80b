//! Repository trait definitions for the domain layer.
//!
//! Traits define the data-access contract; implementations live in
//! `crate::infrastructure::persistence`. Mock implementations are
//! auto-generated via `mockall` for unit tests.
//!
//! # Available Repositories
//!
//! - [`CodeRepository`] - Code reservation, lookup, hierarchy and deactivation
//!
//! # Testing
//!
//! See `tests/registry_*.rs` and `tests/repository_code.rs` for usage examples.

pub mod code_repository;

pub use code_repository::{CodeRepository, check_hierarchy};

#[cfg(test)]
pub use code_repository::MockCodeRepository;
