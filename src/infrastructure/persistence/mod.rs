//! Code registry implementations.
//!
//! # Repositories
//!
//! - [`PgCodeRepository`] - PostgreSQL-backed registry (production)
//! - [`InMemoryCodeRepository`] - process-local registry for local runs and tests

pub mod memory_code_repository;
pub mod pg_code_repository;

pub use memory_code_repository::InMemoryCodeRepository;
pub use pg_code_repository::PgCodeRepository;
