//! Utility functions for code generation and URL processing.
//!
//! - [`code_generator`] - Code generation, inbound normalization and custom-code validation
//! - [`url_normalizer`] - URL normalization and redirect-target validation
//! - [`db_error`] - PostgreSQL error classification

pub mod code_generator;
pub mod db_error;
pub mod url_normalizer;
