//! Error taxonomy of the code registry and resolver.

use crate::domain::entities::Namespace;

/// Errors raised by code generation, reservation and lookup.
///
/// `DuplicateCode` is recovered internally by the create-with-retry protocol
/// and only reaches HTTP callers for explicitly requested custom codes.
#[derive(Debug, thiserror::Error)]
pub enum CodeError {
    #[error("code '{value}' is already taken in namespace {namespace}")]
    DuplicateCode { namespace: Namespace, value: String },

    #[error("failed to generate a unique code after {attempts} attempts")]
    GenerationExhausted { attempts: usize },

    #[error("code not found")]
    NotFound,

    #[error("invalid code: {0}")]
    Invalid(String),

    #[error("hierarchy violation: {0}")]
    HierarchyViolation(String),

    #[error("code store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<sqlx::Error> for CodeError {
    fn from(e: sqlx::Error) -> Self {
        CodeError::StoreUnavailable(e.to_string())
    }
}
