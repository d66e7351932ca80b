//! Repository trait for the code registry.

use crate::domain::entities::{Code, CodeKind, Namespace, NewCode};
use crate::domain::errors::CodeError;
use async_trait::async_trait;

/// Checks the hierarchy invariant for a code about to be reserved.
///
/// `parent` is the current state of `new_code.parent_id`, read inside the
/// same atomic step as the insert.
pub fn check_hierarchy(new_code: &NewCode, parent: Option<&Code>) -> Result<(), CodeError> {
    match (new_code.kind, new_code.parent_id) {
        (CodeKind::Primary, None) => Ok(()),
        (CodeKind::Primary, Some(_)) => Err(CodeError::HierarchyViolation(
            "primary codes cannot have a parent".to_string(),
        )),
        (CodeKind::Sub, None) => Err(CodeError::HierarchyViolation(
            "sub-codes require a parent".to_string(),
        )),
        (CodeKind::Sub, Some(_)) => {
            let parent = parent.filter(|p| p.is_active()).ok_or(CodeError::NotFound)?;

            if !parent.is_primary() {
                return Err(CodeError::HierarchyViolation(
                    "sub-codes cannot be nested".to_string(),
                ));
            }

            if parent.namespace != new_code.namespace {
                return Err(CodeError::HierarchyViolation(format!(
                    "parent lives in namespace {}, not {}",
                    parent.namespace, new_code.namespace
                )));
            }

            Ok(())
        }
    }
}

/// Persistent mapping from code values to resource references.
///
/// The registry is the single source of truth for uniqueness: implementations
/// must enforce "at most one live code per (namespace, value)" atomically with
/// the insert, not by a separate check-then-insert.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgCodeRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::InMemoryCodeRepository`] - process-local registry
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeRepository: Send + Sync {
    /// Reserves a code.
    ///
    /// For sub-codes the parent is re-checked in the same atomic step: it must
    /// exist, be live, be a primary code and live in the same namespace.
    ///
    /// # Errors
    ///
    /// - [`CodeError::DuplicateCode`] if the value is live in the namespace
    /// - [`CodeError::NotFound`] if the parent does not exist or is deactivated
    /// - [`CodeError::HierarchyViolation`] if the parent is not a primary code
    ///   of the same namespace
    /// - [`CodeError::StoreUnavailable`] on storage failures
    async fn reserve(&self, new_code: NewCode) -> Result<Code, CodeError>;

    /// Returns true if the value is taken: live, or deactivated recently
    /// enough that the reuse policy still blocks it.
    async fn exists(&self, namespace: Namespace, value: &str) -> Result<bool, CodeError>;

    /// Finds a live code by value. Deactivated codes are never returned.
    async fn lookup(&self, namespace: Namespace, value: &str) -> Result<Option<Code>, CodeError>;

    /// Finds a code by id regardless of its state.
    async fn find_by_id(&self, id: i64) -> Result<Option<Code>, CodeError>;

    /// Lists the live sub-codes of a parent in creation order.
    async fn list_children(&self, parent_id: i64) -> Result<Vec<Code>, CodeError>;

    /// Lists live primary codes targeting an internal resource, oldest first.
    async fn list_by_resource(
        &self,
        namespace: Namespace,
        resource_id: i64,
    ) -> Result<Vec<Code>, CodeError>;

    /// Deactivates a live code and, if it is a primary code, all of its live
    /// sub-codes in one atomic step.
    ///
    /// Returns the number of codes deactivated (`0` if nothing live matched).
    async fn deactivate(&self, namespace: Namespace, value: &str) -> Result<usize, CodeError>;

    /// Deactivates every live primary code targeting an internal resource,
    /// together with their sub-codes, in one atomic step.
    async fn deactivate_by_resource(
        &self,
        namespace: Namespace,
        resource_id: i64,
    ) -> Result<usize, CodeError>;

    /// Checks that the backing store is reachable.
    async fn health_check(&self) -> bool;
}
