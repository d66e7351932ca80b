//! Classification of PostgreSQL errors raised by the code registry.

/// Name of the partial unique index guarding live `(namespace, value)` pairs.
pub const ACTIVE_CODE_CONSTRAINT: &str = "codes_active_value_key";

/// Returns true if `e` is a unique violation on the live code index.
pub fn is_unique_violation_on_code(e: &sqlx::Error) -> bool {
    let Some(db_err) = e.as_database_error() else {
        return false;
    };

    if !db_err.is_unique_violation() {
        return false;
    }

    matches!(db_err.constraint(), Some(ACTIVE_CODE_CONSTRAINT))
}
