//! PostgreSQL implementation of the code registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Code, Namespace, NewCode, ResourceRef, ReusePolicy};
use crate::domain::errors::CodeError;
use crate::domain::repositories::{CodeRepository, check_hierarchy};
use crate::utils::db_error::is_unique_violation_on_code;

macro_rules! code_columns {
    () => {
        "id, value, namespace, kind, parent_id, target_resource_id, target_url, created_at, deactivated_at"
    };
}

/// Raw `codes` row.
#[derive(Debug, sqlx::FromRow)]
struct CodeRow {
    id: i64,
    value: String,
    namespace: String,
    kind: String,
    parent_id: Option<i64>,
    target_resource_id: Option<i64>,
    target_url: Option<String>,
    created_at: DateTime<Utc>,
    deactivated_at: Option<DateTime<Utc>>,
}

impl TryFrom<CodeRow> for Code {
    type Error = CodeError;

    fn try_from(row: CodeRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| CodeError::StoreUnavailable(format!("corrupt code row {}: {what}", row.id));

        let namespace = row.namespace.parse().map_err(corrupt)?;
        let kind = row.kind.parse().map_err(corrupt)?;
        let target = ResourceRef::from_columns(row.target_resource_id, row.target_url)
            .ok_or_else(|| corrupt("target must set exactly one column".to_string()))?;

        Ok(Code {
            id: row.id,
            value: row.value,
            namespace,
            kind,
            parent_id: row.parent_id,
            target,
            created_at: row.created_at,
            deactivated_at: row.deactivated_at,
        })
    }
}

/// PostgreSQL repository for code reservation and resolution.
///
/// Live uniqueness is enforced by the partial unique index
/// `codes_active_value_key`; hierarchy changes run in transactions that lock
/// the parent row so reservation and cascade deactivation never interleave.
pub struct PgCodeRepository {
    pool: Arc<PgPool>,
    reuse_policy: ReusePolicy,
}

impl PgCodeRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>, reuse_policy: ReusePolicy) -> Self {
        Self { pool, reuse_policy }
    }
}

#[async_trait]
impl CodeRepository for PgCodeRepository {
    async fn reserve(&self, new_code: NewCode) -> Result<Code, CodeError> {
        let mut tx = self.pool.begin().await?;

        let parent = match new_code.parent_id {
            Some(parent_id) => sqlx::query_as::<_, CodeRow>(concat!(
                "SELECT ",
                code_columns!(),
                " FROM codes WHERE id = $1 FOR SHARE"
            ))
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(Code::try_from)
            .transpose()?,
            None => None,
        };

        check_hierarchy(&new_code, parent.as_ref())?;

        let (resource_id, url) = new_code.target.clone().into_columns();

        let row = sqlx::query_as::<_, CodeRow>(concat!(
            "INSERT INTO codes (value, namespace, kind, parent_id, target_resource_id, target_url) ",
            "VALUES ($1, $2, $3, $4, $5, $6) RETURNING ",
            code_columns!()
        ))
        .bind(&new_code.value)
        .bind(new_code.namespace.as_str())
        .bind(new_code.kind.as_str())
        .bind(new_code.parent_id)
        .bind(resource_id)
        .bind(url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation_on_code(&e) {
                CodeError::DuplicateCode {
                    namespace: new_code.namespace,
                    value: new_code.value.clone(),
                }
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;

        Code::try_from(row)
    }

    async fn exists(&self, namespace: Namespace, value: &str) -> Result<bool, CodeError> {
        // NULL cutoff: every deactivated row still blocks reuse.
        let cutoff = self.reuse_policy.cutoff(Utc::now());

        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM codes
                WHERE namespace = $1
                  AND value = $2
                  AND (deactivated_at IS NULL OR $3::timestamptz IS NULL OR deactivated_at > $3)
            )
            "#,
        )
        .bind(namespace.as_str())
        .bind(value)
        .bind(cutoff)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(taken)
    }

    async fn lookup(&self, namespace: Namespace, value: &str) -> Result<Option<Code>, CodeError> {
        sqlx::query_as::<_, CodeRow>(concat!(
            "SELECT ",
            code_columns!(),
            " FROM codes WHERE namespace = $1 AND value = $2 AND deactivated_at IS NULL"
        ))
        .bind(namespace.as_str())
        .bind(value)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Code::try_from)
        .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Code>, CodeError> {
        sqlx::query_as::<_, CodeRow>(concat!(
            "SELECT ",
            code_columns!(),
            " FROM codes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(Code::try_from)
        .transpose()
    }

    async fn list_children(&self, parent_id: i64) -> Result<Vec<Code>, CodeError> {
        sqlx::query_as::<_, CodeRow>(concat!(
            "SELECT ",
            code_columns!(),
            " FROM codes WHERE parent_id = $1 AND deactivated_at IS NULL ORDER BY created_at, id"
        ))
        .bind(parent_id)
        .fetch_all(self.pool.as_ref())
        .await?
        .into_iter()
        .map(Code::try_from)
        .collect()
    }

    async fn list_by_resource(
        &self,
        namespace: Namespace,
        resource_id: i64,
    ) -> Result<Vec<Code>, CodeError> {
        sqlx::query_as::<_, CodeRow>(concat!(
            "SELECT ",
            code_columns!(),
            " FROM codes WHERE namespace = $1 AND kind = 'primary' AND target_resource_id = $2 ",
            "AND deactivated_at IS NULL ORDER BY created_at, id"
        ))
        .bind(namespace.as_str())
        .bind(resource_id)
        .fetch_all(self.pool.as_ref())
        .await?
        .into_iter()
        .map(Code::try_from)
        .collect()
    }

    async fn deactivate(&self, namespace: Namespace, value: &str) -> Result<usize, CodeError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let deactivated = sqlx::query_as::<_, (i64, String)>(
            r#"
            UPDATE codes SET deactivated_at = $3
            WHERE namespace = $1 AND value = $2 AND deactivated_at IS NULL
            RETURNING id, kind
            "#,
        )
        .bind(namespace.as_str())
        .bind(value)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((id, kind)) = deactivated else {
            return Ok(0);
        };

        let mut affected = 1;
        if kind == "primary" {
            let children = sqlx::query(
                "UPDATE codes SET deactivated_at = $2 WHERE parent_id = $1 AND deactivated_at IS NULL",
            )
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            affected += children.rows_affected() as usize;
        }

        tx.commit().await?;

        Ok(affected)
    }

    async fn deactivate_by_resource(
        &self,
        namespace: Namespace,
        resource_id: i64,
    ) -> Result<usize, CodeError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let parent_ids = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE codes SET deactivated_at = $3
            WHERE namespace = $1 AND kind = 'primary' AND target_resource_id = $2
              AND deactivated_at IS NULL
            RETURNING id
            "#,
        )
        .bind(namespace.as_str())
        .bind(resource_id)
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        if parent_ids.is_empty() {
            return Ok(0);
        }

        let children = sqlx::query(
            "UPDATE codes SET deactivated_at = $2 WHERE parent_id = ANY($1) AND deactivated_at IS NULL",
        )
        .bind(&parent_ids)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(parent_ids.len() + children.rows_affected() as usize)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
