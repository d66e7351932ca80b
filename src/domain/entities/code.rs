//! Code entity: a short value embedded in a QR image or short link.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Partition of the code space.
///
/// Uniqueness and lookups are scoped to a namespace, so a printed chapter QR
/// code can never resolve a generic short link and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Chapter QR codes: chapter primary codes and their sub-codes.
    Chapter,
    /// Generic shortened URLs.
    Url,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Chapter => "chapter",
            Namespace::Url => "url",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chapter" => Ok(Namespace::Chapter),
            "url" => Ok(Namespace::Url),
            other => Err(format!("unknown namespace '{other}'")),
        }
    }
}

/// Role of a code in the parent/child hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeKind {
    Primary,
    Sub,
}

impl CodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::Primary => "primary",
            CodeKind::Sub => "sub",
        }
    }
}

impl FromStr for CodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(CodeKind::Primary),
            "sub" => Ok(CodeKind::Sub),
            other => Err(format!("unknown code kind '{other}'")),
        }
    }
}

/// What a code ultimately points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceRef {
    /// A catalog entity, e.g. a chapter id.
    Internal { resource_id: i64 },
    /// An external URL, redirected to as-is.
    External { url: String },
}

impl ResourceRef {
    pub fn internal(resource_id: i64) -> Self {
        Self::Internal { resource_id }
    }

    pub fn external(url: impl Into<String>) -> Self {
        Self::External { url: url.into() }
    }

    /// Splits the reference into its storage columns.
    pub fn into_columns(self) -> (Option<i64>, Option<String>) {
        match self {
            ResourceRef::Internal { resource_id } => (Some(resource_id), None),
            ResourceRef::External { url } => (None, Some(url)),
        }
    }

    /// Rebuilds a reference from storage columns.
    ///
    /// Returns `None` unless exactly one column is set.
    pub fn from_columns(resource_id: Option<i64>, url: Option<String>) -> Option<Self> {
        match (resource_id, url) {
            (Some(resource_id), None) => Some(Self::Internal { resource_id }),
            (None, Some(url)) => Some(Self::External { url }),
            _ => None,
        }
    }
}

/// An issued code.
///
/// Codes are immutable once issued. The only state change is deactivation,
/// after which the row is kept for audit but never resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub id: i64,
    pub value: String,
    pub namespace: Namespace,
    pub kind: CodeKind,
    pub parent_id: Option<i64>,
    pub target: ResourceRef,
    pub created_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Code {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }

    pub fn is_primary(&self) -> bool {
        self.kind == CodeKind::Primary
    }
}

/// Input for reserving a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCode {
    pub value: String,
    pub namespace: Namespace,
    pub kind: CodeKind,
    pub parent_id: Option<i64>,
    pub target: ResourceRef,
}

impl NewCode {
    pub fn primary(namespace: Namespace, value: impl Into<String>, target: ResourceRef) -> Self {
        Self {
            value: value.into(),
            namespace,
            kind: CodeKind::Primary,
            parent_id: None,
            target,
        }
    }

    pub fn sub(
        namespace: Namespace,
        value: impl Into<String>,
        parent_id: i64,
        target: ResourceRef,
    ) -> Self {
        Self {
            value: value.into(),
            namespace,
            kind: CodeKind::Sub,
            parent_id: Some(parent_id),
            target,
        }
    }
}

/// When a deactivated value may be issued again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReusePolicy {
    /// Deactivated values stay blocked forever.
    Never,
    /// Deactivated values become free once the grace period has elapsed.
    AfterGrace(Duration),
}

impl ReusePolicy {
    /// Returns true if a value deactivated at `deactivated_at` still blocks reuse.
    pub fn blocks(&self, deactivated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            ReusePolicy::Never => true,
            ReusePolicy::AfterGrace(grace) => now < deactivated_at + *grace,
        }
    }

    /// Start of the blocking window; `None` means all deactivated rows block.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ReusePolicy::Never => None,
            ReusePolicy::AfterGrace(grace) => Some(now - *grace),
        }
    }
}

impl Default for ReusePolicy {
    fn default() -> Self {
        ReusePolicy::AfterGrace(Duration::days(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_round_trip_through_str() {
        for ns in [Namespace::Chapter, Namespace::Url] {
            assert_eq!(ns.as_str().parse::<Namespace>().unwrap(), ns);
        }
        assert!("sub".parse::<Namespace>().is_err());
    }

    #[test]
    fn test_resource_ref_columns() {
        let (id, url) = ResourceRef::internal(42).into_columns();
        assert_eq!(id, Some(42));
        assert!(url.is_none());

        assert_eq!(
            ResourceRef::from_columns(None, Some("https://example.com".into())),
            Some(ResourceRef::external("https://example.com"))
        );
        assert!(ResourceRef::from_columns(Some(1), Some("https://x.y".into())).is_none());
        assert!(ResourceRef::from_columns(None, None).is_none());
    }

    #[test]
    fn test_resource_ref_serializes_tagged() {
        let json = serde_json::to_value(ResourceRef::internal(7)).unwrap();
        assert_eq!(json["type"], "internal");
        assert_eq!(json["resource_id"], 7);
    }

    #[test]
    fn test_new_code_sub_sets_parent() {
        let code = NewCode::sub(Namespace::Chapter, "s1", 9, ResourceRef::internal(42));
        assert_eq!(code.kind, CodeKind::Sub);
        assert_eq!(code.parent_id, Some(9));
    }

    #[test]
    fn test_reuse_policy_never_blocks() {
        let now = Utc::now();
        assert!(ReusePolicy::Never.blocks(now - Duration::days(3650), now));
        assert!(ReusePolicy::Never.cutoff(now).is_none());
    }

    #[test]
    fn test_reuse_policy_grace_window() {
        let now = Utc::now();
        let policy = ReusePolicy::AfterGrace(Duration::days(30));
        assert!(policy.blocks(now - Duration::days(1), now));
        assert!(!policy.blocks(now - Duration::days(31), now));
    }

    #[test]
    fn test_code_state_helpers() {
        let code = Code {
            id: 1,
            value: "p1".into(),
            namespace: Namespace::Chapter,
            kind: CodeKind::Primary,
            parent_id: None,
            target: ResourceRef::internal(42),
            created_at: Utc::now(),
            deactivated_at: None,
        };
        assert!(code.is_active());
        assert!(code.is_primary());
    }
}
