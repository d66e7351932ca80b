//! DTOs for code management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::CodeTree;
use crate::domain::entities::{Code, CodeKind, Namespace, ResourceRef};

/// Request to issue the codes of a chapter.
///
/// ```json
/// {
///   "custom_code": "algebra-ch1",
///   "sub_targets": [
///     { "type": "external", "url": "https://videos.example.com/intro" },
///     { "type": "internal", "resource_id": 43 }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize, Validate)]
pub struct IssueChapterCodesRequest {
    /// Optional custom primary code (otherwise generated).
    #[validate(length(min = 4, max = 32))]
    pub custom_code: Option<String>,

    /// Targets of the sub-codes issued under the primary code.
    #[serde(default)]
    #[validate(length(max = 50))]
    pub sub_targets: Vec<ResourceRef>,
}

/// Request to add one sub-code under a chapter code.
#[derive(Debug, Deserialize)]
pub struct AddSubCodeRequest {
    pub target: ResourceRef,
}

/// Request to shorten an external URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenUrlRequest {
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,

    #[validate(length(min = 4, max = 32))]
    pub custom_code: Option<String>,
}

/// A single code as returned by the API.
#[derive(Debug, Serialize)]
pub struct CodeResponse {
    pub code: String,
    pub namespace: Namespace,
    pub kind: CodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    pub target: ResourceRef,
    /// URL to print into the QR image or share.
    pub public_url: String,
    pub created_at: DateTime<Utc>,
}

impl CodeResponse {
    pub fn new(code: Code, public_url: String) -> Self {
        Self {
            code: code.value,
            namespace: code.namespace,
            kind: code.kind,
            parent_id: code.parent_id,
            target: code.target,
            public_url,
            created_at: code.created_at,
        }
    }
}

/// A primary code with its sub-codes.
#[derive(Debug, Serialize)]
pub struct CodeTreeResponse {
    #[serde(flatten)]
    pub primary: CodeResponse,
    pub children: Vec<CodeResponse>,
}

impl CodeTreeResponse {
    pub fn new(tree: CodeTree, public_url: impl Fn(&Code) -> String) -> Self {
        let primary_url = public_url(&tree.primary);
        Self {
            primary: CodeResponse::new(tree.primary, primary_url),
            children: tree
                .children
                .into_iter()
                .map(|child| {
                    let url = public_url(&child);
                    CodeResponse::new(child, url)
                })
                .collect(),
        }
    }
}

/// All live codes of a chapter.
#[derive(Debug, Serialize)]
pub struct ChapterCodesResponse {
    pub chapter_id: i64,
    pub codes: Vec<CodeTreeResponse>,
}

/// Number of codes deactivated by a bulk operation.
#[derive(Debug, Serialize)]
pub struct DeactivatedResponse {
    pub deactivated: usize,
}
