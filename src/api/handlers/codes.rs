//! Handlers for code management endpoints.
//!
//! These are called by the catalog service when chapters are created,
//! edited and deleted, and by operators sharing generic short links.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::codes::{
    AddSubCodeRequest, ChapterCodesResponse, CodeResponse, CodeTreeResponse, DeactivatedResponse,
    IssueChapterCodesRequest, ShortenUrlRequest,
};
use crate::application::services::CodeTree;
use crate::domain::entities::{Code, Namespace};
use crate::error::AppError;
use crate::state::AppState;

/// Issues the primary QR code of a chapter and its sub-codes.
///
/// # Endpoint
///
/// `POST /api/chapters/{chapter_id}/codes`
///
/// # Request Body
///
/// ```json
/// {
///   "custom_code": "algebra-ch1",
///   "sub_targets": [{ "type": "external", "url": "https://videos.example.com/intro" }]
/// }
/// ```
///
/// # Response
///
/// `201 Created` with the primary code and its children:
///
/// ```json
/// {
///   "code": "aB3xQ9kPzR",
///   "namespace": "chapter",
///   "kind": "primary",
///   "target": { "type": "internal", "resource_id": 42 },
///   "public_url": "http://localhost:5001/scan/aB3xQ9kPzR",
///   "created_at": "2025-01-01T00:00:00Z",
///   "children": [ ... ]
/// }
/// ```
///
/// # Errors
///
/// Returns 400 for invalid input, 409 if the custom code is taken.
pub async fn issue_chapter_codes_handler(
    Path(chapter_id): Path<i64>,
    State(state): State<AppState>,
    Json(payload): Json<IssueChapterCodesRequest>,
) -> Result<(StatusCode, Json<CodeTreeResponse>), AppError> {
    payload.validate()?;

    let tree = state
        .code_service
        .issue_chapter_codes(chapter_id, payload.custom_code, payload.sub_targets)
        .await?;

    Ok((StatusCode::CREATED, Json(tree_response(&state, tree))))
}

/// Lists the live codes of a chapter with their sub-codes.
///
/// # Endpoint
///
/// `GET /api/chapters/{chapter_id}/codes`
pub async fn list_chapter_codes_handler(
    Path(chapter_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ChapterCodesResponse>, AppError> {
    let trees = state.code_service.list_chapter_codes(chapter_id).await?;

    Ok(Json(ChapterCodesResponse {
        chapter_id,
        codes: trees
            .into_iter()
            .map(|tree| tree_response(&state, tree))
            .collect(),
    }))
}

/// Deactivates every code of a deleted chapter.
///
/// # Endpoint
///
/// `DELETE /api/chapters/{chapter_id}/codes`
///
/// Idempotent: returns `{ "deactivated": 0 }` when nothing was live.
pub async fn delete_chapter_codes_handler(
    Path(chapter_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<DeactivatedResponse>, AppError> {
    let deactivated = state.code_service.deactivate_chapter(chapter_id).await?;

    Ok(Json(DeactivatedResponse { deactivated }))
}

/// Lists the sub-codes of a chapter code.
///
/// # Endpoint
///
/// `GET /api/codes/{namespace}/{code}/children`
pub async fn list_children_handler(
    Path((namespace, code)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<CodeTreeResponse>, AppError> {
    require_chapter(&namespace)?;
    let tree = state.code_service.list_children(&code).await?;

    Ok(Json(tree_response(&state, tree)))
}

/// Adds a sub-code under a chapter code.
///
/// # Endpoint
///
/// `POST /api/codes/{namespace}/{code}/children`
///
/// # Errors
///
/// Returns 404 if the parent is not a live chapter code, 400 if the parent
/// is itself a sub-code or lives outside the `chapter` namespace.
pub async fn add_sub_code_handler(
    Path((namespace, code)): Path<(String, String)>,
    State(state): State<AppState>,
    Json(payload): Json<AddSubCodeRequest>,
) -> Result<(StatusCode, Json<CodeResponse>), AppError> {
    require_chapter(&namespace)?;
    let child = state
        .code_service
        .add_sub_code(&code, payload.target)
        .await?;

    Ok((StatusCode::CREATED, Json(code_response(&state, child))))
}

/// Deactivates one code; primary codes take their sub-codes with them.
///
/// # Endpoint
///
/// `DELETE /api/codes/{namespace}/{code}`
///
/// # Response
///
/// `204 No Content`, or 404 if no live code matched.
pub async fn deactivate_code_handler(
    Path((namespace, code)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let namespace = parse_namespace(&namespace)?;

    state.code_service.deactivate(namespace, &code).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Shortens an external URL.
///
/// # Endpoint
///
/// `POST /api/urls`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com/article", "custom_code": "my-link" }
/// ```
///
/// # Response
///
/// `201 Created` with the code and its `/s/{code}` public URL.
pub async fn shorten_url_handler(
    State(state): State<AppState>,
    Json(payload): Json<ShortenUrlRequest>,
) -> Result<(StatusCode, Json<CodeResponse>), AppError> {
    payload.validate()?;

    let code = state
        .code_service
        .shorten_url(&payload.url, payload.custom_code)
        .await?;

    Ok((StatusCode::CREATED, Json(code_response(&state, code))))
}

fn parse_namespace(raw: &str) -> Result<Namespace, AppError> {
    raw.parse().map_err(|reason: String| {
        AppError::bad_request("Unknown namespace", json!({ "reason": reason }))
    })
}

/// Sub-codes only exist under chapter codes.
fn require_chapter(raw: &str) -> Result<(), AppError> {
    match parse_namespace(raw)? {
        Namespace::Chapter => Ok(()),
        other => Err(AppError::bad_request(
            "Sub-codes are only supported for chapter codes",
            json!({ "namespace": other }),
        )),
    }
}

fn code_response(state: &AppState, code: Code) -> CodeResponse {
    let public_url = state.code_service.public_url(&code);
    CodeResponse::new(code, public_url)
}

fn tree_response(state: &AppState, tree: CodeTree) -> CodeTreeResponse {
    CodeTreeResponse::new(tree, |code| state.code_service.public_url(code))
}
