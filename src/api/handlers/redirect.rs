//! Handlers for scanned QR codes and short link redirects.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::application::services::Resolution;
use crate::domain::entities::Namespace;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a scanned chapter QR code.
///
/// # Endpoint
///
/// `GET /scan/{code}`
///
/// Codes are looked up in the `chapter` namespace only. Internal targets
/// redirect to the frontend deep link (`{FRONTEND_URL}/qr-scan/{id}`).
///
/// # Responses
///
/// - **302 Found** with `Location` and `Cache-Control: no-store`
/// - **400 Bad Request** if the code is empty, too long or malformed
/// - **404 Not Found** if no live code matches
/// - **500 Internal Server Error** if the code store is unavailable
pub async fn scan_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    resolve_and_redirect(&state, Namespace::Chapter, &code).await
}

/// Redirects a shortened URL.
///
/// # Endpoint
///
/// `GET /s/{code}`
///
/// Codes are looked up in the `url` namespace only. Responses as for
/// [`scan_handler`].
pub async fn short_url_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    resolve_and_redirect(&state, Namespace::Url, &code).await
}

/// Rejects `GET /scan` and `GET /s` without a code.
pub async fn missing_code_handler() -> AppError {
    AppError::bad_request("Missing code", json!({ "reason": "code is empty" }))
}

async fn resolve_and_redirect(
    state: &AppState,
    namespace: Namespace,
    code: &str,
) -> Result<Response, AppError> {
    match state.resolver.resolve(namespace, code).await? {
        Resolution::Redirect(location) => Ok(found(&location)),
        Resolution::NotFound => Err(AppError::not_found(
            "Code not found",
            json!({ "namespace": namespace, "code": code.trim() }),
        )),
        Resolution::Invalid(reason) => Err(AppError::bad_request(
            "Invalid code",
            json!({ "reason": reason }),
        )),
    }
}

/// `302 Found` that clients and proxies must not cache, so deactivation
/// takes effect on the next scan.
fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}
