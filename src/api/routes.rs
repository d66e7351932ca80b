//! API route configuration.

use crate::api::handlers::{
    add_sub_code_handler, deactivate_code_handler, delete_chapter_codes_handler,
    issue_chapter_codes_handler, list_chapter_codes_handler, list_children_handler,
    missing_code_handler, scan_handler, short_url_handler, shorten_url_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Public redirect routes hit by scanned QR codes and shared links.
///
/// # Endpoints
///
/// - `GET /scan/{code}` - Chapter QR code redirect
/// - `GET /s/{code}`    - Short URL redirect
/// - `GET /scan`, `GET /s` - Missing code (400)
pub fn redirect_routes() -> Router<AppState> {
    Router::new()
        .route("/scan", get(missing_code_handler))
        .route("/scan/{code}", get(scan_handler))
        .route("/s", get(missing_code_handler))
        .route("/s/{code}", get(short_url_handler))
}

/// Management routes called by the catalog service, mounted under `/api`.
///
/// # Endpoints
///
/// - `POST   /chapters/{chapter_id}/codes`  - Issue chapter codes
/// - `GET    /chapters/{chapter_id}/codes`  - List chapter codes with sub-codes
/// - `DELETE /chapters/{chapter_id}/codes`  - Chapter deletion hook
/// - `GET    /codes/{namespace}/{code}/children` - List sub-codes
/// - `POST   /codes/{namespace}/{code}/children` - Add a sub-code
/// - `DELETE /codes/{namespace}/{code}`          - Deactivate one code (cascades)
/// - `POST   /urls`                         - Shorten an external URL
pub fn management_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/chapters/{chapter_id}/codes",
            post(issue_chapter_codes_handler)
                .get(list_chapter_codes_handler)
                .delete(delete_chapter_codes_handler),
        )
        .route(
            "/codes/{namespace}/{code}/children",
            get(list_children_handler).post(add_sub_code_handler),
        )
        .route("/codes/{namespace}/{code}", delete(deactivate_code_handler))
        .route("/urls", post(shorten_url_handler))
}
