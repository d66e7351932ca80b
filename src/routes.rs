//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET /scan/{code}` - Chapter QR code redirect (public, rate limited)
//! - `GET /s/{code}`    - Short URL redirect (public, rate limited)
//! - `GET /health`      - Health check of the code store
//! - `/api/*`           - Management API for the catalog service
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Per-IP token bucket on the redirect routes
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{rate_limit, tracing};
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `per_second` / `burst` - per-IP limits of the redirect routes
///
/// # Errors
///
/// Returns an error if the rate limits are invalid.
pub fn app_router(
    state: AppState,
    per_second: u64,
    burst: u32,
) -> anyhow::Result<NormalizePath<Router>> {
    let redirects = api::routes::redirect_routes().layer(rate_limit::layer(per_second, burst)?);

    let router = Router::new()
        .merge(redirects)
        .route("/health", get(health_handler))
        .nest("/api", api::routes::management_routes())
        .with_state(state)
        .layer(tracing::layer());

    Ok(NormalizePathLayer::trim_trailing_slash().layer(router))
}
