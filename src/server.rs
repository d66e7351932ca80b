//! HTTP server initialization and runtime setup.
//!
//! Handles the registry backend, service wiring, and the Axum server lifecycle.

use crate::application::services::RedirectPolicy;
use crate::config::{Config, StorageBackend};
use crate::domain::repositories::CodeRepository;
use crate::infrastructure::persistence::{InMemoryCodeRepository, PgCodeRepository};
use crate::routes::app_router;
use crate::state::AppState;
use crate::utils::code_generator::CodeGenerator;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Opens the PostgreSQL pool with the configured limits.
pub async fn connect_pool(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")
}

/// Builds the application state for `config` around `repository`.
pub fn build_state(config: &Config, repository: Arc<dyn CodeRepository>) -> AppState {
    let generator = CodeGenerator::new(config.code_length, config.code_max_attempts);
    let policy = RedirectPolicy {
        frontend_url: config.frontend_url.clone(),
        deep_link_path: config.deep_link_path.clone(),
        allowed_schemes: config.allowed_url_schemes.clone(),
        max_input_length: config.code_max_input_length,
    };

    AppState::new(repository, generator, config.public_base_url.clone(), policy)
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations (or the in-memory registry)
/// - Code service and resolver
/// - Axum HTTP server with graceful shutdown
///
/// The pool is closed after the server has drained.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let (repository, pool): (Arc<dyn CodeRepository>, Option<PgPool>) =
        match config.storage_backend {
            StorageBackend::Postgres => {
                let pool = connect_pool(&config).await?;
                tracing::info!("Connected to database");

                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;
                tracing::info!("Migrations applied");

                let repository =
                    PgCodeRepository::new(Arc::new(pool.clone()), config.reuse_policy);
                (Arc::new(repository), Some(pool))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory code registry; codes are lost on restart");
                (
                    Arc::new(InMemoryCodeRepository::new(config.reuse_policy)),
                    None,
                )
            }
        };

    let state = build_state(&config, repository);
    let app = app_router(state, config.rate_limit_per_second, config.rate_limit_burst)?;

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(pool) = pool {
        pool.close().await;
        tracing::info!("Database pool closed");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
