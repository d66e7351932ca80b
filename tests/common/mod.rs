#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, routing::get};
use axum_test::TestServer;
use std::sync::Arc;

use qr_redirect::api::handlers::health_handler;
use qr_redirect::api::routes::{management_routes, redirect_routes};
use qr_redirect::application::services::RedirectPolicy;
use qr_redirect::domain::entities::{Code, Namespace, NewCode, ResourceRef, ReusePolicy};
use qr_redirect::domain::errors::CodeError;
use qr_redirect::domain::repositories::CodeRepository;
use qr_redirect::infrastructure::persistence::InMemoryCodeRepository;
use qr_redirect::state::AppState;
use qr_redirect::utils::code_generator::CodeGenerator;

pub const FRONTEND_URL: &str = "http://localhost:5173";
pub const PUBLIC_BASE_URL: &str = "http://localhost:5001";

pub fn memory_repository() -> Arc<InMemoryCodeRepository> {
    Arc::new(InMemoryCodeRepository::new(ReusePolicy::default()))
}

pub fn create_test_state(repository: Arc<dyn CodeRepository>) -> AppState {
    AppState::new(
        repository,
        CodeGenerator::default(),
        PUBLIC_BASE_URL,
        RedirectPolicy {
            frontend_url: FRONTEND_URL.to_string(),
            ..RedirectPolicy::default()
        },
    )
}

/// Application routes without the per-IP rate limiter.
pub fn test_app(state: AppState) -> Router {
    Router::new()
        .merge(redirect_routes())
        .route("/health", get(health_handler))
        .nest("/api", management_routes())
        .with_state(state)
}

pub fn test_server(repository: Arc<dyn CodeRepository>) -> TestServer {
    TestServer::new(test_app(create_test_state(repository))).unwrap()
}

pub async fn seed_chapter(repo: &dyn CodeRepository, value: &str, chapter_id: i64) -> Code {
    repo.reserve(NewCode::primary(
        Namespace::Chapter,
        value,
        ResourceRef::internal(chapter_id),
    ))
    .await
    .unwrap()
}

pub async fn seed_sub(repo: &dyn CodeRepository, value: &str, parent: &Code, url: &str) -> Code {
    repo.reserve(NewCode::sub(
        Namespace::Chapter,
        value,
        parent.id,
        ResourceRef::external(url),
    ))
    .await
    .unwrap()
}

pub async fn seed_url(repo: &dyn CodeRepository, value: &str, url: &str) -> Code {
    repo.reserve(NewCode::primary(
        Namespace::Url,
        value,
        ResourceRef::external(url),
    ))
    .await
    .unwrap()
}

/// Registry whose backing store is down.
pub struct UnavailableRepository;

fn down() -> CodeError {
    CodeError::StoreUnavailable("connection refused".to_string())
}

#[async_trait]
impl CodeRepository for UnavailableRepository {
    async fn reserve(&self, _new_code: NewCode) -> Result<Code, CodeError> {
        Err(down())
    }

    async fn exists(&self, _namespace: Namespace, _value: &str) -> Result<bool, CodeError> {
        Err(down())
    }

    async fn lookup(&self, _namespace: Namespace, _value: &str) -> Result<Option<Code>, CodeError> {
        Err(down())
    }

    async fn find_by_id(&self, _id: i64) -> Result<Option<Code>, CodeError> {
        Err(down())
    }

    async fn list_children(&self, _parent_id: i64) -> Result<Vec<Code>, CodeError> {
        Err(down())
    }

    async fn list_by_resource(
        &self,
        _namespace: Namespace,
        _resource_id: i64,
    ) -> Result<Vec<Code>, CodeError> {
        Err(down())
    }

    async fn deactivate(&self, _namespace: Namespace, _value: &str) -> Result<usize, CodeError> {
        Err(down())
    }

    async fn deactivate_by_resource(
        &self,
        _namespace: Namespace,
        _resource_id: i64,
    ) -> Result<usize, CodeError> {
        Err(down())
    }

    async fn health_check(&self) -> bool {
        false
    }
}
