mod common;

use axum::http::StatusCode;
use qr_redirect::domain::entities::Namespace;
use qr_redirect::domain::repositories::CodeRepository;
use std::sync::Arc;

#[tokio::test]
async fn test_scan_redirects_to_deep_link() {
    let repo = common::memory_repository();
    common::seed_chapter(repo.as_ref(), "aB3xQ9kP", 42).await;
    let server = common::test_server(repo);

    let response = server.get("/scan/aB3xQ9kP").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.header("location"), "http://localhost:5173/qr-scan/42");
    assert_eq!(response.header("cache-control"), "no-store");
}

#[tokio::test]
async fn test_scan_is_case_sensitive() {
    let repo = common::memory_repository();
    common::seed_chapter(repo.as_ref(), "aB3xQ9kP", 42).await;
    let server = common::test_server(repo);

    server.get("/scan/AB3XQ9KP").await.assert_status_not_found();
}

#[tokio::test]
async fn test_scan_unknown_code_returns_json_404() {
    let server = common::test_server(common::memory_repository());

    let response = server.get("/scan/notexist1").await;

    response.assert_status_not_found();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "not_found");
    assert!(json["error"]["message"].is_string());
}

#[tokio::test]
async fn test_scan_without_code_is_bad_request() {
    let server = common::test_server(common::memory_repository());

    let response = server.get("/scan").await;

    response.assert_status_bad_request();
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_scan_rejects_malformed_codes() {
    let server = common::test_server(common::memory_repository());

    for path in ["/scan/%20%20", "/scan/ab.cd", "/scan/%3Cscript%3E"] {
        let response = server.get(path).await;
        assert_eq!(
            response.status_code(),
            StatusCode::BAD_REQUEST,
            "{path} should be rejected"
        );
    }

    let too_long = format!("/scan/{}", "a".repeat(65));
    server.get(&too_long).await.assert_status_bad_request();
}

#[tokio::test]
async fn test_scan_trims_surrounding_whitespace() {
    let repo = common::memory_repository();
    common::seed_chapter(repo.as_ref(), "trim1234", 7).await;
    let server = common::test_server(repo);

    let response = server.get("/scan/%20trim1234%20").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.header("location"), "http://localhost:5173/qr-scan/7");
}

#[tokio::test]
async fn test_scan_does_not_resolve_short_links() {
    let repo = common::memory_repository();
    common::seed_url(repo.as_ref(), "xY7abcde", "https://example.com").await;
    let server = common::test_server(repo);

    server.get("/scan/xY7abcde").await.assert_status_not_found();
}

#[tokio::test]
async fn test_scan_resolves_sub_code() {
    let repo = common::memory_repository();
    let parent = common::seed_chapter(repo.as_ref(), "p1", 42).await;
    common::seed_sub(repo.as_ref(), "s1", &parent, "https://videos.example.com/intro").await;
    let server = common::test_server(repo);

    let response = server.get("/scan/s1").await;

    assert_eq!(response.status_code(), StatusCode::FOUND);
    assert_eq!(response.header("location"), "https://videos.example.com/intro");
}

#[tokio::test]
async fn test_deactivated_primary_takes_sub_codes_down() {
    let repo = common::memory_repository();
    let parent = common::seed_chapter(repo.as_ref(), "p1", 42).await;
    common::seed_sub(repo.as_ref(), "s1", &parent, "https://videos.example.com/1").await;
    common::seed_sub(repo.as_ref(), "s2", &parent, "https://videos.example.com/2").await;
    let server = common::test_server(repo.clone());

    for code in ["p1", "s1", "s2"] {
        assert_eq!(
            server.get(&format!("/scan/{code}")).await.status_code(),
            StatusCode::FOUND
        );
    }

    assert_eq!(repo.deactivate(Namespace::Chapter, "p1").await.unwrap(), 3);

    for code in ["p1", "s1", "s2"] {
        server
            .get(&format!("/scan/{code}"))
            .await
            .assert_status_not_found();
    }
}

#[tokio::test]
async fn test_scan_store_failure_returns_generic_500() {
    let server = common::test_server(Arc::new(common::UnavailableRepository));

    let response = server.get("/scan/aB3xQ9kP").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["error"]["code"], "internal_error");
    assert!(
        !json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );
}
