mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use qr_redirect::application::services::{CodeService, RedirectPolicy, Resolution, Resolver};
use qr_redirect::domain::entities::{Namespace, NewCode, ResourceRef};
use qr_redirect::domain::errors::CodeError;
use qr_redirect::domain::repositories::CodeRepository;
use qr_redirect::error::AppError;
use qr_redirect::infrastructure::persistence::InMemoryCodeRepository;
use qr_redirect::utils::code_generator::{CodeGenerator, CodeSource};

/// Hands out every candidate twice, so concurrent issuers keep colliding.
struct DoubledSource(AtomicUsize);

impl CodeSource for DoubledSource {
    fn draw(&self, _length: usize) -> String {
        let n = self.0.fetch_add(1, Ordering::SeqCst) / 2;
        format!("dbl{n:07}")
    }
}

/// Always draws the same candidate.
struct FixedSource(&'static str);

impl CodeSource for FixedSource {
    fn draw(&self, _length: usize) -> String {
        self.0.to_string()
    }
}

fn web() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn service(
    repo: Arc<InMemoryCodeRepository>,
    generator: CodeGenerator,
) -> Arc<CodeService<InMemoryCodeRepository>> {
    Arc::new(CodeService::new(
        repo,
        generator,
        common::PUBLIC_BASE_URL,
        web(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserve_of_same_value() {
    let repo = common::memory_repository();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.reserve(NewCode::primary(
                    Namespace::Chapter,
                    "contested",
                    ResourceRef::internal(i),
                ))
                .await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(CodeError::DuplicateCode { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(winners, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_issuance_yields_distinct_codes() {
    let repo = common::memory_repository();
    let generator =
        CodeGenerator::with_source(Arc::new(DoubledSource(AtomicUsize::new(0))), 10, 20);
    let service = service(repo.clone(), generator);

    let handles: Vec<_> = (0..32)
        .map(|chapter_id| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .issue_chapter_codes(
                        chapter_id,
                        None,
                        vec![ResourceRef::external("https://videos.example.com/a")],
                    )
                    .await
            })
        })
        .collect();

    let mut values = HashSet::new();
    for handle in handles {
        let tree = handle.await.unwrap().unwrap();
        assert!(values.insert(tree.primary.value));
        for child in tree.children {
            assert!(values.insert(child.value));
        }
    }

    assert_eq!(values.len(), 64);

    for value in &values {
        let code = repo.lookup(Namespace::Chapter, value).await.unwrap();
        assert!(code.is_some(), "{value} should be live");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sub_codes_racing_parent_deactivation() {
    let repo = common::memory_repository();
    let parent = common::seed_chapter(repo.as_ref(), "parent01", 42).await;
    let service = service(repo.clone(), CodeGenerator::default());

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .add_sub_code("parent01", ResourceRef::internal(i))
                .await
                .map(|_| ())
        }));
    }
    {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .deactivate(Namespace::Chapter, "parent01")
                .await
                .map(|_| ())
        }));
    }

    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) | Err(AppError::NotFound { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert!(repo.list_children(parent.id).await.unwrap().is_empty());
    assert!(
        repo.lookup(Namespace::Chapter, "parent01")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_generation_exhausted_after_repeated_collisions() {
    let repo = common::memory_repository();
    common::seed_chapter(repo.as_ref(), "taken0001", 1).await;
    let generator = CodeGenerator::with_source(Arc::new(FixedSource("taken0001")), 9, 5);
    let service = service(repo, generator);

    let result = service.issue_chapter_codes(2, None, Vec::new()).await;

    assert!(matches!(result, Err(AppError::Internal { .. })));
}

#[tokio::test]
async fn test_reserved_code_resolves_to_chapter() {
    let repo = common::memory_repository();
    common::seed_chapter(repo.as_ref(), "aB3xQ9kP", 42).await;
    let resolver = Resolver::new(
        repo,
        RedirectPolicy {
            frontend_url: common::FRONTEND_URL.to_string(),
            ..RedirectPolicy::default()
        },
    );

    let first = resolver.resolve(Namespace::Chapter, "aB3xQ9kP").await.unwrap();
    let second = resolver.resolve(Namespace::Chapter, "aB3xQ9kP").await.unwrap();

    assert_eq!(
        first,
        Resolution::Redirect("http://localhost:5173/qr-scan/42".to_string())
    );
    assert_eq!(first, second);
    assert_eq!(
        resolver.resolve(Namespace::Url, "aB3xQ9kP").await.unwrap(),
        Resolution::NotFound
    );
}
