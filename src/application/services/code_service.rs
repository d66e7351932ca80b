//! Code issuing, enumeration and deactivation service.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::domain::entities::{Code, Namespace, NewCode, ResourceRef};
use crate::domain::errors::CodeError;
use crate::domain::repositories::CodeRepository;
use crate::error::AppError;
use crate::utils::code_generator::{CodeGenerator, validate_custom_code};
use crate::utils::url_normalizer::normalize_url;

/// A primary code together with its live sub-codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTree {
    pub primary: Code,
    pub children: Vec<Code>,
}

/// Service for issuing and managing codes.
///
/// Generated codes follow an optimistic protocol: draw a candidate the
/// registry reports as free, then reserve it. A reservation that loses a race
/// (`DuplicateCode`) is retried with a fresh candidate. Both kinds of
/// collision draw from the same attempt budget.
pub struct CodeService<R: CodeRepository + ?Sized> {
    repository: Arc<R>,
    generator: CodeGenerator,
    public_base_url: String,
    allowed_schemes: Vec<String>,
}

impl<R: CodeRepository + ?Sized> CodeService<R> {
    pub fn new(
        repository: Arc<R>,
        generator: CodeGenerator,
        public_base_url: impl Into<String>,
        allowed_schemes: Vec<String>,
    ) -> Self {
        Self {
            repository,
            generator,
            public_base_url: public_base_url.into(),
            allowed_schemes,
        }
    }

    /// Issues the primary QR code of a chapter and one sub-code per target.
    ///
    /// External sub-targets are normalized before anything is reserved. If a
    /// sub-code cannot be reserved, the freshly issued primary code (and any
    /// sub-codes already attached to it) is deactivated before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for invalid custom codes or sub-targets
    /// - [`AppError::Conflict`] if the custom code is taken
    /// - [`AppError::Internal`] on exhaustion or store failures
    pub async fn issue_chapter_codes(
        &self,
        chapter_id: i64,
        custom_code: Option<String>,
        sub_targets: Vec<ResourceRef>,
    ) -> Result<CodeTree, AppError> {
        let sub_targets = sub_targets
            .into_iter()
            .map(|target| self.normalize_target(target))
            .collect::<Result<Vec<_>, _>>()?;

        let primary_target = ResourceRef::internal(chapter_id);
        let primary = match custom_code {
            Some(custom) => {
                self.reserve_custom(NewCode::primary(Namespace::Chapter, custom, primary_target))
                    .await?
            }
            None => {
                self.reserve_generated(Namespace::Chapter, |value| {
                    NewCode::primary(Namespace::Chapter, value, primary_target.clone())
                })
                .await?
            }
        };

        let mut children = Vec::with_capacity(sub_targets.len());
        for target in sub_targets {
            match self.reserve_sub(primary.id, target).await {
                Ok(child) => children.push(child),
                Err(e) => {
                    self.compensate(&primary).await;
                    return Err(e);
                }
            }
        }

        info!(
            chapter_id,
            code = %primary.value,
            sub_codes = children.len(),
            "Issued chapter codes"
        );

        Ok(CodeTree { primary, children })
    }

    /// Adds a sub-code under a live chapter primary code.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if no live chapter code has this value
    /// - [`AppError::Validation`] if the parent is itself a sub-code
    pub async fn add_sub_code(
        &self,
        parent_value: &str,
        target: ResourceRef,
    ) -> Result<Code, AppError> {
        let target = self.normalize_target(target)?;
        let parent = self.find_live(Namespace::Chapter, parent_value).await?;

        let child = self.reserve_sub(parent.id, target).await?;
        info!(parent = %parent.value, code = %child.value, "Added sub-code");

        Ok(child)
    }

    /// Shortens an external URL into a code in the `url` namespace.
    ///
    /// The URL is normalized (lowercase host, default port and fragment
    /// removed) and must use an allowed scheme.
    pub async fn shorten_url(
        &self,
        url: &str,
        custom_code: Option<String>,
    ) -> Result<Code, AppError> {
        let normalized = normalize_url(url, &self.allowed_schemes)?;
        let target = ResourceRef::external(normalized);

        let code = match custom_code {
            Some(custom) => {
                self.reserve_custom(NewCode::primary(Namespace::Url, custom, target))
                    .await?
            }
            None => {
                self.reserve_generated(Namespace::Url, |value| {
                    NewCode::primary(Namespace::Url, value, target.clone())
                })
                .await?
            }
        };

        info!(code = %code.value, "Shortened URL");
        Ok(code)
    }

    /// Returns a live code by value.
    pub async fn get_code(&self, namespace: Namespace, value: &str) -> Result<Code, AppError> {
        self.find_live(namespace, value).await
    }

    /// Returns a live chapter primary code and its live sub-codes.
    pub async fn list_children(&self, parent_value: &str) -> Result<CodeTree, AppError> {
        let primary = self.find_live(Namespace::Chapter, parent_value).await?;
        let children = self.repository.list_children(primary.id).await?;

        Ok(CodeTree { primary, children })
    }

    /// Lists every live primary code of a chapter with its sub-codes.
    pub async fn list_chapter_codes(&self, chapter_id: i64) -> Result<Vec<CodeTree>, AppError> {
        let primaries = self
            .repository
            .list_by_resource(Namespace::Chapter, chapter_id)
            .await?;

        let mut trees = Vec::with_capacity(primaries.len());
        for primary in primaries {
            let children = self.repository.list_children(primary.id).await?;
            trees.push(CodeTree { primary, children });
        }

        Ok(trees)
    }

    /// Deactivates a code, cascading to its sub-codes when it is a primary code.
    ///
    /// Returns the number of codes deactivated.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no live code matched.
    pub async fn deactivate(&self, namespace: Namespace, value: &str) -> Result<usize, AppError> {
        let affected = self.repository.deactivate(namespace, value).await?;

        if affected == 0 {
            return Err(AppError::not_found(
                "Code not found",
                json!({ "namespace": namespace, "code": value }),
            ));
        }

        info!(%namespace, code = %value, affected, "Deactivated code");
        Ok(affected)
    }

    /// Deactivates every code of a chapter. Called when the catalog deletes it.
    ///
    /// Deleting a chapter without codes is not an error.
    pub async fn deactivate_chapter(&self, chapter_id: i64) -> Result<usize, AppError> {
        let affected = self
            .repository
            .deactivate_by_resource(Namespace::Chapter, chapter_id)
            .await?;

        info!(chapter_id, affected, "Deactivated chapter codes");
        Ok(affected)
    }

    /// Public URL embedded in QR images and shared links.
    pub fn public_url(&self, code: &Code) -> String {
        let route = match code.namespace {
            Namespace::Chapter => "scan",
            Namespace::Url => "s",
        };

        format!(
            "{}/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            route,
            code.value
        )
    }

    async fn find_live(&self, namespace: Namespace, value: &str) -> Result<Code, AppError> {
        self.repository
            .lookup(namespace, value)
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    "Code not found",
                    json!({ "namespace": namespace, "code": value }),
                )
            })
    }

    async fn reserve_sub(&self, parent_id: i64, target: ResourceRef) -> Result<Code, AppError> {
        self.reserve_generated(Namespace::Chapter, |value| {
            NewCode::sub(Namespace::Chapter, value, parent_id, target.clone())
        })
        .await
    }

    async fn reserve_custom(&self, new_code: NewCode) -> Result<Code, AppError> {
        validate_custom_code(&new_code.value)?;

        if self
            .repository
            .exists(new_code.namespace, &new_code.value)
            .await?
        {
            return Err(CodeError::DuplicateCode {
                namespace: new_code.namespace,
                value: new_code.value,
            }
            .into());
        }

        Ok(self.repository.reserve(new_code).await?)
    }

    /// Draws and reserves a generated code.
    ///
    /// Candidates the registry reports as taken and reservations lost to a
    /// race share the generator's attempt budget.
    async fn reserve_generated<F>(&self, namespace: Namespace, build: F) -> Result<Code, AppError>
    where
        F: Fn(String) -> NewCode,
    {
        let repository = &*self.repository;
        let build = &build;

        let code = self
            .generator
            .generate(namespace, move |candidate: String| async move {
                if repository.exists(namespace, &candidate).await? {
                    return Ok(None);
                }

                match repository.reserve(build(candidate)).await {
                    Ok(code) => Ok(Some(code)),
                    Err(CodeError::DuplicateCode { value, .. }) => {
                        debug!(%namespace, code = %value, "Reservation lost a race");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;

        Ok(code)
    }

    fn normalize_target(&self, target: ResourceRef) -> Result<ResourceRef, AppError> {
        match target {
            ResourceRef::External { url } => Ok(ResourceRef::external(normalize_url(
                &url,
                &self.allowed_schemes,
            )?)),
            internal => Ok(internal),
        }
    }

    async fn compensate(&self, primary: &Code) {
        match self
            .repository
            .deactivate(primary.namespace, &primary.value)
            .await
        {
            Ok(affected) => warn!(
                code = %primary.value,
                affected,
                "Sub-code issuing failed, deactivated primary code"
            ),
            Err(e) => error!(
                code = %primary.value,
                error = %e,
                "Sub-code issuing failed and primary code could not be deactivated"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CodeKind;
    use crate::domain::repositories::MockCodeRepository;
    use crate::utils::code_generator::CodeSource;
    use chrono::Utc;
    use mockall::predicate::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out a fixed sequence of candidates, repeating the last one.
    struct SequenceSource(Mutex<Vec<&'static str>>);

    impl SequenceSource {
        fn new(values: &[&'static str]) -> Arc<Self> {
            let mut values = values.to_vec();
            values.reverse();
            Arc::new(Self(Mutex::new(values)))
        }
    }

    impl CodeSource for SequenceSource {
        fn draw(&self, _length: usize) -> String {
            let mut values = self.0.lock().unwrap();
            if values.len() > 1 {
                values.pop().unwrap().to_string()
            } else {
                values[0].to_string()
            }
        }
    }

    fn web() -> Vec<String> {
        vec!["http".to_string(), "https".to_string()]
    }

    fn service(mock: MockCodeRepository, values: &[&'static str]) -> CodeService<MockCodeRepository> {
        CodeService::new(
            Arc::new(mock),
            CodeGenerator::with_source(SequenceSource::new(values), 8, 5),
            "https://qr.example.com/",
            web(),
        )
    }

    fn stored(id: i64, new_code: NewCode) -> Code {
        Code {
            id,
            value: new_code.value,
            namespace: new_code.namespace,
            kind: new_code.kind,
            parent_id: new_code.parent_id,
            target: new_code.target,
            created_at: Utc::now(),
            deactivated_at: None,
        }
    }

    #[tokio::test]
    async fn test_issue_chapter_codes_with_sub_targets() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists().returning(|_, _| Ok(false));
        mock.expect_reserve()
            .times(3)
            .returning(|new_code| {
                let id = match new_code.kind {
                    CodeKind::Primary => 1,
                    CodeKind::Sub => 2,
                };
                Ok(stored(id, new_code))
            });

        let service = service(mock, &["p1p1p1p1", "s1s1s1s1", "s2s2s2s2"]);
        let tree = service
            .issue_chapter_codes(
                42,
                None,
                vec![
                    ResourceRef::external("https://Videos.Example.com/intro#t=10"),
                    ResourceRef::internal(43),
                ],
            )
            .await
            .unwrap();

        assert_eq!(tree.primary.value, "p1p1p1p1");
        assert_eq!(tree.primary.target, ResourceRef::internal(42));
        assert_eq!(tree.children.len(), 2);
        assert!(tree.children.iter().all(|c| c.parent_id == Some(1)));
        assert_eq!(
            tree.children[0].target,
            ResourceRef::external("https://videos.example.com/intro")
        );
    }

    #[tokio::test]
    async fn test_issue_chapter_codes_rejects_bad_sub_target_before_reserving() {
        let mut mock = MockCodeRepository::new();
        mock.expect_reserve().never();

        let service = service(mock, &["p1p1p1p1"]);
        let result = service
            .issue_chapter_codes(42, None, vec![ResourceRef::external("javascript:alert(1)")])
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_issue_chapter_codes_compensates_on_sub_failure() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists().returning(|_, _| Ok(false));
        mock.expect_reserve().returning(|new_code| match new_code.kind {
            CodeKind::Primary => Ok(stored(1, new_code)),
            CodeKind::Sub => Err(CodeError::StoreUnavailable("connection reset".into())),
        });
        mock.expect_deactivate()
            .with(eq(Namespace::Chapter), eq("p1p1p1p1"))
            .times(1)
            .returning(|_, _| Ok(1));

        let service = service(mock, &["p1p1p1p1", "s1s1s1s1"]);
        let result = service
            .issue_chapter_codes(42, None, vec![ResourceRef::internal(43)])
            .await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_generated_code_skips_taken_candidates() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists()
            .returning(|_, value| Ok(value == "taken111"));
        mock.expect_reserve()
            .withf(|new_code| new_code.value == "free2222")
            .times(1)
            .returning(|new_code| Ok(stored(1, new_code)));

        let service = service(mock, &["taken111", "free2222"]);
        let code = service.shorten_url("https://example.com/a", None).await.unwrap();

        assert_eq!(code.value, "free2222");
        assert_eq!(code.namespace, Namespace::Url);
    }

    #[tokio::test]
    async fn test_lost_reservation_race_is_retried() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists().returning(|_, _| Ok(false));
        mock.expect_reserve().returning(|new_code| {
            if new_code.value == "raced111" {
                Err(CodeError::DuplicateCode {
                    namespace: new_code.namespace,
                    value: new_code.value,
                })
            } else {
                Ok(stored(7, new_code))
            }
        });

        let service = service(mock, &["raced111", "won22222"]);
        let code = service.shorten_url("https://example.com", None).await.unwrap();

        assert_eq!(code.value, "won22222");
    }

    #[tokio::test]
    async fn test_generation_exhausted_after_max_attempts() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists().times(5).returning(|_, _| Ok(true));
        mock.expect_reserve().never();

        let service = service(mock, &["always11"]);
        let result = service.shorten_url("https://example.com", None).await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_taken_candidates_and_lost_races_share_attempt_budget() {
        let exists_calls = Arc::new(AtomicUsize::new(0));
        let reserve_calls = Arc::new(AtomicUsize::new(0));

        let mut mock = MockCodeRepository::new();
        let counter = exists_calls.clone();
        mock.expect_exists()
            .returning(move |_, _| Ok(counter.fetch_add(1, Ordering::SeqCst) % 2 == 0));
        let counter = reserve_calls.clone();
        mock.expect_reserve().returning(move |new_code| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CodeError::DuplicateCode {
                namespace: new_code.namespace,
                value: new_code.value,
            })
        });

        let service = service(mock, &["contend1"]);
        let result = service.shorten_url("https://example.com", None).await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
        assert_eq!(exists_calls.load(Ordering::SeqCst), 5);
        assert_eq!(reserve_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shorten_url_custom_code_conflict() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists()
            .with(eq(Namespace::Url), eq("my-link"))
            .returning(|_, _| Ok(true));
        mock.expect_reserve().never();

        let service = service(mock, &[]);
        let result = service
            .shorten_url("https://example.com", Some("my-link".to_string()))
            .await;

        assert!(matches!(result, Err(AppError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_shorten_url_rejects_reserved_custom_code() {
        let mut mock = MockCodeRepository::new();
        mock.expect_exists().never();

        let service = service(mock, &[]);
        let result = service
            .shorten_url("https://example.com", Some("health".to_string()))
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_shorten_url_rejects_disallowed_scheme() {
        let service = service(MockCodeRepository::new(), &[]);
        let result = service.shorten_url("ftp://example.com/file", None).await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_add_sub_code_unknown_parent() {
        let mut mock = MockCodeRepository::new();
        mock.expect_lookup().returning(|_, _| Ok(None));
        mock.expect_reserve().never();

        let service = service(mock, &["s1s1s1s1"]);
        let result = service
            .add_sub_code("missing1", ResourceRef::internal(42))
            .await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_deactivate_nothing_live_is_not_found() {
        let mut mock = MockCodeRepository::new();
        mock.expect_deactivate().returning(|_, _| Ok(0));

        let service = service(mock, &[]);
        let result = service.deactivate(Namespace::Url, "gone1234").await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_deactivate_chapter_without_codes_is_ok() {
        let mut mock = MockCodeRepository::new();
        mock.expect_deactivate_by_resource()
            .with(eq(Namespace::Chapter), eq(42))
            .returning(|_, _| Ok(0));

        let service = service(mock, &[]);
        assert_eq!(service.deactivate_chapter(42).await.unwrap(), 0);
    }

    #[test]
    fn test_public_url_per_namespace() {
        let service = service(MockCodeRepository::new(), &[]);

        let chapter = stored(
            1,
            NewCode::primary(Namespace::Chapter, "aB3xQ9kP", ResourceRef::internal(42)),
        );
        let url = stored(
            2,
            NewCode::primary(Namespace::Url, "xY7", ResourceRef::external("https://a.com")),
        );

        assert_eq!(service.public_url(&chapter), "https://qr.example.com/scan/aB3xQ9kP");
        assert_eq!(service.public_url(&url), "https://qr.example.com/s/xY7");
    }
}
