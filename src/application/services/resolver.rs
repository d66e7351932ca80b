//! Resolution of inbound codes into redirect targets.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::domain::entities::{Namespace, ResourceRef};
use crate::domain::errors::CodeError;
use crate::domain::repositories::CodeRepository;
use crate::utils::code_generator::{DEFAULT_MAX_INPUT_LENGTH, normalize_code};
use crate::utils::url_normalizer::validate_redirect_url;

/// Where resolved codes may send the client.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    /// Base URL of the frontend application.
    pub frontend_url: String,
    /// Path segment of the frontend deep link for internal resources.
    pub deep_link_path: String,
    /// Schemes an external target may use.
    pub allowed_schemes: Vec<String>,
    /// Longest raw input accepted before lookup.
    pub max_input_length: usize,
}

impl RedirectPolicy {
    /// Deep link of an internal resource: `{frontend_url}/{deep_link_path}/{id}`.
    pub fn deep_link(&self, resource_id: i64) -> String {
        format!(
            "{}/{}/{}",
            self.frontend_url.trim_end_matches('/'),
            self.deep_link_path.trim_matches('/'),
            resource_id
        )
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            deep_link_path: "qr-scan".to_string(),
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
        }
    }
}

/// Outcome of resolving one inbound code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute URL to redirect to.
    Redirect(String),
    NotFound,
    /// Input rejected before lookup.
    Invalid(String),
}

impl Resolution {
    fn outcome(&self) -> &'static str {
        match self {
            Resolution::Redirect(_) => "redirect",
            Resolution::NotFound => "not_found",
            Resolution::Invalid(_) => "invalid",
        }
    }
}

/// Turns raw scanned or clicked input into a [`Resolution`].
///
/// Each call performs at most one registry lookup, in the namespace chosen by
/// the caller. Resolution has no side effects, so resolving a live code
/// repeatedly always yields the same target.
pub struct Resolver<R: CodeRepository + ?Sized> {
    repository: Arc<R>,
    policy: RedirectPolicy,
}

impl<R: CodeRepository + ?Sized> Resolver<R> {
    pub fn new(repository: Arc<R>, policy: RedirectPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    /// Resolves `raw` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::StoreUnavailable`] if the registry lookup fails.
    pub async fn resolve(&self, namespace: Namespace, raw: &str) -> Result<Resolution, CodeError> {
        let result = self.resolve_inner(namespace, raw).await;

        let outcome = match &result {
            Ok(resolution) => resolution.outcome(),
            Err(_) => "error",
        };
        metrics::counter!(
            "code_resolutions_total",
            "namespace" => namespace.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn resolve_inner(
        &self,
        namespace: Namespace,
        raw: &str,
    ) -> Result<Resolution, CodeError> {
        let value = match normalize_code(raw, self.policy.max_input_length) {
            Ok(value) => value,
            Err(CodeError::Invalid(reason)) => {
                debug!(%namespace, input_len = raw.len(), %reason, "Rejected inbound code");
                return Ok(Resolution::Invalid(reason));
            }
            Err(e) => return Err(e),
        };

        let code = match self.repository.lookup(namespace, &value).await {
            Ok(Some(code)) => code,
            Ok(None) => {
                debug!(%namespace, code = %value, "Code not found");
                return Ok(Resolution::NotFound);
            }
            Err(e) => {
                error!(%namespace, code = %value, error = %e, "Code lookup failed");
                return Err(e);
            }
        };

        match code.target {
            ResourceRef::Internal { resource_id } => {
                Ok(Resolution::Redirect(self.policy.deep_link(resource_id)))
            }
            ResourceRef::External { url } => {
                match validate_redirect_url(&url, &self.policy.allowed_schemes) {
                    Ok(_) => Ok(Resolution::Redirect(url)),
                    Err(e) => {
                        warn!(
                            %namespace,
                            code = %value,
                            error = %e,
                            "Stored target is not a safe redirect, refusing"
                        );
                        Ok(Resolution::NotFound)
                    }
                }
            }
        }
    }
}
