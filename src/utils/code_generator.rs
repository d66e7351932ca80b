//! Short code generation and validation utilities.
//!
//! Codes are drawn from a fixed, case-sensitive alphanumeric alphabet
//! (`A-Z`, `a-z`, `0-9`, 62 symbols). QR payloads are case-sensitive, so the
//! alphabet never case-folds and neither does inbound normalization.

use crate::domain::entities::Namespace;
use crate::domain::errors::CodeError;
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Default length of generated codes (62^10 ≈ 8.4e17 combinations).
pub const DEFAULT_CODE_LENGTH: usize = 10;

/// Default number of draws before generation gives up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default maximum accepted length of inbound code input.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 64;

/// Characters accepted in inbound and custom codes.
static CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("code regex is valid"));

/// Custom codes that cannot be reserved.
const RESERVED_CODES: &[&str] = &["api", "s", "scan", "health", "admin", "static"];

/// Source of random candidate values.
pub trait CodeSource: Send + Sync {
    /// Draws one candidate of `length` characters from the code alphabet.
    fn draw(&self, length: usize) -> String;
}

/// Thread-local CSPRNG drawing from the alphanumeric alphabet.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSource;

impl CodeSource for RandomSource {
    fn draw(&self, length: usize) -> String {
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect()
    }
}

/// Produces candidate code values, skipping values the registry reports as taken.
///
/// Generation is pure: it never reserves anything. Reservation happens in the
/// registry, which may still reject a candidate that raced with another
/// request (see [`crate::application::services::CodeService`]).
#[derive(Clone)]
pub struct CodeGenerator {
    source: Arc<dyn CodeSource>,
    length: usize,
    max_attempts: usize,
}

impl CodeGenerator {
    /// Creates a generator backed by [`RandomSource`].
    pub fn new(length: usize, max_attempts: usize) -> Self {
        Self::with_source(Arc::new(RandomSource), length, max_attempts)
    }

    /// Creates a generator with a custom candidate source.
    pub fn with_source(source: Arc<dyn CodeSource>, length: usize, max_attempts: usize) -> Self {
        Self {
            source,
            length,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Draws candidates until `claim` accepts one.
    ///
    /// `claim` returns `Ok(Some(_))` to accept a candidate and `Ok(None)` when
    /// it collided, whether the registry reported it as taken or a reservation
    /// lost a race. Every draw counts against the same `max_attempts` budget.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError::GenerationExhausted`] once `max_attempts` draws
    /// have all collided, and propagates errors from `claim`.
    pub async fn generate<T, F, Fut>(
        &self,
        namespace: Namespace,
        mut claim: F,
    ) -> Result<T, CodeError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<Option<T>, CodeError>>,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.source.draw(self.length);

            if let Some(claimed) = claim(candidate).await? {
                return Ok(claimed);
            }

            metrics::counter!(
                "code_generation_collisions_total",
                "namespace" => namespace.as_str()
            )
            .increment(1);
            debug!(%namespace, attempt, "Generated code collided, drawing again");
        }

        Err(CodeError::GenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH, DEFAULT_MAX_ATTEMPTS)
    }
}

/// Normalizes raw inbound input into a lookup key.
///
/// Trims surrounding whitespace only; the alphabet is case-sensitive.
///
/// # Errors
///
/// Returns [`CodeError::Invalid`] if the trimmed input is empty, longer than
/// `max_length`, or contains characters outside `[A-Za-z0-9_-]`.
pub fn normalize_code(raw: &str, max_length: usize) -> Result<String, CodeError> {
    let code = raw.trim();

    if code.is_empty() {
        return Err(CodeError::Invalid("code is empty".to_string()));
    }

    if code.chars().count() > max_length {
        return Err(CodeError::Invalid(format!(
            "code exceeds {max_length} characters"
        )));
    }

    if !CODE_REGEX.is_match(code) {
        return Err(CodeError::Invalid(
            "code contains disallowed characters".to_string(),
        ));
    }

    Ok(code.to_string())
}

/// Validates a user-provided custom code.
///
/// # Rules
///
/// - Length: 4-32 characters
/// - Allowed characters: ASCII letters, digits, `_`, `-`
/// - Cannot start or end with a hyphen
/// - Cannot be a reserved word
///
/// # Errors
///
/// Returns [`CodeError::Invalid`] if any rule is violated.
pub fn validate_custom_code(code: &str) -> Result<(), CodeError> {
    if RESERVED_CODES.contains(&code.to_ascii_lowercase().as_str()) {
        return Err(CodeError::Invalid("this code is reserved".to_string()));
    }

    if code.len() < 4 || code.len() > 32 {
        return Err(CodeError::Invalid(
            "custom code must be 4-32 characters".to_string(),
        ));
    }

    if !CODE_REGEX.is_match(code) {
        return Err(CodeError::Invalid(
            "custom code can only contain letters, digits, '_' and '-'".to_string(),
        ));
    }

    if code.starts_with('-') || code.ends_with('-') {
        return Err(CodeError::Invalid(
            "custom code cannot start or end with a hyphen".to_string(),
        ));
    }

    Ok(())
}
