//! URL normalization and redirect-target validation.
//!
//! External targets are normalized once when a short link is created, and
//! checked again at resolution time before anything is redirected to them.

use url::Url;

/// Errors that can occur while normalizing or validating a URL.
#[derive(Debug, thiserror::Error)]
pub enum UrlNormalizationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),

    #[error("URL scheme '{0}' is not allowed")]
    UnsupportedProtocol(String),

    #[error("Failed to normalize URL: {0}")]
    NormalizationFailed(String),
}

/// Parses `input` and checks its scheme against `allowed_schemes`.
///
/// The URL must also carry a host; `http:foo` style inputs are rejected.
///
/// # Errors
///
/// Returns [`UrlNormalizationError::InvalidFormat`] for malformed or hostless URLs.
/// Returns [`UrlNormalizationError::UnsupportedProtocol`] for schemes outside the allow-list.
pub fn validate_redirect_url(
    input: &str,
    allowed_schemes: &[String],
) -> Result<Url, UrlNormalizationError> {
    let url = Url::parse(input).map_err(|e| UrlNormalizationError::InvalidFormat(e.to_string()))?;

    if !allowed_schemes.iter().any(|s| s == url.scheme()) {
        return Err(UrlNormalizationError::UnsupportedProtocol(
            url.scheme().to_string(),
        ));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlNormalizationError::InvalidFormat(
            "URL has no host".to_string(),
        ));
    }

    Ok(url)
}

/// Normalizes a URL to a canonical form before it is stored.
///
/// # Normalization Rules
///
/// 1. **Scheme**: must be in `allowed_schemes`
/// 2. **Hostname**: converted to lowercase
/// 3. **Default ports**: removed (80 for HTTP, 443 for HTTPS)
/// 4. **Fragments**: removed
/// 5. **Query and path**: preserved as-is
///
/// # Errors
///
/// See [`validate_redirect_url`].
pub fn normalize_url(
    input: &str,
    allowed_schemes: &[String],
) -> Result<String, UrlNormalizationError> {
    let mut url = validate_redirect_url(input.trim(), allowed_schemes)?;

    if let Some(host) = url.host_str() {
        let host_lowercase = host.to_ascii_lowercase();
        url.set_host(Some(&host_lowercase)).map_err(|_| {
            UrlNormalizationError::NormalizationFailed("Failed to set normalized host".to_string())
        })?;
    }

    url.set_fragment(None);

    let is_default_port = matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if is_default_port {
        url.set_port(None).map_err(|_| {
            UrlNormalizationError::NormalizationFailed("Failed to remove default port".to_string())
        })?;
    }

    Ok(url.to_string())
}
