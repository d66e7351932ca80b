//! Rate limiting middleware using token bucket algorithm.

use anyhow::{Result, anyhow};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor,
};

/// Per-IP governor layer for the public redirect routes.
pub type RedirectRateLimit =
    GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Creates a rate limiter for the scan and short link redirects.
///
/// # Limits
///
/// - **Rate**: `per_second` requests per second (`RATE_LIMIT_PER_SECOND`)
/// - **Burst**: `burst` requests (`RATE_LIMIT_BURST`)
///
/// Requests exceeding the limit receive `429 Too Many Requests`.
///
/// # Key Extraction
///
/// Rate limits are applied per client IP address extracted from the
/// socket peer address, so the server must be started with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// # Errors
///
/// Returns an error if either limit is zero.
pub fn layer(per_second: u64, burst: u32) -> Result<RedirectRateLimit> {
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(per_second)
        .burst_size(burst)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {per_second}/s, burst {burst}"))?;

    Ok(GovernorLayer::new(Arc::new(governor_conf)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_accepts_configured_limits() {
        assert!(layer(20, 100).is_ok());
    }

    #[test]
    fn test_layer_rejects_zero_limits() {
        assert!(layer(0, 100).is_err());
        assert!(layer(20, 0).is_err());
    }
}
