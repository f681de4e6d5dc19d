//! Global request rate limiting.
//!
//! A single process-wide token bucket guarding the whole API. Per-user
//! monthly quotas are enforced separately by the usage tracker.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use governor::{Quota, RateLimiter};

use colloquy_core::defaults::{RATE_LIMIT_BURST, RATE_LIMIT_PER_SECOND};

use crate::state::{AppState, GlobalRateLimiter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_second: RATE_LIMIT_PER_SECOND,
            burst: RATE_LIMIT_BURST,
        }
    }
}

impl RateLimitConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RATE_LIMIT_ENABLED` | `true` |
    /// | `RATE_LIMIT_PER_SECOND` | `50` |
    /// | `RATE_LIMIT_BURST` | `100` |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.enabled),
            per_second: std::env::var("RATE_LIMIT_PER_SECOND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.per_second),
            burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.burst),
        }
    }
}

/// Build the limiter, or `None` when disabled or configured with zero rate.
pub fn build_rate_limiter(config: &RateLimitConfig) -> Option<Arc<GlobalRateLimiter>> {
    if !config.enabled {
        return None;
    }
    let per_second = NonZeroU32::new(config.per_second)?;
    let burst = NonZeroU32::new(config.burst.max(config.per_second)).unwrap_or(per_second);
    let quota = Quota::per_second(per_second).allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(subsystem = "api", component = "rate_limit", "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_builds_nothing() {
        let config = RateLimitConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(build_rate_limiter(&config).is_none());
    }

    #[test]
    fn test_zero_rate_builds_nothing() {
        let config = RateLimitConfig {
            per_second: 0,
            ..Default::default()
        };
        assert!(build_rate_limiter(&config).is_none());
    }

    #[test]
    fn test_burst_is_enforced() {
        let config = RateLimitConfig {
            enabled: true,
            per_second: 1,
            burst: 2,
        };
        let limiter = build_rate_limiter(&config).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
