//! OAuth token cache.
//!
//! One cached token per client instance, refreshed on demand. The cache is
//! a plain value object; the owning client serializes access to it.

use chrono::{DateTime, Duration, Utc};

/// Seconds subtracted from the provider-reported lifetime so a token is
/// refreshed before it can expire mid-request.
const REFRESH_MARGIN_SECS: i64 = 30;

/// A cached bearer token with its expiry.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Value-object cache for the provider's OAuth access token.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    current: Option<CachedToken>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Returns the cached token if it is still valid at `now`.
    #[must_use]
    pub fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|token| token.expires_at > now)
            .map(|token| token.access_token.as_str())
    }

    /// Stores a freshly issued token. The refresh margin is deducted from
    /// `expires_in_secs` so the token is replaced before the provider
    /// stops accepting it.
    pub fn store(&mut self, access_token: String, expires_in_secs: i64, now: DateTime<Utc>) {
        let lifetime = (expires_in_secs - REFRESH_MARGIN_SECS).max(0);
        self.current = Some(CachedToken {
            access_token,
            expires_at: now + Duration::seconds(lifetime),
        });
    }

    /// Drops the cached token, forcing a refresh on next use.
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_has_no_token() {
        let cache = TokenCache::new();
        assert!(cache.valid_token(Utc::now()).is_none());
    }

    #[test]
    fn test_stored_token_is_returned_while_valid() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), 3600, now);

        assert_eq!(cache.valid_token(now), Some("tok-1"));
        assert_eq!(
            cache.valid_token(now + Duration::seconds(3600 - REFRESH_MARGIN_SECS - 1)),
            Some("tok-1")
        );
    }

    #[test]
    fn test_token_expires_with_margin() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), 3600, now);

        // The provider lifetime is 3600s but the cache refuses the token
        // once the refresh margin is reached.
        assert!(
            cache
                .valid_token(now + Duration::seconds(3600 - REFRESH_MARGIN_SECS))
                .is_none()
        );
    }

    #[test]
    fn test_short_lifetime_is_never_valid() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), REFRESH_MARGIN_SECS - 10, now);
        assert!(cache.valid_token(now).is_none());
    }

    #[test]
    fn test_invalidate_drops_token() {
        let now = Utc::now();
        let mut cache = TokenCache::new();
        cache.store("tok-1".to_string(), 3600, now);
        cache.invalidate();
        assert!(cache.valid_token(now).is_none());
    }
}
