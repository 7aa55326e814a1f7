//! TTL gate between scrapes and network polls.

use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::info;

/// Default minimum spacing between network-performing cycles.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Decides whether a poll cycle may hit the network.
///
/// `cached_at` only ever moves forward. Settings can be changed at any time,
/// including while a cycle is running; the new TTL applies to the next gate
/// check and the new timeout to the next request.
#[derive(Debug)]
pub struct PollingCache {
    ttl: RwLock<Duration>,
    request_timeout: RwLock<Duration>,
    cached_at: RwLock<Option<Instant>>,
}

impl Default for PollingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl PollingCache {
    /// Create a cache that has never been refreshed.
    pub fn new(ttl: Duration, request_timeout: Duration) -> Self {
        Self {
            ttl: RwLock::new(ttl),
            request_timeout: RwLock::new(request_timeout),
            cached_at: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        *self.ttl.read()
    }

    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.write() = ttl;
        info!(ttl_secs = ttl.as_secs_f64(), "Cache TTL updated");
    }

    pub fn request_timeout(&self) -> Duration {
        *self.request_timeout.read()
    }

    pub fn set_request_timeout(&self, timeout: Duration) {
        *self.request_timeout.write() = timeout;
        info!(
            timeout_secs = timeout.as_secs_f64(),
            "Request timeout updated"
        );
    }

    /// Start time of the last completed cycle, if any.
    pub fn cached_at(&self) -> Option<Instant> {
        *self.cached_at.read()
    }

    /// When the cached state expires.
    ///
    /// `None` if nothing was ever cached, or if the TTL reaches past the
    /// clock's range (the state then never expires).
    pub fn expires_at(&self) -> Option<Instant> {
        self.cached_at().and_then(|at| at.checked_add(self.ttl()))
    }

    /// Whether the cached state is still valid at `now`.
    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.cached_at() {
            Some(at) => match at.checked_add(self.ttl()) {
                Some(expires) => now < expires,
                None => true,
            },
            None => false,
        }
    }

    /// How long until a new cycle may run, clamped at zero.
    ///
    /// [`Duration::MAX`] when the cached state never expires.
    pub fn time_until_refresh(&self, now: Instant) -> Duration {
        match self.cached_at() {
            Some(at) => match at.checked_add(self.ttl()) {
                Some(expires) => expires.saturating_duration_since(now),
                None => Duration::MAX,
            },
            None => Duration::ZERO,
        }
    }

    /// Record a completed cycle that started at `started`.
    pub fn mark_refreshed(&self, started: Instant) {
        let mut cached_at = self.cached_at.write();
        *cached_at = Some(match *cached_at {
            Some(previous) if previous > started => previous,
            _ => started,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_refreshed_is_stale() {
        let cache = PollingCache::default();
        let now = Instant::now();

        assert!(!cache.is_fresh(now));
        assert_eq!(cache.time_until_refresh(now), Duration::ZERO);
        assert_eq!(cache.expires_at(), None);
    }

    #[test]
    fn test_gate_boundaries() {
        let cache = PollingCache::new(Duration::from_secs(1), DEFAULT_REQUEST_TIMEOUT);
        let t0 = Instant::now();
        cache.mark_refreshed(t0);

        assert!(cache.is_fresh(t0));
        assert!(cache.is_fresh(t0 + Duration::from_millis(999)));
        assert!(!cache.is_fresh(t0 + Duration::from_secs(1)));
        assert_eq!(
            cache.time_until_refresh(t0 + Duration::from_millis(250)),
            Duration::from_millis(750)
        );
        assert_eq!(
            cache.time_until_refresh(t0 + Duration::from_secs(5)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_cached_at_never_moves_backwards() {
        let cache = PollingCache::default();
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);

        cache.mark_refreshed(later);
        cache.mark_refreshed(t0);

        assert_eq!(cache.cached_at(), Some(later));
    }

    #[test]
    fn test_settings_are_mutable() {
        let cache = PollingCache::default();
        assert_eq!(cache.ttl(), DEFAULT_CACHE_TTL);
        assert_eq!(cache.request_timeout(), DEFAULT_REQUEST_TIMEOUT);

        let t0 = Instant::now();
        cache.mark_refreshed(t0);
        cache.set_ttl(Duration::from_secs(30));
        cache.set_request_timeout(Duration::from_millis(500));

        assert!(cache.is_fresh(t0 + Duration::from_secs(29)));
        assert_eq!(cache.request_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_ttl_beyond_clock_range_never_expires() {
        let ttl = Duration::from_secs(u64::MAX / 2);
        let cache = PollingCache::new(ttl, DEFAULT_REQUEST_TIMEOUT);
        let t0 = Instant::now();

        assert!(!cache.is_fresh(t0));
        cache.mark_refreshed(t0);

        assert_eq!(cache.expires_at(), None);
        assert!(cache.is_fresh(t0 + Duration::from_secs(86_400 * 365)));
        assert_eq!(cache.time_until_refresh(t0), Duration::MAX);
    }
}
