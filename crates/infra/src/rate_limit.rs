//! Dual-tier token-bucket rate limiter.
//!
//! Anonymous requests are budgeted per client address, authenticated requests
//! per principal. Each key gets its own bucket, created lazily and evicted by
//! [`RateLimiter::sweep_idle`] once unused for the configured expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

/// Budget for one tier.
///
/// The bucket holds `burst` tokens and refills at `requests_per_minute / 60`
/// tokens per second. A ceiling of zero disables the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimit {
    pub requests_per_minute: u32,
    pub burst: u32,
}

impl TierLimit {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            requests_per_minute,
            burst,
        }
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    fn capacity(&self) -> f64 {
        f64::from(self.burst.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub enabled: bool,
    pub anonymous: TierLimit,
    pub authenticated: TierLimit,
    pub whitelist_ips: Vec<String>,
    /// Exact paths, or prefixes written with a trailing `/*`.
    pub whitelist_paths: Vec<String>,
    pub idle_expiry: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anonymous: TierLimit::new(100, 20),
            authenticated: TierLimit::new(300, 20),
            whitelist_ips: Vec::new(),
            whitelist_paths: vec!["/health".to_string(), "/health/*".to_string()],
            idle_expiry: Duration::from_secs(600),
        }
    }
}

/// Budget key: which tier and whose budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    Ip(String),
    User(String),
}

impl RateKey {
    pub fn storage_key(&self) -> String {
        match self {
            RateKey::Ip(ip) => format!("ip:{ip}"),
            RateKey::User(id) => format!("user:{id}"),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, RateKey::User(_))
    }
}

/// Whether `path` matches `pattern`: exact, or a prefix when the pattern
/// ends in `/*` (which also matches the bare prefix).
pub fn path_matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(prefix) => {
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        None => pattern == path,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Whole seconds for a `Retry-After` header, at least one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Decision::Allowed => None,
            Decision::Denied { retry_after } => {
                Some((retry_after.as_secs_f64().ceil() as u64).max(1))
            }
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(limit: TierLimit, now: Instant) -> Self {
        Self {
            tokens: limit.capacity(),
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, limit: TierLimit, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let refill = elapsed.as_secs_f64() * limit.refill_per_sec();
        self.tokens = (self.tokens + refill).min(limit.capacity());
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            Err(Duration::from_secs_f64(deficit / limit.refill_per_sec()))
        }
    }
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: DashMap<String, Bucket>,
}

impl core::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_keys", &self.buckets.len())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_whitelisted_ip(&self, ip: &str) -> bool {
        self.config.whitelist_ips.iter().any(|allowed| allowed == ip)
    }

    pub fn is_whitelisted_path(&self, path: &str) -> bool {
        self.config
            .whitelist_paths
            .iter()
            .any(|pattern| path_matches(pattern, path))
    }

    fn bypasses(&self, client_ip: &str, path: &str) -> bool {
        !self.config.enabled || self.is_whitelisted_ip(client_ip) || self.is_whitelisted_path(path)
    }

    /// Charge the anonymous tier keyed by `client_ip`.
    ///
    /// Runs before credentials are examined, for every caller.
    pub fn check_address(&self, client_ip: &str, path: &str) -> Decision {
        if self.bypasses(client_ip, path) {
            return Decision::Allowed;
        }
        self.admit(&RateKey::Ip(client_ip.to_string()))
    }

    /// Charge the authenticated tier keyed by the principal.
    pub fn check_principal(&self, client_ip: &str, path: &str, user_id: &str) -> Decision {
        if self.bypasses(client_ip, path) {
            return Decision::Allowed;
        }
        self.admit(&RateKey::User(user_id.to_string()))
    }

    /// Single-tier decision: the principal's budget when known, else the address's.
    pub fn check(&self, client_ip: &str, path: &str, user_id: Option<&str>) -> Decision {
        match user_id {
            Some(id) => self.check_principal(client_ip, path, id),
            None => self.check_address(client_ip, path),
        }
    }

    /// Consume one token from `key`'s bucket.
    pub fn admit(&self, key: &RateKey) -> Decision {
        self.admit_at(key, Instant::now())
    }

    pub fn admit_at(&self, key: &RateKey, now: Instant) -> Decision {
        let limit = if key.is_authenticated() {
            self.config.authenticated
        } else {
            self.config.anonymous
        };
        if limit.requests_per_minute == 0 {
            return Decision::Allowed;
        }

        let mut bucket = self
            .buckets
            .entry(key.storage_key())
            .or_insert_with(|| Bucket::full(limit, now));
        match bucket.try_acquire(limit, now) {
            Ok(()) => Decision::Allowed,
            Err(retry_after) => Decision::Denied { retry_after },
        }
    }

    /// Number of keys currently holding a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets not touched within the idle expiry. Returns how many went.
    pub fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Instant::now())
    }

    pub fn sweep_idle_at(&self, now: Instant) -> usize {
        let expiry = self.config.idle_expiry;
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < expiry);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, remaining = self.buckets.len(), "evicted idle rate-limit buckets");
        }
        removed
    }

    /// Background task sweeping idle buckets every `interval`.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                limiter.sweep_idle();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limiter(rpm: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            anonymous: TierLimit::new(rpm, burst),
            authenticated: TierLimit::new(rpm * 2, burst * 2),
            whitelist_ips: vec!["10.0.0.1".into()],
            whitelist_paths: vec!["/health".into(), "/docs/*".into()],
            ..RateLimiterConfig::default()
        })
    }

    #[test]
    fn burst_is_admitted_then_denied() {
        let rl = limiter(60, 3);
        let key = RateKey::Ip("1.2.3.4".into());
        let now = Instant::now();
        for _ in 0..3 {
            assert!(rl.admit_at(&key, now).is_allowed());
        }
        let denied = rl.admit_at(&key, now);
        assert!(!denied.is_allowed());
        assert_eq!(denied.retry_after_secs(), Some(1));
    }

    #[test]
    fn bucket_refills_over_time() {
        let rl = limiter(60, 1);
        let key = RateKey::Ip("1.2.3.4".into());
        let start = Instant::now();
        assert!(rl.admit_at(&key, start).is_allowed());
        assert!(!rl.admit_at(&key, start).is_allowed());
        assert!(rl.admit_at(&key, start + Duration::from_secs(1)).is_allowed());
    }

    #[test]
    fn tiers_have_independent_budgets() {
        let rl = limiter(60, 1);
        let now = Instant::now();
        assert!(rl.admit_at(&RateKey::Ip("u1".into()), now).is_allowed());
        assert!(!rl.admit_at(&RateKey::Ip("u1".into()), now).is_allowed());
        // Same string as a principal id lives in a different bucket with a larger burst.
        assert!(rl.admit_at(&RateKey::User("u1".into()), now).is_allowed());
        assert!(rl.admit_at(&RateKey::User("u1".into()), now).is_allowed());
        assert!(!rl.admit_at(&RateKey::User("u1".into()), now).is_allowed());
    }

    #[test]
    fn whitelists_bypass_the_budget() {
        let rl = limiter(60, 1);
        for _ in 0..10 {
            assert!(rl.check("10.0.0.1", "/customers", None).is_allowed());
            assert!(rl.check("9.9.9.9", "/health", None).is_allowed());
            assert!(rl.check("9.9.9.9", "/docs/index.html", None).is_allowed());
        }
        assert_eq!(rl.tracked_keys(), 0);
    }

    #[test]
    fn path_whitelist_matching() {
        let rl = limiter(60, 1);
        assert!(rl.is_whitelisted_path("/health"));
        assert!(!rl.is_whitelisted_path("/healthz"));
        assert!(rl.is_whitelisted_path("/docs/a/b"));
        assert!(rl.is_whitelisted_path("/docs"));
        assert!(!rl.is_whitelisted_path("/docsx"));
    }

    #[test]
    fn path_patterns() {
        assert!(path_matches("/health", "/health"));
        assert!(!path_matches("/health", "/health/ready"));
        assert!(path_matches("/health/*", "/health"));
        assert!(path_matches("/health/*", "/health/ready"));
        assert!(!path_matches("/health/*", "/healthz"));
    }

    #[test]
    fn address_and_principal_checks_charge_separate_tiers() {
        let rl = limiter(60, 1);
        assert!(rl.check_address("1.1.1.1", "/customers").is_allowed());
        assert!(!rl.check_address("1.1.1.1", "/customers").is_allowed());
        assert!(rl.check_principal("1.1.1.1", "/customers", "alice").is_allowed());
        assert!(rl.check_principal("1.1.1.1", "/customers", "alice").is_allowed());
        assert!(!rl.check_principal("1.1.1.1", "/customers", "alice").is_allowed());
        assert!(rl.check_principal("10.0.0.1", "/customers", "alice").is_allowed());
    }

    /// Two keys hammered from parallel threads each get exactly their own burst.
    #[test]
    fn concurrent_keys_are_independent() {
        const BURST: u32 = 25;
        const ATTEMPTS_PER_THREAD: usize = 40;
        const THREADS_PER_KEY: usize = 4;

        let rl = limiter(60, BURST);
        let now = Instant::now();
        let keys = [RateKey::Ip("203.0.113.1".into()), RateKey::Ip("203.0.113.2".into())];

        let allowed: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = keys
                .iter()
                .map(|key| {
                    let workers: Vec<_> = (0..THREADS_PER_KEY)
                        .map(|_| {
                            let rl = &rl;
                            scope.spawn(move || {
                                (0..ATTEMPTS_PER_THREAD)
                                    .filter(|_| rl.admit_at(key, now).is_allowed())
                                    .count()
                            })
                        })
                        .collect();
                    workers
                })
                .collect();
            handles
                .into_iter()
                .map(|workers| workers.into_iter().map(|w| w.join().unwrap()).sum())
                .collect()
        });

        assert_eq!(allowed, vec![BURST as usize, BURST as usize]);
        assert_eq!(rl.tracked_keys(), 2);
    }

    #[test]
    fn disabled_limiter_allows_everything() {
        let rl = RateLimiter::new(RateLimiterConfig {
            enabled: false,
            anonymous: TierLimit::new(1, 1),
            ..RateLimiterConfig::default()
        });
        for _ in 0..5 {
            assert!(rl.check("1.1.1.1", "/customers", None).is_allowed());
        }
    }

    #[test]
    fn check_selects_tier_by_principal() {
        let rl = limiter(60, 1);
        assert!(rl.check("1.1.1.1", "/customers", Some("alice")).is_allowed());
        assert!(rl.check("1.1.1.1", "/customers", None).is_allowed());
        assert!(!rl.check("1.1.1.1", "/customers", None).is_allowed());
        assert!(rl.check("1.1.1.1", "/customers", Some("alice")).is_allowed());
    }

    #[test]
    fn idle_buckets_are_swept() {
        let rl = limiter(60, 1);
        let start = Instant::now();
        rl.admit_at(&RateKey::Ip("a".into()), start);
        rl.admit_at(&RateKey::Ip("b".into()), start + Duration::from_secs(500));
        assert_eq!(rl.sweep_idle_at(start + Duration::from_secs(700)), 1);
        assert_eq!(rl.tracked_keys(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Exhausting one key's budget never changes another key's decisions.
        #[test]
        fn keys_do_not_interfere(
            noisy_requests in 0usize..50,
            burst in 1u32..10,
        ) {
            let rl = limiter(60, burst);
            let now = Instant::now();
            let noisy = RateKey::Ip("203.0.113.1".into());
            let quiet = RateKey::Ip("203.0.113.2".into());

            for _ in 0..noisy_requests {
                rl.admit_at(&noisy, now);
            }
            for _ in 0..burst {
                prop_assert!(rl.admit_at(&quiet, now).is_allowed());
            }
            prop_assert!(!rl.admit_at(&quiet, now).is_allowed());
        }
    }
}
