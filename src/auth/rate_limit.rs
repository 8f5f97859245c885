//! Fixed-window, per-client rate limiting with named tiers.
//!
//! Each `(tier, client)` pair owns one window: a start instant and a request count. The
//! window restarts once its duration has elapsed, and a request is rejected when it pushes
//! the count past the tier's maximum. Tier quotas come from [`RateLimitTable`], which holds
//! materially stricter maxima for production than for other environments.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);
const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    General,
    Auth,
    Api,
    Sensitive,
    Upload,
    Email,
    PasswordReset,
}

impl Tier {
    pub const ALL: [Self; 7] = [
        Self::General,
        Self::Auth,
        Self::Api,
        Self::Sensitive,
        Self::Upload,
        Self::Email,
        Self::PasswordReset,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Api => "api",
            Self::Sensitive => "sensitive",
            Self::Upload => "upload",
            Self::Email => "email",
            Self::PasswordReset => "password_reset",
        }
    }
}

/// Deployment environment. Drives quota strictness and the test-mode bypass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    Production,
    #[default]
    Development,
    Test,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Quota for one tier in one environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierLimit {
    pub window: Duration,
    pub max: u32,
    pub message: &'static str,
    pub retry_after: &'static str,
}

struct TierRow {
    tier: Tier,
    window: Duration,
    production_max: u32,
    default_max: u32,
    message: &'static str,
    retry_after: &'static str,
}

const TIER_TABLE: [TierRow; 7] = [
    TierRow {
        tier: Tier::General,
        window: FIFTEEN_MINUTES,
        production_max: 100,
        default_max: 1000,
        message: "Too many requests from this IP, please try again later.",
        retry_after: "15 minutes",
    },
    TierRow {
        tier: Tier::Auth,
        window: FIFTEEN_MINUTES,
        production_max: 5,
        default_max: 50,
        message: "Too many authentication attempts from this IP, please try again later.",
        retry_after: "15 minutes",
    },
    TierRow {
        tier: Tier::Api,
        window: FIFTEEN_MINUTES,
        production_max: 200,
        default_max: 2000,
        message: "Too many API requests from this IP, please try again later.",
        retry_after: "15 minutes",
    },
    TierRow {
        tier: Tier::Sensitive,
        window: ONE_HOUR,
        production_max: 3,
        default_max: 30,
        message: "Too many attempts for this sensitive operation, please try again later.",
        retry_after: "1 hour",
    },
    TierRow {
        tier: Tier::Upload,
        window: ONE_HOUR,
        production_max: 10,
        default_max: 100,
        message: "Too many file upload attempts, please try again later.",
        retry_after: "1 hour",
    },
    TierRow {
        tier: Tier::Email,
        window: ONE_HOUR,
        production_max: 5,
        default_max: 50,
        message: "Too many email requests, please try again later.",
        retry_after: "1 hour",
    },
    TierRow {
        tier: Tier::PasswordReset,
        window: ONE_HOUR,
        production_max: 3,
        default_max: 30,
        message: "Too many password reset attempts, please try again later.",
        retry_after: "1 hour",
    },
];

/// Per-tier quotas resolved for one environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitTable {
    limits: HashMap<Tier, TierLimit>,
}

impl RateLimitTable {
    #[must_use]
    pub fn for_environment(environment: Environment) -> Self {
        let limits = TIER_TABLE
            .iter()
            .map(|row| {
                let max = if environment == Environment::Production {
                    row.production_max
                } else {
                    row.default_max
                };
                let limit = TierLimit {
                    window: row.window,
                    max,
                    message: row.message,
                    retry_after: row.retry_after,
                };
                (row.tier, limit)
            })
            .collect();
        Self { limits }
    }

    /// Override the window and maximum of one tier, keeping its messages.
    #[must_use]
    pub fn with_limit(mut self, tier: Tier, window: Duration, max: u32) -> Self {
        let limit = self.limit(tier);
        self.limits.insert(
            tier,
            TierLimit {
                window,
                max,
                ..limit
            },
        );
        self
    }

    #[must_use]
    pub fn limit(&self, tier: Tier) -> TierLimit {
        self.limits.get(&tier).copied().unwrap_or(TierLimit {
            window: FIFTEEN_MINUTES,
            max: 100,
            message: "Too many requests from this IP, please try again later.",
            retry_after: "15 minutes",
        })
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    environment: Environment,
    table: RateLimitTable,
    trusted: HashSet<String>,
}

impl RateLimitConfig {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            table: RateLimitTable::for_environment(environment),
            trusted: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: RateLimitTable) -> Self {
        self.table = table;
        self
    }

    #[must_use]
    pub fn with_trusted_identities<I, S>(mut self, identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted = identities.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn table(&self) -> &RateLimitTable {
        &self.table
    }

    /// Trusted clients and the test environment skip counting entirely.
    #[must_use]
    pub fn bypasses(&self, identity: &str) -> bool {
        self.environment == Environment::Test || self.trusted.contains(identity)
    }
}

/// Quota state after an admitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub tier: Tier,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitRejection {
    pub tier: Tier,
    pub message: &'static str,
    pub retry_after: &'static str,
    pub limit: u32,
    pub window: Duration,
    pub reset_after: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Bypassed,
    Allowed(RateLimitStatus),
    Limited(RateLimitRejection),
}

impl RateLimitDecision {
    #[must_use]
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited(_))
    }
}

pub trait RateLimiter: Send + Sync {
    /// Count one request from `identity` against `tier`.
    fn check(&self, tier: Tier, identity: &str) -> RateLimitDecision;

    /// Drop windows that have fully elapsed.
    fn prune(&self) {}
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _tier: Tier, _identity: &str) -> RateLimitDecision {
        RateLimitDecision::Bypassed
    }
}

#[derive(Clone, Copy, Debug)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// In-memory fixed-window limiter, scoped to this process.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(Tier, String), Window>>,
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// [`RateLimiter::check`] with an explicit clock.
    ///
    /// Reset and increment happen under one lock acquisition, so concurrent requests never
    /// admit more than `max` per window.
    pub fn check_at(&self, tier: Tier, identity: &str, now: Instant) -> RateLimitDecision {
        if self.config.bypasses(identity) {
            return RateLimitDecision::Bypassed;
        }

        let limit = self.config.table.limit(tier);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows
            .entry((tier, identity.to_string()))
            .or_insert(Window {
                started_at: now,
                count: 0,
            });

        if now.saturating_duration_since(window.started_at) >= limit.window {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }
        window.count = window.count.saturating_add(1);

        let reset_after =
            limit.window.saturating_sub(now.saturating_duration_since(window.started_at));

        if window.count > limit.max {
            debug!(
                tier = tier.as_str(),
                count = window.count,
                max = limit.max,
                "Rate limit exceeded"
            );
            RateLimitDecision::Limited(RateLimitRejection {
                tier,
                message: limit.message,
                retry_after: limit.retry_after,
                limit: limit.max,
                window: limit.window,
                reset_after,
            })
        } else {
            RateLimitDecision::Allowed(RateLimitStatus {
                tier,
                limit: limit.max,
                remaining: limit.max - window.count,
                reset_after,
            })
        }
    }

    /// [`RateLimiter::prune`] with an explicit clock.
    pub fn prune_at(&self, now: Instant) {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let table = &self.config.table;
        windows.retain(|(tier, _), window| {
            now.saturating_duration_since(window.started_at) < table.limit(*tier).window
        });
    }

    #[must_use]
    pub fn tracked_windows(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, tier: Tier, identity: &str) -> RateLimitDecision {
        self.check_at(tier, identity, Instant::now())
    }

    fn prune(&self) {
        self.prune_at(Instant::now());
    }
}

/// Prune elapsed windows every `interval` until the returned task is aborted.
pub fn spawn_pruner(limiter: Arc<dyn RateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            limiter.prune();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const MINUTE: Duration = Duration::from_secs(60);

    fn limiter(max: u32) -> FixedWindowRateLimiter {
        let table = RateLimitTable::for_environment(Environment::Production)
            .with_limit(Tier::Auth, MINUTE, max);
        FixedWindowRateLimiter::new(
            RateLimitConfig::new(Environment::Production).with_table(table),
        )
    }

    #[test]
    fn admits_max_then_rejects() {
        let limiter = limiter(5);
        let start = Instant::now();

        for n in 1..=5 {
            match limiter.check_at(Tier::Auth, "10.0.0.1", start) {
                RateLimitDecision::Allowed(status) => assert_eq!(status.remaining, 5 - n),
                other => panic!("request {n} should be admitted, got {other:?}"),
            }
        }

        match limiter.check_at(Tier::Auth, "10.0.0.1", start + Duration::from_secs(30)) {
            RateLimitDecision::Limited(rejection) => {
                assert_eq!(rejection.limit, 5);
                assert_eq!(rejection.window, MINUTE);
                assert_eq!(rejection.retry_after, "15 minutes");
                assert_eq!(rejection.reset_after, Duration::from_secs(30));
            }
            other => panic!("sixth request should be limited, got {other:?}"),
        }
    }

    #[test]
    fn window_restarts_after_elapsing() {
        let limiter = limiter(5);
        let start = Instant::now();
        for _ in 0..6 {
            limiter.check_at(Tier::Auth, "10.0.0.1", start);
        }

        // The counter restarts at 1, leaving max - 1 requests.
        assert_eq!(
            limiter.check_at(Tier::Auth, "10.0.0.1", start + MINUTE),
            RateLimitDecision::Allowed(RateLimitStatus {
                tier: Tier::Auth,
                limit: 5,
                remaining: 4,
                reset_after: MINUTE,
            })
        );
    }

    #[test]
    fn tiers_and_identities_are_independent() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(!limiter.check_at(Tier::Auth, "10.0.0.1", now).is_limited());
        assert!(limiter.check_at(Tier::Auth, "10.0.0.1", now).is_limited());
        assert!(!limiter.check_at(Tier::Auth, "10.0.0.2", now).is_limited());
        assert!(!limiter.check_at(Tier::General, "10.0.0.1", now).is_limited());
    }

    #[test]
    fn trusted_identity_bypasses() {
        let table = RateLimitTable::for_environment(Environment::Production)
            .with_limit(Tier::Auth, MINUTE, 1);
        let limiter = FixedWindowRateLimiter::new(
            RateLimitConfig::new(Environment::Production)
                .with_table(table)
                .with_trusted_identities(["127.0.0.1"]),
        );

        for _ in 0..10 {
            assert_eq!(
                limiter.check(Tier::Auth, "127.0.0.1"),
                RateLimitDecision::Bypassed
            );
        }
        assert_eq!(limiter.tracked_windows(), 0);
    }

    #[test]
    fn test_environment_bypasses() {
        let limiter = FixedWindowRateLimiter::new(RateLimitConfig::new(Environment::Test));
        for _ in 0..100 {
            assert_eq!(
                limiter.check(Tier::Sensitive, "10.0.0.1"),
                RateLimitDecision::Bypassed
            );
        }
    }

    #[test]
    fn production_is_stricter() {
        let production = RateLimitTable::for_environment(Environment::Production);
        let development = RateLimitTable::for_environment(Environment::Development);

        for tier in Tier::ALL {
            assert!(production.limit(tier).max < development.limit(tier).max);
            assert_eq!(production.limit(tier).window, development.limit(tier).window);
        }
        assert_eq!(production.limit(Tier::Auth).max, 5);
        assert_eq!(development.limit(Tier::Auth).max, 50);
        assert_eq!(production.limit(Tier::Sensitive).window, ONE_HOUR);
    }

    #[test]
    fn prune_drops_only_elapsed_windows() {
        let limiter = limiter(5);
        let start = Instant::now();
        limiter.check_at(Tier::Auth, "10.0.0.1", start);
        limiter.check_at(Tier::General, "10.0.0.1", start);
        assert_eq!(limiter.tracked_windows(), 2);

        // The auth window is one minute, the general window fifteen.
        limiter.prune_at(start + MINUTE);
        assert_eq!(limiter.tracked_windows(), 1);

        limiter.prune_at(start + FIFTEEN_MINUTES);
        assert_eq!(limiter.tracked_windows(), 0);
    }

    #[test]
    fn concurrent_requests_never_exceed_quota() {
        let limiter = Arc::new(limiter(10));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || {
                    (0..25)
                        .filter(|_| !limiter.check(Tier::Auth, "10.0.0.1").is_limited())
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_default())
            .sum();
        assert_eq!(admitted, 10);
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>(),
            Ok(Environment::Production)
        );
        assert_eq!("Test".parse::<Environment>(), Ok(Environment::Test));
        assert_eq!("dev".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn noop_limiter_always_bypasses() {
        assert_eq!(
            NoopRateLimiter.check(Tier::PasswordReset, "10.0.0.1"),
            RateLimitDecision::Bypassed
        );
    }
}
