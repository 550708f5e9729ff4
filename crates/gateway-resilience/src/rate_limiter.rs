//! Per-provider sliding-window rate limiting.
//!
//! Each provider gets an independent [`RateLimiter`] holding the timestamps of
//! the calls admitted during the trailing window. A call that would exceed the
//! budget waits until the oldest admitted call ages out, then re-checks.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default budget per window
pub const DEFAULT_REQUESTS_PER_MINUTE: usize = 60;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Calls admitted per window (at least 1)
    pub max_requests: usize,
    /// Trailing window length
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_REQUESTS_PER_MINUTE,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RateLimiterConfig {
    /// Budget per minute
    #[must_use]
    pub fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, DEFAULT_WINDOW)
    }

    /// Budget over a custom window; a zero budget is raised to one
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
        }
    }
}

/// Sliding-window limiter for one provider
#[derive(Debug)]
pub struct RateLimiter {
    /// Provider name
    name: String,
    config: RateLimiterConfig,
    /// Admission times, oldest first
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter
    #[must_use]
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        Self {
            name: name.into(),
            timestamps: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            config,
        }
    }

    /// Create a limiter with the default budget
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, RateLimiterConfig::default())
    }

    /// Provider name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    /// Wait until the call may proceed and record it.
    ///
    /// Returns how long the caller was delayed. The queue lock is never held
    /// across the sleep.
    pub async fn admit(&self) -> Duration {
        let started = Instant::now();

        loop {
            let wait = match self.check_and_record(Instant::now()) {
                None => return started.elapsed(),
                Some(wait) => wait,
            };

            debug!(
                provider = %self.name,
                wait_ms = wait.as_millis(),
                max_requests = self.config.max_requests,
                "Rate limit reached, delaying call"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Record the call if the budget allows it, without waiting
    pub fn try_admit(&self) -> bool {
        self.check_and_record(Instant::now()).is_none()
    }

    /// Calls currently counted against the window
    #[must_use]
    pub fn in_window(&self) -> usize {
        let mut timestamps = self.timestamps.lock();
        Self::purge(&mut timestamps, Instant::now(), self.config.window);
        timestamps.len()
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        let in_window = self.in_window();
        RateLimiterStats {
            in_window,
            remaining: self.config.max_requests.saturating_sub(in_window),
            max_requests: self.config.max_requests,
            window: self.config.window,
        }
    }

    /// Purge, check, append. `None` means admitted, otherwise the time until
    /// the oldest retained call leaves the window.
    fn check_and_record(&self, now: Instant) -> Option<Duration> {
        let mut timestamps = self.timestamps.lock();
        Self::purge(&mut timestamps, now, self.config.window);

        if timestamps.len() < self.config.max_requests {
            timestamps.push_back(now);
            return None;
        }

        let wait = timestamps
            .front()
            .map_or(Duration::ZERO, |oldest| {
                (*oldest + self.config.window).saturating_duration_since(now)
            });
        Some(wait)
    }

    fn purge(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while timestamps
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= window)
        {
            timestamps.pop_front();
        }
    }
}

/// Rate limiter statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    /// Calls counted in the current window
    pub in_window: usize,
    /// Calls still admissible without waiting
    pub remaining: usize,
    /// Budget per window
    pub max_requests: usize,
    /// Window length
    pub window: Duration,
}

/// The set of per-provider limiters.
///
/// Provider names without a registered limiter are unlimited.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a provider's limiter with a per-minute budget
    pub fn register(&self, name: &str, requests_per_minute: usize) -> Arc<RateLimiter> {
        self.register_with_config(name, RateLimiterConfig::per_minute(requests_per_minute))
    }

    /// Register (or replace) a provider's limiter with a custom window
    pub fn register_with_window(
        &self,
        name: &str,
        max_requests: usize,
        window: Duration,
    ) -> Arc<RateLimiter> {
        self.register_with_config(name, RateLimiterConfig::new(max_requests, window))
    }

    /// Register (or replace) a provider's limiter
    pub fn register_with_config(&self, name: &str, config: RateLimiterConfig) -> Arc<RateLimiter> {
        let limiter = Arc::new(RateLimiter::new(name, config));
        self.limiters.insert(name.to_string(), Arc::clone(&limiter));
        debug!(
            provider = %name,
            max_requests = config.max_requests,
            window_secs = config.window.as_secs(),
            "Registered rate limiter"
        );
        limiter
    }

    /// Limiter for a provider
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a provider's limiter
    pub fn remove(&self, name: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.remove(name).map(|(_, limiter)| limiter)
    }

    /// Wait for admission on a provider's limiter
    pub async fn admit(&self, name: &str) -> Duration {
        // Clone the Arc out so no map guard is held across the await
        match self.get(name) {
            Some(limiter) => limiter.admit().await,
            None => Duration::ZERO,
        }
    }

    /// Non-blocking admission; unregistered names are always admitted
    pub fn try_admit(&self, name: &str) -> bool {
        self.get(name).map_or(true, |limiter| limiter.try_admit())
    }

    /// Registered provider names
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.limiters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_is_admitted_immediately() {
        let limiter = RateLimiter::new("test", RateLimiterConfig::new(3, Duration::from_secs(60)));

        for _ in 0..3 {
            assert_eq!(limiter.admit().await, Duration::ZERO);
        }
        assert_eq!(limiter.stats().remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_over_budget_waits_for_oldest_to_expire() {
        let limiter = RateLimiter::new("test", RateLimiterConfig::new(2, Duration::from_secs(60)));

        limiter.admit().await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.admit().await;

        let before = Instant::now();
        limiter.admit().await;

        // First call was at t=0, we are at t=10: it leaves the window at t=60
        assert_eq!(before.elapsed(), Duration::from_secs(50));
        assert_eq!(limiter.in_window(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_restores_budget() {
        let limiter = RateLimiter::new("test", RateLimiterConfig::new(1, Duration::from_secs(1)));

        assert!(limiter.try_admit());
        assert!(!limiter.try_admit());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_admit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_are_all_admitted() {
        let limiter = Arc::new(RateLimiter::new(
            "test",
            RateLimiterConfig::new(2, Duration::from_secs(10)),
        ));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.admit().await })
            })
            .collect();

        let mut delays = Vec::new();
        for handle in handles {
            delays.push(handle.await.unwrap());
        }
        delays.sort();

        assert_eq!(delays[0], Duration::ZERO);
        assert_eq!(delays[1], Duration::ZERO);
        assert_eq!(delays[2], Duration::from_secs(10));
        assert_eq!(delays[4], Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_limits_are_independent() {
        let registry = RateLimiterRegistry::new();
        registry.register_with_window("a", 1, Duration::from_secs(60));
        registry.register_with_window("b", 1, Duration::from_secs(60));

        assert!(registry.try_admit("a"));
        assert!(!registry.try_admit("a"));
        assert!(registry.try_admit("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_names_are_unlimited() {
        let registry = RateLimiterRegistry::new();

        for _ in 0..100 {
            assert_eq!(registry.admit("nobody").await, Duration::ZERO);
        }
        assert!(registry.get("nobody").is_none());
    }

    #[test]
    fn test_zero_budget_is_raised_to_one() {
        assert_eq!(RateLimiterConfig::per_minute(0).max_requests, 1);
    }

    #[test]
    fn test_register_replaces_existing_limiter() {
        let registry = RateLimiterRegistry::new();
        registry.register("openai", 10);
        registry.register("openai", 20);

        assert_eq!(registry.get("openai").unwrap().config().max_requests, 20);
        assert_eq!(registry.names(), vec!["openai".to_string()]);
    }
}
