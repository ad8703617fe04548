//! Per-sender sliding-window rate limiter.
//!
//! Each key owns a FIFO of admission instants. A check evicts instants older
//! than the window, admits iff fewer than `limit` remain, and records the
//! admission. Check and record run under one lock, so concurrent callers for
//! the same sender can never both slip past the limit.
//!
//! Uses `tokio::time::Instant`, so tests can drive the window with a paused
//! clock.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::{ProtocolError, ProtocolResult};

const BURST_SPAN: Duration = Duration::from_secs(1);

/// Sliding-window admission control keyed by sender id.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit one request from `sender_id` against the configured limit.
    ///
    /// Returns `false` when the sender already used its quota in the current window.
    pub async fn check_rate_limit(&self, sender_id: &str) -> bool {
        self.check_with_limit(sender_id, self.config.requests_per_minute)
            .await
    }

    /// Admit one request for `key` against an explicit per-window `limit`.
    ///
    /// Used for capability-level overrides, where the key combines sender and
    /// capability.
    pub async fn check_with_limit(&self, key: &str, limit: u32) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = Instant::now();
        let window = self.config.window();

        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_default();
        evict(entry, now, window);

        if entry.len() >= limit as usize {
            warn!(key = %key, limit, "Rate limit exceeded");
            return false;
        }

        if let Some(burst) = self.config.burst_size {
            let recent = entry
                .iter()
                .rev()
                .take_while(|t| now.duration_since(**t) < BURST_SPAN)
                .count();
            if recent >= burst as usize {
                warn!(key = %key, burst, "Burst limit exceeded");
                return false;
            }
        }

        entry.push_back(now);
        debug!(key = %key, used = entry.len(), limit, "Request admitted");
        true
    }

    /// Like [`check_rate_limit`](Self::check_rate_limit) but fails with
    /// [`ProtocolError::RateLimit`] instead of returning `false`.
    pub async fn acquire(&self, sender_id: &str) -> ProtocolResult<()> {
        if self.check_rate_limit(sender_id).await {
            Ok(())
        } else {
            Err(ProtocolError::RateLimit {
                sender_id: sender_id.to_string(),
                limit: self.config.requests_per_minute,
                window_seconds: self.config.window_seconds,
            })
        }
    }

    /// Admissions left for `sender_id` in the current window.
    pub async fn remaining(&self, sender_id: &str) -> u32 {
        let limit = self.config.requests_per_minute;
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        match windows.get_mut(sender_id) {
            Some(entry) => {
                evict(entry, now, self.config.window());
                limit.saturating_sub(entry.len() as u32)
            }
            None => limit,
        }
    }

    /// Forget the history of one sender.
    pub async fn reset(&self, sender_id: &str) {
        self.windows.lock().await.remove(sender_id);
    }

    /// Forget all history.
    pub async fn clear(&self) {
        self.windows.lock().await.clear();
    }

    /// Drop senders with no admissions inside the window. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let window = self.config.window();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, entry| {
            evict(entry, now, window);
            !entry.is_empty()
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, "Swept idle rate-limit windows");
        }
        removed
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

fn evict(entry: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = entry.front() {
        if now.duration_since(*oldest) > window {
            entry.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn window_slides() {
        let limiter = RateLimiter::new(RateLimitConfig::new(2, 10));
        assert!(limiter.check_rate_limit("a").await);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.check_rate_limit("a").await);
        assert!(!limiter.check_rate_limit("a").await);

        // First admission leaves the window, second is still inside it.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.check_rate_limit("a").await);
        assert!(!limiter.check_rate_limit("a").await);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_cap_applies_within_one_second() {
        let mut config = RateLimitConfig::new(100, 60);
        config.burst_size = Some(2);
        let limiter = RateLimiter::new(config);
        assert!(limiter.check_rate_limit("a").await);
        assert!(limiter.check_rate_limit("a").await);
        assert!(!limiter.check_rate_limit("a").await);
        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(limiter.check_rate_limit("a").await);
    }

    #[tokio::test]
    async fn disabled_limiter_admits_everything() {
        let mut config = RateLimitConfig::new(1, 60);
        config.enabled = false;
        let limiter = RateLimiter::new(config);
        for _ in 0..10 {
            assert!(limiter.check_rate_limit("a").await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_idle_senders() {
        let limiter = RateLimiter::new(RateLimitConfig::new(5, 1));
        limiter.check_rate_limit("a").await;
        limiter.check_rate_limit("b").await;
        assert_eq!(limiter.tracked_keys().await, 2);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.sweep().await, 2);
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
