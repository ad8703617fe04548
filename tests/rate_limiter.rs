//! Tests for per-sender sliding-window admission control.

use std::sync::Arc;
use std::time::Duration;

use a2a_protocol::config::RateLimitConfig;
use a2a_protocol::error::ProtocolError;
use a2a_protocol::protocol::RateLimiter;

#[tokio::test(start_paused = true)]
async fn limit_plus_one_is_rejected() {
    let limiter = RateLimiter::new(RateLimitConfig::new(3, 60));
    for _ in 0..3 {
        assert!(limiter.check_rate_limit("alice").await);
    }
    assert!(!limiter.check_rate_limit("alice").await);
    assert_eq!(limiter.remaining("alice").await, 0);
}

#[tokio::test(start_paused = true)]
async fn window_resets_after_it_elapses() {
    let limiter = RateLimiter::new(RateLimitConfig::new(2, 60));
    assert!(limiter.check_rate_limit("alice").await);
    assert!(limiter.check_rate_limit("alice").await);
    assert!(!limiter.check_rate_limit("alice").await);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(limiter.remaining("alice").await, 2);
    assert!(limiter.check_rate_limit("alice").await);
}

#[tokio::test(start_paused = true)]
async fn rejected_checks_do_not_consume_quota() {
    let limiter = RateLimiter::new(RateLimitConfig::new(1, 10));
    assert!(limiter.check_rate_limit("alice").await);
    for _ in 0..5 {
        assert!(!limiter.check_rate_limit("alice").await);
    }
    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(limiter.check_rate_limit("alice").await);
}

#[tokio::test]
async fn senders_are_independent() {
    let limiter = RateLimiter::new(RateLimitConfig::new(1, 60));
    assert!(limiter.check_rate_limit("alice").await);
    assert!(!limiter.check_rate_limit("alice").await);
    assert!(limiter.check_rate_limit("bob").await);
    assert_eq!(limiter.tracked_keys().await, 2);
}

#[tokio::test]
async fn acquire_reports_rate_limit_error() {
    let limiter = RateLimiter::new(RateLimitConfig::new(1, 30));
    limiter.acquire("alice").await.unwrap();
    let err = limiter.acquire("alice").await.unwrap_err();
    assert_eq!(
        err,
        ProtocolError::RateLimit {
            sender_id: "alice".to_string(),
            limit: 1,
            window_seconds: 30,
        }
    );
    assert!(err.is_rate_limited());
}

#[tokio::test]
async fn explicit_limit_uses_its_own_key() {
    let limiter = RateLimiter::new(RateLimitConfig::new(100, 60));
    assert!(limiter.check_with_limit("alice:echo", 1).await);
    assert!(!limiter.check_with_limit("alice:echo", 1).await);
    assert!(limiter.check_rate_limit("alice").await);
}

#[tokio::test]
async fn reset_and_clear_forget_history() {
    let limiter = RateLimiter::new(RateLimitConfig::new(1, 60));
    limiter.check_rate_limit("alice").await;
    limiter.check_rate_limit("bob").await;

    limiter.reset("alice").await;
    assert!(limiter.check_rate_limit("alice").await);

    limiter.clear().await;
    assert_eq!(limiter.tracked_keys().await, 0);
    assert!(limiter.check_rate_limit("bob").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_never_exceed_limit() {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(10, 60)));
    let mut handles = Vec::new();
    for _ in 0..50 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(
            async move { limiter.check_rate_limit("alice").await },
        ));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}
