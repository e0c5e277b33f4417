//! Rate limiter integration tests.
//!
//! Tests verify:
//! - A burst of B requests is admitted and the next one rejected
//! - One more request is admitted after 1/R seconds
//! - Idle clients are evicted and come back with a full burst
//! - Concurrent checks never admit more than the burst
//!
//! Time is driven by hand through governor's `FakeRelativeClock`.

use std::sync::Arc;
use std::time::Duration;

use governor::clock::FakeRelativeClock;
use tinyimg::error::LimitError;
use tinyimg::limit::{RateLimiter, RateLimiterConfig};

fn limiter(
    rate: f64,
    burst: u32,
    idle: Duration,
) -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
    let clock = FakeRelativeClock::default();
    let limiter = RateLimiter::with_clock(
        RateLimiterConfig {
            rate,
            burst,
            idle_timeout: idle,
            sweep_interval: Duration::from_secs(60),
        },
        clock.clone(),
    );
    (limiter, clock)
}

#[tokio::test]
async fn test_burst_plus_one() {
    let (limiter, _clock) = limiter(30.0, 120, Duration::from_secs(180));

    for i in 0..120 {
        assert!(
            limiter.check("10.0.0.1").await.is_ok(),
            "request {} should be admitted",
            i
        );
    }
    assert!(matches!(
        limiter.check("10.0.0.1").await,
        Err(LimitError::RateLimited { .. })
    ));
}

#[tokio::test]
async fn test_refill_after_one_interval() {
    let (limiter, clock) = limiter(4.0, 2, Duration::from_secs(180));

    limiter.check("a").await.unwrap();
    limiter.check("a").await.unwrap();
    assert!(limiter.check("a").await.is_err());

    // Not yet a full interval
    clock.advance(Duration::from_millis(200));
    assert!(limiter.check("a").await.is_err());

    clock.advance(Duration::from_millis(50));
    assert!(limiter.check("a").await.is_ok());
    assert!(limiter.check("a").await.is_err());
}

#[tokio::test]
async fn test_idle_client_evicted_then_full_burst() {
    let (limiter, clock) = limiter(0.001, 3, Duration::from_secs(180));

    for _ in 0..3 {
        limiter.check("a").await.unwrap();
    }
    assert!(limiter.check("a").await.is_err());

    clock.advance(Duration::from_secs(181));
    assert_eq!(limiter.sweep().await, 1);
    assert_eq!(limiter.visitor_count().await, 0);

    for _ in 0..3 {
        assert!(limiter.check("a").await.is_ok());
    }
    assert!(limiter.check("a").await.is_err());
}

#[tokio::test]
async fn test_sweep_keeps_active_clients() {
    let (limiter, clock) = limiter(1.0, 1, Duration::from_secs(180));

    limiter.check("idle").await.unwrap();
    clock.advance(Duration::from_secs(100));
    limiter.check("active").await.unwrap();

    clock.advance(Duration::from_secs(100));
    assert_eq!(limiter.sweep().await, 1);
    assert_eq!(limiter.visitor_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_checks_admit_exactly_burst() {
    let (limiter, _clock) = limiter(0.001, 50, Duration::from_secs(180));
    let limiter = Arc::new(limiter);

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move { limiter.check("shared").await.is_ok() })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 50);
}

#[tokio::test]
async fn test_background_sweeper_evicts_idle_clients() {
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        rate: 10.0,
        burst: 10,
        idle_timeout: Duration::from_millis(20),
        sweep_interval: Duration::from_millis(10),
    }));
    let _sweeper = limiter.spawn_sweeper();

    limiter.check("a").await.unwrap();
    assert_eq!(limiter.visitor_count().await, 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(limiter.visitor_count().await, 0);
}
