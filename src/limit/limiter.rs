use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::LimitError;

/// Default sustained request rate per client (requests per second).
pub const DEFAULT_RATE_PER_SEC: f64 = 30.0;

/// Default burst size per client.
pub const DEFAULT_BURST: u32 = 120;

/// Default time after which an idle client is forgotten (3 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Default interval between idle sweeps (1 minute).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Rate limiter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterConfig {
    /// Requests replenished per second
    pub rate: f64,

    /// Largest burst a fresh client may send
    pub burst: u32,

    /// Clients not seen for longer than this are evicted
    pub idle_timeout: Duration,

    /// How often the background sweeper runs
    pub sweep_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE_PER_SEC,
            burst: DEFAULT_BURST,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl RateLimiterConfig {
    /// The GCRA quota for one client: one request every `1 / rate` seconds,
    /// with up to `burst` requests at once.
    ///
    /// A rate that does not map to a positive period falls back to one
    /// request per second. A zero burst is treated as one.
    pub fn quota(&self) -> Quota {
        let burst = NonZeroU32::new(self.burst).unwrap_or(NonZeroU32::MIN);

        Duration::try_from_secs_f64(1.0 / self.rate)
            .ok()
            .and_then(Quota::with_period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst)
    }
}

type ClientLimiter<C> =
    governor::RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

struct Visitor<C: Clock> {
    limiter: ClientLimiter<C>,
    last_seen: C::Instant,
}

/// Per-client admission control.
///
/// Every client identity gets its own `governor` limiter, created with a
/// full burst allowance on first sight. A client that stays quiet for longer
/// than the idle timeout is dropped by [`RateLimiter::sweep`] and starts over
/// with a full burst.
///
/// The clock is a type parameter so tests can drive time by hand with
/// [`governor::clock::FakeRelativeClock`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tinyimg::limit::{RateLimiter, RateLimiterConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::default()));
///     let _sweeper = limiter.spawn_sweeper();
///
///     assert!(limiter.check("10.0.0.1").await.is_ok());
/// }
/// ```
pub struct RateLimiter<C: Clock = DefaultClock> {
    config: RateLimiterConfig,
    quota: Quota,
    clock: C,
    visitors: Mutex<HashMap<String, Visitor<C>>>,
}

impl RateLimiter<DefaultClock> {
    /// Create a limiter on the system clock with no known clients.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C> RateLimiter<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Create a limiter on the given clock.
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Self {
        Self {
            quota: config.quota(),
            config,
            clock,
            visitors: Mutex::new(HashMap::new()),
        }
    }

    /// Get the limiter settings.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Admit or reject one request from `client`.
    ///
    /// The client's last-seen time is refreshed even when the request is
    /// rejected.
    pub async fn check(&self, client: &str) -> Result<(), LimitError> {
        let now = self.clock.now();
        let mut visitors = self.visitors.lock().await;

        let visitor = visitors
            .entry(client.to_string())
            .or_insert_with(|| Visitor {
                limiter: governor::RateLimiter::direct_with_clock(self.quota, &self.clock),
                last_seen: now,
            });
        visitor.last_seen = now;

        visitor
            .limiter
            .check()
            .map_err(|_| LimitError::RateLimited {
                client: client.to_string(),
            })
    }

    /// Evict clients idle for longer than the idle timeout.
    ///
    /// Returns the number of evicted clients.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let idle_timeout = self.config.idle_timeout;
        let mut visitors = self.visitors.lock().await;

        let before = visitors.len();
        visitors.retain(|_, v| Duration::from(now.duration_since(v.last_seen)) <= idle_timeout);
        before - visitors.len()
    }

    /// Number of clients currently tracked.
    pub async fn visitor_count(&self) -> usize {
        self.visitors.lock().await.len()
    }

    /// Start the background idle sweep.
    ///
    /// The task only holds a weak reference and stops once the limiter is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::downgrade(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(limiter) = limiter.upgrade() else {
                    break;
                };

                let evicted = limiter.sweep().await;
                if evicted > 0 {
                    debug!(evicted, "Evicted idle clients");
                }
            }
        })
    }
}

impl<C: Clock> fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
