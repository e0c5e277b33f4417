//! Per-client admission control.
//!
//! Each client (identified by peer IP) gets its own `governor` limiter, a
//! GCRA token bucket. A request takes one cell; an exhausted client gets
//! `429 Too Many Requests`. Cells replenish at a steady rate and clients that
//! go quiet are swept away in the background.
//!
//! ```text
//!   request ──▶ check(client) ──▶ quota has a cell?   ──yes──▶ handler
//!                                         │
//!                                         no
//!                                         ▼
//!                                 LimitError::RateLimited
//! ```

mod limiter;

pub use limiter::{
    RateLimiter, RateLimiterConfig, DEFAULT_BURST, DEFAULT_IDLE_TIMEOUT, DEFAULT_RATE_PER_SEC,
    DEFAULT_SWEEP_INTERVAL,
};
