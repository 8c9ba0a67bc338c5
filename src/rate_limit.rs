//! Token-bucket admission control for outbound requests.
//!
//! Backed by `governor`'s GCRA limiter: the bucket state is a single atomic
//! timestamp, so concurrent callers never contend on a lock and no
//! background refill task exists. Tokens are "replenished" by arithmetic
//! on elapsed time at the moment someone asks for one.
//!
//! ## Invariants
//!
//! * At most `burst` acquisitions succeed without time passing.
//! * Below the configured rate, a caller waits at most one refill
//!   interval (`1 / rate`).
//! * A wait abandoned because the context ended consumes no token.

use crate::config::RateLimitConfig;
use crate::context::CallContext;
use crate::error::{CancelReason, ConfigError};
use governor::{DefaultDirectRateLimiter, Quota};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Shared, thread-safe token bucket.
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    config: RateLimitConfig,
    period: Duration,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate_per_sec", &self.config.rate_per_sec)
            .field("burst", &self.config.burst)
            .finish()
    }
}

impl RateLimiter {
    /// Build a limiter holding `burst` tokens, refilled at `rate_per_sec`.
    ///
    /// The bucket starts full.
    pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let period = config.refill_period()?;
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| ConfigError("burst must be ≥ 1".into()))?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                ConfigError(format!(
                    "rate {} is too high to express as a refill period",
                    config.rate_per_sec
                ))
            })?
            .allow_burst(burst);

        Ok(Self {
            limiter: governor::RateLimiter::direct(quota),
            config,
            period,
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Time between two token refills.
    pub fn refill_interval(&self) -> Duration {
        self.period
    }

    /// Wait for a token, or until `ctx` ends.
    ///
    /// Admission order among concurrent waiters is not FIFO. An
    /// already-ended context fails without touching the bucket.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<(), CancelReason> {
        if let Some(reason) = ctx.err() {
            return Err(reason);
        }

        if self.limiter.check().is_ok() {
            return Ok(());
        }

        debug!(
            rate_per_sec = self.config.rate_per_sec,
            burst = self.config.burst,
            "rate limit reached, waiting for a token"
        );

        tokio::select! {
            biased;
            reason = ctx.done() => Err(reason),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
