//! Exponential-backoff retry driver with a permanent/transient split.
//!
//! ## Retry Strategy
//!
//! Delays grow geometrically from [`RetryConfig::initial_interval`] up to
//! [`RetryConfig::max_interval`], with optional jitter, and retrying stops
//! once [`RetryConfig::max_elapsed_time`] has passed since the first
//! attempt. With the completion defaults (500 ms, ×1.5, 5 s cap, 30 s
//! ceiling) the un-jittered schedule is 500 ms → 750 ms → 1.1 s → 1.7 s →
//! 2.5 s → 3.8 s → 5 s → 5 s …
//!
//! Three things end the loop early:
//!
//! * an error whose [`Classify::is_permanent`] is true: surfaced at once,
//!   the backoff is never waited out;
//! * the caller's [`CallContext`] ending, during an attempt or a sleep;
//! * success.
//!
//! The schedule is computed by `backoff::ExponentialBackoff` reading
//! tokio's clock, so tests running with paused time see exact delays.

use crate::config::RetryConfig;
use crate::context::CallContext;
use crate::error::{CancelReason, FailureKind, TransportError};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use backoff::Clock;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Decides whether an error is worth retrying.
pub trait Classify {
    /// True when retrying cannot help (bad request, bad credentials).
    fn is_permanent(&self) -> bool;
}

impl Classify for TransportError {
    fn is_permanent(&self) -> bool {
        self.kind() == FailureKind::Permanent
    }
}

/// What the attempt function is told about the attempt it is running.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 0 for the first attempt.
    pub index: u32,
    /// Time since the first attempt started.
    pub elapsed: Duration,
    /// Display form of the previous attempt's error, if any.
    pub last_error: Option<String>,
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The attempt reported a permanent failure.
    #[error("permanent failure after {attempts} attempt(s): {error}")]
    Permanent { error: E, attempts: u32 },

    /// The elapsed-time ceiling was reached without success.
    #[error("failed after retries ({attempts} attempts in {elapsed:?}): {error}")]
    Exhausted {
        error: E,
        attempts: u32,
        elapsed: Duration,
    },

    /// The caller's context ended.
    #[error("retry aborted after {attempts} attempt(s): {reason}")]
    Cancelled {
        reason: CancelReason,
        attempts: u32,
        last_error: Option<E>,
    },
}

impl<E> RetryError<E> {
    /// Number of times the attempt function was invoked.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// `backoff::Clock` driven by tokio's (pausable) clock.
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> std::time::Instant {
        Instant::now().into_std()
    }
}

/// Retry driver for one kind of operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// A fresh backoff schedule starting now.
    fn schedule(&self) -> ExponentialBackoff<TokioClock> {
        let c = &self.config;
        let mut schedule = ExponentialBackoff {
            current_interval: c.initial_interval,
            initial_interval: c.initial_interval,
            randomization_factor: c.randomization_factor,
            multiplier: c.multiplier,
            max_interval: c.max_interval,
            start_time: TokioClock.now(),
            max_elapsed_time: Some(c.max_elapsed_time),
            clock: TokioClock,
        };
        schedule.reset();
        schedule
    }

    /// Run `attempt` until it succeeds, fails permanently, exhausts the
    /// elapsed-time ceiling, or `ctx` ends.
    pub async fn run<T, E, F, Fut>(&self, ctx: &CallContext, mut attempt: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetryAttempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        let mut schedule = self.schedule();
        let start = Instant::now();
        let mut attempts: u32 = 0;
        let mut last_error: Option<E> = None;

        loop {
            if let Some(reason) = ctx.err() {
                return Err(RetryError::Cancelled {
                    reason,
                    attempts,
                    last_error,
                });
            }

            let info = RetryAttempt {
                index: attempts,
                elapsed: start.elapsed(),
                last_error: last_error.as_ref().map(|e| e.to_string()),
            };
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                reason = ctx.done() => {
                    return Err(RetryError::Cancelled { reason, attempts, last_error });
                }
                outcome = attempt(info) => outcome,
            };

            let error = match outcome {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(attempts, "succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if error.is_permanent() {
                return Err(RetryError::Permanent { error, attempts });
            }

            let Some(delay) = schedule.next_backoff() else {
                return Err(RetryError::Exhausted {
                    error,
                    attempts,
                    elapsed: start.elapsed(),
                });
            };

            warn!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );
            last_error = Some(error);

            tokio::select! {
                biased;
                reason = ctx.done() => {
                    return Err(RetryError::Cancelled { reason, attempts, last_error });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
