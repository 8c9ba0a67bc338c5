//! Configuration types for the resilient client and the document pipeline.
//!
//! Every knob lives in an explicit value handed to a constructor; there is
//! no package-level default client. Two [`crate::client::Client`]s built
//! from two configs share nothing, not even their rate limiters, which is
//! what lets tests run independent clients side by side.

use crate::error::ConfigError;
use std::fmt;
use std::time::Duration;
use tracing::Dispatch;

// ── Rate limiting ────────────────────────────────────────────────────────

/// Token-bucket parameters for outbound requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained admission rate in requests per second. Default: 10.
    ///
    /// Fractional rates are allowed (`0.5` = one request every two seconds).
    pub rate_per_sec: f64,

    /// Maximum tokens held at once, i.e. how many requests may start
    /// back-to-back after an idle period. Default: 20.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 10.0,
            burst: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rate_per_sec.is_finite() || self.rate_per_sec <= 0.0 {
            return Err(ConfigError(format!(
                "rate limit must be a positive number of requests per second, got {}",
                self.rate_per_sec
            )));
        }
        if self.burst == 0 {
            return Err(ConfigError("burst must be ≥ 1".into()));
        }
        self.refill_period().map(|_| ())
    }

    /// Time between two token refills, `1 / rate_per_sec`.
    pub fn refill_period(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(1.0 / self.rate_per_sec).map_err(|_| {
            ConfigError(format!(
                "rate limit {} is too low to express as a refill period",
                self.rate_per_sec
            ))
        })
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

/// Exponential backoff parameters for one kind of operation.
///
/// The delay before retry *n* is roughly
/// `min(initial_interval * multiplier^n, max_interval)`, spread by
/// `± randomization_factor`. Retrying stops once `max_elapsed_time` has
/// passed since the first attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Delay before the first retry. Default: 500 ms.
    pub initial_interval: Duration,

    /// Growth factor between consecutive delays. Default: 1.5.
    pub multiplier: f64,

    /// Jitter as a fraction of the current delay, 0.0–1.0. Default: 0.5.
    ///
    /// Set to 0 for a deterministic schedule.
    pub randomization_factor: f64,

    /// Cap on a single delay.
    pub max_interval: Duration,

    /// Overall ceiling on time spent retrying.
    pub max_elapsed_time: Duration,
}

impl RetryConfig {
    /// Ceiling for file uploads: 10 s max step, 1 min total.
    ///
    /// Uploads are idempotent by file identity and expensive to redo from
    /// scratch, so they get the longer budget.
    pub fn upload() -> Self {
        Self {
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Duration::from_secs(60),
            ..Self::base()
        }
    }

    /// Ceiling for completions: 5 s max step, 30 s total.
    pub fn completion() -> Self {
        Self {
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Duration::from_secs(30),
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Duration::from_secs(15 * 60),
        }
    }

    pub fn initial_interval(mut self, d: Duration) -> Self {
        self.initial_interval = d;
        self
    }

    pub fn multiplier(mut self, m: f64) -> Self {
        self.multiplier = m;
        self
    }

    pub fn randomization_factor(mut self, r: f64) -> Self {
        self.randomization_factor = r;
        self
    }

    pub fn max_interval(mut self, d: Duration) -> Self {
        self.max_interval = d;
        self
    }

    pub fn max_elapsed_time(mut self, d: Duration) -> Self {
        self.max_elapsed_time = d;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_interval.is_zero() {
            return Err(ConfigError("initial retry interval must be > 0".into()));
        }
        if self.max_interval < self.initial_interval {
            return Err(ConfigError(format!(
                "max retry interval ({:?}) must be ≥ initial interval ({:?})",
                self.max_interval, self.initial_interval
            )));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(ConfigError(format!(
                "retry multiplier must be ≥ 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(ConfigError(format!(
                "randomization factor must be within 0.0–1.0, got {}",
                self.randomization_factor
            )));
        }
        Ok(())
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// Configuration for a [`crate::client::Client`].
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use openai_pdf::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .rate_limit(2.0, 4)
///     .build()
///     .unwrap();
/// assert_eq!(config.rate_limit.burst, 4);
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Admission control for every outbound request.
    pub rate_limit: RateLimitConfig,

    /// Backoff schedule for [`crate::client::Client::upload_file`].
    pub upload_retry: RetryConfig,

    /// Backoff schedule for [`crate::client::Client::complete_text`].
    pub completion_retry: RetryConfig,

    /// Logger override. When set, the client's spans and events go to
    /// this dispatcher instead of the global default.
    pub dispatch: Option<Dispatch>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            upload_retry: RetryConfig::upload(),
            completion_retry: RetryConfig::completion(),
            dispatch: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("rate_limit", &self.rate_limit)
            .field("upload_retry", &self.upload_retry)
            .field("completion_retry", &self.completion_retry)
            .field("dispatch", &self.dispatch.as_ref().map(|_| "<Dispatch>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Override the admission rate (requests/second) and burst size.
    pub fn rate_limit(mut self, rate_per_sec: f64, burst: u32) -> Self {
        self.config.rate_limit = RateLimitConfig {
            rate_per_sec,
            burst,
        };
        self
    }

    pub fn upload_retry(mut self, retry: RetryConfig) -> Self {
        self.config.upload_retry = retry;
        self
    }

    pub fn completion_retry(mut self, retry: RetryConfig) -> Self {
        self.config.completion_retry = retry;
        self
    }

    /// Route this client's spans and log events to `dispatch`.
    pub fn dispatch(mut self, dispatch: impl Into<Dispatch>) -> Self {
        self.config.dispatch = Some(dispatch.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let c = &self.config;
        c.rate_limit.validate()?;
        c.upload_retry.validate()?;
        c.completion_retry.validate()?;
        Ok(self.config)
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// Options for [`crate::process::process_document`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Upload purpose tag understood by the service. Default: `"assistants"`.
    pub purpose: String,

    /// Ask the model for a summary after uploading. Default: true.
    pub summarize: bool,

    /// Maximum characters of extracted text sent in the summary prompt.
    /// Default: 2000.
    ///
    /// Keeping the prompt within the model's context window is the caller's
    /// job, not the client's; this is where the pipeline does it.
    pub summary_chars: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            purpose: "assistants".to_string(),
            summarize: true,
            summary_chars: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operation_ceilings() {
        let c = ClientConfig::default();
        assert_eq!(c.rate_limit.rate_per_sec, 10.0);
        assert_eq!(c.rate_limit.burst, 20);
        assert_eq!(c.upload_retry.max_interval, Duration::from_secs(10));
        assert_eq!(c.upload_retry.max_elapsed_time, Duration::from_secs(60));
        assert_eq!(c.completion_retry.max_interval, Duration::from_secs(5));
        assert_eq!(c.completion_retry.max_elapsed_time, Duration::from_secs(30));
        assert!(c.upload_retry.max_elapsed_time > c.completion_retry.max_elapsed_time);
    }

    #[test]
    fn builder_rejects_bad_rate_limits() {
        assert!(ClientConfig::builder().rate_limit(0.0, 1).build().is_err());
        assert!(ClientConfig::builder().rate_limit(f64::NAN, 1).build().is_err());
        assert!(ClientConfig::builder().rate_limit(5.0, 0).build().is_err());
        assert!(ClientConfig::builder().rate_limit(0.5, 1).build().is_ok());
    }

    #[test]
    fn builder_rejects_rate_whose_period_overflows() {
        let err = ClientConfig::builder()
            .rate_limit(1e-20, 1)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("too low"), "got: {err}");
        assert!(ClientConfig::builder().rate_limit(f64::MIN_POSITIVE, 1).build().is_err());
    }

    #[test]
    fn refill_period_is_inverse_rate() {
        let c = RateLimitConfig {
            rate_per_sec: 4.0,
            burst: 1,
        };
        assert_eq!(c.refill_period().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn builder_rejects_inverted_backoff() {
        let retry = RetryConfig::completion()
            .initial_interval(Duration::from_secs(10))
            .max_interval(Duration::from_secs(1));
        let err = ClientConfig::builder()
            .completion_retry(retry)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max retry interval"), "got: {err}");
    }

    #[test]
    fn builder_rejects_out_of_range_jitter() {
        let retry = RetryConfig::upload().randomization_factor(1.5);
        assert!(ClientConfig::builder().upload_retry(retry).build().is_err());
    }

    #[test]
    fn debug_hides_dispatch() {
        let config = ClientConfig::builder()
            .dispatch(Dispatch::none())
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("<Dispatch>"), "got: {dbg}");
    }

    #[test]
    fn process_defaults() {
        let o = ProcessOptions::default();
        assert_eq!(o.purpose, "assistants");
        assert!(o.summarize);
        assert_eq!(o.summary_chars, 2000);
    }
}
