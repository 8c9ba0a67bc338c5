//! Subscriber set-up for the `openai-pdf` binary.
//!
//! The library only emits `tracing` data; installing a subscriber is the
//! application's call. This module is what the bundled CLI uses: a fmt
//! layer on stderr behind an `EnvFilter`, plus, with the `otel` feature,
//! a `tracing-opentelemetry` layer exporting spans to stdout.

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider as _;
#[cfg(feature = "otel")]
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};

/// How the process-wide subscriber should look.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"`.
    pub default_filter: String,

    /// Export spans as OpenTelemetry JSON on stdout. Needs feature `otel`.
    pub otel_stdout: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            otel_stdout: false,
        }
    }
}

/// Keeps the exporter alive; flushes pending spans when dropped.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "otel")]
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otel")]
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush OpenTelemetry spans: {e}");
            }
        }
    }
}

/// Install the global subscriber. Call once, at the top of `main`.
pub fn init(config: &TelemetryConfig) -> Result<TelemetryGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter)
            .with_context(|| format!("Invalid log filter '{}'", config.default_filter))?,
    };

    let registry = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false),
    );

    #[cfg(feature = "otel")]
    if config.otel_stdout {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .with_resource(
                Resource::builder()
                    .with_service_name(env!("CARGO_PKG_NAME"))
                    .build(),
            )
            .build();
        let tracer = provider.tracer(env!("CARGO_PKG_NAME"));

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()
            .context("Failed to install tracing subscriber")?;

        return Ok(TelemetryGuard {
            provider: Some(provider),
        });
    }

    #[cfg(not(feature = "otel"))]
    if config.otel_stdout {
        anyhow::bail!("--otel-stdout requires building with the `otel` feature");
    }

    registry
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(TelemetryGuard::default())
}
