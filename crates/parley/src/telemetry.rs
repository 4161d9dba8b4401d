//! Tracing subscriber set-up for hosts embedding the engine.
//!
//! The engine itself only emits `tracing` events. Hosts that already own a
//! subscriber can ignore this module; the rest call [`initialise`] once at
//! start-up, or compose [`build_subscriber`] into their own set-up.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::SubscriberExt;

use parley_config::{Config, LogFormat};

use crate::audit::ACTION_TARGET;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression as configured.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the subscriber from [`build_subscriber`] on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching global
/// state.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a foreign
/// subscriber already owns the global slot.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED.get_or_try_init(|| {
        let subscriber = build_subscriber(config)?;
        tracing::subscriber::set_global_default(subscriber)?;
        Ok::<(), TelemetryError>(())
    })?;
    Ok(TelemetryHandle)
}

/// Builds a stderr subscriber in the configured format without installing it.
///
/// Action-log entries stay enabled at `info` unless the configured filter
/// names their target explicitly.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the filter expression is invalid.
pub fn build_subscriber(
    config: &Config,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError> {
    let filter = engine_filter(config.log_filter())?;
    let registry = tracing_subscriber::registry().with(filter);
    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(
            registry.with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(io::stderr),
            ),
        ),
        LogFormat::Compact => Box::new(
            registry.with(
                fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_ansi(io::stderr().is_terminal())
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(io::stderr),
            ),
        ),
    };
    Ok(subscriber)
}

fn engine_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    let invalid = |message: String| TelemetryError::Filter {
        filter: expression.to_owned(),
        message,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse(expression)
        .map_err(|error| invalid(error.to_string()))?;
    if expression.contains(ACTION_TARGET) {
        return Ok(filter);
    }
    let actions: Directive = format!("{ACTION_TARGET}=info")
        .parse()
        .map_err(|error: tracing_subscriber::filter::ParseError| invalid(error.to_string()))?;
    Ok(filter.add_directive(actions))
}
