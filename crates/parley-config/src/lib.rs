//! Shared configuration for the parley command engine.
//!
//! Configuration is layered by [`ortho_config`]: compiled defaults, an
//! optional `parley.toml` file (selected with `--config-path`), `PARLEY_`
//! prefixed environment variables and finally command-line flags. Hosts load a
//! [`Config`] once at start-up and hand it to the dispatcher and telemetry
//! initialisation.

mod defaults;
mod logging;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_LOCALE, DEFAULT_LOG_FILTER, DEFAULT_MAX_REDIRECT_DEPTH,
    DEFAULT_NATIVE_PERMISSION_PREFIX, default_locale, default_log_filter,
    default_log_filter_string, default_log_format, default_native_permission_prefix,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for the command engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PARLEY")]
pub struct Config {
    /// `tracing` filter expression applied by the telemetry subscriber.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log lines.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Maximum number of redirects a single invocation may follow.
    #[ortho_config(default = DEFAULT_MAX_REDIRECT_DEPTH)]
    pub max_redirect_depth: u32,
    /// Prefix of the permission leaf checked before bridged native commands.
    #[ortho_config(default = default_native_permission_prefix())]
    pub native_permission_prefix: String,
    /// Locale assumed for callers that do not report one.
    #[ortho_config(default = default_locale())]
    pub locale: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_redirect_depth: DEFAULT_MAX_REDIRECT_DEPTH,
            native_permission_prefix: default_native_permission_prefix(),
            locale: default_locale(),
        }
    }
}

impl Config {
    /// Returns the log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the redirect bound.
    #[must_use]
    pub const fn max_redirect_depth(&self) -> u32 {
        self.max_redirect_depth
    }

    /// Returns the native permission prefix.
    #[must_use]
    pub fn native_permission_prefix(&self) -> &str {
        self.native_permission_prefix.as_str()
    }

    /// Returns the fallback locale.
    #[must_use]
    pub fn locale(&self) -> &str {
        self.locale.as_str()
    }

    /// Checks values that the loader accepts syntactically but the engine
    /// cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_redirect_depth == 0 {
            return Err(ConfigValidationError::ZeroRedirectDepth);
        }
        let prefix = self.native_permission_prefix.trim();
        if prefix.is_empty() || prefix.split('.').any(str::is_empty) {
            return Err(ConfigValidationError::InvalidNativePrefix {
                prefix: self.native_permission_prefix.clone(),
            });
        }
        if self.locale.trim().is_empty() {
            return Err(ConfigValidationError::EmptyLocale);
        }
        Ok(())
    }
}

/// Semantic validation failures for a loaded [`Config`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Redirects would be impossible, including the built-in help redirect.
    #[error("max_redirect_depth must be at least 1")]
    ZeroRedirectDepth,
    /// The native permission prefix is not a dotted permission path.
    #[error("native permission prefix '{prefix}' is not a dotted permission path")]
    InvalidNativePrefix {
        /// Offending prefix.
        prefix: String,
    },
    /// No fallback locale was configured.
    #[error("locale must not be empty")]
    EmptyLocale,
}
