/// Default log filter expression used by hosts embedding the engine.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default bound on how many redirects one invocation may follow.
pub const DEFAULT_MAX_REDIRECT_DEPTH: u32 = 4;

/// Prefix of the permission leaf synthesized for bridged native commands.
pub const DEFAULT_NATIVE_PERMISSION_PREFIX: &str = "commands.native";

/// Locale used when a caller does not carry one.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Owned native permission prefix.
#[must_use]
pub fn default_native_permission_prefix() -> String {
    DEFAULT_NATIVE_PERMISSION_PREFIX.to_string()
}

/// Owned default locale.
#[must_use]
pub fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}
