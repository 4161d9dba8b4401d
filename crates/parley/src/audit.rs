//! Action-log records for finished invocations.

use std::fmt;

use crate::caller::{CallerKind, PrincipalId};
use crate::services::ActionLog;

/// Tracing target for action-log entries.
pub(crate) const ACTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::actions");

/// One completed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    /// Principal that ran the command.
    pub caller: PrincipalId,
    /// Caller kind at the time of the invocation.
    pub caller_kind: CallerKind,
    /// Space-separated path of the executed command, such as `clear inventory`.
    pub command: String,
    /// Raw line as typed.
    pub raw: String,
    /// Short outcome label (`completed`, `handled`, `cancelled`, `failed`).
    pub outcome: &'static str,
}

impl fmt::Display for ActionEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} {} ran '{}' ({})",
            self.caller_kind, self.caller, self.raw, self.outcome
        )
    }
}

/// Action log that writes entries as structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredActionLog;

impl ActionLog for StructuredActionLog {
    fn record(&self, entry: &ActionEntry) {
        tracing::info!(
            target: ACTION_TARGET,
            caller = %entry.caller,
            caller_kind = %entry.caller_kind,
            command = entry.command.as_str(),
            raw = entry.raw.as_str(),
            outcome = entry.outcome,
            "command executed"
        );
    }
}
