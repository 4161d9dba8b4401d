//! Control flow between command bodies, assertions and the dispatcher.
//!
//! Every assertion on the execution context returns a [`Flow`]. The `Err` side
//! carries a [`Signal`] describing why the body must stop: the caller was
//! already told what happened, execution should move to another command, the
//! invocation was cancelled, or something unexpected broke. Bodies propagate
//! signals with `?` and the dispatcher classifies them at the boundary.

use std::sync::Arc;

use thiserror::Error;

use crate::command::CommandId;
use crate::services::ServiceError;

/// Why a command body stopped before completing normally.
#[derive(Debug, Clone)]
pub enum Signal {
    /// An expected condition was met and the caller has already been told.
    ///
    /// Raised for missing permissions, wrong caller kind, bad usage and active
    /// cooldowns. Never logged as an error.
    Handled,
    /// Execution should continue with another command.
    SwitchTo(CommandId),
    /// The invocation was cancelled cooperatively.
    Cancelled,
    /// Something unexpected failed.
    Failed(CommandError),
}

impl Signal {
    /// Returns `true` for signals that represent expected outcomes.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Handled | Self::SwitchTo(_))
    }
}

/// Result type returned by command bodies and context assertions.
pub type Flow<T = ()> = Result<T, Signal>;

/// Unexpected failures surfaced by command bodies or the engine itself.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// A command body reported a failure in its own words.
    #[error("{message}")]
    Message {
        /// Failure description, logged but never shown to the caller.
        message: String,
    },

    /// A command body panicked.
    #[error("command body panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text where possible.
        message: String,
    },

    /// A command attempted to redirect to itself.
    #[error("command '{command}' cannot redirect to itself")]
    SelfRedirect {
        /// Name of the offending command type.
        command: &'static str,
    },

    /// A redirect named a command that is not registered.
    #[error("redirect target '{command}' is not registered")]
    UnknownRedirect {
        /// Type name of the missing target.
        command: &'static str,
    },

    /// A redirect chain revisited a command it had already executed.
    #[error("redirect cycle detected at '{command}'")]
    RedirectCycle {
        /// Type name of the command visited twice.
        command: &'static str,
    },

    /// A redirect chain exceeded the configured depth.
    #[error("redirect depth {limit} exceeded")]
    RedirectDepth {
        /// Configured maximum.
        limit: u32,
    },

    /// A collaborator service failed.
    #[error(transparent)]
    Service(Arc<ServiceError>),
}

impl CommandError {
    /// Creates a free-form failure.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Creates a panic failure from a `catch_unwind` payload.
    #[must_use]
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| String::from("non-string panic payload"));
        Self::Panicked { message }
    }

    /// Creates a self-redirect failure.
    #[must_use]
    pub const fn self_redirect(command: &'static str) -> Self {
        Self::SelfRedirect { command }
    }

    /// Creates an unknown redirect target failure.
    #[must_use]
    pub const fn unknown_redirect(command: &'static str) -> Self {
        Self::UnknownRedirect { command }
    }

    /// Creates a redirect cycle failure.
    #[must_use]
    pub const fn redirect_cycle(command: &'static str) -> Self {
        Self::RedirectCycle { command }
    }

    /// Creates a redirect depth failure.
    #[must_use]
    pub const fn redirect_depth(limit: u32) -> Self {
        Self::RedirectDepth { limit }
    }
}

impl From<ServiceError> for CommandError {
    fn from(error: ServiceError) -> Self {
        Self::Service(Arc::new(error))
    }
}

impl From<CommandError> for Signal {
    fn from(error: CommandError) -> Self {
        Self::Failed(error)
    }
}

impl From<ServiceError> for Signal {
    fn from(error: ServiceError) -> Self {
        Self::Failed(CommandError::from(error))
    }
}
