//! The dispatcher: the single entry point for the hosting layer.
//!
//! [`Dispatcher::dispatch`] takes one [`Invocation`] (a caller plus an
//! already tokenised line) and runs it to completion: it finds the top-level
//! command, resolves the sub-command chain, intercepts help keywords, bridges
//! native commands, and drives structured commands through locking,
//! assertions, the body itself, cooldown bookkeeping and any redirects the
//! body requests. Whatever happens the caller hears back at most one
//! terminal message from the engine, and none if the body already replied.

mod pipeline;
pub mod resolve;

use std::fmt;
use std::sync::Arc;

use parley_config::{Config, DEFAULT_MAX_REDIRECT_DEPTH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use self::pipeline::Session;
use self::resolve::{CommandLine, intercept_help, resolve_chain};
use crate::audit::ActionEntry;
use crate::caller::{Caller, Culture};
use crate::descriptor::split_flag_token;
use crate::localization::messages;
use crate::registry::{CommandMatch, CommandRegistry};
use crate::services::Services;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Dispatcher tuning derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum number of redirects one invocation may follow.
    pub max_redirect_depth: u32,
    /// Culture given to callers whose host did not report one.
    pub default_culture: Culture,
}

impl DispatchSettings {
    /// Reads the dispatcher settings from the layered configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_redirect_depth: config.max_redirect_depth(),
            default_culture: Culture::for_locale(config.locale()),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_redirect_depth: DEFAULT_MAX_REDIRECT_DEPTH,
            default_culture: Culture::invariant(),
        }
    }
}

/// One line typed by a caller.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Who typed the line.
    pub caller: Caller,
    /// The command token, without a leading slash.
    pub command: String,
    /// Argument tokens after the command token.
    pub arguments: Vec<String>,
    /// Flag tokens, classified separately by the host.
    pub flags: Vec<String>,
    /// The line as typed; rebuilt from the tokens when absent.
    pub raw: Option<String>,
    /// Caller-level cancellation.
    pub cancellation: CancellationToken,
}

impl Invocation {
    /// Creates an invocation of `command` without arguments.
    #[must_use]
    pub fn new(caller: Caller, command: impl Into<String>) -> Self {
        Self {
            caller,
            command: command.into(),
            arguments: Vec::new(),
            flags: Vec::new(),
            raw: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Splits already tokenised input into command, arguments and flags.
    ///
    /// Tokens with one or two leading dashes are flags unless the rest is
    /// numeric, so `-5` stays an argument. Returns `None` for empty input.
    #[must_use]
    pub fn from_tokens<I, S>(caller: Caller, tokens: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = tokens.into_iter().map(Into::into);
        let first: String = tokens.next()?;
        let command = first.trim_start_matches('/').to_owned();
        let (flags, arguments): (Vec<String>, Vec<String>) =
            tokens.partition(|token| is_flag_token(token));
        Some(Self {
            arguments,
            flags,
            ..Self::new(caller, command)
        })
    }

    /// Replaces the argument tokens.
    #[must_use]
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the flag tokens.
    #[must_use]
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the raw line used for logging.
    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Links the invocation to a caller-level cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    fn raw_line(&self) -> String {
        self.raw.clone().unwrap_or_else(|| {
            std::iter::once(format!("/{}", self.command))
                .chain(self.arguments.iter().cloned())
                .chain(self.flags.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

fn is_flag_token(token: &str) -> bool {
    split_flag_token(token).is_some_and(|(_, body)| {
        !body
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_digit() || first == '.')
    })
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The body ran to completion.
    Completed,
    /// A control signal stopped execution after the caller was told why.
    Handled,
    /// The invocation was cancelled.
    Cancelled,
    /// The body or a collaborator failed unexpectedly.
    Failed,
    /// No command matched the command token.
    Unrecognised,
}

impl Outcome {
    /// Short label used in logs and action entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Handled => "handled",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Unrecognised => "unrecognised",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Summary of one dispatched invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Whether the command token named a registered command.
    pub recognised: bool,
    /// How the invocation ended.
    pub outcome: Outcome,
    /// Path of the last command that ran, such as `clear inventory`.
    pub command: Option<String>,
    /// Number of redirects followed.
    pub redirects: u32,
}

/// Routes invocations through the registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    services: Services,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Creates a dispatcher over a frozen registry.
    #[must_use]
    pub const fn new(
        registry: Arc<CommandRegistry>,
        services: Services,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            services,
            settings,
        }
    }

    /// The command registry.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        self.registry.as_ref()
    }

    /// Collaborator services.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Runs one invocation to completion.
    pub async fn dispatch(&self, invocation: Invocation) -> DispatchReport {
        let raw = invocation.raw_line();
        let Invocation {
            caller,
            command,
            arguments,
            flags,
            cancellation,
            ..
        } = invocation;
        debug!(
            target: DISPATCH_TARGET,
            caller = %caller,
            command = command.as_str(),
            arguments = arguments.len(),
            "dispatching"
        );
        let caller = caller.with_default_culture(&self.settings.default_culture);
        let mut session = Session::new(caller, flags, raw, cancellation);

        let outcome = match self.registry.find_command(&command) {
            None => self.unknown_command(&mut session, &command).await,
            Some(CommandMatch::Native(entry)) => {
                let line = CommandLine::new(entry.name(), arguments);
                match intercept_help(&self.registry, &line, 0, None) {
                    Some(help) => self.run_help(&mut session, help).await,
                    None => self.run_native(&mut session, entry, &line).await,
                }
            }
            Some(CommandMatch::Structured(root)) => {
                let line = CommandLine::new(root.name(), arguments);
                let resolution = resolve_chain(&self.registry, root.id(), &line.arguments);
                let resolved = self
                    .registry
                    .node(resolution.node)
                    .and_then(|node| node.command_id());
                match intercept_help(&self.registry, &line, resolution.offset, resolved) {
                    Some(help) => self.run_help(&mut session, help).await,
                    None => {
                        self.run_structured(&mut session, resolution.node, line, resolution.offset)
                            .await
                    }
                }
            }
        };
        self.report(session, &command, outcome)
    }

    async fn unknown_command(&self, session: &mut Session, command: &str) -> Outcome {
        debug!(
            target: DISPATCH_TARGET,
            caller = %session.caller,
            command,
            "unknown command"
        );
        self.services.primary.enter().await;
        self.send(session, messages::UNKNOWN_COMMAND);
        Outcome::Unrecognised
    }

    async fn run_help(&self, session: &mut Session, line: CommandLine) -> Outcome {
        debug!(
            target: DISPATCH_TARGET,
            line = line.words().join(" "),
            "help keyword intercepted"
        );
        match self.registry.help() {
            Some(help) => self.run_structured(session, help.id(), line, 0).await,
            None => self.unknown_command(session, &line.command).await,
        }
    }

    fn report(&self, session: Session, command: &str, outcome: Outcome) -> DispatchReport {
        let entry = ActionEntry {
            caller: session.caller.id(),
            caller_kind: session.caller.kind(),
            command: session
                .command
                .clone()
                .unwrap_or_else(|| command.to_owned()),
            raw: session.raw.to_string(),
            outcome: outcome.as_str(),
        };
        self.services.actions.record(&entry);
        info!(
            target: DISPATCH_TARGET,
            caller = %session.caller,
            command = entry.command.as_str(),
            outcome = outcome.as_str(),
            redirects = session.redirects,
            "dispatch finished"
        );
        DispatchReport {
            recognised: outcome != Outcome::Unrecognised,
            outcome,
            command: session.command,
            redirects: session.redirects,
        }
    }
}

#[cfg(test)]
mod tests;
