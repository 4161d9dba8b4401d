//! The per-invocation execution context.
//!
//! An [`ExecutionContext`] is what a command body sees: an offset-aware view
//! over the argument tokens, typed parsing helpers, flag matching, permission
//! and cooldown assertions, and the reply and redirect surface. Assertions
//! return [`Flow`](crate::Flow) so bodies can bail out with `?` once the
//! caller has been told what went wrong.
//!
//! Index arguments are relative to the current offset: after resolving
//! `/clear inventory Bob`, the offset is 1 and `get(0)` is `Bob`.

mod assert;
mod flags;
mod parse;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::caller::{Caller, Culture};
use crate::command::CommandId;
use crate::cooldown::Cooldown;
use crate::descriptor::{CommandDescriptor, ParameterNode};
use crate::registry::{CommandNode, CommandRegistry, NodeId};
use crate::services::Services;

/// Tracing target for execution-context events.
pub(crate) const CONTEXT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::context");

/// An offset outside `0..=original_length` was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("argument offset {offset} exceeds argument count {length}")]
pub struct OffsetOutOfRange {
    /// Requested offset.
    pub offset: usize,
    /// Number of original arguments.
    pub length: usize,
}

/// Everything the dispatcher hands over when it creates a context.
pub(crate) struct ContextParts {
    pub(crate) registry: Arc<CommandRegistry>,
    pub(crate) services: Services,
    pub(crate) node: Arc<CommandNode>,
    pub(crate) caller: Caller,
    pub(crate) arguments: Arc<[String]>,
    pub(crate) offset: usize,
    pub(crate) flags: Arc<[String]>,
    pub(crate) raw: Arc<str>,
    pub(crate) cancellation: CancellationToken,
}

/// State of one command execution.
pub struct ExecutionContext {
    registry: Arc<CommandRegistry>,
    services: Services,
    node: Arc<CommandNode>,
    caller: Caller,
    arguments: Arc<[String]>,
    offset: usize,
    flags: Arc<[String]>,
    raw: Arc<str>,
    cancellation: CancellationToken,
    responded: bool,
    pending_redirect: Option<CommandId>,
    standard_cooldown: Option<Cooldown>,
    isolated_cooldown: Option<Cooldown>,
    cooldown_to_start: Option<Duration>,
    isolated_cooldown_to_start: Option<Duration>,
}

impl ExecutionContext {
    /// Builds a context. Offsets past the end are clamped to the end.
    pub(crate) fn new(parts: ContextParts) -> Self {
        let offset = parts.offset.min(parts.arguments.len());
        Self {
            registry: parts.registry,
            services: parts.services,
            node: parts.node,
            caller: parts.caller,
            arguments: parts.arguments,
            offset,
            flags: parts.flags,
            raw: parts.raw,
            cancellation: parts.cancellation,
            responded: false,
            pending_redirect: None,
            standard_cooldown: None,
            isolated_cooldown: None,
            cooldown_to_start: None,
            isolated_cooldown_to_start: None,
        }
    }

    /// Who ran the command.
    #[must_use]
    pub const fn caller(&self) -> &Caller {
        &self.caller
    }

    /// Culture snapshot taken when the invocation began.
    #[must_use]
    pub const fn culture(&self) -> &Culture {
        self.caller.culture()
    }

    /// The shared command registry.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        self.registry.as_ref()
    }

    /// Collaborator services.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Registry id of the executing node.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node.id()
    }

    /// The executing node.
    #[must_use]
    pub fn node(&self) -> &CommandNode {
        self.node.as_ref()
    }

    /// Cleaned descriptor of the executing command.
    #[must_use]
    pub fn descriptor(&self) -> &CommandDescriptor {
        self.node().descriptor()
    }

    /// The line as the caller typed it.
    #[must_use]
    pub fn raw_line(&self) -> &str {
        &self.raw
    }

    /// Current argument offset.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Moves the offset.
    ///
    /// # Errors
    ///
    /// Returns [`OffsetOutOfRange`] when `offset` exceeds the number of
    /// original arguments; the offset is left unchanged.
    pub fn set_offset(&mut self, offset: usize) -> Result<(), OffsetOutOfRange> {
        if offset > self.arguments.len() {
            return Err(OffsetOutOfRange {
                offset,
                length: self.arguments.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    /// Number of arguments visible past the offset.
    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.arguments.len().saturating_sub(self.offset)
    }

    /// Arguments visible past the offset.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        self.arguments.get(self.offset..).unwrap_or_default()
    }

    /// Every argument, including those consumed by sub-command names.
    #[must_use]
    pub fn original_arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Argument at `index` past the offset.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.arguments().get(index).map(String::as_str)
    }

    /// Returns `true` when at least `count` arguments are visible.
    #[must_use]
    pub fn has_args(&self, count: usize) -> bool {
        self.argument_count() >= count
    }

    /// Returns `true` when exactly `count` arguments are visible.
    #[must_use]
    pub fn has_args_exact(&self, count: usize) -> bool {
        self.argument_count() == count
    }

    /// Returns `true` when the argument at `index` equals `name`, ignoring
    /// case.
    #[must_use]
    pub fn match_parameter(&self, index: usize, name: &str) -> bool {
        self.get(index)
            .is_some_and(|token| token.eq_ignore_ascii_case(name))
    }

    /// Returns `true` when the argument at `index` names `parameter` or a
    /// parameter reachable through one of its look-at children.
    #[must_use]
    pub fn is_parameter_match_or_look_at_match(
        &self,
        index: usize,
        parameter: &ParameterNode,
    ) -> bool {
        self.get(index)
            .is_some_and(|token| parameter.is_parameter_match_or_look_at_match(token))
    }

    /// Arguments from `index` onwards joined by single spaces.
    #[must_use]
    pub fn remainder(&self, index: usize) -> Option<String> {
        let tail = self.arguments().get(index..)?;
        (!tail.is_empty()).then(|| tail.join(" "))
    }

    /// Returns `true` once anything has been sent to the caller.
    #[must_use]
    pub const fn responded(&self) -> bool {
        self.responded
    }

    /// Redirect requested by the body, if any.
    #[must_use]
    pub const fn pending_redirect(&self) -> Option<CommandId> {
        self.pending_redirect
    }

    /// Token cancelled when the invocation ends or the caller gives up.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Standard cooldown duration to start after execution.
    pub(crate) const fn cooldown_to_start(&self) -> Option<Duration> {
        self.cooldown_to_start
    }

    /// Isolated cooldown duration to start after execution.
    pub(crate) const fn isolated_cooldown_to_start(&self) -> Option<Duration> {
        self.isolated_cooldown_to_start
    }
}
