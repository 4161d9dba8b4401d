//! Contracts implemented by command types.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use crate::caller::Caller;
use crate::context::ExecutionContext;
use crate::descriptor::CommandDescriptor;
use crate::services::ReplySink;
use crate::signal::{CommandError, Flow};

/// Identity of a command implementation.
///
/// Redirect targets, parent references and lock ownership are all keyed by
/// the implementing Rust type rather than by name, so renaming a command never
/// breaks the links between commands.
#[derive(Clone, Copy)]
pub struct CommandId {
    type_id: TypeId,
    type_name: &'static str,
}

impl CommandId {
    /// Returns the identity of `C`.
    #[must_use]
    pub fn of<C: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
        }
    }

    /// Fully qualified type name of the implementation.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for CommandId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for CommandId {}

impl Hash for CommandId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("CommandId")
            .field(&self.type_name)
            .finish()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.type_name)
    }
}

/// Executable part of a command, constructed fresh for every invocation.
#[async_trait]
pub trait CommandBody: Send {
    /// Runs the command.
    ///
    /// Bodies use the context to read arguments, assert preconditions and
    /// reply. Returning `Err` stops execution with the carried [`Signal`].
    ///
    /// [`Signal`]: crate::Signal
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow;
}

/// A structured command registered with the [`RegistryBuilder`].
///
/// [`RegistryBuilder`]: crate::RegistryBuilder
pub trait Command: CommandBody + Sized + 'static {
    /// Declarative shape of the command.
    fn descriptor() -> CommandDescriptor;

    /// Builds the per-invocation body from the freshly created context.
    fn create(ctx: &ExecutionContext) -> Self;
}

/// Factory stored by the registry for each executable command.
pub type CommandFactory = Arc<dyn Fn(&ExecutionContext) -> Box<dyn CommandBody> + Send + Sync>;

pub(crate) fn factory_for<C: Command>() -> CommandFactory {
    Arc::new(|ctx: &ExecutionContext| -> Box<dyn CommandBody> { Box::new(C::create(ctx)) })
}

/// A command owned by the host outside the descriptor tree.
///
/// Bridged commands only get a permission check against a synthesised leaf
/// before they are invoked; the structured pipeline (locks, cooldowns,
/// redirects) does not apply.
#[async_trait]
pub trait NativeCommand: Send + Sync {
    /// Runs the bridged command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] when the host command fails; the dispatcher
    /// reports it as an unexpected failure.
    async fn invoke(
        &self,
        caller: &Caller,
        arguments: &[String],
        replies: &dyn ReplySink,
    ) -> Result<(), CommandError>;
}
