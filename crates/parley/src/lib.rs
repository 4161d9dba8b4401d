//! Text-command routing and execution engine.
//!
//! A host application hands the engine an already tokenised command line
//! together with the identity of whoever typed it. The engine works out which
//! registered command (or nested sub-command) the tokens name, enforces
//! permissions and cooldowns, parses arguments and flags on behalf of the
//! command body, runs the body under cooperative cancellation and makes sure
//! the caller hears back exactly once when something goes wrong.
//!
//! The moving parts, leaves first:
//!
//! - [`descriptor`]: declarative command shapes and their normalisation.
//! - [`registry`]: the immutable command arena built at start-up.
//! - [`context`]: the per-invocation [`ExecutionContext`].
//! - [`dispatch`]: sub-command resolution and the execution pipeline.
//! - [`help`]: the built-in help command that redirects land on.
//!
//! Collaborators owned by the host (permission and cooldown stores, reply
//! delivery, translation, target resolution) are consumed through the traits
//! in [`services`]; [`memory`] carries in-process implementations suitable for
//! tests and small hosts.

pub mod audit;
mod caller;
mod command;
pub mod context;
pub mod cooldown;
pub mod descriptor;
pub mod dispatch;
pub mod help;
pub mod localization;
pub mod memory;
pub mod permissions;
pub mod registry;
pub mod services;
mod signal;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use caller::{Caller, CallerKind, Culture, PrincipalId};
pub use command::{Command, CommandBody, CommandFactory, CommandId, NativeCommand};
pub use context::ExecutionContext;
pub use dispatch::{DispatchReport, DispatchSettings, Dispatcher, Invocation, Outcome};
pub use help::HelpCommand;
pub use registry::{CommandRegistry, RegistryBuilder, RegistryError};
pub use signal::{CommandError, Flow, Signal};
