//! Assertions, replies and control flow on the execution context.

use std::ops::RangeBounds;
use std::time::Duration;

use tracing::debug;

use super::{CONTEXT_TARGET, ExecutionContext};
use crate::command::CommandId;
use crate::cooldown::{Cooldown, CooldownScope, format_duration};
use crate::help::{HelpCommand, usage_line};
use crate::localization::{Message, messages};
use crate::permissions::{self, PermissionLeaf, PermissionMode};
use crate::signal::{CommandError, Flow, Signal};

impl ExecutionContext {
    /// Returns whether the caller holds `leaf`.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Failed`] when the permission store fails.
    pub async fn has_permission(&self, leaf: &PermissionLeaf) -> Flow<bool> {
        Ok(permissions::check(
            self.services.permissions(),
            &self.caller,
            PermissionMode::All,
            std::slice::from_ref(leaf),
        )
        .await?)
    }

    /// Requires `leaf`.
    ///
    /// # Errors
    ///
    /// Replies with the no-permission message and returns
    /// [`Signal::Handled`] when the caller lacks the leaf.
    pub async fn assert_permission(&mut self, leaf: &PermissionLeaf) -> Flow {
        self.assert_permissions(PermissionMode::All, std::slice::from_ref(leaf))
            .await
    }

    /// Requires `leaves` combined with `mode`.
    ///
    /// # Errors
    ///
    /// Replies with the no-permission message and returns
    /// [`Signal::Handled`] when the combination is not satisfied.
    pub async fn assert_permissions(
        &mut self,
        mode: PermissionMode,
        leaves: &[PermissionLeaf],
    ) -> Flow {
        let granted =
            permissions::check(self.services.permissions(), &self.caller, mode, leaves).await?;
        if granted {
            return Ok(());
        }
        debug!(
            target: CONTEXT_TARGET,
            caller = %self.caller,
            command = self.node.name(),
            "permission assertion failed"
        );
        self.reply_message(messages::NO_PERMISSION);
        Err(Signal::Handled)
    }

    /// Requires the permissions declared by the executing command.
    ///
    /// # Errors
    ///
    /// As for [`assert_permissions`](Self::assert_permissions).
    pub async fn assert_command_permissions(&mut self) -> Flow {
        let node = self.node.clone();
        let descriptor = node.descriptor();
        self.assert_permissions(descriptor.mode(), descriptor.permissions())
            .await
    }

    /// Requires an in-session player.
    ///
    /// # Errors
    ///
    /// Replies and returns [`Signal::Handled`] for console callers.
    pub fn assert_ran_by_player(&mut self) -> Flow {
        if self.caller.is_player() {
            return Ok(());
        }
        self.reply_message(messages::PLAYERS_ONLY);
        Err(Signal::Handled)
    }

    /// Requires the administrative console.
    ///
    /// # Errors
    ///
    /// Replies and returns [`Signal::Handled`] for player callers.
    pub fn assert_ran_by_console(&mut self) -> Flow {
        if self.caller.is_console() {
            return Ok(());
        }
        self.reply_message(messages::CONSOLE_ONLY);
        Err(Signal::Handled)
    }

    /// Requires the visible argument count to fall within `range`.
    ///
    /// # Errors
    ///
    /// Replies with the usage line and returns [`Signal::Handled`] otherwise.
    pub fn assert_arg_count(&mut self, range: impl RangeBounds<usize>) -> Flow {
        if range.contains(&self.argument_count()) {
            return Ok(());
        }
        Err(self.bad_usage())
    }

    /// Replies with the command's usage line and returns the signal to stop
    /// with.
    pub fn bad_usage(&mut self) -> Signal {
        let prefix = self.translate(messages::BAD_USAGE);
        let usage = usage_line(self.node());
        self.reply(&format!("{prefix} {usage}"));
        Signal::Handled
    }

    /// Returns `true` when the standard cooldown was running when the
    /// invocation started.
    #[must_use]
    pub const fn is_on_cooldown(&self) -> bool {
        self.standard_cooldown.is_some()
    }

    /// Standard cooldown captured at construction.
    #[must_use]
    pub const fn standard_cooldown(&self) -> Option<&Cooldown> {
        self.standard_cooldown.as_ref()
    }

    /// Isolated cooldown captured at construction.
    #[must_use]
    pub const fn isolated_cooldown(&self) -> Option<&Cooldown> {
        self.isolated_cooldown.as_ref()
    }

    /// Fails when the standard cooldown was running at construction.
    ///
    /// # Errors
    ///
    /// Replies with the remaining time and returns [`Signal::Handled`].
    pub fn assert_standard_cooldown(&mut self) -> Flow {
        let Some(active) = self.standard_cooldown.clone() else {
            return Ok(());
        };
        self.notify_cooldown(&active);
        Err(Signal::Handled)
    }

    /// Fails when the isolated cooldown was running at construction.
    ///
    /// With a compounding policy the cooldown restarts with its grown
    /// duration and is persisted before the caller is told.
    ///
    /// # Errors
    ///
    /// Replies with the remaining time and returns [`Signal::Handled`], or
    /// returns [`Signal::Failed`] when persisting the compounded cooldown
    /// fails.
    pub async fn assert_isolated_cooldown(&mut self) -> Flow {
        let Some(active) = self.isolated_cooldown.clone() else {
            return Ok(());
        };
        let now = self.services.cooldowns().now();
        let current = match active.compounded_at(now) {
            Some(grown) => {
                debug!(
                    target: CONTEXT_TARGET,
                    command = grown.command.as_str(),
                    duration_secs = grown.duration.as_secs(),
                    "compounding isolated cooldown"
                );
                self.services.cooldowns().start(grown.clone()).await?;
                self.isolated_cooldown = Some(grown.clone());
                grown
            }
            None => active,
        };
        self.notify_cooldown(&current);
        Err(Signal::Handled)
    }

    /// Sets the standard cooldown started after this execution, overriding
    /// the descriptor default.
    pub const fn set_cooldown(&mut self, duration: Duration) {
        self.cooldown_to_start = Some(duration);
    }

    /// Sets the isolated cooldown started after this execution.
    pub const fn set_isolated_cooldown(&mut self, duration: Duration) {
        self.isolated_cooldown_to_start = Some(duration);
    }

    fn notify_cooldown(&mut self, active: &Cooldown) {
        let now = self.services.cooldowns().now();
        let prefix = self.translate(messages::ON_COOLDOWN);
        let remaining = format_duration(active.remaining_at(now));
        self.reply(&format!("{prefix} {remaining}"));
    }

    /// Looks up both cooldown scopes once; later assertions reuse the result.
    pub(crate) async fn load_cooldowns(&mut self) -> Flow {
        let key = self.node.path_key();
        let subject = self.caller.id();
        let store = self.services.cooldowns();
        self.standard_cooldown = store
            .active(subject, &key, CooldownScope::Standard)
            .await?;
        self.isolated_cooldown = store
            .active(subject, &key, CooldownScope::Isolated)
            .await?;
        Ok(())
    }

    /// Sends literal text to the caller.
    pub fn reply(&mut self, text: &str) {
        self.services.replies().send(&self.caller, text);
        self.responded = true;
    }

    /// Sends a localised engine message to the caller.
    pub fn reply_message(&mut self, message: Message) {
        let text = self.translate(message);
        self.reply(&text);
    }

    /// Resolves `message` for the caller's locale without sending it.
    #[must_use]
    pub fn translate(&self, message: Message) -> String {
        self.services
            .translator()
            .message(message.id, self.culture().locale(), message.fallback)
    }

    /// Requests a redirect to the command implemented by `C`.
    ///
    /// The returned signal must be propagated. Redirecting to the executing
    /// command itself yields a failure signal instead.
    pub fn switch_to_command<C: 'static>(&mut self) -> Signal {
        self.switch_to(CommandId::of::<C>())
    }

    /// Requests a redirect to the built-in help command.
    pub fn switch_to_help(&mut self) -> Signal {
        self.switch_to_command::<HelpCommand>()
    }

    pub(crate) fn switch_to(&mut self, target: CommandId) -> Signal {
        if self.node.command_id() == Some(target) {
            return Signal::Failed(CommandError::self_redirect(target.type_name()));
        }
        self.pending_redirect = Some(target);
        Signal::SwitchTo(target)
    }

    /// Fails with [`Signal::Cancelled`] once the invocation is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Cancelled`] after cancellation.
    pub fn check_cancelled(&self) -> Flow {
        if self.cancellation.is_cancelled() {
            Err(Signal::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Waits for the primary-context synchronisation point.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Cancelled`] when the invocation is cancelled while
    /// waiting.
    pub async fn enter_primary(&self) -> Flow {
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(Signal::Cancelled),
            () = self.services.primary.enter() => Ok(()),
        }
    }
}
