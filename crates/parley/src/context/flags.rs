//! Flag lookup on the execution context.

use super::ExecutionContext;
use crate::descriptor::FlagDescriptor;
use crate::localization::messages;
use crate::permissions::{self, PermissionMode};
use crate::signal::{Flow, Signal};

impl ExecutionContext {
    /// Raw flag tokens as classified by the host.
    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Returns `true` when a flag token selects `name`.
    ///
    /// Declared flags follow their declared dash count. Undeclared names are
    /// treated as short when they are one character long and long otherwise.
    #[must_use]
    pub fn has_flag(&self, name: &str) -> bool {
        let declared = self.descriptor().flags();
        match declared
            .iter()
            .find(|flag| flag.name().eq_ignore_ascii_case(name))
        {
            Some(flag) => self.match_flag(flag),
            None => {
                let implicit = if name.chars().count() == 1 {
                    FlagDescriptor::short(name)
                } else {
                    FlagDescriptor::long(name)
                };
                self.flags
                    .iter()
                    .any(|token| implicit.matches_token(token, declared))
            }
        }
    }

    /// Returns `true` when a flag token selects `flag`.
    #[must_use]
    pub fn match_flag(&self, flag: &FlagDescriptor) -> bool {
        let declared = self.descriptor().flags();
        self.flags
            .iter()
            .any(|token| flag.matches_token(token, declared))
    }

    /// Returns whether `name` is present, enforcing the flag's permission.
    ///
    /// # Errors
    ///
    /// Replies with the no-permission message and returns
    /// [`Signal::Handled`] when the flag is present but its permission is
    /// missing.
    pub async fn assert_flag(&mut self, name: &str) -> Flow<bool> {
        if !self.has_flag(name) {
            return Ok(false);
        }
        let permission = self
            .descriptor()
            .flags()
            .iter()
            .find(|flag| flag.name().eq_ignore_ascii_case(name))
            .and_then(|flag| flag.permission().cloned());
        let Some(leaf) = permission else {
            return Ok(true);
        };
        let granted = permissions::check(
            self.services.permissions(),
            &self.caller,
            PermissionMode::All,
            std::slice::from_ref(&leaf),
        )
        .await?;
        if granted {
            Ok(true)
        } else {
            self.reply_message(messages::NO_PERMISSION);
            Err(Signal::Handled)
        }
    }
}
