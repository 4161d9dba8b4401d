//! Localised reply text.
//!
//! Every reply the engine sends on its own behalf is a [`Message`]: a Fluent
//! identifier plus the English fallback used when no catalogue entry exists.
//! [`FluentTranslator`] resolves the embedded en-US catalogue through
//! `ortho_config`'s Fluent localizer and falls back to the hardcoded English
//! if that pipeline fails to load.

use std::collections::BTreeMap;

use ortho_config::{FluentLocalizer, Localizer, NoOpLocalizer};

use crate::services::Translator;

/// Embedded en-US Fluent catalogue.
pub(crate) static PARLEY_EN_US: &str = include_str!("../locales/en-US/messages.ftl");

/// A translatable engine reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Fluent identifier.
    pub id: &'static str,
    /// English text used when the catalogue has no entry.
    pub fallback: &'static str,
}

impl Message {
    const fn new(id: &'static str, fallback: &'static str) -> Self {
        Self { id, fallback }
    }
}

/// Engine reply catalogue.
///
/// The fallbacks must match `locales/en-US/messages.ftl`; the
/// `fluent_and_fallback_outputs_are_identical` test guards against drift.
pub mod messages {
    use super::Message;

    /// Permission check failed.
    pub const NO_PERMISSION: Message =
        Message::new("parley-no-permission", "You do not have permission to do that.");
    /// Generic reply for unexpected failures.
    pub const UNKNOWN_ERROR: Message = Message::new(
        "parley-unknown-error",
        "Something went wrong while running that command.",
    );
    /// The invocation was cancelled.
    pub const CANCELLED: Message = Message::new("parley-cancelled", "The command was cancelled.");
    /// Prefix of the cooldown notice; the remaining time follows.
    pub const ON_COOLDOWN: Message = Message::new(
        "parley-on-cooldown",
        "You must wait before using that again. Time remaining:",
    );
    /// No command matched the typed name.
    pub const UNKNOWN_COMMAND: Message = Message::new(
        "parley-unknown-command",
        "Unknown command. Type /help to list the available commands.",
    );
    /// A console caller ran a player-only command.
    pub const PLAYERS_ONLY: Message =
        Message::new("parley-players-only", "Only players can run that command.");
    /// A player ran a console-only command.
    pub const CONSOLE_ONLY: Message = Message::new(
        "parley-console-only",
        "That command can only be run from the console.",
    );
    /// Prefix of the usage hint; the usage line follows.
    pub const BAD_USAGE: Message = Message::new("parley-bad-usage", "Incorrect usage. Try:");
    /// Heading of the command list.
    pub const HELP_HEADER: Message = Message::new("parley-help-header", "Available commands:");
    /// Label preceding a command's aliases.
    pub const HELP_ALIASES: Message = Message::new("parley-help-aliases", "Aliases:");
    /// Label preceding a command's sub-commands.
    pub const HELP_SUB_COMMANDS: Message =
        Message::new("parley-help-sub-commands", "Sub-commands:");
    /// A player lookup found nobody.
    pub const PLAYER_NOT_FOUND: Message =
        Message::new("parley-player-not-found", "No player matches that name.");
    /// A look-at lookup found nothing of the requested kind.
    pub const NOTHING_IN_SIGHT: Message = Message::new(
        "parley-nothing-in-sight",
        "You are not looking at anything suitable.",
    );

    /// Every message, for catalogue preloading.
    pub const ALL: &[Message] = &[
        NO_PERMISSION,
        UNKNOWN_ERROR,
        CANCELLED,
        ON_COOLDOWN,
        UNKNOWN_COMMAND,
        PLAYERS_ONLY,
        CONSOLE_ONLY,
        BAD_USAGE,
        HELP_HEADER,
        HELP_ALIASES,
        HELP_SUB_COMMANDS,
        PLAYER_NOT_FOUND,
        NOTHING_IN_SIGHT,
    ];
}

/// Builds the Fluent localizer, falling back to [`NoOpLocalizer`] so a
/// catalogue problem never stops the engine.
fn build_localizer() -> Box<dyn Localizer> {
    match FluentLocalizer::with_en_us_defaults([PARLEY_EN_US]) {
        Ok(localizer) => Box::new(localizer),
        Err(_) => Box::new(NoOpLocalizer),
    }
}

/// Translator backed by the embedded Fluent catalogue.
///
/// Engine messages carry no arguments, so the catalogue is rendered once at
/// construction and served from memory afterwards. Only `en-US` ships, so
/// every caller locale is answered from it; hosts with more languages plug in
/// their own [`Translator`], which receives the caller's locale.
#[derive(Debug, Clone)]
pub struct FluentTranslator {
    rendered: BTreeMap<&'static str, String>,
}

impl FluentTranslator {
    /// Loads and renders the embedded catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::from_localizer(build_localizer().as_ref())
    }

    /// Renders the engine messages through `localizer`.
    #[must_use]
    pub fn from_localizer(localizer: &dyn Localizer) -> Self {
        let rendered = messages::ALL
            .iter()
            .map(|message| {
                (
                    message.id,
                    localizer.message(message.id, None, message.fallback),
                )
            })
            .collect();
        Self { rendered }
    }
}

impl Default for FluentTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator for FluentTranslator {
    fn message(&self, id: &str, _locale: &str, fallback: &str) -> String {
        self.rendered
            .get(id)
            .cloned()
            .unwrap_or_else(|| fallback.to_owned())
    }
}

/// Translator that always answers with the English fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackTranslator;

impl Translator for FallbackTranslator {
    fn message(&self, _id: &str, _locale: &str, fallback: &str) -> String {
        fallback.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fluent_and_fallback_outputs_are_identical() {
        let fluent = FluentTranslator::new();
        for message in messages::ALL {
            assert_eq!(
                fluent.message(message.id, "en-US", "<missing>"),
                message.fallback,
                "catalogue drift for {}",
                message.id
            );
        }
    }

    #[test]
    fn noop_localizer_serves_fallbacks() {
        let translator = FluentTranslator::from_localizer(&NoOpLocalizer);
        assert_eq!(
            translator.message(messages::CANCELLED.id, "de-DE", "unused"),
            messages::CANCELLED.fallback
        );
    }

    #[test]
    fn unknown_ids_use_the_caller_fallback() {
        let translator = FluentTranslator::new();
        assert_eq!(
            translator.message("parley-not-a-message", "en-US", "fallback text"),
            "fallback text"
        );
        assert_eq!(
            FallbackTranslator.message("anything", "en-US", "plain"),
            "plain"
        );
    }
}
