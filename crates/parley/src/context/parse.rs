//! Typed argument parsing.
//!
//! Numbers honour the caller's culture snapshot: group separators are
//! stripped and the locale's decimal separator is accepted. Every parser
//! returns `None` for a missing or unparsable argument; bodies decide whether
//! that is bad usage.

use std::str::FromStr;
use std::time::Duration;

use super::ExecutionContext;
use crate::caller::Culture;
use crate::localization::messages;
use crate::services::{PlayerTarget, WorldTarget};
use crate::signal::{Flow, Signal};

impl ExecutionContext {
    /// Parses the argument at `index` with [`FromStr`].
    #[must_use]
    pub fn try_get<T: FromStr>(&self, index: usize) -> Option<T> {
        self.get(index)?.parse().ok()
    }

    /// Parses a culture-formatted integer such as `1,000` or `-42`.
    #[must_use]
    pub fn try_get_i64(&self, index: usize) -> Option<i64> {
        parse_i64(self.get(index)?, self.culture())
    }

    /// Parses a culture-formatted, finite decimal number.
    #[must_use]
    pub fn try_get_f64(&self, index: usize) -> Option<f64> {
        parse_f64(self.get(index)?, self.culture())
    }

    /// Parses `true/false`, `yes/no`, `on/off` or `1/0`, ignoring case.
    #[must_use]
    pub fn try_get_bool(&self, index: usize) -> Option<bool> {
        parse_bool(self.get(index)?)
    }

    /// Parses a duration such as `90`, `45s`, `1h30m` or `2d`.
    ///
    /// A bare number is read as seconds.
    #[must_use]
    pub fn try_get_duration(&self, index: usize) -> Option<Duration> {
        parse_duration(self.get(index)?)
    }

    /// Resolves the argument at `index` to an online player.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Failed`](crate::Signal::Failed) when the target
    /// service fails.
    pub async fn try_get_player(&self, index: usize) -> Flow<Option<PlayerTarget>> {
        let Some(query) = self.get(index) else {
            return Ok(None);
        };
        Ok(self.services.targets().find_player(query).await?)
    }

    /// Resolves the object of `kind` the caller is aiming at.
    ///
    /// Console callers never aim at anything.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Failed`](crate::Signal::Failed) when the target
    /// service fails.
    pub async fn try_get_look_at(&self, kind: &str) -> Flow<Option<WorldTarget>> {
        if !self.caller.is_player() {
            return Ok(None);
        }
        Ok(self.services.targets().look_at(&self.caller, kind).await?)
    }

    /// Like [`Self::try_get_player`], but tells the caller when nobody
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Handled`] after replying when no player matches, or
    /// [`Signal::Failed`] when the target service fails.
    pub async fn assert_player(&mut self, index: usize) -> Flow<PlayerTarget> {
        match self.try_get_player(index).await? {
            Some(player) => Ok(player),
            None => {
                self.reply_message(messages::PLAYER_NOT_FOUND);
                Err(Signal::Handled)
            }
        }
    }

    /// Like [`Self::try_get_look_at`], but tells the caller when nothing
    /// suitable is in sight.
    ///
    /// # Errors
    ///
    /// Returns [`Signal::Handled`] after replying when nothing of `kind` is
    /// aimed at, or [`Signal::Failed`] when the target service fails.
    pub async fn assert_look_at(&mut self, kind: &str) -> Flow<WorldTarget> {
        match self.try_get_look_at(kind).await? {
            Some(target) => Ok(target),
            None => {
                self.reply_message(messages::NOTHING_IN_SIGHT);
                Err(Signal::Handled)
            }
        }
    }
}

fn normalise_number(token: &str, culture: &Culture) -> String {
    token
        .trim()
        .chars()
        .filter(|character| *character != culture.group_separator())
        .map(|character| {
            if character == culture.decimal_separator() {
                '.'
            } else {
                character
            }
        })
        .collect()
}

pub(crate) fn parse_i64(token: &str, culture: &Culture) -> Option<i64> {
    normalise_number(token, culture).parse().ok()
}

pub(crate) fn parse_f64(token: &str, culture: &Culture) -> Option<f64> {
    let normalised = normalise_number(token, culture);
    if normalised
        .chars()
        .any(|character| character.is_ascii_alphabetic() && !matches!(character, 'e' | 'E'))
    {
        return None;
    }
    normalised.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub(crate) fn parse_bool(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_duration(token: &str) -> Option<Duration> {
    let trimmed = token.trim().to_ascii_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let mut total: u64 = 0;
    let mut digits = String::new();
    for character in trimmed.chars() {
        if character.is_ascii_digit() {
            digits.push(character);
            continue;
        }
        let unit = match character {
            'w' => 604_800,
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        let amount: u64 = digits.parse().ok()?;
        digits.clear();
        total = total.checked_add(amount.checked_mul(unit)?)?;
    }
    digits.is_empty().then_some(Duration::from_secs(total))
}
