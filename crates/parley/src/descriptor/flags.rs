//! Flag declarations and token matching.

use std::fmt;

use crate::permissions::PermissionLeaf;

/// A declared flag.
///
/// One-dash flags are short: `-e` matches the flag named `e`, and a combined
/// token such as `-ab` matches each of `a` and `b` when every letter is a
/// declared one-letter short flag. Two-dash flags are long and must be typed
/// in full (`--enter`). A token with the wrong dash count never matches.
///
/// Short flags are letters and compare case-sensitively, so `-E` is not `-e`.
/// Long flags are words and ignore ASCII case (`--ENTER` selects `enter`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDescriptor {
    pub(crate) name: String,
    pub(crate) dash_count: u8,
    pub(crate) permission_name: Option<String>,
    pub(crate) permission: Option<PermissionLeaf>,
}

impl FlagDescriptor {
    /// Declares a flag with an explicit dash count.
    #[must_use]
    pub fn new(name: impl Into<String>, dash_count: u8) -> Self {
        Self {
            name: name.into(),
            dash_count,
            permission_name: None,
            permission: None,
        }
    }

    /// Declares a one-dash flag.
    #[must_use]
    pub fn short(name: impl Into<String>) -> Self {
        Self::new(name, 1)
    }

    /// Declares a two-dash flag.
    #[must_use]
    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, 2)
    }

    /// Requires `permission` whenever the flag is used.
    #[must_use]
    pub fn requires(mut self, permission: impl Into<String>) -> Self {
        self.permission_name = Some(permission.into());
        self
    }

    /// Bare flag name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Dashes that must prefix the name.
    #[must_use]
    pub const fn dash_count(&self) -> u8 {
        self.dash_count
    }

    /// Permission required to use the flag, once validated.
    #[must_use]
    pub const fn permission(&self) -> Option<&PermissionLeaf> {
        self.permission.as_ref()
    }

    /// Returns `true` when the declaration can ever match a token.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        matches!(self.dash_count, 1 | 2)
            && !self.name.is_empty()
            && !self.name.starts_with('-')
            && !self.name.chars().any(char::is_whitespace)
    }

    /// Returns `true` when `token` selects this flag.
    ///
    /// `declared` is the full flag set of the command and enables letter-set
    /// matching of combined short flags.
    #[must_use]
    pub fn matches_token(&self, token: &str, declared: &[Self]) -> bool {
        let Some((dashes, body)) = split_flag_token(token) else {
            return false;
        };
        if dashes != self.dash_count {
            return false;
        }
        if dashes == 2 {
            return body.eq_ignore_ascii_case(&self.name);
        }
        if body == self.name {
            return true;
        }
        self.is_single_letter()
            && body.chars().count() > 1
            && body.contains(self.name.as_str())
            && body.chars().all(|letter| {
                declared
                    .iter()
                    .any(|flag| flag.dash_count == 1 && flag.is_letter(letter))
            })
    }

    fn is_single_letter(&self) -> bool {
        self.name.chars().count() == 1
    }

    fn is_letter(&self, letter: char) -> bool {
        let mut chars = self.name.chars();
        chars.next() == Some(letter) && chars.next().is_none()
    }
}

impl fmt::Display for FlagDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dashes = if self.dash_count == 2 { "--" } else { "-" };
        write!(formatter, "{dashes}{}", self.name)
    }
}

/// Splits a raw token into its dash count and body.
///
/// Returns `None` for tokens that are not flags: no leading dash, more than
/// two dashes, or nothing after the dashes.
pub(crate) fn split_flag_token(token: &str) -> Option<(u8, &str)> {
    let (dashes, body) = match token.strip_prefix("--") {
        Some(rest) => (2, rest),
        None => (1, token.strip_prefix('-')?),
    };
    if body.is_empty() || body.starts_with('-') {
        return None;
    }
    Some((dashes, body))
}
