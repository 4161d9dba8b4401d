//! Identity of whoever typed a command line.
//!
//! A [`Caller`] is either an in-session player or the administrative console.
//! Each carries a [`Culture`] snapshot taken when the invocation starts so that
//! number parsing and translated replies stay stable for the whole execution,
//! even if the player changes language mid-command.

use std::fmt;

/// Stable identifier of an authorisable principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalId(u64);

impl PrincipalId {
    /// Identifier reserved for the administrative console.
    pub const CONSOLE: Self = Self(0);

    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Where an invocation originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerKind {
    /// A player connected to the session.
    Player,
    /// The administrative console.
    Console,
}

impl fmt::Display for CallerKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Player => "player",
            Self::Console => "console",
        };
        formatter.write_str(label)
    }
}

/// Locale and number-format snapshot used while parsing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Culture {
    locale: String,
    decimal_separator: char,
    group_separator: char,
}

impl Culture {
    /// Builds a culture with explicit separators.
    #[must_use]
    pub fn new(locale: impl Into<String>, decimal_separator: char, group_separator: char) -> Self {
        Self {
            locale: locale.into(),
            decimal_separator,
            group_separator,
        }
    }

    /// Builds the culture conventionally used by `locale`.
    ///
    /// Locales whose language writes decimals with a comma get `,` as the
    /// decimal separator and `.` as the group separator; everything else uses
    /// the invariant `.` / `,` pair.
    #[must_use]
    pub fn for_locale(locale: &str) -> Self {
        let language = locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if COMMA_DECIMAL_LANGUAGES.contains(&language.as_str()) {
            Self::new(locale, ',', '.')
        } else {
            Self::new(locale, '.', ',')
        }
    }

    /// Invariant culture (`en-US` separators).
    #[must_use]
    pub fn invariant() -> Self {
        Self::new(parley_config::DEFAULT_LOCALE, '.', ',')
    }

    /// Locale tag such as `en-US`.
    #[must_use]
    pub fn locale(&self) -> &str {
        self.locale.as_str()
    }

    /// Character separating the integral and fractional parts.
    #[must_use]
    pub const fn decimal_separator(&self) -> char {
        self.decimal_separator
    }

    /// Character grouping thousands.
    #[must_use]
    pub const fn group_separator(&self) -> char {
        self.group_separator
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

const COMMA_DECIMAL_LANGUAGES: &[&str] = &[
    "de", "es", "fr", "it", "nl", "pl", "pt", "ru", "tr", "uk", "cs", "ro", "sv", "da", "fi",
];

/// Principal that issued an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    id: PrincipalId,
    name: String,
    kind: CallerKind,
    superuser: bool,
    culture: Culture,
    /// The host supplied `culture`; configured defaults never replace it.
    culture_reported: bool,
}

impl Caller {
    /// Builds a regular player caller.
    #[must_use]
    pub fn player(id: PrincipalId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: CallerKind::Player,
            superuser: false,
            culture: Culture::invariant(),
            culture_reported: false,
        }
    }

    /// Builds the administrative console caller, which is always a superuser.
    #[must_use]
    pub fn console() -> Self {
        Self {
            id: PrincipalId::CONSOLE,
            name: String::from("Console"),
            kind: CallerKind::Console,
            superuser: true,
            culture: Culture::invariant(),
            culture_reported: false,
        }
    }

    /// Marks the caller as a superuser who bypasses permission checks.
    #[must_use]
    pub fn with_superuser(mut self, superuser: bool) -> Self {
        self.superuser = superuser;
        self
    }

    /// Replaces the caller's culture snapshot.
    #[must_use]
    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = culture;
        self.culture_reported = true;
        self
    }

    /// Uses `culture` unless the host already reported one for this caller.
    #[must_use]
    pub fn with_default_culture(mut self, culture: &Culture) -> Self {
        if !self.culture_reported {
            self.culture = culture.clone();
        }
        self
    }

    /// Principal identifier.
    #[must_use]
    pub const fn id(&self) -> PrincipalId {
        self.id
    }

    /// Display name used in logs and replies.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Origin of the invocation.
    #[must_use]
    pub const fn kind(&self) -> CallerKind {
        self.kind
    }

    /// Returns `true` for in-session players.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.kind, CallerKind::Player)
    }

    /// Returns `true` for the administrative console.
    #[must_use]
    pub const fn is_console(&self) -> bool {
        matches!(self.kind, CallerKind::Console)
    }

    /// Returns `true` when permission checks are bypassed.
    #[must_use]
    pub const fn is_superuser(&self) -> bool {
        self.superuser
    }

    /// Culture snapshot captured for this caller.
    #[must_use]
    pub const fn culture(&self) -> &Culture {
        &self.culture
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({} {})", self.name, self.kind, self.id)
    }
}
