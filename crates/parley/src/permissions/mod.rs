//! Permission leaves and combined permission checks.
//!
//! A [`PermissionLeaf`] is one dotted, hierarchical authorisable action such
//! as `commands.clear.inventory`. Commands require one or more leaves and
//! combine them with a [`PermissionMode`]. Superusers bypass every check
//! without the store being consulted.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

use crate::caller::Caller;
use crate::services::{PermissionStore, ServiceError};

/// Tracing target for permission checks.
pub(crate) const PERMISSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::permissions");

const WILDCARD: &str = "*";

/// A validated, lower-cased dotted permission path.
///
/// Segments contain ASCII alphanumerics, `_` or `-`. A lone `*` is accepted as
/// the final segment so stores can express grants over a whole subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionLeaf(String);

impl PermissionLeaf {
    /// Validates and normalises `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionLeafError`] when the path is empty, has an empty
    /// segment, contains unsupported characters or uses `*` anywhere but the
    /// final segment.
    pub fn new(raw: &str) -> Result<Self, PermissionLeafError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PermissionLeafError::Empty);
        }
        let normalised = trimmed.to_ascii_lowercase();
        let segments: Vec<&str> = normalised.split('.').collect();
        let last = segments.len().saturating_sub(1);
        for (position, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(PermissionLeafError::EmptySegment {
                    leaf: trimmed.to_owned(),
                });
            }
            if *segment == WILDCARD {
                if position == last {
                    continue;
                }
                return Err(PermissionLeafError::MisplacedWildcard {
                    leaf: trimmed.to_owned(),
                });
            }
            if let Some(character) = segment
                .chars()
                .find(|character| !is_segment_char(*character))
            {
                return Err(PermissionLeafError::InvalidCharacter {
                    leaf: trimmed.to_owned(),
                    character,
                });
            }
        }
        Ok(Self(normalised))
    }

    /// Returns the normalised path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Iterates over the dotted segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Returns `true` when the final segment is `*`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.segments().last() == Some(WILDCARD)
    }

    /// Appends one segment.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionLeafError`] when the resulting path is invalid,
    /// including when `self` already ends with a wildcard.
    pub fn child(&self, segment: &str) -> Result<Self, PermissionLeafError> {
        Self::new(&format!("{}.{segment}", self.0))
    }

    /// Returns `true` when this leaf, read as a grant, authorises `requested`.
    ///
    /// Plain grants match exactly. A wildcard grant `a.b.*` authorises every
    /// leaf strictly below `a.b`; a bare `*` authorises everything.
    #[must_use]
    pub fn grants(&self, requested: &Self) -> bool {
        if !self.is_wildcard() {
            return self == requested;
        }
        let mut granted = self.segments();
        let mut wanted = requested.segments();
        loop {
            match (granted.next(), wanted.next()) {
                (Some(WILDCARD), Some(_)) => return true,
                (Some(grant), Some(want)) if grant == want => {}
                _ => return false,
            }
        }
    }
}

fn is_segment_char(character: char) -> bool {
    character.is_ascii_alphanumeric() || character == '_' || character == '-'
}

impl fmt::Display for PermissionLeaf {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for PermissionLeaf {
    type Err = PermissionLeafError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

/// Reasons a permission path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionLeafError {
    /// The path was blank.
    #[error("permission leaf is empty")]
    Empty,
    /// Two dots were adjacent, or the path started or ended with a dot.
    #[error("permission leaf '{leaf}' contains an empty segment")]
    EmptySegment {
        /// Offending path.
        leaf: String,
    },
    /// A segment contained a character outside `[A-Za-z0-9_-]`.
    #[error("permission leaf '{leaf}' contains invalid character '{character}'")]
    InvalidCharacter {
        /// Offending path.
        leaf: String,
        /// First invalid character.
        character: char,
    },
    /// `*` appeared before the final segment.
    #[error("permission leaf '{leaf}' may only use '*' as its final segment")]
    MisplacedWildcard {
        /// Offending path.
        leaf: String,
    },
}

/// How multiple required leaves combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionMode {
    /// Every leaf is required.
    #[default]
    All,
    /// Any single leaf suffices.
    Any,
}

/// Evaluates `leaves` for `caller` under `mode`.
///
/// Superusers and empty requirement lists pass without touching the store.
/// `All` stops at the first denial and `Any` at the first grant, so the
/// number of store queries never exceeds what the answer needs.
///
/// # Errors
///
/// Propagates the first [`ServiceError`] reported by the store.
pub async fn check(
    store: &dyn PermissionStore,
    caller: &Caller,
    mode: PermissionMode,
    leaves: &[PermissionLeaf],
) -> Result<bool, ServiceError> {
    if caller.is_superuser() || leaves.is_empty() {
        return Ok(true);
    }
    let granted = match mode {
        PermissionMode::All => {
            let mut all = true;
            for leaf in leaves {
                if !store.has_permission(caller, leaf).await? {
                    debug!(target: PERMISSION_TARGET, caller = %caller, leaf = %leaf, "permission denied");
                    all = false;
                    break;
                }
            }
            all
        }
        PermissionMode::Any => {
            let mut any = false;
            for leaf in leaves {
                if store.has_permission(caller, leaf).await? {
                    any = true;
                    break;
                }
            }
            any
        }
    };
    Ok(granted)
}

#[cfg(test)]
mod tests;
