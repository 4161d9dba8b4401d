//! Parameter type names and their resolution.

use std::collections::BTreeMap;
use std::fmt;

const VERBATIM: &str = "verbatim";
const LOOK_AT_PREFIX: &str = "look/";

const BUILTIN_TYPES: &[&str] = &[
    "string",
    "int",
    "float",
    "bool",
    "duration",
    "player",
    "location",
    "vehicle",
    "structure",
    "barricade",
    "item",
];

/// Handle to a type known to the [`TypeCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(String);

impl TypeHandle {
    /// Canonical lower-case type name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// The set of type names parameters may declare.
///
/// Lookups are case-insensitive. Hosts extend the built-in set with their own
/// world object kinds before building the registry.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    types: BTreeMap<String, TypeHandle>,
}

impl TypeCatalog {
    /// Catalog holding only the built-in types.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self {
            types: BTreeMap::new(),
        };
        for name in BUILTIN_TYPES {
            catalog.insert(name);
        }
        catalog
    }

    /// Adds a host-defined type.
    #[must_use]
    pub fn with_type(mut self, name: &str) -> Self {
        self.insert(name);
        self
    }

    fn insert(&mut self, name: &str) {
        let key = name.trim().to_ascii_lowercase();
        if !key.is_empty() {
            self.types.insert(key.clone(), TypeHandle(key));
        }
    }

    /// Resolves `name` to a handle.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<TypeHandle> {
        self.types.get(&name.trim().to_ascii_lowercase()).cloned()
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// One accepted form of a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterType {
    /// The parameter's own name must be typed literally.
    Verbatim,
    /// A value of the given type.
    Value(TypeHandle),
    /// The object of the given type the caller is aiming at.
    LookAt(TypeHandle),
}

impl ParameterType {
    /// Resolves a declared type name, recognising `verbatim` and
    /// `Look/<Type>`.
    #[must_use]
    pub fn resolve(raw: &str, catalog: &TypeCatalog) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case(VERBATIM) {
            return Some(Self::Verbatim);
        }
        let lowered = trimmed.to_ascii_lowercase();
        match lowered.strip_prefix(LOOK_AT_PREFIX) {
            Some(inner) => catalog.resolve(inner).map(Self::LookAt),
            None => catalog.resolve(&lowered).map(Self::Value),
        }
    }

    /// Returns `true` for the look-at composite form.
    #[must_use]
    pub const fn is_look_at(&self) -> bool {
        matches!(self, Self::LookAt(_))
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verbatim => formatter.write_str(VERBATIM),
            Self::Value(handle) => write!(formatter, "{handle}"),
            Self::LookAt(handle) => write!(formatter, "look/{handle}"),
        }
    }
}
