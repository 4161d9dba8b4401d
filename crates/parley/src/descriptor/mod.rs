//! Declarative command shapes.
//!
//! A [`CommandDescriptor`] states what a command is called, who may run it,
//! which flags and parameters it accepts and how it relates to other
//! commands. Descriptors are written by hand in `Command::descriptor` and
//! normalised once by [`CommandDescriptor::clean`] while the registry is
//! built. Bad declarative data never fails the build: the offending entry is
//! dropped and a warning is logged.

mod flags;
mod types;

use std::collections::HashSet;
use std::time::Duration;

use tracing::warn;

use crate::command::CommandId;
use crate::cooldown::Compounding;
use crate::permissions::{PermissionLeaf, PermissionMode};

pub use self::flags::FlagDescriptor;
pub(crate) use self::flags::split_flag_token;
pub use self::types::{ParameterType, TypeCatalog, TypeHandle};

/// Tracing target for descriptor normalisation.
const DESCRIPTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::descriptor");

const DEFAULT_PARAMETER_TYPE: &str = "string";

/// One parameter position, possibly followed by chained child parameters.
///
/// Chained syntax such as `x y z | location | player` is expressed as sibling
/// nodes for the alternatives and children for the positions that follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterNode {
    pub(crate) name: String,
    pub(crate) type_names: Vec<String>,
    pub(crate) types: Vec<ParameterType>,
    pub(crate) optional: bool,
    pub(crate) children: Vec<ParameterNode>,
}

impl ParameterNode {
    /// Declares a parameter. Without an explicit type it accepts a string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_names: Vec::new(),
            types: Vec::new(),
            optional: false,
            children: Vec::new(),
        }
    }

    /// Adds an accepted type name (`int`, `verbatim`, `Look/Vehicle`, ...).
    #[must_use]
    pub fn of_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_names.push(type_name.into());
        self
    }

    /// Marks the parameter as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Appends a parameter that follows this one.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Resolved types, populated by [`CommandDescriptor::clean`].
    #[must_use]
    pub fn types(&self) -> &[ParameterType] {
        &self.types
    }

    /// Whether the parameter may be omitted.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Parameters that follow this one.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Returns `true` when one of the accepted types is a look-at form.
    #[must_use]
    pub fn uses_look_at(&self) -> bool {
        self.types.iter().any(ParameterType::is_look_at)
    }

    /// Returns `true` when `token` names this parameter, or names a parameter
    /// reachable through a look-at child.
    ///
    /// The exact, case-insensitive name match is tried first. Children are
    /// only searched when at least one of them accepts a look-at target.
    #[must_use]
    pub fn is_parameter_match_or_look_at_match(&self, token: &str) -> bool {
        if self.name.eq_ignore_ascii_case(token) {
            return true;
        }
        if !self.children.iter().any(Self::uses_look_at) {
            return false;
        }
        self.children
            .iter()
            .any(|child| child.is_parameter_match_or_look_at_match(token))
    }

    fn clean(&mut self, command: &str, catalog: &TypeCatalog) -> bool {
        self.name = self.name.trim().to_owned();
        if self.name.is_empty() {
            warn!(
                target: DESCRIPTOR_TARGET,
                command,
                "dropping parameter without a name"
            );
            return false;
        }
        let declared: Vec<&str> = if self.type_names.is_empty() {
            vec![DEFAULT_PARAMETER_TYPE]
        } else {
            self.type_names.iter().map(String::as_str).collect()
        };
        let mut resolved = Vec::with_capacity(declared.len());
        for type_name in declared {
            let Some(parameter_type) = ParameterType::resolve(type_name, catalog) else {
                warn!(
                    target: DESCRIPTOR_TARGET,
                    command,
                    parameter = self.name.as_str(),
                    type_name,
                    "dropping parameter with unknown type"
                );
                return false;
            };
            if !resolved.contains(&parameter_type) {
                resolved.push(parameter_type);
            }
        }
        self.types = resolved;
        self.children
            .retain_mut(|child| child.clean(command, catalog));
        true
    }
}

/// Declarative shape of a command or sub-command.
#[derive(Debug, Clone, Default)]
pub struct CommandDescriptor {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) description: String,
    pub(crate) parent: Option<CommandId>,
    pub(crate) sub_commands: Vec<CommandDescriptor>,
    pub(crate) permission_names: Vec<String>,
    pub(crate) permissions: Vec<PermissionLeaf>,
    pub(crate) permission_mode: PermissionMode,
    pub(crate) flags: Vec<FlagDescriptor>,
    pub(crate) parameters: Vec<ParameterNode>,
    pub(crate) group: bool,
    pub(crate) priority: i32,
    pub(crate) synchronized: bool,
    pub(crate) cooldown: Option<Duration>,
    pub(crate) compounding: Option<Compounding>,
}

impl CommandDescriptor {
    /// Starts a descriptor. An empty name is replaced by one derived from the
    /// owning type during [`clean`](Self::clean).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Nests this command under the command or group identified by `P`.
    #[must_use]
    pub fn parent<P: 'static>(mut self) -> Self {
        self.parent = Some(CommandId::of::<P>());
        self
    }

    /// Attaches an inline, body-less sub-command.
    #[must_use]
    pub fn sub_command(mut self, sub_command: Self) -> Self {
        self.sub_commands.push(sub_command);
        self
    }

    /// Requires a permission leaf such as `commands.clear`.
    #[must_use]
    pub fn permission(mut self, leaf: impl Into<String>) -> Self {
        self.permission_names.push(leaf.into());
        self
    }

    /// Chooses how multiple required leaves combine.
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// Declares a flag.
    #[must_use]
    pub fn flag(mut self, flag: FlagDescriptor) -> Self {
        self.flags.push(flag);
        self
    }

    /// Declares a top-level parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterNode) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Marks the command as a pure group: running it shows help.
    #[must_use]
    pub const fn group(mut self) -> Self {
        self.group = true;
        self
    }

    /// Sets the priority used to break ties between equal names.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Forbids concurrent executions of this command.
    #[must_use]
    pub const fn synchronized(mut self) -> Self {
        self.synchronized = true;
        self
    }

    /// Sets the default standard cooldown started after each execution.
    #[must_use]
    pub const fn cooldown(mut self, duration: Duration) -> Self {
        self.cooldown = Some(duration);
        self
    }

    /// Lets the isolated cooldown grow each time it is violated.
    #[must_use]
    pub const fn compounding(mut self, policy: Compounding) -> Self {
        self.compounding = Some(policy);
        self
    }

    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Aliases after normalisation.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Help text.
    #[must_use]
    pub fn description_text(&self) -> &str {
        self.description.as_str()
    }

    /// Declared parent command, if any.
    #[must_use]
    pub const fn parent_id(&self) -> Option<CommandId> {
        self.parent
    }

    /// Inline sub-commands.
    #[must_use]
    pub fn sub_commands(&self) -> &[Self] {
        &self.sub_commands
    }

    /// Validated permission leaves.
    #[must_use]
    pub fn permissions(&self) -> &[PermissionLeaf] {
        &self.permissions
    }

    /// How the permission leaves combine.
    #[must_use]
    pub const fn mode(&self) -> PermissionMode {
        self.permission_mode
    }

    /// Declared flags.
    #[must_use]
    pub fn flags(&self) -> &[FlagDescriptor] {
        &self.flags
    }

    /// Declared top-level parameters.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterNode] {
        &self.parameters
    }

    /// Whether the command is a pure group.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        self.group
    }

    /// Tie-breaking priority.
    #[must_use]
    pub const fn priority_value(&self) -> i32 {
        self.priority
    }

    /// Whether executions are serialised.
    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Default standard cooldown.
    #[must_use]
    pub const fn default_cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    /// Compounding policy for the isolated cooldown.
    #[must_use]
    pub const fn compounding_policy(&self) -> Option<Compounding> {
        self.compounding
    }

    /// Returns `true` when `token` equals the name or an alias, ignoring case.
    #[must_use]
    pub fn answers_to(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token) || self.has_alias(token)
    }

    /// Returns `true` when `token` equals an alias, ignoring case.
    #[must_use]
    pub fn has_alias(&self, token: &str) -> bool {
        self.aliases
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(token))
    }

    /// Normalises the descriptor in place.
    ///
    /// `owner` is the fully qualified type name of the implementing command
    /// and supplies the default name. Running `clean` twice yields the same
    /// descriptor as running it once.
    pub fn clean(&mut self, owner: &str, catalog: &TypeCatalog) {
        self.name = self.name.trim().to_owned();
        if self.name.is_empty() {
            self.name = default_name(owner);
        }
        self.clean_entries(catalog);
    }

    fn clean_entries(&mut self, catalog: &TypeCatalog) {
        let command = self.name.clone();
        self.aliases = dedup_aliases(&self.name, &self.aliases);
        self.permissions = self
            .permission_names
            .iter()
            .filter_map(|raw| match PermissionLeaf::new(raw) {
                Ok(leaf) => Some(leaf),
                Err(error) => {
                    warn!(target: DESCRIPTOR_TARGET, command = command.as_str(), %error, "dropping permission");
                    None
                }
            })
            .collect();
        self.clean_flags(&command);
        self.parameters
            .retain_mut(|parameter| parameter.clean(&command, catalog));
        self.sub_commands.retain_mut(|sub_command| {
            sub_command.name = sub_command.name.trim().to_owned();
            if sub_command.name.is_empty() {
                warn!(
                    target: DESCRIPTOR_TARGET,
                    command = command.as_str(),
                    "dropping inline sub-command without a name"
                );
                return false;
            }
            sub_command.clean_entries(catalog);
            true
        });
    }

    fn clean_flags(&mut self, command: &str) {
        let mut seen = HashSet::new();
        self.flags.retain_mut(|flag| {
            if !flag.is_well_formed() {
                warn!(
                    target: DESCRIPTOR_TARGET,
                    command,
                    flag = flag.name.as_str(),
                    dash_count = flag.dash_count,
                    "dropping malformed flag"
                );
                return false;
            }
            if !seen.insert((flag.name.to_ascii_lowercase(), flag.dash_count)) {
                return false;
            }
            flag.permission = flag
                .permission_name
                .as_deref()
                .and_then(|raw| match PermissionLeaf::new(raw) {
                    Ok(leaf) => Some(leaf),
                    Err(error) => {
                        warn!(target: DESCRIPTOR_TARGET, command, flag = flag.name.as_str(), %error, "ignoring flag permission");
                        None
                    }
                });
            true
        });
    }
}

/// Derives a command name from a type name: `app::cmds::ClearCommand` becomes
/// `clear`.
#[must_use]
pub fn default_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    let last = without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics);
    let stem = last.strip_suffix("Command").unwrap_or(last);
    let chosen = if stem.is_empty() { last } else { stem };
    chosen.to_ascii_lowercase()
}

fn dedup_aliases(name: &str, aliases: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([name.to_ascii_lowercase()]);
    aliases
        .iter()
        .map(|alias| alias.trim())
        .filter(|alias| !alias.is_empty() && seen.insert(alias.to_ascii_lowercase()))
        .map(str::to_owned)
        .collect()
}
