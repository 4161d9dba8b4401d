//! The authoritative command set.
//!
//! Commands are registered explicitly at start-up through a
//! [`RegistryBuilder`], which cleans every descriptor, resolves declared
//! parents, flattens inline sub-commands and freezes the result into an
//! immutable [`CommandRegistry`] arena. The registry is shared read-only by
//! every invocation afterwards.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parley_config::Config;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::command::{Command, CommandFactory, CommandId, NativeCommand, factory_for};
use crate::descriptor::{CommandDescriptor, TypeCatalog};
use crate::help::HelpCommand;
use crate::permissions::{PermissionLeaf, PermissionLeafError};

/// Tracing target for registry construction.
const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Index of a node in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A normalised, immutable command node.
pub struct CommandNode {
    id: NodeId,
    command: Option<CommandId>,
    descriptor: CommandDescriptor,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    factory: Option<CommandFactory>,
    lock: Option<Arc<Mutex<()>>>,
    path: Vec<String>,
}

impl CommandNode {
    /// Arena index of the node.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Implementing type, absent for inline sub-commands.
    #[must_use]
    pub const fn command_id(&self) -> Option<CommandId> {
        self.command
    }

    /// Cleaned descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// Parent node, absent for top-level commands.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child node ids in registration order.
    #[must_use]
    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }

    /// Names from the top-level command down to this one.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Space-separated path, used as the cooldown key.
    #[must_use]
    pub fn path_key(&self) -> String {
        self.path.join(" ")
    }

    /// Number of ancestors above this node.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Returns `true` when the node has a body to run.
    #[must_use]
    pub const fn is_executable(&self) -> bool {
        self.factory.is_some() && !self.descriptor.is_group()
    }

    pub(crate) const fn factory(&self) -> Option<&CommandFactory> {
        self.factory.as_ref()
    }

    pub(crate) fn lock(&self) -> Option<Arc<Mutex<()>>> {
        self.lock.clone()
    }
}

impl fmt::Debug for CommandNode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandNode")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("path", &self.path)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("executable", &self.is_executable())
            .field("synchronized", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}

/// A host-owned command reached through a thin permission-checked adapter.
pub struct NativeCommandEntry {
    name: String,
    aliases: Vec<String>,
    description: String,
    priority: i32,
    permission: PermissionLeaf,
    handler: Arc<dyn NativeCommand>,
}

impl NativeCommandEntry {
    /// Command name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Aliases.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Help text.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Synthesised permission leaf, `<prefix>.<name>`.
    #[must_use]
    pub const fn permission(&self) -> &PermissionLeaf {
        &self.permission
    }

    pub(crate) fn handler(&self) -> &dyn NativeCommand {
        self.handler.as_ref()
    }
}

impl fmt::Debug for NativeCommandEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NativeCommandEntry")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Result of a top-level name lookup.
#[derive(Debug, Clone, Copy)]
pub enum CommandMatch<'a> {
    /// A command from the descriptor tree.
    Structured(&'a CommandNode),
    /// A bridged host command.
    Native(&'a NativeCommandEntry),
}

impl CommandMatch<'_> {
    /// Name of the matched command.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Structured(node) => node.name(),
            Self::Native(entry) => entry.name(),
        }
    }

    fn aliases(&self) -> &[String] {
        match self {
            Self::Structured(node) => node.descriptor.aliases(),
            Self::Native(entry) => entry.aliases(),
        }
    }

    const fn priority(&self) -> i32 {
        match self {
            Self::Structured(node) => node.descriptor.priority_value(),
            Self::Native(entry) => entry.priority,
        }
    }
}

/// Failures while freezing the command set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The same implementing type was registered twice.
    #[error("command '{command}' is registered more than once")]
    DuplicateCommand {
        /// Type name of the duplicated command.
        command: &'static str,
    },
    /// A descriptor names a parent that was never registered.
    #[error("command '{command}' declares unknown parent '{parent}'")]
    UnknownParent {
        /// Type name of the child.
        command: &'static str,
        /// Type name of the missing parent.
        parent: &'static str,
    },
    /// Parent references form a loop.
    #[error("command '{command}' is its own ancestor")]
    ParentCycle {
        /// Type name of a command on the loop.
        command: &'static str,
    },
    /// The native permission prefix is not a valid leaf.
    #[error("native permission prefix '{prefix}' is invalid: {source}")]
    InvalidNativePrefix {
        /// Configured prefix.
        prefix: String,
        /// Validation failure.
        #[source]
        source: PermissionLeafError,
    },
    /// A native command name cannot form a permission segment.
    #[error("native command name '{name}' is invalid: {source}")]
    InvalidNativeName {
        /// Offending command name.
        name: String,
        /// Validation failure.
        #[source]
        source: PermissionLeafError,
    },
}

struct PendingCommand {
    id: CommandId,
    descriptor: CommandDescriptor,
    factory: Option<CommandFactory>,
}

struct PendingNative {
    descriptor: CommandDescriptor,
    handler: Arc<dyn NativeCommand>,
}

/// Start-up table of commands.
///
/// The built-in [`HelpCommand`] is always registered.
pub struct RegistryBuilder {
    pending: Vec<PendingCommand>,
    natives: Vec<PendingNative>,
    catalog: TypeCatalog,
    native_prefix: String,
}

impl RegistryBuilder {
    /// Creates a builder holding only the help command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            natives: Vec::new(),
            catalog: TypeCatalog::builtin(),
            native_prefix: parley_config::default_native_permission_prefix(),
        }
        .register::<HelpCommand>()
    }

    /// Creates a builder whose native permission leaves use the configured
    /// prefix.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new().native_permission_prefix(config.native_permission_prefix())
    }

    /// Registers the structured command `C`.
    #[must_use]
    pub fn register<C: Command>(mut self) -> Self {
        self.pending.push(PendingCommand {
            id: CommandId::of::<C>(),
            descriptor: C::descriptor(),
            factory: Some(factory_for::<C>()),
        });
        self
    }

    /// Registers a body-less group identified by the marker type `G`.
    ///
    /// Running a group shows its help. Other commands nest under it with
    /// `CommandDescriptor::parent::<G>()`.
    #[must_use]
    pub fn register_group<G: 'static>(mut self, descriptor: CommandDescriptor) -> Self {
        self.pending.push(PendingCommand {
            id: CommandId::of::<G>(),
            descriptor: descriptor.group(),
            factory: None,
        });
        self
    }

    /// Registers a bridged host command.
    ///
    /// Only the descriptor's name, aliases, description and priority are
    /// used; its permission is synthesised from the native prefix.
    #[must_use]
    pub fn register_native(
        mut self,
        descriptor: CommandDescriptor,
        handler: Arc<dyn NativeCommand>,
    ) -> Self {
        self.natives.push(PendingNative {
            descriptor,
            handler,
        });
        self
    }

    /// Replaces the parameter type catalog.
    #[must_use]
    pub fn catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the prefix of synthesised native permission leaves.
    #[must_use]
    pub fn native_permission_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.native_prefix = prefix.into();
        self
    }

    /// Freezes the command set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for duplicate registrations, unknown or
    /// cyclic parents, and invalid native permission names.
    pub fn build(self) -> Result<CommandRegistry, RegistryError> {
        let Self {
            pending,
            natives,
            catalog,
            native_prefix,
        } = self;

        let mut arena = Arena::new(pending, &catalog)?;
        for index in 0..arena.pending.len() {
            arena.place(index, &mut Vec::new())?;
        }

        let natives = build_natives(natives, &native_prefix, &catalog)?;
        let registry = CommandRegistry {
            nodes: arena.nodes.into_iter().map(Arc::new).collect(),
            by_type: arena.by_type,
            top_level: arena.top_level,
            natives,
            catalog,
        };
        debug!(
            target: REGISTRY_TARGET,
            commands = registry.nodes.len(),
            natives = registry.natives.len(),
            "command registry built"
        );
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct Arena {
    pending: Vec<Option<PendingCommand>>,
    index_by_type: HashMap<CommandId, usize>,
    placed: HashMap<usize, NodeId>,
    nodes: Vec<CommandNode>,
    by_type: HashMap<CommandId, NodeId>,
    top_level: Vec<NodeId>,
}

impl Arena {
    fn new(pending: Vec<PendingCommand>, catalog: &TypeCatalog) -> Result<Self, RegistryError> {
        let mut index_by_type = HashMap::new();
        let mut cleaned = Vec::with_capacity(pending.len());
        for (index, mut entry) in pending.into_iter().enumerate() {
            if index_by_type.insert(entry.id, index).is_some() {
                return Err(RegistryError::DuplicateCommand {
                    command: entry.id.type_name(),
                });
            }
            entry.descriptor.clean(entry.id.type_name(), catalog);
            cleaned.push(Some(entry));
        }
        Ok(Self {
            pending: cleaned,
            index_by_type,
            placed: HashMap::new(),
            nodes: Vec::new(),
            by_type: HashMap::new(),
            top_level: Vec::new(),
        })
    }

    /// Places pending entry `index`, placing its declared parent first.
    fn place(&mut self, index: usize, visiting: &mut Vec<usize>) -> Result<NodeId, RegistryError> {
        if let Some(node) = self.placed.get(&index) {
            return Ok(*node);
        }
        let (id, parent_id) = match self.pending.get(index).and_then(Option::as_ref) {
            Some(entry) => (entry.id, entry.descriptor.parent_id()),
            None => return Err(RegistryError::ParentCycle { command: "<unknown>" }),
        };
        if visiting.contains(&index) {
            return Err(RegistryError::ParentCycle {
                command: id.type_name(),
            });
        }
        visiting.push(index);
        let parent = match parent_id {
            Some(parent_id) => {
                let parent_index = *self.index_by_type.get(&parent_id).ok_or(
                    RegistryError::UnknownParent {
                        command: id.type_name(),
                        parent: parent_id.type_name(),
                    },
                )?;
                Some(self.place(parent_index, visiting)?)
            }
            None => None,
        };
        visiting.pop();

        let Some(entry) = self.pending.get_mut(index).and_then(Option::take) else {
            return Err(RegistryError::ParentCycle {
                command: id.type_name(),
            });
        };
        let node = self.attach(parent, Some(entry.id), entry.descriptor, entry.factory);
        self.placed.insert(index, node);
        self.by_type.insert(id, node);
        Ok(node)
    }

    fn attach(
        &mut self,
        parent: Option<NodeId>,
        command: Option<CommandId>,
        mut descriptor: CommandDescriptor,
        factory: Option<CommandFactory>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut path = parent
            .and_then(|parent_id| self.nodes.get(parent_id.0))
            .map(|parent_node| parent_node.path.clone())
            .unwrap_or_default();
        path.push(descriptor.name().to_owned());

        let inline = std::mem::take(&mut descriptor.sub_commands);
        let executable = factory.is_some() && !descriptor.is_group();
        let lock = (executable && descriptor.is_synchronized()).then(|| Arc::new(Mutex::new(())));
        self.nodes.push(CommandNode {
            id,
            command,
            descriptor,
            parent,
            children: Vec::new(),
            factory,
            lock,
            path,
        });
        match parent.and_then(|parent_id| self.nodes.get_mut(parent_id.0)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.top_level.push(id),
        }
        for sub_command in inline {
            self.attach(Some(id), None, sub_command.group(), None);
        }
        id
    }
}

fn build_natives(
    natives: Vec<PendingNative>,
    prefix: &str,
    catalog: &TypeCatalog,
) -> Result<Vec<NativeCommandEntry>, RegistryError> {
    let root = PermissionLeaf::new(prefix).map_err(|source| RegistryError::InvalidNativePrefix {
        prefix: prefix.to_owned(),
        source,
    })?;
    natives
        .into_iter()
        .map(|native| {
            let mut descriptor = native.descriptor;
            descriptor.clean("native", catalog);
            let permission =
                root.child(descriptor.name())
                    .map_err(|source| RegistryError::InvalidNativeName {
                        name: descriptor.name().to_owned(),
                        source,
                    })?;
            Ok(NativeCommandEntry {
                name: descriptor.name().to_owned(),
                aliases: descriptor.aliases().to_vec(),
                description: descriptor.description_text().to_owned(),
                priority: descriptor.priority_value(),
                permission,
                handler: native.handler,
            })
        })
        .collect()
}

fn best_match<'a>(
    candidates: impl Iterator<Item = CommandMatch<'a>>,
    matched: impl Fn(&CommandMatch<'a>) -> bool,
) -> Option<CommandMatch<'a>> {
    candidates
        .filter(|candidate| matched(candidate))
        .min_by_key(|candidate| (Reverse(candidate.priority()), candidate.name().len()))
}

fn starts_with_ignore_case(text: &str, lowered_prefix: &str) -> bool {
    text.to_ascii_lowercase().starts_with(lowered_prefix)
}

/// Immutable command arena.
pub struct CommandRegistry {
    nodes: Vec<Arc<CommandNode>>,
    by_type: HashMap<CommandId, NodeId>,
    top_level: Vec<NodeId>,
    natives: Vec<NativeCommandEntry>,
    catalog: TypeCatalog,
}

impl CommandRegistry {
    /// Finds a top-level command by name.
    ///
    /// Exact name matches win over alias matches, which win over commands
    /// whose name or alias starts with `name`. Within each stage the highest
    /// priority wins, then the shortest name.
    #[must_use]
    pub fn find_command(&self, name: &str) -> Option<CommandMatch<'_>> {
        let token = name.trim();
        if token.is_empty() {
            return None;
        }
        let lowered = token.to_ascii_lowercase();
        let candidates = || {
            self.top_level
                .iter()
                .filter_map(|id| self.node(*id))
                .map(CommandMatch::Structured)
                .chain(self.natives.iter().map(CommandMatch::Native))
        };

        best_match(candidates(), |candidate| {
            candidate.name().eq_ignore_ascii_case(token)
        })
        .or_else(|| {
            best_match(candidates(), |candidate| {
                candidate
                    .aliases()
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(token))
            })
        })
        .or_else(|| {
            best_match(candidates(), |candidate| {
                starts_with_ignore_case(candidate.name(), &lowered)
                    || candidate
                        .aliases()
                        .iter()
                        .any(|alias| starts_with_ignore_case(alias, &lowered))
            })
        })
    }

    /// Finds the node implemented by `C`.
    #[must_use]
    pub fn find_by_type<C: 'static>(&self) -> Option<&CommandNode> {
        self.find_by_id(CommandId::of::<C>())
    }

    /// Finds the node implemented by `id`.
    #[must_use]
    pub fn find_by_id(&self, id: CommandId) -> Option<&CommandNode> {
        self.by_type.get(&id).and_then(|node| self.node(*node))
    }

    /// Returns the node at `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&CommandNode> {
        self.nodes.get(id.0).map(Arc::as_ref)
    }

    pub(crate) fn shared_node(&self, id: NodeId) -> Option<Arc<CommandNode>> {
        self.nodes.get(id.0).cloned()
    }

    /// Children of `id` in registration order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &CommandNode> {
        self.node(id)
            .map(CommandNode::child_ids)
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.node(*child))
    }

    /// Ancestors of `id`, top-level command first, excluding `id` itself.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<&CommandNode> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.node(id).and_then(CommandNode::parent);
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                break;
            }
            let Some(parent) = self.node(parent_id) else {
                break;
            };
            chain.push(parent);
            cursor = parent.parent;
        }
        chain.reverse();
        chain
    }

    /// Names from the top-level command down to `id`.
    #[must_use]
    pub fn path_names(&self, id: NodeId) -> Vec<String> {
        self.node(id)
            .map(|node| node.path.clone())
            .unwrap_or_default()
    }

    /// Top-level structured commands in registration order.
    pub fn top_level(&self) -> impl Iterator<Item = &CommandNode> {
        self.top_level.iter().filter_map(|id| self.node(*id))
    }

    /// Bridged host commands.
    #[must_use]
    pub fn natives(&self) -> &[NativeCommandEntry] {
        &self.natives
    }

    /// Parameter type catalog the descriptors were cleaned with.
    #[must_use]
    pub const fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// The built-in help command node.
    #[must_use]
    pub fn help(&self) -> Option<&CommandNode> {
        self.find_by_type::<HelpCommand>()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CommandRegistry")
            .field("nodes", &self.nodes)
            .field("natives", &self.natives)
            .finish_non_exhaustive()
    }
}
