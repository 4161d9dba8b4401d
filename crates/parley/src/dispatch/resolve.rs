//! Sub-command resolution.
//!
//! Resolution descends greedily from a top-level command: at each node the
//! next unconsumed token is matched against the children's names, then their
//! aliases. The first token that names no child stops the descent. The number
//! of tokens consumed is the offset handed to the execution context.

use crate::command::CommandId;
use crate::help::HelpCommand;
use crate::registry::{CommandNode, CommandRegistry, NodeId};

/// Tokens that ask for help wherever they appear after a command path.
pub const HELP_KEYWORDS: [&str; 3] = ["help", "hlep", "?"];

/// Returns `true` when `token` is a reserved help keyword.
#[must_use]
pub fn is_help_keyword(token: &str) -> bool {
    HELP_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(token))
}

/// Deepest node named by the tokens and the number of tokens consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved node.
    pub node: NodeId,
    /// Tokens consumed by sub-command names.
    pub offset: usize,
}

/// A command token followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Top-level command name.
    pub command: String,
    /// Tokens after the command name.
    pub arguments: Vec<String>,
}

impl CommandLine {
    /// Builds a line from a command name and its arguments.
    #[must_use]
    pub fn new(command: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            command: command.into(),
            arguments,
        }
    }

    /// The line as space-separated words.
    #[must_use]
    pub fn words(&self) -> Vec<&str> {
        std::iter::once(self.command.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .collect()
    }
}

/// Descends from `root` through `arguments`.
#[must_use]
pub fn resolve_chain(registry: &CommandRegistry, root: NodeId, arguments: &[String]) -> Resolution {
    let mut node = root;
    let mut offset = 0;
    for token in arguments {
        match find_child(registry, node, token) {
            Some(child) => {
                node = child;
                offset += 1;
            }
            None => break,
        }
    }
    Resolution { node, offset }
}

fn find_child(registry: &CommandRegistry, parent: NodeId, token: &str) -> Option<NodeId> {
    registry
        .children(parent)
        .find(|child| child.name().eq_ignore_ascii_case(token))
        .or_else(|| {
            registry
                .children(parent)
                .find(|child| child.descriptor().has_alias(token))
        })
        .map(CommandNode::id)
}

/// Rebuilds the line a top-down resolution of `node` would have seen.
///
/// The top-level name becomes the command token, the names of the remaining
/// ancestors and of `node` itself are prepended to `tail`, and the returned
/// offset equals the depth of `node`.
#[must_use]
pub fn backtrack(node: &CommandNode, tail: &[String]) -> (CommandLine, usize) {
    let (command, prefix) = node
        .path()
        .split_first()
        .map_or((node.name(), &[][..]), |(root, rest)| (root.as_str(), rest));
    let arguments = prefix.iter().chain(tail).cloned().collect();
    (CommandLine::new(command, arguments), prefix.len())
}

/// Rewrites `line` for the help command when the token at `offset` is a
/// help keyword.
///
/// `resolved` identifies the command the tokens resolved to, `None` for a
/// bridged command. A trailing keyword is dropped (`clear inventory help`
/// becomes `help clear inventory`); elsewhere the command name is simply
/// prepended. Returns `None` when no interception applies, including when the
/// resolved command is already help.
#[must_use]
pub fn intercept_help(
    registry: &CommandRegistry,
    line: &CommandLine,
    offset: usize,
    resolved: Option<CommandId>,
) -> Option<CommandLine> {
    let help_id = CommandId::of::<HelpCommand>();
    if resolved == Some(help_id) {
        return None;
    }
    let token = line.arguments.get(offset)?;
    if !is_help_keyword(token) {
        return None;
    }
    let help = registry.find_by_id(help_id)?;
    let trailing = offset + 1 == line.arguments.len();
    let kept = if trailing {
        offset
    } else {
        line.arguments.len()
    };
    let arguments = std::iter::once(line.command.clone())
        .chain(line.arguments.iter().take(kept).cloned())
        .collect();
    Some(CommandLine::new(help.name(), arguments))
}

/// Line handed to the help command when redirecting away from `line`.
#[must_use]
pub fn help_line(help: &CommandNode, line: &CommandLine) -> CommandLine {
    let arguments = std::iter::once(line.command.clone())
        .chain(line.arguments.iter().cloned())
        .collect();
    CommandLine::new(help.name(), arguments)
}
