//! The built-in help command.
//!
//! Help receives `[commandName, ...remainingArgs]`, either typed directly or
//! rebuilt by the dispatcher when it intercepts a help keyword or redirects a
//! body-less group. Help keywords inside the arguments are ignored so
//! `/help clear help inventory` and `/help clear inventory` agree.

use async_trait::async_trait;

use crate::command::{Command, CommandBody};
use crate::context::ExecutionContext;
use crate::descriptor::{CommandDescriptor, ParameterNode};
use crate::dispatch::resolve::{is_help_keyword, resolve_chain};
use crate::localization::messages;
use crate::registry::{CommandMatch, CommandNode, CommandRegistry, NativeCommandEntry};
use crate::signal::Flow;

/// Describes commands to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct HelpCommand;

impl Command for HelpCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("help")
            .alias("?")
            .description("Shows how to use a command, or lists every command.")
            .parameter(ParameterNode::new("command").optional())
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for HelpCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        let wanted: Vec<String> = ctx
            .arguments()
            .iter()
            .filter(|token| !is_help_keyword(token))
            .cloned()
            .collect();

        let Some((name, rest)) = wanted.split_first() else {
            let listing = list_commands(ctx);
            ctx.reply(&listing);
            return Ok(());
        };

        let text = match ctx.registry().find_command(name) {
            Some(CommandMatch::Structured(root)) => {
                let resolved = resolve_chain(ctx.registry(), root.id(), rest);
                ctx.registry()
                    .node(resolved.node)
                    .map(|node| describe_node(ctx, node))
            }
            Some(CommandMatch::Native(entry)) => Some(describe_native(ctx, entry)),
            None => None,
        };
        match text {
            Some(text) => ctx.reply(&text),
            None => ctx.reply_message(messages::UNKNOWN_COMMAND),
        }
        Ok(())
    }
}

/// Renders the usage line of `node`: `/path <required> [optional] [-f] [--flag]`.
#[must_use]
pub fn usage_line(node: &CommandNode) -> String {
    let mut parts = vec![format!("/{}", node.path().join(" "))];
    parts.extend(signature(node));
    parts.join(" ")
}

fn signature(node: &CommandNode) -> impl Iterator<Item = String> + '_ {
    let descriptor = node.descriptor();
    descriptor
        .parameters()
        .iter()
        .map(render_parameter)
        .chain(descriptor.flags().iter().map(|flag| format!("[{flag}]")))
}

/// Usage line with the sub-command names spliced in after the path.
fn usage_with_children(registry: &CommandRegistry, node: &CommandNode) -> String {
    let children: Vec<&str> = registry.children(node.id()).map(CommandNode::name).collect();
    if children.is_empty() {
        return usage_line(node);
    }
    let mut parts = vec![
        format!("/{}", node.path().join(" ")),
        format!("<{}>", children.join("|")),
    ];
    parts.extend(signature(node));
    parts.join(" ")
}

fn render_parameter(parameter: &ParameterNode) -> String {
    let own = if parameter.is_optional() {
        format!("[{}]", parameter.name())
    } else {
        format!("<{}>", parameter.name())
    };
    let children: Vec<String> = parameter.children().iter().map(render_parameter).collect();
    if children.is_empty() {
        own
    } else {
        format!("{own} {}", children.join(" | "))
    }
}

fn describe_node(ctx: &ExecutionContext, node: &CommandNode) -> String {
    let registry = ctx.registry();
    let descriptor = node.descriptor();
    let mut lines = vec![usage_with_children(registry, node)];
    if !descriptor.description_text().is_empty() {
        lines.push(descriptor.description_text().to_owned());
    }
    if !descriptor.aliases().is_empty() {
        lines.push(format!(
            "{} {}",
            ctx.translate(messages::HELP_ALIASES),
            descriptor.aliases().join(", ")
        ));
    }
    let children: Vec<&str> = registry.children(node.id()).map(CommandNode::name).collect();
    if !children.is_empty() {
        lines.push(format!(
            "{} {}",
            ctx.translate(messages::HELP_SUB_COMMANDS),
            children.join(", ")
        ));
    }
    lines.join("\n")
}

fn describe_native(ctx: &ExecutionContext, entry: &NativeCommandEntry) -> String {
    let mut lines = vec![format!("/{}", entry.name())];
    if !entry.description().is_empty() {
        lines.push(entry.description().to_owned());
    }
    if !entry.aliases().is_empty() {
        lines.push(format!(
            "{} {}",
            ctx.translate(messages::HELP_ALIASES),
            entry.aliases().join(", ")
        ));
    }
    lines.join("\n")
}

fn list_commands(ctx: &ExecutionContext) -> String {
    let registry = ctx.registry();
    let mut entries: Vec<(String, String)> = registry
        .top_level()
        .map(|node| {
            (
                node.name().to_owned(),
                node.descriptor().description_text().to_owned(),
            )
        })
        .chain(registry.natives().iter().map(|entry| {
            (entry.name().to_owned(), entry.description().to_owned())
        }))
        .collect();
    entries.sort();

    let mut lines = vec![ctx.translate(messages::HELP_HEADER)];
    lines.extend(entries.into_iter().map(|(name, description)| {
        if description.is_empty() {
            format!("/{name}")
        } else {
            format!("/{name} - {description}")
        }
    }));
    lines.join("\n")
}
