//! Unit tests for sub-command resolution, help interception and invocation
//! parsing.

use parley_config::Config;
use rstest::{fixture, rstest};

use super::resolve::{
    CommandLine, backtrack, help_line, intercept_help, is_help_keyword, resolve_chain,
};
use super::*;
use crate::registry::{CommandNode, CommandRegistry};
use crate::tests::support::{
    ClearCommand, ClearInventoryCommand, ToolsGroup, WipeCommand, alice, sample_registry,
};
use crate::{CommandId, HelpCommand};

#[fixture]
fn registry() -> CommandRegistry {
    sample_registry()
}

fn words(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|token| (*token).to_owned()).collect()
}

fn node<C: 'static>(registry: &CommandRegistry) -> &CommandNode {
    registry.find_by_type::<C>().expect("command registered")
}

#[rstest]
#[case::no_tokens(&[], &["clear"], 0)]
#[case::argument_only(&["Bob"], &["clear"], 0)]
#[case::by_name(&["inventory", "Bob"], &["clear", "inventory"], 1)]
#[case::by_alias(&["INV"], &["clear", "inventory"], 1)]
#[case::stops_at_first_non_child(&["inventory", "inventory"], &["clear", "inventory"], 1)]
fn resolution_descends_as_far_as_names_allow(
    registry: CommandRegistry,
    #[case] tokens: &[&str],
    #[case] path: &[&str],
    #[case] offset: usize,
) {
    let root = node::<ClearCommand>(&registry).id();

    let resolution = resolve_chain(&registry, root, &words(tokens));

    assert_eq!(registry.path_names(resolution.node), path);
    assert_eq!(resolution.offset, offset);
    assert_eq!(
        resolution,
        resolve_chain(&registry, root, &words(tokens)),
        "resolution is deterministic"
    );
}

#[rstest]
fn resolution_reaches_inline_sub_commands(registry: CommandRegistry) {
    let root = node::<ToolsGroup>(&registry).id();

    let resolution = resolve_chain(&registry, root, &words(&["inspect", "hammer"]));

    assert_eq!(registry.path_names(resolution.node), ["tools", "inspect"]);
    assert_eq!(resolution.offset, 1);
}

#[rstest]
#[case("help", true)]
#[case("HLEP", true)]
#[case("?", true)]
#[case("helper", false)]
fn help_keywords_are_reserved(#[case] token: &str, #[case] expected: bool) {
    assert_eq!(is_help_keyword(token), expected);
}

#[rstest]
fn trailing_help_keyword_is_dropped(registry: CommandRegistry) {
    let line = CommandLine::new("clear", words(&["inventory", "help"]));
    let resolved = Some(CommandId::of::<ClearInventoryCommand>());

    let help = intercept_help(&registry, &line, 1, resolved).expect("intercepted");

    assert_eq!(help.words(), ["help", "clear", "inventory"]);
}

#[rstest]
fn inner_help_keyword_keeps_every_argument(registry: CommandRegistry) {
    let line = CommandLine::new("clear", words(&["?", "inventory"]));
    let resolved = Some(CommandId::of::<ClearCommand>());

    let help = intercept_help(&registry, &line, 0, resolved).expect("intercepted");

    assert_eq!(help.words(), ["help", "clear", "?", "inventory"]);
}

#[rstest]
#[case::not_a_keyword(&["inventory", "Bob"], 1, Some(CommandId::of::<ClearInventoryCommand>()))]
#[case::nothing_after_offset(&["inventory"], 1, Some(CommandId::of::<ClearInventoryCommand>()))]
#[case::already_help(&["?"], 0, Some(CommandId::of::<HelpCommand>()))]
fn interception_only_applies_to_keywords(
    registry: CommandRegistry,
    #[case] tokens: &[&str],
    #[case] offset: usize,
    #[case] resolved: Option<CommandId>,
) {
    let line = CommandLine::new("clear", words(tokens));

    assert_eq!(intercept_help(&registry, &line, offset, resolved), None);
}

#[rstest]
fn backtracking_prepends_the_target_path(registry: CommandRegistry) {
    let inventory = node::<ClearInventoryCommand>(&registry);

    let (line, offset) = backtrack(inventory, &words(&["Bob"]));

    assert_eq!(line.words(), ["clear", "inventory", "Bob"]);
    assert_eq!(offset, 1);
}

#[rstest]
fn backtracking_a_top_level_command_keeps_the_tail(registry: CommandRegistry) {
    let wipe = node::<WipeCommand>(&registry);

    let (line, offset) = backtrack(wipe, &words(&["Bob", "now"]));

    assert_eq!(line.words(), ["wipe", "Bob", "now"]);
    assert_eq!(offset, 0);
}

#[rstest]
fn help_line_names_the_redirecting_command(registry: CommandRegistry) {
    let help = registry.help().expect("help registered");
    let line = CommandLine::new("wipe", words(&["Bob"]));

    assert_eq!(help_line(help, &line).words(), ["help", "wipe", "Bob"]);
}

#[test]
fn tokens_are_split_into_arguments_and_flags() {
    let invocation = Invocation::from_tokens(
        alice(),
        ["/tp", "Bob", "-e", "--enter", "-5", "-.5", "--", "-"],
    )
    .expect("non-empty line");

    assert_eq!(invocation.command, "tp");
    assert_eq!(invocation.arguments, ["Bob", "-5", "-.5", "--", "-"]);
    assert_eq!(invocation.flags, ["-e", "--enter"]);
    assert_eq!(invocation.raw_line(), "/tp Bob -5 -.5 -- - -e --enter");
}

#[test]
fn empty_token_lists_are_not_invocations() {
    assert!(Invocation::from_tokens(alice(), Vec::<String>::new()).is_none());
}

#[test]
fn explicit_raw_line_wins() {
    let invocation = Invocation::new(alice(), "clear").with_raw("/CLEAR   ");

    assert_eq!(invocation.raw_line(), "/CLEAR   ");
}

#[test]
fn settings_follow_configuration() {
    let config = Config {
        max_redirect_depth: 9,
        locale: "de-DE".to_owned(),
        ..Config::default()
    };

    let settings = DispatchSettings::from_config(&config);

    assert_eq!(settings.max_redirect_depth, 9);
    assert_eq!(settings.default_culture.locale(), "de-DE");
    assert_eq!(settings.default_culture.decimal_separator(), ',');
    assert_eq!(
        DispatchSettings::default().max_redirect_depth,
        parley_config::DEFAULT_MAX_REDIRECT_DEPTH
    );
}

#[test]
fn outcome_labels() {
    assert_eq!(Outcome::Completed.to_string(), "completed");
    assert_eq!(Outcome::Unrecognised.as_str(), "unrecognised");
}
