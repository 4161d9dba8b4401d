//! Behavioural tests for command dispatch.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Runtime;

use super::support::{Harness, alice, bob};
use crate::{Caller, DispatchReport};

struct DispatchWorld {
    runtime: Runtime,
    harness: Harness,
    report: Option<DispatchReport>,
}

impl DispatchWorld {
    fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("build test runtime");
        Self {
            runtime,
            harness: Harness::new(),
            report: None,
        }
    }

    fn type_line(&mut self, caller: Caller, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let report = self.runtime.block_on(self.harness.run(caller, &tokens));
        self.report = Some(report);
    }

    fn report(&self) -> &DispatchReport {
        self.report.as_ref().expect("a line was typed")
    }
}

fn player(name: &str) -> Caller {
    match name {
        "Alice" => alice(),
        "Bob" => bob(),
        other => panic!("no sample player named {other}"),
    }
}

#[fixture]
fn world() -> RefCell<DispatchWorld> {
    RefCell::new(DispatchWorld::new())
}

#[given(r#""{name}" holds "{permission}""#)]
fn given_permission(world: &RefCell<DispatchWorld>, name: String, permission: String) {
    let caller = player(strip_quotes(&name));
    world
        .borrow()
        .harness
        .grant(&caller, strip_quotes(&permission));
}

#[when(r#""{name}" types "{line}""#)]
fn when_player_types(world: &RefCell<DispatchWorld>, name: String, line: String) {
    let caller = player(strip_quotes(&name));
    world.borrow_mut().type_line(caller, strip_quotes(&line));
}

#[when(r#"the console types "{line}""#)]
fn when_console_types(world: &RefCell<DispatchWorld>, line: String) {
    world
        .borrow_mut()
        .type_line(Caller::console(), strip_quotes(&line));
}

#[then(r#"the outcome is "{outcome}""#)]
fn then_outcome(world: &RefCell<DispatchWorld>, outcome: String) {
    let actual = world.borrow().report().outcome;
    assert_eq!(actual.as_str(), strip_quotes(&outcome));
}

#[then(r#"the command that ran is "{command}""#)]
fn then_command(world: &RefCell<DispatchWorld>, command: String) {
    let actual = world.borrow().report().command.clone();
    assert_eq!(actual.as_deref(), Some(strip_quotes(&command)));
}

#[then(r#"the only reply is "{text}""#)]
fn then_only_reply(world: &RefCell<DispatchWorld>, text: String) {
    let texts = world.borrow().harness.texts();
    assert_eq!(texts, vec![strip_quotes(&text).to_owned()]);
}

#[then(r#"the reply starts with "{prefix}""#)]
fn then_reply_prefix(world: &RefCell<DispatchWorld>, prefix: String) {
    let texts = world.borrow().harness.texts();
    let wanted = strip_quotes(&prefix);
    assert!(
        texts.iter().any(|text| text.starts_with(wanted)),
        "expected a reply starting with {wanted:?}, got: {texts:?}"
    );
}

/// Strips surrounding double quotes from a string if present.
fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "Sub-commands resolve through aliases"
)]
fn alias_resolution(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "A trailing help keyword shows help for the sub-command"
)]
fn trailing_help(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "Missing permissions are reported"
)]
fn missing_permissions(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "Granted permissions let the body run"
)]
fn granted_permissions(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "Flags are matched by their short form"
)]
fn short_flags(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "Unknown commands are answered once"
)]
fn unknown_commands(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "Console-only commands refuse players"
)]
fn console_only_refuses_players(world: RefCell<DispatchWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/command_dispatch.feature",
    name = "The console may run console-only commands"
)]
fn console_runs_console_only(world: RefCell<DispatchWorld>) {
    drop(world);
}
