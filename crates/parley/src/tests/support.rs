//! Sample commands and a dispatch harness shared by the crate's test suites.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio_util::sync::CancellationToken;

use crate::context::{ContextParts, ExecutionContext};
use crate::cooldown::Compounding;
use crate::descriptor::{CommandDescriptor, FlagDescriptor, ParameterNode};
use crate::memory::{InMemoryCooldownStore, InMemoryPermissionStore, RecordingReplySink};
use crate::permissions::PermissionLeaf;
use crate::services::{ReplySink, Services};
use crate::{
    Caller, Command, CommandBody, CommandError, CommandRegistry, DispatchReport, DispatchSettings,
    Dispatcher, Flow, Invocation, NativeCommand, PrincipalId, RegistryBuilder,
};

/// Instant the pinned cooldown clock starts at.
pub(crate) const EPOCH: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

pub(crate) fn leaf(raw: &str) -> PermissionLeaf {
    PermissionLeaf::new(raw).expect("valid leaf")
}

pub(crate) fn alice() -> Caller {
    Caller::player(PrincipalId::new(1), "Alice")
}

pub(crate) fn bob() -> Caller {
    Caller::player(PrincipalId::new(2), "Bob")
}

/// `/clear`: replies, and owns the `inventory` sub-command.
pub(crate) struct ClearCommand;

impl Command for ClearCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("clear")
            .alias("cl")
            .description("Clears things.")
            .permission("commands.clear")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for ClearCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.reply("cleared the area");
        Ok(())
    }
}

/// `/clear inventory [player]`.
pub(crate) struct ClearInventoryCommand;

impl Command for ClearInventoryCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("inventory")
            .alias("inv")
            .parent::<ClearCommand>()
            .description("Empties an inventory.")
            .parameter(ParameterNode::new("player").of_type("player").optional())
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for ClearInventoryCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        let whom = ctx.get(0).unwrap_or("yourself").to_owned();
        ctx.reply(&format!("cleared inventory of {whom}"));
        Ok(())
    }
}

/// Marker for the body-less `/tools` group.
pub(crate) struct ToolsGroup;

pub(crate) fn tools_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("tools")
        .description("Tool maintenance.")
        .sub_command(CommandDescriptor::new("inspect"))
}

/// `/tools repair`.
pub(crate) struct RepairCommand;

impl Command for RepairCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("repair").parent::<ToolsGroup>()
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for RepairCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.reply("repaired");
        Ok(())
    }
}

/// `/teleport <target>` with `-e` and a permission-gated `--enter`.
pub(crate) struct TeleportCommand;

impl Command for TeleportCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("teleport")
            .alias("tp")
            .permission("commands.teleport")
            .parameter(ParameterNode::new("target").of_type("player"))
            .flag(FlagDescriptor::short("e"))
            .flag(FlagDescriptor::long("enter").requires("commands.teleport.enter"))
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for TeleportCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.assert_arg_count(1..=1)?;
        let target = ctx.assert_player(0).await?;
        let entering = ctx.assert_flag("enter").await?;
        let suffix = if entering { " and entered" } else { "" };
        ctx.reply(&format!("teleported to {}{suffix}", target.name));
        Ok(())
    }
}

/// Tracks how many bodies are inside a critical section at once.
#[derive(Debug, Default)]
pub(crate) struct OverlapTracker {
    active: AtomicUsize,
    peak: AtomicUsize,
    runs: AtomicUsize,
}

impl OverlapTracker {
    pub(crate) fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(crate) fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

pub(crate) static SAVE_OVERLAP: Lazy<OverlapTracker> = Lazy::new(OverlapTracker::default);

/// `/save`: synchronized, stays inside the tracker across a suspension point.
pub(crate) struct SaveCommand;

impl Command for SaveCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("save").synchronized()
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for SaveCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        SAVE_OVERLAP.enter();
        tokio::time::sleep(Duration::from_millis(20)).await;
        SAVE_OVERLAP.leave();
        ctx.reply("saved");
        Ok(())
    }
}

/// `/vault`: synchronized, holds its lock for a while.
pub(crate) struct VaultCommand;

impl Command for VaultCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("vault").synchronized()
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for VaultCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.reply("vault closed");
        Ok(())
    }
}

/// `/explode`: panics.
pub(crate) struct ExplodeCommand;

impl Command for ExplodeCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("explode")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for ExplodeCommand {
    async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Flow {
        panic!("boom");
    }
}

/// `/fragile <name>`: its constructor insists on an argument.
pub(crate) struct FragileCommand {
    name: String,
}

impl Command for FragileCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("fragile")
    }

    fn create(ctx: &ExecutionContext) -> Self {
        let name = ctx.get(0).expect("constructor needs an argument");
        Self {
            name: name.to_owned(),
        }
    }
}

#[async_trait]
impl CommandBody for FragileCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.reply(&format!("handled {}", self.name));
        Ok(())
    }
}

/// `/fail [chatty]`: fails, optionally after replying.
pub(crate) struct FailCommand;

impl Command for FailCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("fail")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for FailCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        if ctx.match_parameter(0, "chatty") {
            ctx.reply("about to fail");
        }
        ctx.set_cooldown(Duration::from_secs(5));
        Err(CommandError::message("storage offline").into())
    }
}

/// `/wait`: suspends until cancelled.
pub(crate) struct WaitCommand;

impl Command for WaitCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("wait")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for WaitCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.cancellation_token().cancelled().await;
        ctx.check_cancelled()
    }
}

/// `/mirror`: redirects to itself.
pub(crate) struct MirrorCommand;

impl Command for MirrorCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("mirror")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for MirrorCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        Err(ctx.switch_to_command::<Self>())
    }
}

/// `/ping` redirects to `/pong`, which redirects back.
pub(crate) struct PingCommand;

/// See [`PingCommand`].
pub(crate) struct PongCommand;

impl Command for PingCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("ping")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for PingCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        Err(ctx.switch_to_command::<PongCommand>())
    }
}

impl Command for PongCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("pong")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for PongCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        Err(ctx.switch_to_command::<PingCommand>())
    }
}

/// `/wipe <player>`: hands over to `/clear inventory`.
pub(crate) struct WipeCommand;

impl Command for WipeCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("wipe")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for WipeCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        if !ctx.has_args(1) {
            return Err(ctx.switch_to_help());
        }
        Err(ctx.switch_to_command::<ClearInventoryCommand>())
    }
}

/// `/heal`: a 60 second standard cooldown.
pub(crate) struct HealCommand;

impl Command for HealCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("heal").cooldown(Duration::from_secs(60))
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for HealCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.reply("healed");
        Ok(())
    }
}

/// `/boost`: an isolated cooldown that doubles on violation, capped at 40s.
pub(crate) struct BoostCommand;

impl Command for BoostCommand {
    fn descriptor() -> CommandDescriptor {
        let policy = Compounding::new(2.0, Duration::from_secs(40)).expect("valid policy");
        CommandDescriptor::new("boost").compounding(policy)
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for BoostCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.assert_isolated_cooldown().await?;
        ctx.set_isolated_cooldown(Duration::from_secs(15));
        ctx.reply("boosted");
        Ok(())
    }
}

/// `/shutdown`: console only.
pub(crate) struct ShutdownCommand;

impl Command for ShutdownCommand {
    fn descriptor() -> CommandDescriptor {
        CommandDescriptor::new("shutdown")
    }

    fn create(_ctx: &ExecutionContext) -> Self {
        Self
    }
}

#[async_trait]
impl CommandBody for ShutdownCommand {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Flow {
        ctx.assert_ran_by_console()?;
        ctx.reply("shutting down");
        Ok(())
    }
}

/// A bridged host command that echoes its arguments.
pub(crate) struct EchoNative;

#[async_trait]
impl NativeCommand for EchoNative {
    async fn invoke(
        &self,
        caller: &Caller,
        arguments: &[String],
        replies: &dyn ReplySink,
    ) -> Result<(), CommandError> {
        replies.send(caller, &format!("echo: {}", arguments.join(" ")));
        Ok(())
    }
}

/// Every sample command registered the way a host would.
pub(crate) fn sample_registry() -> CommandRegistry {
    RegistryBuilder::new()
        .register::<ClearCommand>()
        .register::<ClearInventoryCommand>()
        .register_group::<ToolsGroup>(tools_descriptor())
        .register::<RepairCommand>()
        .register::<TeleportCommand>()
        .register::<SaveCommand>()
        .register::<VaultCommand>()
        .register::<ExplodeCommand>()
        .register::<FragileCommand>()
        .register::<FailCommand>()
        .register::<WaitCommand>()
        .register::<MirrorCommand>()
        .register::<PingCommand>()
        .register::<PongCommand>()
        .register::<WipeCommand>()
        .register::<HealCommand>()
        .register::<BoostCommand>()
        .register::<ShutdownCommand>()
        .register_native(
            CommandDescriptor::new("echo").description("Repeats you."),
            Arc::new(EchoNative),
        )
        .build()
        .expect("sample registry builds")
}

/// A dispatcher over [`sample_registry`] with inspectable in-memory services.
pub(crate) struct Harness {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) replies: Arc<RecordingReplySink>,
    pub(crate) permissions: Arc<InMemoryPermissionStore>,
    pub(crate) cooldowns: Arc<InMemoryCooldownStore>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_permissions(InMemoryPermissionStore::new())
    }

    pub(crate) fn with_permissions(store: InMemoryPermissionStore) -> Self {
        let replies = Arc::new(RecordingReplySink::new());
        let permissions = Arc::new(store);
        let cooldowns = Arc::new(InMemoryCooldownStore::with_clock(EPOCH));
        let services = Services::in_memory()
            .with_replies(replies.clone())
            .with_permissions(permissions.clone())
            .with_cooldowns(cooldowns.clone())
            .with_targets(Arc::new(
                crate::memory::StaticTargetResolver::new()
                    .with_player(PrincipalId::new(1), "Alice")
                    .with_player(PrincipalId::new(2), "Bob"),
            ));
        let dispatcher = Dispatcher::new(
            Arc::new(sample_registry()),
            services,
            DispatchSettings::default(),
        );
        Self {
            dispatcher,
            replies,
            permissions,
            cooldowns,
        }
    }

    pub(crate) fn grant(&self, caller: &Caller, raw: &str) {
        self.permissions.grant(caller.id(), leaf(raw));
    }

    pub(crate) async fn run(&self, caller: Caller, tokens: &[&str]) -> DispatchReport {
        let invocation =
            Invocation::from_tokens(caller, tokens.iter().copied()).expect("non-empty line");
        self.dispatcher.dispatch(invocation).await
    }

    pub(crate) async fn run_with(&self, invocation: Invocation) -> DispatchReport {
        self.dispatcher.dispatch(invocation).await
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.replies.texts()
    }
}

/// Builds a context on the node at `path` without going through dispatch.
pub(crate) fn context_for(
    registry: Arc<CommandRegistry>,
    services: Services,
    caller: Caller,
    path: &[&str],
    arguments: &[&str],
    flags: &[&str],
) -> ExecutionContext {
    let (root, rest) = path.split_first().expect("non-empty path");
    let found = match registry.find_command(root) {
        Some(crate::registry::CommandMatch::Structured(node)) => node.id(),
        _ => panic!("no structured command named {root}"),
    };
    let mut node = found;
    for segment in rest {
        node = registry
            .children(node)
            .find(|child| child.name() == *segment)
            .map(crate::registry::CommandNode::id)
            .expect("known sub-command");
    }
    let shared = registry.shared_node(node).expect("node exists");
    let arguments: Vec<String> = rest
        .iter()
        .chain(arguments)
        .map(|token| (*token).to_owned())
        .collect();
    ExecutionContext::new(ContextParts {
        registry,
        services,
        node: shared,
        caller,
        arguments: arguments.into(),
        offset: rest.len(),
        flags: flags.iter().map(|flag| (*flag).to_owned()).collect(),
        raw: Arc::from(path.join(" ")),
        cancellation: CancellationToken::new(),
    })
}
