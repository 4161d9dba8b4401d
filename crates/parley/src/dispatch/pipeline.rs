//! The structured execution pipeline and the native bridge.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::resolve::{CommandLine, backtrack, help_line};
use super::{DISPATCH_TARGET, Dispatcher, Outcome};
use crate::caller::Caller;
use crate::command::{CommandFactory, CommandId};
use crate::context::{ContextParts, ExecutionContext};
use crate::cooldown::{Cooldown, CooldownScope};
use crate::help::HelpCommand;
use crate::localization::{Message, messages};
use crate::permissions::{self, PermissionMode};
use crate::registry::{CommandNode, NativeCommandEntry, NodeId};
use crate::signal::{CommandError, Flow, Signal};

/// Per-invocation state that survives redirects.
pub(super) struct Session {
    pub(super) caller: Caller,
    flags: Arc<[String]>,
    pub(super) raw: Arc<str>,
    cancellation: CancellationToken,
    /// Anything was sent to the caller by any step of the chain.
    responded: bool,
    /// Nodes run so far, for cycle detection.
    chain: Vec<NodeId>,
    pub(super) redirects: u32,
    pub(super) command: Option<String>,
}

impl Session {
    pub(super) fn new(
        caller: Caller,
        flags: Vec<String>,
        raw: String,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            caller,
            flags: flags.into(),
            raw: raw.into(),
            cancellation,
            responded: false,
            chain: Vec::new(),
            redirects: 0,
            command: None,
        }
    }
}

/// Result of running one command of the chain.
enum Step {
    Finished(Outcome),
    Redirect(CommandId),
}

/// A node and the line it runs with.
struct Target {
    node: Arc<CommandNode>,
    line: CommandLine,
    offset: usize,
}

impl Dispatcher {
    /// Runs `node` and follows whatever redirects it requests.
    pub(super) async fn run_structured(
        &self,
        session: &mut Session,
        node: NodeId,
        line: CommandLine,
        offset: usize,
    ) -> Outcome {
        let Some(shared) = self.registry.shared_node(node) else {
            return self
                .fail(session, &CommandError::message("resolved node vanished"))
                .await;
        };
        let mut target = Target {
            node: shared,
            line,
            offset,
        };
        loop {
            session.chain.push(target.node.id());
            session.command = Some(target.node.path_key());
            let redirect = match self.run_step(session, &target).await {
                Step::Finished(outcome) => return outcome,
                Step::Redirect(redirect) => redirect,
            };
            target = match self.follow(session, &target, redirect) {
                Ok(next) => next,
                Err(failure) => return self.fail(session, &failure).await,
            };
        }
    }

    /// Works out where a redirect lands and rewrites the line for it.
    fn follow(
        &self,
        session: &mut Session,
        from: &Target,
        redirect: CommandId,
    ) -> Result<Target, CommandError> {
        session.redirects += 1;
        let limit = self.settings.max_redirect_depth;
        if session.redirects > limit {
            return Err(CommandError::redirect_depth(limit));
        }
        let node = self
            .registry
            .find_by_id(redirect)
            .and_then(|found| self.registry.shared_node(found.id()))
            .ok_or_else(|| CommandError::unknown_redirect(redirect.type_name()))?;
        if session.chain.contains(&node.id()) {
            return Err(CommandError::redirect_cycle(redirect.type_name()));
        }

        let (line, offset) = if redirect == CommandId::of::<HelpCommand>() {
            (help_line(&node, &from.line), 0)
        } else {
            let visible = from.line.arguments.get(from.offset..).unwrap_or_default();
            backtrack(&node, visible)
        };
        info!(
            target: DISPATCH_TARGET,
            from = from.node.path_key(),
            to = node.path_key(),
            redirects = session.redirects,
            "following redirect"
        );
        Ok(Target { node, line, offset })
    }

    async fn run_step(&self, session: &mut Session, target: &Target) -> Step {
        let node = &target.node;
        let _guard = match node.lock() {
            Some(lock) => {
                debug!(target: DISPATCH_TARGET, command = node.name(), "waiting for command lock");
                tokio::select! {
                    biased;
                    () = session.cancellation.cancelled() => {
                        return Step::Finished(self.finish(session, Outcome::Cancelled).await);
                    }
                    guard = lock.lock_owned() => Some(guard),
                }
            }
            None => None,
        };

        let Some(factory) = node.factory().filter(|_| node.is_executable()) else {
            debug!(target: DISPATCH_TARGET, command = node.name(), "group invoked, showing help");
            return Step::Redirect(CommandId::of::<HelpCommand>());
        };

        let scope = session.cancellation.child_token();
        let mut ctx = ExecutionContext::new(ContextParts {
            registry: Arc::clone(&self.registry),
            services: self.services.clone(),
            node: Arc::clone(node),
            caller: session.caller.clone(),
            arguments: target.line.arguments.clone().into(),
            offset: target.offset,
            flags: Arc::clone(&session.flags),
            raw: Arc::clone(&session.raw),
            cancellation: scope.clone(),
        });
        debug!(
            target: DISPATCH_TARGET,
            command = node.path_key(),
            offset = ctx.offset(),
            "executing"
        );

        let mut started = false;
        let result = supervise(&scope, run_body(&mut ctx, factory, &mut started)).await;
        scope.cancel();
        session.responded |= ctx.responded();
        self.settle(session, &ctx, result, started).await
    }

    /// Classifies a body result and runs the terminal bookkeeping.
    async fn settle(
        &self,
        session: &mut Session,
        ctx: &ExecutionContext,
        result: Flow,
        started: bool,
    ) -> Step {
        let outcome = match result {
            Ok(()) => Outcome::Completed,
            Err(Signal::SwitchTo(redirect)) => return Step::Redirect(redirect),
            Err(Signal::Handled) => Outcome::Handled,
            Err(Signal::Cancelled) => {
                debug!(
                    target: DISPATCH_TARGET,
                    command = ctx.node().path_key(),
                    caller = %session.caller,
                    "command cancelled"
                );
                Outcome::Cancelled
            }
            Err(Signal::Failed(failure)) => {
                log_failure(session, &ctx.node().path_key(), &failure);
                Outcome::Failed
            }
        };
        self.services.primary.enter().await;
        if started {
            self.start_cooldowns(ctx, outcome).await;
        }
        Step::Finished(self.conclude(session, outcome))
    }

    /// Starts the cooldowns the body asked for, plus the descriptor default
    /// after a completed run.
    async fn start_cooldowns(&self, ctx: &ExecutionContext, outcome: Outcome) {
        let descriptor = ctx.descriptor();
        let standard = match ctx.cooldown_to_start() {
            Some(duration) => Some(duration),
            None if outcome == Outcome::Completed => descriptor.default_cooldown(),
            None => None,
        };
        let pending = [
            (CooldownScope::Standard, standard),
            (CooldownScope::Isolated, ctx.isolated_cooldown_to_start()),
        ];
        let store = self.services.cooldowns();
        for (scope, duration) in pending {
            let Some(duration) = duration.filter(|length| !length.is_zero()) else {
                continue;
            };
            let cooldown = Cooldown {
                subject: ctx.caller().id(),
                command: ctx.node().path_key(),
                started_at: store.now(),
                duration,
                scope,
                compounding: descriptor.compounding_policy(),
            };
            if let Err(failure) = store.start(cooldown).await {
                error!(
                    target: DISPATCH_TARGET,
                    command = ctx.node().path_key(),
                    scope = scope.as_str(),
                    error = %failure,
                    "failed to start cooldown"
                );
            }
        }
    }

    /// Bridges a native command: permission check, then a direct call.
    pub(super) async fn run_native(
        &self,
        session: &mut Session,
        entry: &NativeCommandEntry,
        line: &CommandLine,
    ) -> Outcome {
        session.command = Some(entry.name().to_owned());
        let granted = permissions::check(
            self.services.permissions(),
            &session.caller,
            PermissionMode::All,
            std::slice::from_ref(entry.permission()),
        )
        .await;
        match granted {
            Ok(true) => {}
            Ok(false) => {
                self.services.primary.enter().await;
                self.send(session, messages::NO_PERMISSION);
                return Outcome::Handled;
            }
            Err(failure) => return self.fail(session, &failure.into()).await,
        }

        let invoked = entry
            .handler()
            .invoke(&session.caller, &line.arguments, self.services.replies())
            .map(|result| result.map_err(Signal::from));
        match supervise(&session.cancellation, invoked).await {
            Ok(()) => self.finish(session, Outcome::Completed).await,
            Err(Signal::Failed(failure)) => self.fail(session, &failure).await,
            Err(Signal::Cancelled) => self.finish(session, Outcome::Cancelled).await,
            Err(Signal::Handled | Signal::SwitchTo(_)) => {
                self.finish(session, Outcome::Handled).await
            }
        }
    }

    pub(super) async fn fail(&self, session: &mut Session, failure: &CommandError) -> Outcome {
        let command = session.command.clone().unwrap_or_default();
        log_failure(session, &command, failure);
        self.finish(session, Outcome::Failed).await
    }

    async fn finish(&self, session: &mut Session, outcome: Outcome) -> Outcome {
        self.services.primary.enter().await;
        self.conclude(session, outcome)
    }

    /// Sends the fallback reply for `outcome` unless the caller already heard
    /// something.
    fn conclude(&self, session: &mut Session, outcome: Outcome) -> Outcome {
        let fallback = match outcome {
            Outcome::Cancelled => Some(messages::CANCELLED),
            Outcome::Failed => Some(messages::UNKNOWN_ERROR),
            Outcome::Completed | Outcome::Handled | Outcome::Unrecognised => None,
        };
        if let Some(message) = fallback.filter(|_| !session.responded) {
            self.send(session, message);
        }
        outcome
    }

    pub(super) fn send(&self, session: &mut Session, message: Message) {
        let text = self.services.translator().message(
            message.id,
            session.caller.culture().locale(),
            message.fallback,
        );
        self.services.replies().send(&session.caller, &text);
        session.responded = true;
    }
}

/// Loads cooldown state, builds the body and makes the assertions that come
/// before it runs.
async fn run_body(
    ctx: &mut ExecutionContext,
    factory: &CommandFactory,
    started: &mut bool,
) -> Flow {
    ctx.load_cooldowns().await?;
    let mut body = factory(&*ctx);
    ctx.assert_command_permissions().await?;
    ctx.assert_standard_cooldown()?;
    *started = true;
    body.as_mut().execute(ctx).await
}

/// Runs `work` until it finishes, panics or `scope` is cancelled.
async fn supervise<F>(scope: &CancellationToken, work: F) -> Flow
where
    F: Future<Output = Flow>,
{
    let guarded = AssertUnwindSafe(work).catch_unwind();
    tokio::select! {
        biased;
        () = scope.cancelled() => Err(Signal::Cancelled),
        caught = guarded => caught.unwrap_or_else(|payload| {
            Err(Signal::Failed(CommandError::panicked(payload.as_ref())))
        }),
    }
}

fn log_failure(session: &Session, command: &str, failure: &CommandError) {
    error!(
        target: DISPATCH_TARGET,
        command,
        caller = %session.caller,
        raw = &*session.raw,
        error = %failure,
        "command failed"
    );
}
