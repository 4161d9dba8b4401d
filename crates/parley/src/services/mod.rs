//! Contracts for the collaborators the engine consumes.
//!
//! The engine never owns permission data, cooldown persistence, reply
//! delivery or world queries. Hosts implement these traits and hand them to
//! the dispatcher bundled as [`Services`]. Anything that may suspend is an
//! async trait method; the engine treats immediate and deferred completion
//! identically.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::audit::{ActionEntry, StructuredActionLog};
use crate::caller::{Caller, PrincipalId};
use crate::cooldown::{Cooldown, CooldownScope};
use crate::localization::FluentTranslator;
use crate::memory::{
    ImmediatePrimaryContext, InMemoryCooldownStore, InMemoryPermissionStore, RecordingReplySink,
    StaticTargetResolver,
};
use crate::permissions::PermissionLeaf;

/// Failure reported by a collaborator service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} service failed: {message}")]
pub struct ServiceError {
    /// Short name of the failing service, such as `permissions`.
    pub service: &'static str,
    /// Human-readable failure description.
    pub message: String,
}

impl ServiceError {
    /// Creates a service error.
    #[must_use]
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// Authorisation queries.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Returns whether `caller` holds `leaf`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store cannot answer.
    async fn has_permission(
        &self,
        caller: &Caller,
        leaf: &PermissionLeaf,
    ) -> Result<bool, ServiceError>;
}

/// Cooldown persistence.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Returns the cooldown currently running for `subject` on `command`.
    ///
    /// Expired entries must not be returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the store cannot answer.
    async fn active(
        &self,
        subject: PrincipalId,
        command: &str,
        scope: CooldownScope,
    ) -> Result<Option<Cooldown>, ServiceError>;

    /// Starts (or replaces) a cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the write fails.
    async fn start(&self, cooldown: Cooldown) -> Result<(), ServiceError>;

    /// Clock used to stamp and evaluate cooldowns.
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Message catalogue lookup.
pub trait Translator: Send + Sync {
    /// Resolves message `id` for `locale`, returning `fallback` when the
    /// catalogue has no entry.
    fn message(&self, id: &str, locale: &str, fallback: &str) -> String;
}

/// A player found by name or identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTarget {
    /// Principal of the player.
    pub id: PrincipalId,
    /// Display name.
    pub name: String,
}

/// A world object the caller is aiming at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldTarget {
    /// Catalogue type name such as `vehicle`.
    pub kind: String,
    /// Host-assigned object identifier.
    pub id: u64,
    /// Label shown to players.
    pub label: String,
}

/// Player and world lookups used by typed argument parsing.
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Finds an online player by name fragment or numeric identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the lookup fails.
    async fn find_player(&self, query: &str) -> Result<Option<PlayerTarget>, ServiceError>;

    /// Returns the object of `kind` the caller is currently looking at.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the lookup fails.
    async fn look_at(
        &self,
        caller: &Caller,
        kind: &str,
    ) -> Result<Option<WorldTarget>, ServiceError>;
}

/// Delivery of reply text to a caller.
pub trait ReplySink: Send + Sync {
    /// Sends `text` to `caller`.
    fn send(&self, caller: &Caller, text: &str);
}

/// Sink for completed-invocation records.
pub trait ActionLog: Send + Sync {
    /// Records one invocation.
    fn record(&self, entry: &ActionEntry);
}

/// Synchronisation point guarding shared application state.
///
/// The dispatcher awaits [`PrimaryContext::enter`] before writing cooldowns
/// or sending terminal replies; command bodies do the same through
/// [`ExecutionContext::enter_primary`](crate::ExecutionContext::enter_primary).
#[async_trait]
pub trait PrimaryContext: Send + Sync {
    /// Resolves once the caller may touch shared state.
    async fn enter(&self);
}

/// Collaborators handed to the dispatcher and every execution context.
#[derive(Clone)]
pub struct Services {
    pub(crate) permissions: Arc<dyn PermissionStore>,
    pub(crate) cooldowns: Arc<dyn CooldownStore>,
    pub(crate) translator: Arc<dyn Translator>,
    pub(crate) targets: Arc<dyn TargetResolver>,
    pub(crate) replies: Arc<dyn ReplySink>,
    pub(crate) actions: Arc<dyn ActionLog>,
    pub(crate) primary: Arc<dyn PrimaryContext>,
}

impl Services {
    /// Builds a bundle backed entirely by the in-process implementations in
    /// [`crate::memory`], the Fluent catalogue and the tracing action log.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            permissions: Arc::new(InMemoryPermissionStore::default()),
            cooldowns: Arc::new(InMemoryCooldownStore::default()),
            translator: Arc::new(FluentTranslator::new()),
            targets: Arc::new(StaticTargetResolver::default()),
            replies: Arc::new(RecordingReplySink::default()),
            actions: Arc::new(StructuredActionLog),
            primary: Arc::new(ImmediatePrimaryContext),
        }
    }

    /// Replaces the permission store.
    #[must_use]
    pub fn with_permissions(mut self, store: Arc<dyn PermissionStore>) -> Self {
        self.permissions = store;
        self
    }

    /// Replaces the cooldown store.
    #[must_use]
    pub fn with_cooldowns(mut self, store: Arc<dyn CooldownStore>) -> Self {
        self.cooldowns = store;
        self
    }

    /// Replaces the translator.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    /// Replaces the target resolver.
    #[must_use]
    pub fn with_targets(mut self, targets: Arc<dyn TargetResolver>) -> Self {
        self.targets = targets;
        self
    }

    /// Replaces the reply sink.
    #[must_use]
    pub fn with_replies(mut self, replies: Arc<dyn ReplySink>) -> Self {
        self.replies = replies;
        self
    }

    /// Replaces the action log.
    #[must_use]
    pub fn with_actions(mut self, actions: Arc<dyn ActionLog>) -> Self {
        self.actions = actions;
        self
    }

    /// Replaces the primary-context synchronisation point.
    #[must_use]
    pub fn with_primary(mut self, primary: Arc<dyn PrimaryContext>) -> Self {
        self.primary = primary;
        self
    }

    /// Permission store.
    #[must_use]
    pub fn permissions(&self) -> &dyn PermissionStore {
        self.permissions.as_ref()
    }

    /// Cooldown store.
    #[must_use]
    pub fn cooldowns(&self) -> &dyn CooldownStore {
        self.cooldowns.as_ref()
    }

    /// Translator.
    #[must_use]
    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    /// Target resolver.
    #[must_use]
    pub fn targets(&self) -> &dyn TargetResolver {
        self.targets.as_ref()
    }

    /// Reply sink.
    #[must_use]
    pub fn replies(&self) -> &dyn ReplySink {
        self.replies.as_ref()
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Services").finish_non_exhaustive()
    }
}
