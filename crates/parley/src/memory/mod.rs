//! In-process collaborator implementations.
//!
//! These back [`Services::in_memory`](crate::services::Services::in_memory)
//! and the engine's own tests. Small hosts without a database can use them
//! directly; state lives only as long as the value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::caller::{Caller, PrincipalId};
use crate::cooldown::{Cooldown, CooldownScope};
use crate::permissions::PermissionLeaf;
use crate::services::{
    CooldownStore, PermissionStore, PlayerTarget, PrimaryContext, ReplySink, ServiceError,
    TargetResolver, WorldTarget,
};

/// Grant table keyed by principal, with trailing-wildcard support.
///
/// A deferred store yields to the runtime before every answer, forcing
/// callers through their suspending path.
#[derive(Debug, Default)]
pub struct InMemoryPermissionStore {
    grants: RwLock<HashMap<PrincipalId, Vec<PermissionLeaf>>>,
    deferred: bool,
    queries: AtomicUsize,
}

impl InMemoryPermissionStore {
    /// Creates a store that answers without suspending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that yields once before answering each query.
    #[must_use]
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    /// Grants `leaf` (possibly a wildcard) to `principal`.
    pub fn grant(&self, principal: PrincipalId, leaf: PermissionLeaf) {
        let mut grants = self.grants.write().unwrap_or_else(PoisonError::into_inner);
        grants.entry(principal).or_default().push(leaf);
    }

    /// Number of `has_permission` queries answered so far.
    #[must_use]
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn has_permission(
        &self,
        caller: &Caller,
        leaf: &PermissionLeaf,
    ) -> Result<bool, ServiceError> {
        if self.deferred {
            tokio::task::yield_now().await;
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        let grants = self
            .grants
            .read()
            .map_err(|_| ServiceError::new("permissions", "grant table lock poisoned"))?;
        Ok(grants
            .get(&caller.id())
            .is_some_and(|held| held.iter().any(|grant| grant.grants(leaf))))
    }
}

type CooldownKey = (PrincipalId, String, CooldownScope);

/// Cooldown table with an optionally pinned clock.
#[derive(Debug, Default)]
pub struct InMemoryCooldownStore {
    entries: Mutex<HashMap<CooldownKey, Cooldown>>,
    pinned_clock: Mutex<Option<OffsetDateTime>>,
}

impl InMemoryCooldownStore {
    /// Creates a store that reads the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose clock stays at `now` until advanced.
    #[must_use]
    pub fn with_clock(now: OffsetDateTime) -> Self {
        Self {
            entries: Mutex::default(),
            pinned_clock: Mutex::new(Some(now)),
        }
    }

    /// Moves a pinned clock forward. Has no effect on a system clock.
    pub fn advance(&self, by: Duration) {
        let mut clock = self
            .pinned_clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(now) = clock.as_mut() {
            *now = now.saturating_add(time::Duration::try_from(by).unwrap_or(time::Duration::MAX));
        }
    }

    /// Cooldowns held by the table.
    ///
    /// Expired entries linger until the next [`CooldownStore::start`] evicts
    /// them.
    #[must_use]
    pub fn entries(&self) -> Vec<Cooldown> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CooldownStore for InMemoryCooldownStore {
    async fn active(
        &self,
        subject: PrincipalId,
        command: &str,
        scope: CooldownScope,
    ) -> Result<Option<Cooldown>, ServiceError> {
        let now = self.now();
        let entries = self
            .entries
            .lock()
            .map_err(|_| ServiceError::new("cooldowns", "cooldown table lock poisoned"))?;
        Ok(entries
            .get(&(subject, command.to_owned(), scope))
            .filter(|entry| entry.is_active_at(now))
            .cloned())
    }

    async fn start(&self, cooldown: Cooldown) -> Result<(), ServiceError> {
        let now = self.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ServiceError::new("cooldowns", "cooldown table lock poisoned"))?;
        entries.retain(|_, entry| entry.is_active_at(now));
        entries.insert(
            (cooldown.subject, cooldown.command.clone(), cooldown.scope),
            cooldown,
        );
        Ok(())
    }

    fn now(&self) -> OffsetDateTime {
        let pinned = *self
            .pinned_clock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pinned.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

/// One message captured by [`RecordingReplySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReply {
    /// Recipient.
    pub recipient: PrincipalId,
    /// Delivered text.
    pub text: String,
}

/// Reply sink that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingReplySink {
    replies: Mutex<Vec<RecordedReply>>,
}

impl RecordingReplySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured replies in delivery order.
    #[must_use]
    pub fn replies(&self) -> Vec<RecordedReply> {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Text of every captured reply in delivery order.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.replies().into_iter().map(|reply| reply.text).collect()
    }

    /// Forgets every captured reply.
    pub fn clear(&self) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ReplySink for RecordingReplySink {
    fn send(&self, caller: &Caller, text: &str) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedReply {
                recipient: caller.id(),
                text: text.to_owned(),
            });
    }
}

/// Target resolver over a fixed roster and fixed aim table.
#[derive(Debug, Default, Clone)]
pub struct StaticTargetResolver {
    players: Vec<PlayerTarget>,
    aims: HashMap<(PrincipalId, String), WorldTarget>,
}

impl StaticTargetResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an online player.
    #[must_use]
    pub fn with_player(mut self, id: PrincipalId, name: impl Into<String>) -> Self {
        self.players.push(PlayerTarget {
            id,
            name: name.into(),
        });
        self
    }

    /// Records what `viewer` is looking at.
    #[must_use]
    pub fn with_aim(mut self, viewer: PrincipalId, target: WorldTarget) -> Self {
        self.aims
            .insert((viewer, target.kind.to_ascii_lowercase()), target);
        self
    }
}

#[async_trait]
impl TargetResolver for StaticTargetResolver {
    async fn find_player(&self, query: &str) -> Result<Option<PlayerTarget>, ServiceError> {
        let by_id = query
            .parse::<u64>()
            .ok()
            .and_then(|raw| self.players.iter().find(|player| player.id.get() == raw));
        if let Some(player) = by_id {
            return Ok(Some(player.clone()));
        }
        let exact = self
            .players
            .iter()
            .find(|player| player.name.eq_ignore_ascii_case(query));
        let found = exact.or_else(|| {
            let needle = query.to_ascii_lowercase();
            self.players
                .iter()
                .find(|player| player.name.to_ascii_lowercase().starts_with(&needle))
        });
        Ok(found.cloned())
    }

    async fn look_at(
        &self,
        caller: &Caller,
        kind: &str,
    ) -> Result<Option<WorldTarget>, ServiceError> {
        Ok(self
            .aims
            .get(&(caller.id(), kind.to_ascii_lowercase()))
            .cloned())
    }
}

/// Primary context for hosts without a main-thread requirement.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediatePrimaryContext;

#[async_trait]
impl PrimaryContext for ImmediatePrimaryContext {
    async fn enter(&self) {}
}

#[cfg(test)]
mod tests;
