//! Cooldown records and compounding policies.
//!
//! Two scopes exist. A [`CooldownScope::Standard`] cooldown is checked by the
//! dispatcher before a body runs; an [`CooldownScope::Isolated`] cooldown is a
//! finer throttle asserted by bodies themselves and may compound when the
//! caller keeps hitting it.

use std::time::Duration;

use time::OffsetDateTime;

use crate::caller::PrincipalId;

/// Which throttle a cooldown belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownScope {
    /// Checked by the dispatcher before the body starts.
    Standard,
    /// Asserted explicitly by command bodies.
    Isolated,
}

impl CooldownScope {
    /// Lower-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Isolated => "isolated",
        }
    }
}

/// Growth applied to an isolated cooldown each time it is violated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compounding {
    multiplier: f64,
    cap: Duration,
}

impl Compounding {
    /// Builds a policy, returning `None` unless `multiplier` is finite and at
    /// least `1.0`.
    #[must_use]
    pub fn new(multiplier: f64, cap: Duration) -> Option<Self> {
        (multiplier.is_finite() && multiplier >= 1.0).then_some(Self { multiplier, cap })
    }

    /// Factor applied per violation.
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Upper bound of the compounded duration.
    #[must_use]
    pub const fn cap(&self) -> Duration {
        self.cap
    }

    /// Returns `min(current × multiplier, cap)`.
    #[expect(
        clippy::float_arithmetic,
        reason = "compounding multipliers are fractional by nature"
    )]
    #[must_use]
    pub fn apply(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map_or(self.cap, |grown| grown.min(self.cap))
    }
}

/// A running cooldown.
#[derive(Debug, Clone, PartialEq)]
pub struct Cooldown {
    /// Principal being throttled.
    pub subject: PrincipalId,
    /// Command key, the space-separated command path.
    pub command: String,
    /// When the cooldown started.
    pub started_at: OffsetDateTime,
    /// Total length.
    pub duration: Duration,
    /// Scope the cooldown belongs to.
    pub scope: CooldownScope,
    /// Compounding policy carried for later violations.
    pub compounding: Option<Compounding>,
}

impl Cooldown {
    /// Time left at `now`, zero once expired.
    #[must_use]
    pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
        let elapsed = Duration::try_from(now - self.started_at).unwrap_or(Duration::ZERO);
        self.duration.saturating_sub(elapsed)
    }

    /// Returns `true` while time remains at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.remaining_at(now).is_zero()
    }

    /// Restarts the cooldown at `now` with its duration grown by the
    /// compounding policy, or returns `None` when it has no policy.
    #[must_use]
    pub fn compounded_at(&self, now: OffsetDateTime) -> Option<Self> {
        self.compounding.map(|policy| Self {
            started_at: now,
            duration: policy.apply(self.duration),
            ..self.clone()
        })
    }
}

/// Renders a duration for players, rounding partial seconds up.
///
/// `5400s` renders as `1h 30m`, `61s` as `1m 1s`, and anything below one
/// second but above zero as `1s`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let mut seconds = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        seconds = seconds.saturating_add(1);
    }
    if seconds == 0 {
        return String::from("0s");
    }
    let units = [("d", 86_400_u64), ("h", 3_600), ("m", 60), ("s", 1)];
    let mut rendered = String::new();
    for (suffix, size) in units {
        let count = seconds.checked_div(size).unwrap_or_default();
        if count == 0 {
            continue;
        }
        seconds = seconds.checked_rem(size).unwrap_or_default();
        if !rendered.is_empty() {
            rendered.push(' ');
        }
        rendered.push_str(&count.to_string());
        rendered.push_str(suffix);
    }
    rendered
}
