use std::time::{Duration, Instant};

use crate::shared::constants::DEFAULT_COOLDOWN;

/// The most recently reported code and when it was reported.
///
/// Code and time are stored together so one can never be set without the
/// other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastEmission {
    pub code: String,
    pub at: Instant,
}

/// Decides whether a decoded `text` at `now` is a new scan.
///
/// A code is new when nothing has been reported yet, when it differs from the
/// last reported code, or when strictly more than `cooldown` has elapsed since
/// that code was reported. Only the last reported code is remembered, so two
/// alternating codes are always reported.
pub fn should_emit(
    last: Option<&LastEmission>,
    text: &str,
    now: Instant,
    cooldown: Duration,
) -> bool {
    match last {
        None => true,
        Some(last) if last.code != text => true,
        Some(last) => now.saturating_duration_since(last.at) > cooldown,
    }
}

/// Novelty state for one scan session.
#[derive(Debug, Default)]
pub struct ScanSession {
    last: Option<LastEmission>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the cooldown rule and records the code when it passes.
    ///
    /// Returns `true` when the caller should report `text`.
    pub fn observe(&mut self, text: &str, now: Instant, policy: &CooldownPolicy) -> bool {
        if !policy.should_emit(self.last.as_ref(), text, now) {
            return false;
        }
        self.last = Some(LastEmission {
            code: text.to_string(),
            at: now,
        });
        true
    }

    pub fn last_emission(&self) -> Option<&LastEmission> {
        self.last.as_ref()
    }
}

/// Wraps [`should_emit`] with a fixed cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CooldownPolicy {
    cooldown: Duration,
}

impl CooldownPolicy {
    pub const fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn should_emit(&self, last: Option<&LastEmission>, text: &str, now: Instant) -> bool {
        should_emit(last, text, now, self.cooldown)
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
