//! Deadline arithmetic for the session time limit.
//!
//! The session start is recovered from the persisted snapshot on
//! reload, so the clock never resets: a session reloaded after its
//! limit has already elapsed must expire immediately, not after another
//! tick. The ticking task itself lives in the session crate; everything
//! here is plain arithmetic.

use crate::types::EpochMillis;

/// What the controller should do at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineDecision {
    Continue { remaining_secs: u64 },
    /// Trigger the forced submit, bypassing completeness validation.
    Expire,
}

/// Whole seconds left on the clock, zero once the limit has elapsed.
/// A start timestamp in the future (clock skew) counts as no time
/// elapsed.
pub fn remaining_secs(limit_secs: u64, started_at_ms: EpochMillis, now_ms: EpochMillis) -> u64 {
    let elapsed_secs = ((now_ms - started_at_ms).max(0) / 1000) as u64;
    limit_secs.saturating_sub(elapsed_secs)
}

/// Evaluate the deadline at `now_ms`.
pub fn check(limit_secs: u64, started_at_ms: EpochMillis, now_ms: EpochMillis) -> DeadlineDecision {
    match remaining_secs(limit_secs, started_at_ms, now_ms) {
        0 => DeadlineDecision::Expire,
        remaining_secs => DeadlineDecision::Continue { remaining_secs },
    }
}

/// Countdown display, `mm:ss` (hours roll into minutes).
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
