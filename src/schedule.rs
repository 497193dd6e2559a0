use serde::{Deserialize, Serialize};

/// Spacing between consecutive rounds: one round per day.
pub const ROUND_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// The scheduled start time for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSchedule {
    /// Zero-based round index, matching the bracket's round order.
    pub round: usize,
    /// Epoch milliseconds.
    pub scheduled_at: i64,
}

/// Schedules `round_count` rounds starting at `start`, one day apart.
pub fn build_schedule(round_count: usize, start: i64) -> Vec<RoundSchedule> {
    (0..round_count)
        .map(|round| RoundSchedule {
            round,
            scheduled_at: start + round as i64 * ROUND_INTERVAL_MS,
        })
        .collect()
}

/// Resolves the effective scheduled time for a match: a per-match override
/// wins over the round's time.
pub fn scheduled_time(match_override: Option<i64>, round_time: Option<i64>) -> Option<i64> {
    match_override.or(round_time)
}
