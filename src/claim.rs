use serde::{Deserialize, Serialize};
use strum::Display;

use crate::store::models::MatchResolution;

/// Grace period after a match's scheduled start during which no-show claims
/// are disallowed, in milliseconds.
///
/// Fixed at 10 minutes: long enough that a slightly late opponent is not
/// forfeited, short enough that the waiting player is not stuck.
pub const GRACE_PERIOD_MS: i64 = 10 * 60 * 1000;

/// The outcome of a claim eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEligibility {
    pub eligible: bool,
    pub remaining_ms: i64,
}

/// Whether a no-show claim is currently permitted for a match scheduled at
/// `scheduled_at`.
///
/// Pure and side-effect free, so the caller can poll it every second for a
/// countdown display. Both arguments are epoch milliseconds.
pub fn evaluate_claim_eligibility(scheduled_at: i64, now: i64) -> ClaimEligibility {
    let remaining_ms = (scheduled_at + GRACE_PERIOD_MS - now).max(0);
    ClaimEligibility {
        eligible: remaining_ms == 0,
        remaining_ms,
    }
}

/// Where a match sits in the no-show claim lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ClaimPhase {
    /// The scheduled start has not arrived yet.
    #[strum(to_string = "Scheduled")]
    Scheduled,
    /// Within the grace window; claims are disabled.
    #[strum(to_string = "Grace period")]
    GracePeriod,
    /// The grace window has elapsed with no resolution; a claim may be made.
    #[strum(to_string = "Claimable")]
    Claimable,
    /// A result was submitted or a claim granted. Terminal.
    #[strum(to_string = "Resolved")]
    Resolved,
}

/// Derives the claim phase from the scheduled time, the match's resolution
/// status, and the current time.
pub fn claim_phase(scheduled_at: i64, resolution: &MatchResolution, now: i64) -> ClaimPhase {
    if !matches!(resolution, MatchResolution::Unresolved) {
        return ClaimPhase::Resolved;
    }
    if now < scheduled_at {
        return ClaimPhase::Scheduled;
    }
    if evaluate_claim_eligibility(scheduled_at, now).eligible {
        ClaimPhase::Claimable
    } else {
        ClaimPhase::GracePeriod
    }
}
