use serde::{Deserialize, Serialize};
use strum::Display;

use crate::bracket::Bracket;
use crate::schedule::RoundSchedule;

/// The status of a tournament. Used to know whether a bracket may still be
/// mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
pub enum TournamentStatus {
    /// Registration phase: the tournament exists but the field is not locked
    /// and no bracket has been formed yet.
    #[strum(to_string = "Open")]
    #[default]
    Pending,
    #[strum(to_string = "In progress")]
    Started,
    #[strum(to_string = "Completed")]
    Completed,
}

/// A tournament as the surrounding service persists it.
///
/// The tournament record exclusively owns its bracket: every mutation goes
/// through winner propagation, and the whole record is written back in one
/// optimistic transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TournamentRecord {
    pub tournament_id: i32,
    pub name: String,
    pub created_at: i64,
    pub start_time: Option<i64>,
    pub status: TournamentStatus,
    pub bracket: Bracket,
    pub schedule: Vec<RoundSchedule>,
}

/// How a match reached, or has not yet reached, its terminal state.
///
/// `NoShowClaimed` doubles as the claim record: writing it exactly once is
/// what prevents double-claiming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum MatchResolution {
    #[strum(to_string = "Unresolved")]
    #[default]
    Unresolved,
    #[strum(to_string = "Result submitted")]
    ResultSubmitted { winner: String },
    #[strum(to_string = "No-show claimed")]
    NoShowClaimed { claimant: String, claimed_at: i64 },
}

/// A match within a tournament, one record per structural matchup.
///
/// Records for future rounds exist from tournament start with both player
/// slots empty; winner propagation fills them in as earlier rounds resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub tournament_id: i32,
    /// One-based round number, as encoded in the match id.
    pub round: i32,
    /// One-based position within the round.
    pub sequence: i32,
    pub player1: Option<String>,
    pub player2: Option<String>,
    /// Epoch milliseconds; inherited from the round schedule, overridable
    /// per match.
    pub scheduled_at: Option<i64>,
    pub resolution: MatchResolution,
}

impl MatchRecord {
    pub fn new(tournament_id: i32, round: i32, sequence: i32) -> Self {
        Self {
            match_id: Self::generate_id(tournament_id, round, sequence),
            tournament_id,
            round,
            sequence,
            ..Default::default()
        }
    }

    pub fn generate_id(tournament_id: i32, round: i32, sequence: i32) -> String {
        format!("{}.{}.{}", tournament_id, round, sequence)
    }

    pub fn is_participant(&self, id: &str) -> bool {
        self.player1.as_deref() == Some(id) || self.player2.as_deref() == Some(id)
    }

    /// The other participant, if both slots are filled.
    pub fn opponent_of(&self, id: &str) -> Option<&str> {
        match (self.player1.as_deref(), self.player2.as_deref()) {
            (Some(p1), p2) if p1 == id => p2,
            (p1, Some(p2)) if p2 == id => p1,
            _ => None,
        }
    }
}

/// A stored record plus the version that guards optimistic updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}
