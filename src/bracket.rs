use prettytable::{row, Table};
use serde::{Deserialize, Serialize};

use crate::utils::error::TournamentError;

/// One cell of the bracket.
///
/// An absent player means "not yet determined" in a later round, or a bye in
/// the first round when the entrant count is odd.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub winner: Option<String>,
}

impl Matchup {
    pub fn has_player(&self, id: &str) -> bool {
        self.player1.as_deref() == Some(id) || self.player2.as_deref() == Some(id)
    }

    /// A first-round matchup with exactly one entrant.
    pub fn is_bye(&self) -> bool {
        self.player1.is_some() != self.player2.is_some()
    }
}

/// An ordered set of matchups belonging to one elimination tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub matchups: Vec<Matchup>,
}

/// Which slot of the next round's matchup a winner advances into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Player1,
    Player2,
}

/// Where `record_winner` placed the advancing player.
///
/// Callers that mirror the bracket into per-match records use this to update
/// the next round's record as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextSlot {
    pub round: usize,
    pub matchup: usize,
    pub slot: Slot,
}

/// The result of recording a winner on a matchup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Winner stored and advanced into the next round.
    Advanced(NextSlot),
    /// Winner stored on the final matchup; the bracket is complete.
    FinalResolved,
    /// The same winner was already recorded; state is unchanged.
    Unchanged,
}

/// The full set of elimination rounds for one tournament.
///
/// Built once from a snapshot of the entrant list and mutated only through
/// [`Bracket::record_winner`]. Round sizes strictly halve (rounding up) until
/// a single-matchup final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub rounds: Vec<Round>,
}

/// Builds the complete round structure for a single-elimination tournament.
///
/// Entrants are paired sequentially in the order given; no seeding or
/// shuffling happens here (seeding is the caller's responsibility). An odd
/// entrant count leaves the last first-round matchup with an empty `player2`
/// slot, a bye. Byes are not auto-resolved; advancing them is a downstream
/// progression decision.
///
/// Zero or one entrants need no matches and yield a bracket with no rounds.
pub fn build_bracket(entrants: &[String]) -> Bracket {
    if entrants.len() < 2 {
        return Bracket::default();
    }

    let mut first = Vec::with_capacity(entrants.len().div_ceil(2));
    for pair in entrants.chunks(2) {
        first.push(Matchup {
            player1: Some(pair[0].clone()),
            player2: pair.get(1).cloned(),
            winner: None,
        });
    }

    let mut count = first.len();
    let mut rounds = vec![Round { matchups: first }];
    while count > 1 {
        count = count.div_ceil(2);
        rounds.push(Round {
            matchups: vec![Matchup::default(); count],
        });
    }

    Bracket { rounds }
}

impl Bracket {
    /// Records the winner of one matchup and advances them to the next round.
    ///
    /// The winner must be one of the matchup's players. Re-submitting the
    /// winner already on record is a no-op that succeeds; submitting a
    /// different winner fails with a conflict and leaves the bracket
    /// untouched. The advancing player lands in the next round's matchup at
    /// `match_idx / 2`, in the `player1` slot when `match_idx` is even and
    /// `player2` when odd.
    pub fn record_winner(
        &mut self,
        round_idx: usize,
        match_idx: usize,
        winner: &str,
    ) -> Result<RecordOutcome, TournamentError> {
        let round_count = self.rounds.len();
        let matchup = self
            .rounds
            .get(round_idx)
            .ok_or(TournamentError::RoundNotExists(round_idx))?
            .matchups
            .get(match_idx)
            .ok_or_else(|| {
                TournamentError::MatchNotExists(format!("{}.{}", round_idx, match_idx))
            })?;

        if !matchup.has_player(winner) {
            return Err(TournamentError::WinnerNotInMatchup(winner.to_string()));
        }
        if let Some(existing) = &matchup.winner {
            if existing == winner {
                return Ok(RecordOutcome::Unchanged);
            }
            return Err(TournamentError::WinnerAlreadyRecorded(existing.clone()));
        }

        self.rounds[round_idx].matchups[match_idx].winner = Some(winner.to_string());

        if round_idx + 1 >= round_count {
            return Ok(RecordOutcome::FinalResolved);
        }

        let slot = if match_idx % 2 == 0 {
            Slot::Player1
        } else {
            Slot::Player2
        };
        let next = &mut self.rounds[round_idx + 1].matchups[match_idx / 2];
        match slot {
            Slot::Player1 => next.player1 = Some(winner.to_string()),
            Slot::Player2 => next.player2 = Some(winner.to_string()),
        }

        Ok(RecordOutcome::Advanced(NextSlot {
            round: round_idx + 1,
            matchup: match_idx / 2,
            slot,
        }))
    }

    /// True once the final matchup has a winner. A bracket with no rounds
    /// (zero or one entrants) is trivially complete.
    pub fn is_complete(&self) -> bool {
        match self.rounds.last() {
            Some(last) => last.matchups.first().is_some_and(|m| m.winner.is_some()),
            None => true,
        }
    }

    /// Renders the bracket as a table for logs and operator output.
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(row!["Round", "Match", "Player 1", "Player 2", "Winner"]);

        for (round_idx, round) in self.rounds.iter().enumerate() {
            for (match_idx, matchup) in round.matchups.iter().enumerate() {
                table.add_row(row![
                    round_idx + 1,
                    match_idx + 1,
                    matchup.player1.as_deref().unwrap_or("-"),
                    matchup.player2.as_deref().unwrap_or("-"),
                    matchup.winner.as_deref().unwrap_or("-"),
                ]);
            }
        }

        table
    }
}
