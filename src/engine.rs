use tracing::{debug, info, warn};

use crate::bracket::{build_bracket, Bracket, RecordOutcome, Slot};
use crate::claim::{claim_phase, evaluate_claim_eligibility, ClaimPhase};
use crate::schedule::{build_schedule, scheduled_time};
use crate::store::models::{
    MatchRecord, MatchResolution, TournamentRecord, TournamentStatus, Versioned,
};
use crate::store::{MatchStore, TournamentStore};
use crate::utils::error::{StoreError, TournamentError};
use crate::utils::time::{now_ms, to_rfc2822};

/// Bounded optimistic-retry parameters for bracket updates.
const MAX_TXN_RETRIES: u32 = 5;
const RETRY_BACKOFF_MS: u64 = 25;

/// Runs bracket progression and no-show claims over an injected record store.
///
/// All mutations follow an optimistic read-modify-write discipline: read the
/// versioned record, apply the change, write back expecting the read version,
/// and start over from fresh state when a concurrent writer got there first.
#[derive(Debug, Clone)]
pub struct TournamentEngine<S> {
    store: S,
}

impl<S> TournamentEngine<S>
where
    S: TournamentStore + MatchStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a tournament in the registration phase, before any bracket
    /// exists. Entrants sign up with the surrounding service until
    /// [`TournamentEngine::start_tournament`] locks the field.
    pub async fn create_tournament(
        &self,
        tournament_id: i32,
        name: &str,
    ) -> Result<TournamentRecord, TournamentError> {
        let record = TournamentRecord {
            tournament_id,
            name: name.to_string(),
            created_at: now_ms(),
            start_time: None,
            status: TournamentStatus::Pending,
            bracket: Bracket::default(),
            schedule: Vec::new(),
        };
        self.store.put_tournament(&record, None).await?;
        info!("Created tournament {} ({}); awaiting entrants", tournament_id, name);
        Ok(record)
    }

    /// Starts a tournament from a snapshot of the entrant list.
    ///
    /// Builds the full bracket, schedules one round per day starting at
    /// `start_time`, and creates a match record for every structural matchup,
    /// future rounds included. Entrants are paired in the order given;
    /// seeding, if any, happens before this call. A tournament previously
    /// created with [`TournamentEngine::create_tournament`] transitions out
    /// of its registration phase; starting one that already ran fails. With
    /// fewer than two entrants there is nothing to play and the tournament
    /// is completed on the spot.
    pub async fn start_tournament(
        &self,
        tournament_id: i32,
        name: &str,
        entrants: &[String],
        start_time: i64,
    ) -> Result<TournamentRecord, TournamentError> {
        let (created_at, expected_version) = match self.store.get_tournament(tournament_id).await? {
            Some(existing) if existing.record.status == TournamentStatus::Pending => {
                (existing.record.created_at, Some(existing.version))
            }
            Some(_) => return Err(TournamentError::TournamentAlreadyStarted(tournament_id)),
            None => (now_ms(), None),
        };

        let bracket = build_bracket(entrants);
        let schedule = build_schedule(bracket.rounds.len(), start_time);
        let status = if bracket.rounds.is_empty() {
            TournamentStatus::Completed
        } else {
            TournamentStatus::Started
        };

        let record = TournamentRecord {
            tournament_id,
            name: name.to_string(),
            created_at,
            start_time: Some(start_time),
            status,
            bracket,
            schedule,
        };
        self.store.put_tournament(&record, expected_version).await?;

        for (round_idx, round) in record.bracket.rounds.iter().enumerate() {
            let round_time = record.schedule.get(round_idx).map(|s| s.scheduled_at);
            for (match_idx, matchup) in round.matchups.iter().enumerate() {
                let mut match_record =
                    MatchRecord::new(tournament_id, round_idx as i32 + 1, match_idx as i32 + 1);
                match_record.player1 = matchup.player1.clone();
                match_record.player2 = matchup.player2.clone();
                match_record.scheduled_at = round_time;
                self.store.put_match(&match_record, None).await?;
            }
        }

        info!(
            "Started tournament {} ({}) with {} entrants across {} rounds, first round at {}",
            tournament_id,
            name,
            entrants.len(),
            record.bracket.rounds.len(),
            to_rfc2822(start_time),
        );
        debug!("Bracket for tournament {}:\n{}", tournament_id, record.bracket.table());

        Ok(record)
    }

    /// Records a match winner on the bracket and advances them.
    ///
    /// Applied as an optimistic transaction over the whole tournament record:
    /// two results racing to populate the same next-round matchup serialize
    /// through the version check, and the loser retries from fresh state with
    /// backoff. The source match record is marked resolved in the same flow,
    /// so the claim gate and the bracket always agree on decided matches.
    /// Resubmitting the winner already on record succeeds without a write; a
    /// completed tournament is read-only and rejects the call.
    pub async fn record_winner(
        &self,
        tournament_id: i32,
        round_idx: usize,
        match_idx: usize,
        winner: &str,
    ) -> Result<(), TournamentError> {
        let mut attempt = 0;
        loop {
            let Versioned {
                version,
                record: mut tournament,
            } = self.tournament_required(tournament_id).await?;

            if tournament.status == TournamentStatus::Completed {
                return Err(TournamentError::TournamentCompleted(tournament_id));
            }

            let outcome = tournament.bracket.record_winner(round_idx, match_idx, winner)?;
            if outcome == RecordOutcome::Unchanged {
                return Ok(());
            }
            if tournament.bracket.is_complete() {
                tournament.status = TournamentStatus::Completed;
            }

            match self.store.put_tournament(&tournament, Some(version)).await {
                Ok(_) => {
                    if let RecordOutcome::Advanced(placement) = outcome {
                        self.mirror_placement(tournament_id, placement.round, placement.matchup, placement.slot, winner)
                            .await?;
                    }
                    self.resolve_source_record(tournament_id, round_idx, match_idx, winner)
                        .await?;
                    info!(
                        "Recorded {} as winner of match {}",
                        winner,
                        MatchRecord::generate_id(tournament_id, round_idx as i32 + 1, match_idx as i32 + 1),
                    );
                    if tournament.status == TournamentStatus::Completed {
                        info!("Tournament {} is complete; {} takes the final", tournament_id, winner);
                    }
                    return Ok(());
                }
                Err(StoreError::VersionConflict(_)) if attempt < MAX_TXN_RETRIES => {
                    attempt += 1;
                    warn!(
                        "Concurrent bracket update for tournament {}; retrying (attempt {})",
                        tournament_id, attempt
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(
                        RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Grants a forfeit win to `claimant_id` if their opponent failed to
    /// appear, using the current wall clock.
    pub async fn claim_no_show(
        &self,
        match_id: &str,
        claimant_id: &str,
    ) -> Result<MatchRecord, TournamentError> {
        self.claim_no_show_at(match_id, claimant_id, now_ms()).await
    }

    /// Clock-injected variant of [`TournamentEngine::claim_no_show`].
    ///
    /// The claim transition is a single compare-and-swap of the match record,
    /// which makes it at-most-once: of any number of concurrent claims on the
    /// same match, exactly one lands and the rest observe the resolution and
    /// fail with `AlreadyResolved`. Every precondition, including the
    /// bracket-side state of the matchup and the tournament lifecycle, is
    /// verified before the write; nothing is persisted on a failing claim.
    /// The bracket is advanced after the claim write, outside the claim
    /// transaction.
    pub async fn claim_no_show_at(
        &self,
        match_id: &str,
        claimant_id: &str,
        now: i64,
    ) -> Result<MatchRecord, TournamentError> {
        loop {
            let Versioned {
                version,
                record: mut match_record,
            } = self.match_required(match_id).await?;

            if !match_record.is_participant(claimant_id) {
                return Err(TournamentError::Unauthorized(claimant_id.to_string()));
            }
            if match_record.resolution != MatchResolution::Unresolved {
                return Err(TournamentError::AlreadyResolved(match_id.to_string()));
            }
            self.ensure_match_open(&match_record).await?;
            let scheduled_at = self.effective_schedule(&match_record).await?;
            let eligibility = evaluate_claim_eligibility(scheduled_at, now);
            if !eligibility.eligible {
                return Err(TournamentError::NotYetEligible {
                    remaining_ms: eligibility.remaining_ms,
                });
            }

            match_record.resolution = MatchResolution::NoShowClaimed {
                claimant: claimant_id.to_string(),
                claimed_at: now,
            };
            match self.store.put_match(&match_record, Some(version)).await {
                Ok(_) => {
                    info!(
                        "No-show win granted to {} for match {}",
                        claimant_id, match_id
                    );
                    self.record_winner(
                        match_record.tournament_id,
                        (match_record.round - 1) as usize,
                        (match_record.sequence - 1) as usize,
                        claimant_id,
                    )
                    .await?;
                    return Ok(match_record);
                }
                // Lost the race; re-read. If the other writer resolved the
                // match this surfaces as AlreadyResolved on the next pass.
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Resolves a match with a submitted result and advances the winner.
    ///
    /// The reporter and the winner must both be participants. Runs under the
    /// same compare-and-swap discipline as the no-show claim, so a result and
    /// a claim racing on one match resolve it exactly once.
    pub async fn submit_result(
        &self,
        match_id: &str,
        reporter_id: &str,
        winner_id: &str,
    ) -> Result<MatchRecord, TournamentError> {
        loop {
            let Versioned {
                version,
                record: mut match_record,
            } = self.match_required(match_id).await?;

            if !match_record.is_participant(reporter_id) {
                return Err(TournamentError::Unauthorized(reporter_id.to_string()));
            }
            if !match_record.is_participant(winner_id) {
                return Err(TournamentError::WinnerNotInMatchup(winner_id.to_string()));
            }
            if match_record.resolution != MatchResolution::Unresolved {
                return Err(TournamentError::AlreadyResolved(match_id.to_string()));
            }
            self.ensure_match_open(&match_record).await?;

            match_record.resolution = MatchResolution::ResultSubmitted {
                winner: winner_id.to_string(),
            };
            match self.store.put_match(&match_record, Some(version)).await {
                Ok(_) => {
                    info!(
                        "Result for match {} submitted by {}: {} wins",
                        match_id, reporter_id, winner_id
                    );
                    self.record_winner(
                        match_record.tournament_id,
                        (match_record.round - 1) as usize,
                        (match_record.sequence - 1) as usize,
                        winner_id,
                    )
                    .await?;
                    return Ok(match_record);
                }
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read-only view of where a match sits in the claim lifecycle. Safe to
    /// poll for countdown displays.
    pub async fn claim_phase_at(
        &self,
        match_id: &str,
        now: i64,
    ) -> Result<ClaimPhase, TournamentError> {
        let Versioned { record, .. } = self.match_required(match_id).await?;
        let scheduled_at = self.effective_schedule(&record).await?;
        Ok(claim_phase(scheduled_at, &record.resolution, now))
    }

    /// The effective scheduled time for a match: its own time when set,
    /// otherwise its round's time from the tournament schedule.
    async fn effective_schedule(&self, record: &MatchRecord) -> Result<i64, TournamentError> {
        let round_time = if record.scheduled_at.is_none() {
            self.tournament_required(record.tournament_id)
                .await?
                .record
                .schedule
                .get((record.round - 1) as usize)
                .map(|entry| entry.scheduled_at)
        } else {
            None
        };
        scheduled_time(record.scheduled_at, round_time)
            .ok_or_else(|| TournamentError::MissingSchedule(record.match_id.clone()))
    }

    /// The current tournament record, bracket included, for display.
    pub async fn tournament(&self, tournament_id: i32) -> Result<TournamentRecord, TournamentError> {
        Ok(self.tournament_required(tournament_id).await?.record)
    }

    async fn tournament_required(
        &self,
        tournament_id: i32,
    ) -> Result<Versioned<TournamentRecord>, TournamentError> {
        self.store
            .get_tournament(tournament_id)
            .await?
            .ok_or(TournamentError::TournamentNotExists(tournament_id))
    }

    async fn match_required(
        &self,
        match_id: &str,
    ) -> Result<Versioned<MatchRecord>, TournamentError> {
        self.store
            .get_match(match_id)
            .await?
            .ok_or_else(|| TournamentError::MatchNotExists(match_id.to_string()))
    }

    /// Fails when a match can no longer be resolved: its tournament is
    /// retired, or its bracket matchup already has a winner that was never
    /// reflected onto the record. Read-only; runs before any resolution
    /// write.
    async fn ensure_match_open(&self, record: &MatchRecord) -> Result<(), TournamentError> {
        let Versioned {
            record: tournament, ..
        } = self.tournament_required(record.tournament_id).await?;

        if tournament.status == TournamentStatus::Completed {
            return Err(TournamentError::TournamentCompleted(record.tournament_id));
        }
        let decided = tournament
            .bracket
            .rounds
            .get((record.round - 1) as usize)
            .and_then(|round| round.matchups.get((record.sequence - 1) as usize))
            .is_some_and(|matchup| matchup.winner.is_some());
        if decided {
            return Err(TournamentError::AlreadyResolved(record.match_id.clone()));
        }
        Ok(())
    }

    /// Marks the match record behind a decided bracket matchup as resolved,
    /// so the claim gate sees the decision. A record already resolved (by a
    /// claim or a submitted result) is left alone.
    async fn resolve_source_record(
        &self,
        tournament_id: i32,
        round_idx: usize,
        match_idx: usize,
        winner: &str,
    ) -> Result<(), TournamentError> {
        let match_id =
            MatchRecord::generate_id(tournament_id, round_idx as i32 + 1, match_idx as i32 + 1);
        loop {
            let Versioned {
                version,
                record: mut match_record,
            } = self.match_required(&match_id).await?;

            if match_record.resolution != MatchResolution::Unresolved {
                return Ok(());
            }
            match_record.resolution = MatchResolution::ResultSubmitted {
                winner: winner.to_string(),
            };
            match self.store.put_match(&match_record, Some(version)).await {
                Ok(_) => return Ok(()),
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Mirrors a bracket advancement into the next round's match record.
    async fn mirror_placement(
        &self,
        tournament_id: i32,
        round_idx: usize,
        match_idx: usize,
        slot: Slot,
        winner: &str,
    ) -> Result<(), TournamentError> {
        let match_id =
            MatchRecord::generate_id(tournament_id, round_idx as i32 + 1, match_idx as i32 + 1);
        loop {
            let Versioned {
                version,
                record: mut match_record,
            } = self.match_required(&match_id).await?;

            match slot {
                Slot::Player1 => match_record.player1 = Some(winner.to_string()),
                Slot::Player2 => match_record.player2 = Some(winner.to_string()),
            }
            match self.store.put_match(&match_record, Some(version)).await {
                Ok(_) => return Ok(()),
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use futures::future::join_all;

    use super::TournamentEngine;
    use crate::claim::{ClaimPhase, GRACE_PERIOD_MS};
    use crate::schedule::ROUND_INTERVAL_MS;
    use crate::store::memory::MemoryStore;
    use crate::store::models::{
        MatchRecord, MatchResolution, TournamentRecord, TournamentStatus, Versioned,
    };
    use crate::store::{MatchStore, TournamentStore};
    use crate::utils::error::{StoreError, TournamentError};

    const START: i64 = 1_700_000_000_000;

    fn create_dummies(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("player-{}", index)).collect()
    }

    fn engine() -> TournamentEngine<MemoryStore> {
        // RUST_LOG=tourneycore=debug surfaces engine logs in test output.
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
        TournamentEngine::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn starting_creates_bracket_schedule_and_match_records() {
        let engine = engine();
        let record = engine
            .start_tournament(1, "Season opener", &create_dummies(8), START)
            .await
            .unwrap();

        assert_eq!(record.status, TournamentStatus::Started);
        assert_eq!(record.bracket.rounds.len(), 3);

        let matches = engine.store().get_matches_for_tournament(1).await.unwrap();
        assert_eq!(matches.len(), 7);

        // Round 1 is fully populated, later rounds wait for winners.
        let first = &matches[0];
        assert_eq!(first.match_id, "1.1.1");
        assert_eq!(first.player1.as_deref(), Some("player-0"));
        assert_eq!(first.player2.as_deref(), Some("player-1"));
        assert_eq!(first.scheduled_at, Some(START));

        let final_match = matches.last().unwrap();
        assert_eq!(final_match.match_id, "1.3.1");
        assert!(final_match.player1.is_none());
        assert!(final_match.player2.is_none());
        assert_eq!(final_match.scheduled_at, Some(START + 2 * ROUND_INTERVAL_MS));
    }

    #[tokio::test]
    async fn a_single_entrant_tournament_is_born_complete() {
        let engine = engine();
        let record = engine
            .start_tournament(1, "Walkover", &create_dummies(1), START)
            .await
            .unwrap();

        assert_eq!(record.status, TournamentStatus::Completed);
        assert!(record.bracket.rounds.is_empty());
        assert!(engine
            .store()
            .get_matches_for_tournament(1)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn recorded_winners_appear_in_the_next_rounds_match_record() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(8), START)
            .await
            .unwrap();

        engine.record_winner(1, 0, 0, "player-0").await.unwrap();
        engine.record_winner(1, 0, 1, "player-3").await.unwrap();

        let next = engine.store().get_match("1.2.1").await.unwrap().unwrap().record;
        assert_eq!(next.player1.as_deref(), Some("player-0"));
        assert_eq!(next.player2.as_deref(), Some("player-3"));

        let tournament = engine.tournament(1).await.unwrap();
        assert_eq!(
            tournament.bracket.rounds[1].matchups[0].player1.as_deref(),
            Some("player-0")
        );
    }

    #[tokio::test]
    async fn a_completed_tournament_is_read_only() {
        let engine = engine();
        engine
            .start_tournament(1, "Final only", &create_dummies(2), START)
            .await
            .unwrap();

        engine.record_winner(1, 0, 0, "player-1").await.unwrap();
        let tournament = engine.tournament(1).await.unwrap();
        assert_eq!(tournament.status, TournamentStatus::Completed);

        let err = engine.record_winner(1, 0, 0, "player-1").await.unwrap_err();
        assert!(matches!(err, TournamentError::TournamentCompleted(1)));
    }

    #[tokio::test]
    async fn resubmitting_the_same_winner_changes_nothing() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        engine.record_winner(1, 0, 0, "player-1").await.unwrap();
        let before = engine.tournament(1).await.unwrap();

        engine.record_winner(1, 0, 0, "player-1").await.unwrap();
        assert_eq!(engine.tournament(1).await.unwrap(), before);
    }

    #[tokio::test]
    async fn recording_a_winner_resolves_the_source_match_record() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        engine.record_winner(1, 0, 0, "player-0").await.unwrap();

        let source = engine.store().get_match("1.1.1").await.unwrap().unwrap().record;
        assert_eq!(
            source.resolution,
            MatchResolution::ResultSubmitted {
                winner: "player-0".to_string(),
            }
        );
        assert_eq!(
            engine.claim_phase_at("1.1.1", START).await.unwrap(),
            ClaimPhase::Resolved
        );
    }

    #[tokio::test]
    async fn a_decided_match_cannot_be_claimed_or_overwritten() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        engine.record_winner(1, 0, 0, "player-0").await.unwrap();

        let err = engine
            .claim_no_show_at("1.1.1", "player-1", START + GRACE_PERIOD_MS)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::AlreadyResolved(_)));

        // The loser's claim must not land over the recorded decision.
        let stored = engine.store().get_match("1.1.1").await.unwrap().unwrap().record;
        assert_eq!(
            stored.resolution,
            MatchResolution::ResultSubmitted {
                winner: "player-0".to_string(),
            }
        );
        let tournament = engine.tournament(1).await.unwrap();
        assert_eq!(
            tournament.bracket.rounds[0].matchups[0].winner.as_deref(),
            Some("player-0")
        );
    }

    #[tokio::test]
    async fn claims_on_a_retired_tournament_leave_no_trace() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(3), START)
            .await
            .unwrap();

        // Decide the final through the first semifinal while the bye match
        // 1.1.2 stays unresolved; the tournament retires.
        engine.record_winner(1, 0, 0, "player-1").await.unwrap();
        engine.record_winner(1, 1, 0, "player-1").await.unwrap();
        let tournament = engine.tournament(1).await.unwrap();
        assert_eq!(tournament.status, TournamentStatus::Completed);

        let err = engine
            .claim_no_show_at("1.1.2", "player-2", START + GRACE_PERIOD_MS)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::TournamentCompleted(1)));

        let bye = engine.store().get_match("1.1.2").await.unwrap().unwrap().record;
        assert_eq!(bye.resolution, MatchResolution::Unresolved);

        let err = engine
            .submit_result("1.1.2", "player-2", "player-2")
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::TournamentCompleted(1)));
    }

    #[tokio::test]
    async fn a_pending_tournament_starts_once() {
        let engine = engine();
        let created = engine.create_tournament(1, "Season opener").await.unwrap();
        assert_eq!(created.status, TournamentStatus::Pending);
        assert!(created.bracket.rounds.is_empty());

        let started = engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();
        assert_eq!(started.status, TournamentStatus::Started);
        assert_eq!(started.created_at, created.created_at);
        assert_eq!(started.bracket.rounds.len(), 2);

        let err = engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::TournamentAlreadyStarted(1)));
    }

    #[tokio::test]
    async fn claims_are_rejected_during_the_grace_period() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        let err = engine
            .claim_no_show_at("1.1.1", "player-0", START + GRACE_PERIOD_MS - 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::NotYetEligible { remaining_ms: 1 }));

        let phase = engine
            .claim_phase_at("1.1.1", START + GRACE_PERIOD_MS - 1)
            .await
            .unwrap();
        assert_eq!(phase, ClaimPhase::GracePeriod);
    }

    #[tokio::test]
    async fn an_eligible_claim_resolves_and_advances_the_claimant() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        let now = START + GRACE_PERIOD_MS;
        let resolved = engine.claim_no_show_at("1.1.1", "player-0", now).await.unwrap();
        assert_eq!(
            resolved.resolution,
            MatchResolution::NoShowClaimed {
                claimant: "player-0".to_string(),
                claimed_at: now,
            }
        );

        let next = engine.store().get_match("1.2.1").await.unwrap().unwrap().record;
        assert_eq!(next.player1.as_deref(), Some("player-0"));

        assert_eq!(engine.claim_phase_at("1.1.1", now).await.unwrap(), ClaimPhase::Resolved);
    }

    #[tokio::test]
    async fn non_participants_cannot_claim_regardless_of_timing() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        for now in [START, START + GRACE_PERIOD_MS] {
            let err = engine
                .claim_no_show_at("1.1.1", "player-2", now)
                .await
                .unwrap_err();
            assert!(matches!(err, TournamentError::Unauthorized(_)));
        }
    }

    #[tokio::test]
    async fn a_submitted_result_blocks_later_claims() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        engine.submit_result("1.1.1", "player-0", "player-1").await.unwrap();

        let err = engine
            .claim_no_show_at("1.1.1", "player-0", START + GRACE_PERIOD_MS)
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::AlreadyResolved(_)));

        let next = engine.store().get_match("1.2.1").await.unwrap().unwrap().record;
        assert_eq!(next.player1.as_deref(), Some("player-1"));
    }

    #[tokio::test]
    async fn result_reporters_and_winners_must_be_participants() {
        let engine = engine();
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        let err = engine
            .submit_result("1.1.1", "player-2", "player-0")
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::Unauthorized(_)));

        let err = engine
            .submit_result("1.1.1", "player-0", "player-2")
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::WinnerNotInMatchup(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_claims_grant_exactly_one_win() {
        let engine = Arc::new(engine());
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        let now = START + GRACE_PERIOD_MS;
        let tasks: Vec<_> = (0..6)
            .map(|attempt| {
                let engine = engine.clone();
                let claimant = format!("player-{}", attempt % 2);
                tokio::spawn(async move {
                    engine.claim_no_show_at("1.1.1", &claimant, now).await
                })
            })
            .collect();

        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let granted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(granted, 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(
                result.as_ref().unwrap_err(),
                TournamentError::AlreadyResolved(_)
            ));
        }

        // The stored claimant matches the single winner of the race.
        let resolved = engine.store().get_match("1.1.1").await.unwrap().unwrap().record;
        let claimant = match &resolved.resolution {
            MatchResolution::NoShowClaimed { claimant, .. } => claimant.clone(),
            other => panic!("expected a granted claim, got {:?}", other),
        };
        let winner = results
            .into_iter()
            .flatten()
            .next()
            .map(|record| match record.resolution {
                MatchResolution::NoShowClaimed { claimant, .. } => claimant,
                other => panic!("expected a granted claim, got {:?}", other),
            })
            .unwrap();
        assert_eq!(claimant, winner);
    }

    /// Store wrapper that loses the first few tournament writes, as a
    /// contended backend would.
    struct ContendedStore {
        inner: MemoryStore,
        conflicts_left: AtomicU32,
    }

    impl TournamentStore for ContendedStore {
        async fn get_tournament(
            &self,
            tournament_id: i32,
        ) -> Result<Option<Versioned<TournamentRecord>>, StoreError> {
            self.inner.get_tournament(tournament_id).await
        }

        async fn put_tournament(
            &self,
            record: &TournamentRecord,
            expected_version: Option<u64>,
        ) -> Result<u64, StoreError> {
            if expected_version.is_some()
                && self
                    .conflicts_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok()
            {
                return Err(StoreError::VersionConflict(record.tournament_id.to_string()));
            }
            self.inner.put_tournament(record, expected_version).await
        }
    }

    impl MatchStore for ContendedStore {
        async fn get_match(
            &self,
            match_id: &str,
        ) -> Result<Option<Versioned<MatchRecord>>, StoreError> {
            self.inner.get_match(match_id).await
        }

        async fn put_match(
            &self,
            record: &MatchRecord,
            expected_version: Option<u64>,
        ) -> Result<u64, StoreError> {
            self.inner.put_match(record, expected_version).await
        }

        async fn get_matches_for_tournament(
            &self,
            tournament_id: i32,
        ) -> Result<Vec<MatchRecord>, StoreError> {
            self.inner.get_matches_for_tournament(tournament_id).await
        }
    }

    #[tokio::test]
    async fn winner_recording_retries_through_transient_conflicts() {
        let engine = TournamentEngine::new(ContendedStore {
            inner: MemoryStore::new(),
            conflicts_left: AtomicU32::new(2),
        });
        engine
            .start_tournament(1, "Season opener", &create_dummies(4), START)
            .await
            .unwrap();

        engine.record_winner(1, 0, 0, "player-0").await.unwrap();

        let tournament = engine.tournament(1).await.unwrap();
        assert_eq!(
            tournament.bracket.rounds[0].matchups[0].winner.as_deref(),
            Some("player-0")
        );
    }
}
