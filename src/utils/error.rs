/// Caller-facing errors for bracket progression and no-show claims.
///
/// Validation and conflict variants are terminal: the caller must re-read
/// current state instead of retrying with the same input. `NotYetEligible`
/// carries the remaining wait so the caller can render a countdown rather
/// than a hard failure.
#[derive(Debug)]
pub enum TournamentError {
    TournamentNotExists(i32),
    RoundNotExists(usize),
    MatchNotExists(String),
    WinnerNotInMatchup(String),
    WinnerAlreadyRecorded(String),
    TournamentCompleted(i32),
    TournamentAlreadyStarted(i32),
    MissingSchedule(String),
    NotYetEligible { remaining_ms: i64 },
    AlreadyResolved(String),
    Unauthorized(String),
    Store(StoreError),
}

impl std::fmt::Display for TournamentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TournamentError::*;
        match self {
            TournamentNotExists(id) => write!(f, "Tournament {} does not exist.", id),
            RoundNotExists(idx) => write!(f, "Round {} does not exist.", idx),
            MatchNotExists(id) => write!(f, "Match {} does not exist.", id),
            WinnerNotInMatchup(id) => {
                write!(f, "Player {} is not part of this matchup.", id)
            }
            WinnerAlreadyRecorded(id) => {
                write!(f, "A different winner ({}) was already recorded.", id)
            }
            TournamentCompleted(id) => {
                write!(f, "Tournament {} is complete and read-only.", id)
            }
            TournamentAlreadyStarted(id) => {
                write!(f, "Tournament {} has already started.", id)
            }
            MissingSchedule(id) => write!(f, "Match {} has no scheduled time.", id),
            NotYetEligible { remaining_ms } => write!(
                f,
                "Too early to claim a no-show win; {} ms remaining.",
                remaining_ms
            ),
            AlreadyResolved(id) => write!(f, "Match {} is already resolved.", id),
            Unauthorized(id) => write!(f, "User {} is not a participant of this match.", id),
            Store(e) => write!(f, "Store error: {}", e),
        }
    }
}

impl std::error::Error for TournamentError {}

impl From<StoreError> for TournamentError {
    fn from(value: StoreError) -> Self {
        TournamentError::Store(value)
    }
}

/// Errors produced by a record store implementation.
///
/// `VersionConflict` marks a lost optimistic write; it is transient and safe
/// to retry from freshly read state. `Backend` failures are opaque to the
/// core.
#[derive(Debug)]
pub enum StoreError {
    VersionConflict(String),
    NotFound(String),
    Backend(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::VersionConflict(id) => {
                write!(f, "Concurrent update to record {}.", id)
            }
            StoreError::NotFound(id) => write!(f, "Record {} not found.", id),
            StoreError::Backend(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Backend(value.into())
    }
}
