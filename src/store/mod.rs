use crate::utils::error::StoreError;
use models::{MatchRecord, TournamentRecord, Versioned};

/// The reference in-memory store implementation.
pub mod memory;
/// Record models persisted by the stores.
///
/// These are the shapes the core reads and writes; the surrounding service
/// maps them onto whatever document database it runs against.
pub mod models;

/// Any record store holding tournament documents.
///
/// Implementors must provide optimistic versioning: a `put` with an expected
/// version fails with [`StoreError::VersionConflict`] when the record changed
/// underneath the caller, which is what makes the read-modify-write
/// discipline in the engine safe under concurrent updates.
///
/// Note that swapping the implementor only changes which database backs the
/// core; the record shapes stay the same.
#[allow(async_fn_in_trait)]
pub trait TournamentStore {
    /// Retrieves a tournament together with its current version.
    async fn get_tournament(
        &self,
        tournament_id: i32,
    ) -> Result<Option<Versioned<TournamentRecord>>, StoreError>;

    /// Writes a tournament record.
    ///
    /// `expected_version` of `None` inserts a new record and fails on an
    /// existing one; `Some(v)` replaces the record only if its version is
    /// still `v`. Returns the new version.
    async fn put_tournament(
        &self,
        record: &TournamentRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;
}

/// Any record store holding per-match documents.
#[allow(async_fn_in_trait)]
pub trait MatchStore {
    /// Retrieves a match together with its current version.
    async fn get_match(&self, match_id: &str)
        -> Result<Option<Versioned<MatchRecord>>, StoreError>;

    /// Writes a match record under the same versioning rules as
    /// [`TournamentStore::put_tournament`].
    async fn put_match(
        &self,
        record: &MatchRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// All matches belonging to a tournament, ordered by round then sequence.
    async fn get_matches_for_tournament(
        &self,
        tournament_id: i32,
    ) -> Result<Vec<MatchRecord>, StoreError>;
}
