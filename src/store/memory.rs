use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::models::{MatchRecord, TournamentRecord, Versioned};
use super::{MatchStore, TournamentStore};
use crate::utils::error::StoreError;

/// An in-memory document store with optimistic versioning.
///
/// Records are kept as JSON documents, the representation the external
/// document database uses, so everything the core persists round-trips
/// through serde here exactly as it would in production. Backs the tests and
/// any embedding that does not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tournaments: Mutex<HashMap<String, (u64, serde_json::Value)>>,
    matches: Mutex<HashMap<String, (u64, serde_json::Value)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        map: &Mutex<HashMap<String, (u64, serde_json::Value)>>,
    ) -> Result<MutexGuard<'_, HashMap<String, (u64, serde_json::Value)>>, StoreError> {
        map.lock()
            .map_err(|_| StoreError::Backend(anyhow!("store mutex poisoned")))
    }

    fn get_document<T: DeserializeOwned>(
        map: &Mutex<HashMap<String, (u64, serde_json::Value)>>,
        key: &str,
    ) -> Result<Option<Versioned<T>>, StoreError> {
        let guard = Self::lock(map)?;
        match guard.get(key) {
            Some((version, document)) => Ok(Some(Versioned {
                version: *version,
                record: serde_json::from_value(document.clone())?,
            })),
            None => Ok(None),
        }
    }

    fn put_document<T: Serialize>(
        map: &Mutex<HashMap<String, (u64, serde_json::Value)>>,
        key: &str,
        record: &T,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let document = serde_json::to_value(record)?;
        let mut guard = Self::lock(map)?;
        let current = guard.get(key).map(|(version, _)| *version);

        let next = match (expected_version, current) {
            (None, None) => 1,
            (Some(expected), Some(version)) if expected == version => version + 1,
            (Some(_), None) => return Err(StoreError::NotFound(key.to_string())),
            _ => return Err(StoreError::VersionConflict(key.to_string())),
        };

        guard.insert(key.to_string(), (next, document));
        Ok(next)
    }
}

impl TournamentStore for MemoryStore {
    async fn get_tournament(
        &self,
        tournament_id: i32,
    ) -> Result<Option<Versioned<TournamentRecord>>, StoreError> {
        Self::get_document(&self.tournaments, &tournament_id.to_string())
    }

    async fn put_tournament(
        &self,
        record: &TournamentRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        Self::put_document(
            &self.tournaments,
            &record.tournament_id.to_string(),
            record,
            expected_version,
        )
    }
}

impl MatchStore for MemoryStore {
    async fn get_match(
        &self,
        match_id: &str,
    ) -> Result<Option<Versioned<MatchRecord>>, StoreError> {
        Self::get_document(&self.matches, match_id)
    }

    async fn put_match(
        &self,
        record: &MatchRecord,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        Self::put_document(&self.matches, &record.match_id, record, expected_version)
    }

    async fn get_matches_for_tournament(
        &self,
        tournament_id: i32,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let guard = Self::lock(&self.matches)?;
        let mut records = Vec::new();
        for (_, document) in guard.values() {
            let record: MatchRecord = serde_json::from_value(document.clone())?;
            if record.tournament_id == tournament_id {
                records.push(record);
            }
        }
        records.sort_by_key(|record| (record.round, record.sequence));
        Ok(records)
    }
}
