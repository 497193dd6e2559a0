//! Core logic for single-elimination tournaments: bracket construction and
//! winner propagation, plus the time-gated no-show claim window.
//!
//! The crate owns no storage, transport, or UI. It reads and writes
//! tournament and match records through the narrow store traits in
//! [`store`], which the surrounding service implements against its document
//! database; [`store::memory::MemoryStore`] is the reference implementation.
//! [`engine::TournamentEngine`] ties the pieces together under an
//! optimistic-concurrency discipline.

/// Bracket construction and winner propagation.
pub mod bracket;
/// The no-show claim gate: grace window evaluation and the claim lifecycle.
pub mod claim;
/// Orchestration of bracket progression and claims over a record store.
pub mod engine;
/// Round scheduling.
pub mod schedule;
/// Traits and types used for interacting with the record stores.
pub mod store;

mod utils;

pub use utils::error::{StoreError, TournamentError};
pub use utils::time::now_ms;
