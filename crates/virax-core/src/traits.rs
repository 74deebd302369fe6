//! Core trait definitions for the ViraxLog pipeline.
//!
//! These two traits are the seams between the pipeline and its
//! collaborators:
//!
//! - `EventStore`: durable sink and read side of the chain
//! - `RecordObserver`: fire-and-forget reaction to accepted records
//!
//! The pipeline never inspects how either is implemented.

use chrono::{DateTime, Utc};

use virax_contracts::{error::ViraxResult, EventRecord, QueryFilter, StoredEvent};

/// Append-only persistence for chain records and heartbeats.
///
/// Implementations are shared between the commit worker, the heartbeat
/// emitter, auditors and query callers, so every method takes `&self` and
/// implementations serialize internally.
pub trait EventStore: Send + Sync {
    /// Persist `records` in order as one atomic unit: either every record is
    /// stored or none is.
    fn insert_batch(&self, records: &[EventRecord]) -> ViraxResult<()>;

    /// Hash of the most recently inserted record, or `GENESIS` when empty.
    ///
    /// The pipeline seeds its chain head from this on startup.
    fn last_hash(&self) -> ViraxResult<String>;

    /// At most `limit` records matching `filter`, newest first.
    fn query_range(&self, filter: &QueryFilter, limit: usize) -> ViraxResult<Vec<StoredEvent>>;

    /// Records in insertion order: all of them, or only the most recent
    /// `limit`.
    fn integrity_rows(&self, limit: Option<usize>) -> ViraxResult<Vec<StoredEvent>>;

    /// Number of chain records stored.
    fn count(&self) -> ViraxResult<u64>;

    fn insert_heartbeat(&self, timestamp: &str, status: &str) -> ViraxResult<()>;

    /// Delete heartbeat rows stamped before `older_than`; returns rows removed.
    fn prune_heartbeats(&self, older_than: DateTime<Utc>) -> ViraxResult<usize>;

    /// Reclaim free space. Has no effect on stored records.
    fn compact(&self) -> ViraxResult<()>;

    /// Release the underlying connection. Later calls fail with
    /// `ViraxError::StoreClosed`.
    fn close(&self) -> ViraxResult<()>;
}

/// Receives every record the pipeline accepts.
///
/// `observe` is called on the producer's thread right after the record is
/// queued, so implementations must hand work off rather than run it inline.
/// It cannot fail: an observer absorbs and logs its own errors.
pub trait RecordObserver: Send + Sync {
    fn observe(&self, record: &EventRecord);
}
