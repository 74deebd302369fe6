//! The event record and its persisted form.
//!
//! `EventRecord` is a single link of the hash chain. It is built exactly once,
//! by the ingestion pipeline, and never modified afterwards. `StoredEvent` is
//! what the store hands back: the record plus the sequence id and creation
//! time the database assigned.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// The `prev_hash` of the first record in every chain.
pub const GENESIS: &str = "GENESIS";

/// Version of the record layout written by this crate.
pub const SCHEMA_VERSION: u32 = 1;

/// One immutable entry of the event chain.
///
/// `hash` commits to `timestamp`, `level`, `category`, `payload` and
/// `prev_hash` (in that order); `session_id`, `source` and `schema_version`
/// are carried but not hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// ISO-8601 UTC timestamp with second precision.
    pub timestamp: String,

    /// Session that produced the record.
    pub session_id: String,

    /// Uppercased severity label (`INFO`, `ERROR`, ...).
    pub level: String,

    /// Free-form category; watchers match against this field.
    pub category: String,

    /// Caller-supplied origin, typically `file:line`.
    pub source: String,

    /// Canonical payload string exactly as it was hashed.
    pub payload: String,

    /// Lowercase hex digest of this record.
    pub hash: String,

    /// Digest of the predecessor, or [`GENESIS`].
    pub prev_hash: String,

    pub schema_version: u32,
}

impl EventRecord {
    /// True when this record claims to be the first link of a chain.
    pub fn is_genesis(&self) -> bool {
        self.prev_hash == GENESIS
    }
}

/// A record as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Auto-incremented sequence id assigned on insert.
    pub id: i64,

    /// Server-side insertion time as recorded by the store.
    pub created_at: String,

    #[serde(flatten)]
    pub record: EventRecord,
}

/// Render `at` the way every record timestamp is rendered:
/// `YYYY-MM-DDTHH:MM:SS+00:00`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// The current time as a record timestamp.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
