//! Audit reports and query filters.

use serde::{Deserialize, Serialize};

/// Outcome of replaying the persisted chain.
///
/// Serialized with a `status` tag so the JSON form reads
/// `{"status":"failed","count":12,"error_index":4,...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditReport {
    /// The store holds no records.
    Empty,

    /// Every fetched record links to its predecessor and matches its hash.
    Success { count: usize },

    /// The first broken record in the fetched slice.
    Failed {
        count: usize,
        /// Zero-based position inside the fetched slice.
        error_index: usize,
        /// Store sequence id of the broken record.
        corrupted_db_id: i64,
        details: CorruptionDetails,
    },

    /// The records could not be read.
    Error { message: String },
}

impl AuditReport {
    pub fn status(&self) -> &'static str {
        match self {
            AuditReport::Empty => "empty",
            AuditReport::Success { .. } => "success",
            AuditReport::Failed { .. } => "failed",
            AuditReport::Error { .. } => "error",
        }
    }

    /// Records examined; zero for `Empty` and `Error`.
    pub fn count(&self) -> usize {
        match self {
            AuditReport::Success { count } | AuditReport::Failed { count, .. } => *count,
            AuditReport::Empty | AuditReport::Error { .. } => 0,
        }
    }

    pub fn is_intact(&self) -> bool {
        matches!(self, AuditReport::Empty | AuditReport::Success { .. })
    }
}

/// Diagnostic values for a broken record.
///
/// A link break shows up as `expected_prev_hash != found_prev_hash`; a content
/// break as `expected_hash != found_hash`. Both may differ at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionDetails {
    pub timestamp: String,
    pub category: String,
    pub level: String,
    pub expected_prev_hash: String,
    pub found_prev_hash: String,
    pub expected_hash: String,
    pub found_hash: String,
}

/// Optional filters for range queries. Empty filters match every record.
///
/// `since` and `until` are inclusive and compared against the stored
/// timestamp text, so they must use the record timestamp format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub category: Option<String>,
    pub level: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Levels are stored uppercased; the filter is uppercased to match.
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into().to_uppercase());
        self
    }

    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    pub fn until(mut self, until: impl Into<String>) -> Self {
        self.until = Some(until.into());
        self
    }
}
