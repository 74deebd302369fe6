//! Replaying the persisted chain.
//!
//! `AuditEngine` reads records straight from the store and recomputes every
//! link and hash. It shares nothing with the ingestion pipeline except the
//! store, so it can run while producers are still writing; records committed
//! after the read simply are not part of that audit.

use std::sync::Arc;

use tracing::{error, info, warn};

use virax_chain::{verify_chain, ChainBreak};
use virax_contracts::{AuditReport, CorruptionDetails, EventRecord, HashAlgorithm, StoredEvent, GENESIS};
use virax_core::EventStore;

/// Verifies the chain held by an [`EventStore`].
pub struct AuditEngine {
    store: Arc<dyn EventStore>,
    algorithm: HashAlgorithm,
}

impl AuditEngine {
    /// `algorithm` must be the one the records were written with.
    pub fn new(store: Arc<dyn EventStore>, algorithm: HashAlgorithm) -> Self {
        Self { store, algorithm }
    }

    /// Verify all records (`None`) or the most recent `limit`. A limit of
    /// zero means a full audit.
    ///
    /// A full audit requires the first record to link to `GENESIS`. A
    /// partial audit trusts the `prev_hash` of the oldest fetched record and
    /// checks everything after it.
    ///
    /// Never fails: read errors become [`AuditReport::Error`].
    pub fn validate(&self, limit: Option<usize>) -> AuditReport {
        let limit = limit.filter(|&n| n > 0);
        let rows = match self.store.integrity_rows(limit) {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "audit could not read records");
                return AuditReport::Error { message: e.to_string() };
            }
        };
        let Some(first) = rows.first() else {
            info!("audit found no records");
            return AuditReport::Empty;
        };

        let anchor = match limit {
            None => GENESIS.to_string(),
            Some(_) => first.record.prev_hash.clone(),
        };
        let records: Vec<EventRecord> = rows.iter().map(|row| row.record.clone()).collect();

        match verify_chain(&records, &anchor, self.algorithm) {
            Ok(count) => {
                info!(count, algorithm = %self.algorithm, "audit passed");
                AuditReport::Success { count }
            }
            Err(chain_break) => failed_report(&rows, chain_break),
        }
    }
}

fn failed_report(rows: &[StoredEvent], chain_break: ChainBreak) -> AuditReport {
    let row = &rows[chain_break.index];
    warn!(
        index = chain_break.index,
        db_id = row.id,
        category = %row.record.category,
        link_break = chain_break.is_link_break(),
        content_break = chain_break.is_content_break(),
        "audit detected a broken chain"
    );

    AuditReport::Failed {
        count: rows.len(),
        error_index: chain_break.index,
        corrupted_db_id: row.id,
        details: CorruptionDetails {
            timestamp: row.record.timestamp.clone(),
            category: row.record.category.clone(),
            level: row.record.level.clone(),
            expected_prev_hash: chain_break.expected_prev_hash,
            found_prev_hash: chain_break.found_prev_hash,
            expected_hash: chain_break.expected_hash,
            found_hash: chain_break.found_hash,
        },
    }
}
