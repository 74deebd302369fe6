//! # virax-audit
//!
//! Offline verification of a persisted ViraxLog chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use virax_audit::AuditEngine;
//!
//! let engine = AuditEngine::new(store, HashAlgorithm::Sha256);
//! match engine.validate(None) {
//!     AuditReport::Failed { corrupted_db_id, .. } => alert(corrupted_db_id),
//!     report => println!("{}", report.status()),
//! }
//! ```

pub mod engine;

pub use engine::AuditEngine;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use rusqlite::{params, Connection};
    use serde_json::json;

    use virax_chain::{canonicalize, Unsealed};
    use virax_contracts::{AuditReport, EventRecord, HashAlgorithm, GENESIS};
    use virax_core::EventStore;
    use virax_store::SqliteStore;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn chain_after(prev: &str, n: usize, algorithm: HashAlgorithm) -> Vec<EventRecord> {
        let mut prev = prev.to_string();
        (0..n)
            .map(|i| {
                let record = Unsealed {
                    timestamp: format!("2024-01-01T00:00:{i:02}+00:00"),
                    session_id: "S1".to_string(),
                    level: "INFO".to_string(),
                    category: if i % 2 == 0 { "AUTH" } else { "BILLING" }.to_string(),
                    source: "audit-test".to_string(),
                    payload: canonicalize(&json!({ "seq": i })),
                }
                .seal(&prev, algorithm);
                prev = record.hash.clone();
                record
            })
            .collect()
    }

    /// A file-backed store holding `n` valid records.
    fn seeded_store(path: &Path, n: usize) -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open(path).unwrap());
        store.insert_batch(&chain_after(GENESIS, n, HashAlgorithm::Sha256)).unwrap();
        store
    }

    /// Edit a stored row behind the store's back.
    fn tamper(path: &Path, id: i64, column: &str, value: &str) {
        let conn = Connection::open(path).unwrap();
        let changed = conn
            .execute(&format!("UPDATE registry SET {column} = ?1 WHERE id = ?2"), params![value, id])
            .unwrap();
        assert_eq!(changed, 1);
    }

    fn engine(store: Arc<SqliteStore>) -> AuditEngine {
        AuditEngine::new(store, HashAlgorithm::Sha256)
    }

    // ── Outcomes ──────────────────────────────────────────────────────────────

    #[test]
    fn empty_store_reports_empty() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        assert_eq!(engine(store).validate(None), AuditReport::Empty);
    }

    #[test]
    fn intact_chain_reports_success_with_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir.path().join("ok.db"), 5);
        let report = engine(store).validate(None);
        assert_eq!(report, AuditReport::Success { count: 5 });
        assert!(report.is_intact());
    }

    #[test]
    fn altered_payload_is_located_by_row_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.db");
        let store = seeded_store(&path, 5);
        let original = store.integrity_rows(None).unwrap()[2].record.clone();

        tamper(&path, 3, "payload", r#""HACKED_CONTENT""#);

        match engine(store).validate(None) {
            AuditReport::Failed {
                count,
                error_index,
                corrupted_db_id,
                details,
            } => {
                assert_eq!(count, 5);
                assert_eq!(error_index, 2);
                assert_eq!(corrupted_db_id, 3);
                assert_eq!(details.category, original.category);
                assert_eq!(details.found_hash, original.hash);
                assert_ne!(details.expected_hash, original.hash);
                assert_eq!(details.expected_prev_hash, details.found_prev_hash);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn rewritten_link_is_a_prev_hash_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.db");
        let store = seeded_store(&path, 4);
        let rows = store.integrity_rows(None).unwrap();

        tamper(&path, 2, "prev_hash", "WRONG_HASH");

        match engine(store).validate(None) {
            AuditReport::Failed {
                error_index, details, ..
            } => {
                assert_eq!(error_index, 1);
                assert_eq!(details.expected_prev_hash, rows[0].record.hash);
                assert_eq!(details.found_prev_hash, "WRONG_HASH");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn wrong_algorithm_fails_at_first_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(&dir.path().join("alg.db"), 3);
        let report = AuditEngine::new(store, HashAlgorithm::Blake2b256).validate(None);
        assert!(matches!(report, AuditReport::Failed { error_index: 0, corrupted_db_id: 1, .. }));
    }

    // ── Partial audits ────────────────────────────────────────────────────────

    #[test]
    fn partial_audit_checks_only_recent_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.db");
        let store = seeded_store(&path, 6);

        tamper(&path, 1, "payload", r#""old damage""#);

        let engine = engine(store);
        assert_eq!(engine.validate(Some(3)), AuditReport::Success { count: 3 });
        assert!(matches!(engine.validate(None), AuditReport::Failed { error_index: 0, .. }));
    }

    #[test]
    fn zero_limit_audits_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.db");
        let store = seeded_store(&path, 3);

        let engine = engine(store);
        assert_eq!(engine.validate(Some(0)), AuditReport::Success { count: 3 });

        tamper(&path, 2, "payload", r#""HACKED_CONTENT""#);
        assert!(matches!(
            engine.validate(Some(0)),
            AuditReport::Failed { error_index: 1, corrupted_db_id: 2, .. }
        ));
    }

    #[test]
    fn full_audit_requires_genesis_anchor() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .insert_batch(&chain_after("f00dfeed", 3, HashAlgorithm::Sha256))
            .unwrap();

        let engine = engine(store);
        match engine.validate(None) {
            AuditReport::Failed { error_index, details, .. } => {
                assert_eq!(error_index, 0);
                assert_eq!(details.expected_prev_hash, GENESIS);
                assert_eq!(details.found_prev_hash, "f00dfeed");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(engine.validate(Some(10)), AuditReport::Success { count: 3 });
    }

    #[test]
    fn unreadable_store_reports_error() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.close().unwrap();

        let report = engine(store).validate(None);
        assert_eq!(report.status(), "error");
        assert_eq!(report.count(), 0);
    }

    #[test]
    fn report_serializes_with_status_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("json.db");
        let store = seeded_store(&path, 2);
        tamper(&path, 2, "level", "CRITICAL");

        let value = serde_json::to_value(engine(store).validate(None)).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["corrupted_db_id"], 2);
        assert_eq!(value["details"]["level"], "CRITICAL");
    }
}
