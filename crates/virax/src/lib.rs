//! # virax
//!
//! Tamper-evident, append-only event logging.
//!
//! Every event is canonicalized, linked to its predecessor by a digest, and
//! committed in batches to SQLite by a background worker. Watchers react to
//! categories as events arrive; the auditor replays the stored chain and
//! pinpoints the first altered or re-linked record.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use virax::{PipelineConfig, ViraxLogger, WatchOptions};
//!
//! let logger = ViraxLogger::open(PipelineConfig::default())?;
//! logger.watch("SECURITY", |record| { page_oncall(record); Ok(()) }, WatchOptions::default())?;
//! logger.info("AUTH", &serde_json::json!({"user": "ana", "action": "login"}));
//!
//! assert!(logger.audit(None).is_intact());
//! logger.shutdown()?;
//! ```

pub mod global;
pub mod logger;

pub use global::{
    critical, debug, error, fatal, get_logger, info, initialize, log, stop, trace, warning, watch,
};
pub use logger::{MaintenanceReport, ViraxLogger};

pub use virax_chain::{canonicalize, verify_chain};
pub use virax_contracts::{
    AuditReport, CorruptionDetails, EventRecord, HashAlgorithm, Payload, PipelineConfig, QueryFilter,
    StoredEvent, ViraxError, ViraxResult, GENESIS,
};
pub use virax_core::{PipelineState, PipelineStats};
pub use virax_watch::{CallbackResult, WatchOptions, WatcherId, WatcherInfo};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, Utc};
    use rusqlite::{params, Connection};
    use virax_contracts::record::format_timestamp;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// In-memory logger whose single watcher worker keeps callback order.
    fn ordered_logger() -> ViraxLogger {
        let config = PipelineConfig {
            max_workers: 1,
            poll_interval_ms: 20,
            ..PipelineConfig::in_memory()
        };
        ViraxLogger::open(config).unwrap()
    }

    /// Capture every record the logger accepts.
    fn capture_all(logger: &ViraxLogger) -> Arc<Mutex<Vec<EventRecord>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        logger
            .watch(
                "*",
                move |record| {
                    sink.lock().unwrap().push(record.clone());
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();
        seen
    }

    // ── Facade ────────────────────────────────────────────────────────────────

    #[test]
    fn source_is_callers_file_and_line() {
        let logger = ordered_logger();
        let seen = capture_all(&logger);

        let line = line!() + 1;
        logger.info("AUTH", "login");
        logger.shutdown().unwrap();

        let records = seen.lock().unwrap();
        assert_eq!(records[0].source, format!("{}:{}", file!(), line));
    }

    #[test]
    fn level_shortcuts_write_uppercase_levels() {
        let logger = ordered_logger();
        let seen = capture_all(&logger);

        logger.trace("APP", "t");
        logger.debug("APP", "d");
        logger.info("APP", "i");
        logger.warning("APP", "w");
        logger.error("APP", "e");
        logger.critical("APP", "c");
        logger.fatal("APP", "f");
        logger.log("notice", "APP", "n");
        logger.shutdown().unwrap();

        let levels: Vec<String> = seen.lock().unwrap().iter().map(|r| r.level.clone()).collect();
        assert_eq!(
            levels,
            vec!["TRACE", "DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "FATAL", "NOTICE"]
        );
        assert_eq!(logger.stats().submitted, 8);
    }

    #[test]
    fn maintain_prunes_heartbeats_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maintain.db");
        let config = PipelineConfig {
            store_path: path.clone(),
            heartbeat_enabled: false,
            retention_days: 7,
            ..PipelineConfig::default()
        };
        let logger = ViraxLogger::open(config).unwrap();

        let conn = Connection::open(&path).unwrap();
        for age in [30, 8, 1] {
            conn.execute(
                "INSERT INTO heartbeat (timestamp, status) VALUES (?1, 'alive')",
                params![format_timestamp(Utc::now() - Duration::days(age))],
            )
            .unwrap();
        }

        let report = logger.maintain().unwrap();
        assert_eq!(report.pruned_heartbeats, 2);
        assert_eq!(report.retention_days, 7);
        logger.shutdown().unwrap();
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = PipelineConfig {
            max_workers: 0,
            ..PipelineConfig::in_memory()
        };
        assert!(matches!(ViraxLogger::open(config), Err(ViraxError::Config { .. })));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let logger = ordered_logger();
        logger.shutdown().unwrap();
        logger.shutdown().unwrap();
        assert_eq!(logger.state(), PipelineState::Stopped);
    }
}
