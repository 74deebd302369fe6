//! `ViraxLogger`: one handle over the pipeline, store, watchers and auditor.

use std::{fmt, panic::Location, sync::Arc};

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use virax_audit::AuditEngine;
use virax_contracts::{
    error::ViraxResult, AuditReport, EventRecord, PipelineConfig, QueryFilter, StoredEvent,
};
use virax_core::{EventStore, IngestionPipeline, PipelineState, PipelineStats, RecordObserver};
use virax_store::SqliteStore;
use virax_watch::{CallbackResult, WatchOptions, WatcherDispatch, WatcherId, WatcherInfo};

/// Outcome of [`ViraxLogger::maintain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub pruned_heartbeats: usize,
    pub retention_days: u32,
}

/// A running ViraxLog instance.
///
/// Dropping the logger shuts it down with the configured timeout.
pub struct ViraxLogger {
    config: PipelineConfig,
    store: Arc<SqliteStore>,
    watchers: Arc<WatcherDispatch>,
    pipeline: IngestionPipeline,
    auditor: AuditEngine,
}

impl ViraxLogger {
    /// Open the store named in `config`, resume its chain, and start the
    /// background workers.
    pub fn open(config: PipelineConfig) -> ViraxResult<Self> {
        config.validate()?;

        let store = Arc::new(SqliteStore::open_config(&config)?);
        let watchers = Arc::new(WatcherDispatch::new(config.max_workers)?);
        let pipeline = IngestionPipeline::launch(
            config.clone(),
            store.clone(),
            Some(watchers.clone() as Arc<dyn RecordObserver>),
        )?;
        let auditor = AuditEngine::new(store.clone(), config.algorithm);

        info!(
            store = %config.store_path.display(),
            session_id = %config.session_id,
            algorithm = %config.algorithm,
            "virax logger ready"
        );
        Ok(Self {
            config,
            store,
            watchers,
            pipeline,
            auditor,
        })
    }

    // ── Ingestion ─────────────────────────────────────────────────────────────

    /// Record an event. The caller's `file:line` becomes the record source.
    #[track_caller]
    pub fn log<P>(&self, level: &str, category: &str, payload: &P)
    where
        P: Serialize + fmt::Debug + ?Sized,
    {
        let caller = Location::caller();
        let source = format!("{}:{}", caller.file(), caller.line());
        self.pipeline.submit(level, category, &source, payload);
    }

    #[track_caller]
    pub fn trace<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("TRACE", category, payload);
    }

    #[track_caller]
    pub fn debug<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("DEBUG", category, payload);
    }

    #[track_caller]
    pub fn info<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("INFO", category, payload);
    }

    #[track_caller]
    pub fn warning<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("WARNING", category, payload);
    }

    #[track_caller]
    pub fn error<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("ERROR", category, payload);
    }

    #[track_caller]
    pub fn critical<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("CRITICAL", category, payload);
    }

    #[track_caller]
    pub fn fatal<P: Serialize + fmt::Debug + ?Sized>(&self, category: &str, payload: &P) {
        self.log("FATAL", category, payload);
    }

    // ── Watchers ──────────────────────────────────────────────────────────────

    pub fn watch<F>(&self, pattern: &str, callback: F, options: WatchOptions) -> ViraxResult<WatcherId>
    where
        F: Fn(&EventRecord) -> CallbackResult + Send + Sync + 'static,
    {
        self.watchers.register(pattern, callback, options)
    }

    pub fn unwatch(&self, id: WatcherId) -> bool {
        self.watchers.unregister(id)
    }

    pub fn set_watcher_enabled(&self, id: WatcherId, enabled: bool) -> bool {
        self.watchers.set_enabled(id, enabled)
    }

    pub fn watchers(&self) -> Vec<WatcherInfo> {
        self.watchers.list()
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Verify the committed chain. Records still queued are not included.
    pub fn audit(&self, limit: Option<usize>) -> AuditReport {
        self.auditor.validate(limit)
    }

    pub fn query(&self, filter: &QueryFilter, limit: usize) -> ViraxResult<Vec<StoredEvent>> {
        self.store.query_range(filter, limit)
    }

    /// Committed records.
    pub fn count(&self) -> ViraxResult<u64> {
        self.store.count()
    }

    /// Prune heartbeats older than `retention_days` and compact the database.
    pub fn maintain(&self) -> ViraxResult<MaintenanceReport> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(self.config.retention_days));
        let pruned_heartbeats = self.store.prune_heartbeats(cutoff)?;
        self.store.compact()?;
        info!(pruned_heartbeats, retention_days = self.config.retention_days, "maintenance finished");
        Ok(MaintenanceReport {
            pruned_heartbeats,
            retention_days: self.config.retention_days,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Flush queued events, close the store, then let running watcher
    /// callbacks finish. Idempotent.
    pub fn shutdown(&self) -> ViraxResult<()> {
        let flushed = self.pipeline.shutdown(self.config.shutdown_timeout());
        self.watchers.shutdown();
        if let Err(e) = &flushed {
            warn!(error = %e, "store did not close cleanly");
        }
        flushed
    }
}

impl Drop for ViraxLogger {
    fn drop(&mut self) {
        if matches!(self.state(), PipelineState::Created | PipelineState::Running) {
            // Errors are already logged by `shutdown`.
            let _ = self.shutdown();
        }
    }
}
