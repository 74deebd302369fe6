//! Process-wide logger.
//!
//! For applications that want to log from anywhere without threading a
//! handle through. One instance per process; [`stop`] releases it so a new
//! one can be initialized.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use serde::Serialize;
use tracing::warn;

use virax_contracts::{
    error::{ViraxError, ViraxResult},
    EventRecord, PipelineConfig,
};
use virax_watch::{CallbackResult, WatchOptions, WatcherId};

use crate::logger::ViraxLogger;

static GLOBAL: Mutex<Option<Arc<ViraxLogger>>> = Mutex::new(None);

/// Open the global logger, or return the one already running.
///
/// When a logger already exists `config` is ignored.
pub fn initialize(config: PipelineConfig) -> ViraxResult<Arc<ViraxLogger>> {
    let mut global = lock();
    if let Some(existing) = global.as_ref() {
        warn!(
            store = %existing.config().store_path.display(),
            "virax already initialized; returning the existing logger"
        );
        return Ok(Arc::clone(existing));
    }

    let logger = Arc::new(ViraxLogger::open(config)?);
    *global = Some(Arc::clone(&logger));
    Ok(logger)
}

pub fn get_logger() -> Option<Arc<ViraxLogger>> {
    lock().clone()
}

/// Log through the global logger. Dropped with a warning before
/// [`initialize`].
#[track_caller]
pub fn log<P>(level: &str, category: &str, payload: &P)
where
    P: Serialize + fmt::Debug + ?Sized,
{
    match get_logger() {
        Some(logger) => logger.log(level, category, payload),
        None => warn!(level, category, "virax not initialized; event dropped"),
    }
}

#[track_caller]
pub fn trace<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("TRACE", category, payload);
}

#[track_caller]
pub fn debug<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("DEBUG", category, payload);
}

#[track_caller]
pub fn info<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("INFO", category, payload);
}

#[track_caller]
pub fn warning<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("WARNING", category, payload);
}

#[track_caller]
pub fn error<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("ERROR", category, payload);
}

#[track_caller]
pub fn critical<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("CRITICAL", category, payload);
}

#[track_caller]
pub fn fatal<P: Serialize + fmt::Debug + ?Sized>(category: &str, payload: &P) {
    log("FATAL", category, payload);
}

pub fn watch<F>(pattern: &str, callback: F, options: WatchOptions) -> ViraxResult<WatcherId>
where
    F: Fn(&EventRecord) -> CallbackResult + Send + Sync + 'static,
{
    let logger = get_logger().ok_or_else(|| ViraxError::Lifecycle {
        reason: "virax not initialized".to_string(),
    })?;
    logger.watch(pattern, callback, options)
}

/// Shut down and release the global logger. A no-op if none is running.
pub fn stop() -> ViraxResult<()> {
    let taken = lock().take();
    match taken {
        Some(logger) => logger.shutdown(),
        None => Ok(()),
    }
}

fn lock() -> MutexGuard<'static, Option<Arc<ViraxLogger>>> {
    GLOBAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
