//! Routing accepted records to registered watchers.
//!
//! `dispatch` runs on the producer's thread. It only matches rules and
//! bumps their hit counters under the registry lock; the callbacks
//! themselves run on the worker pool, each inside a wrapper that absorbs
//! returned errors and panics.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use virax_contracts::{error::ViraxResult, EventRecord};
use virax_core::RecordObserver;

use crate::{
    pool::WorkerPool,
    rule::{Callback, CallbackResult, Matcher, WatchOptions, WatcherId, WatcherInfo, WatcherRule},
};

/// Registry of watcher rules plus the pool that runs their callbacks.
pub struct WatcherDispatch {
    /// Kept in registration order so a stable sort preserves it among equal
    /// priorities.
    rules: Mutex<Vec<WatcherRule>>,
    pool: WorkerPool,
    stopped: AtomicBool,
}

impl WatcherDispatch {
    /// Start a dispatch with `max_workers` callback threads.
    pub fn new(max_workers: usize) -> ViraxResult<Self> {
        Ok(Self {
            rules: Mutex::new(Vec::new()),
            pool: WorkerPool::new(max_workers)?,
            stopped: AtomicBool::new(false),
        })
    }

    /// Register `callback` for categories matching `pattern`.
    ///
    /// Returns `ViraxError::InvalidPattern` if a regex pattern does not
    /// compile; nothing is registered in that case.
    pub fn register<F>(&self, pattern: &str, callback: F, options: WatchOptions) -> ViraxResult<WatcherId>
    where
        F: Fn(&EventRecord) -> CallbackResult + Send + Sync + 'static,
    {
        let matcher = Matcher::compile(pattern, options.use_regex)?;
        let rule = WatcherRule::new(matcher, Arc::new(callback), options);
        let id = rule.id;

        lock(&self.rules).push(rule);
        info!(
            watcher = %id,
            pattern,
            regex = options.use_regex,
            priority = options.priority,
            "watcher registered"
        );
        Ok(id)
    }

    /// Remove a rule. Returns `false` if `id` is unknown.
    pub fn unregister(&self, id: WatcherId) -> bool {
        let mut rules = lock(&self.rules);
        let before = rules.len();
        rules.retain(|rule| rule.id != id);
        let removed = rules.len() != before;
        if removed {
            info!(watcher = %id, "watcher removed");
        }
        removed
    }

    /// Switch a rule on or off. Returns `false` if `id` is unknown.
    pub fn set_enabled(&self, id: WatcherId, enabled: bool) -> bool {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|rule| rule.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                debug!(watcher = %id, enabled, "watcher toggled");
                true
            }
            None => false,
        }
    }

    /// Snapshot of every rule in registration order.
    pub fn list(&self) -> Vec<WatcherInfo> {
        let now = Utc::now();
        lock(&self.rules).iter().map(|rule| rule.info(now)).collect()
    }

    /// Route `record` to every enabled matching rule, lowest priority first.
    ///
    /// Ignored after [`shutdown`](Self::shutdown).
    pub fn dispatch(&self, record: &EventRecord) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut matched: Vec<(i32, WatcherId, Callback)> = {
            let mut rules = lock(&self.rules);
            rules
                .iter_mut()
                .filter(|rule| rule.accepts(&record.category))
                .map(|rule| {
                    rule.hits += 1;
                    (rule.priority, rule.id, Arc::clone(&rule.callback))
                })
                .collect()
        };
        if matched.is_empty() {
            return;
        }
        matched.sort_by_key(|(priority, _, _)| *priority);

        let record = Arc::new(record.clone());
        for (_, id, callback) in matched {
            let record = Arc::clone(&record);
            if !self.pool.execute(move || run_isolated(id, &callback, &record)) {
                debug!(watcher = %id, "watcher pool closed; callback skipped");
            }
        }
    }

    /// Stop accepting dispatches and wait for queued callbacks to finish.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.shutdown();
        info!("watcher dispatch stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl RecordObserver for WatcherDispatch {
    fn observe(&self, record: &EventRecord) {
        self.dispatch(record);
    }
}

impl Drop for WatcherDispatch {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn run_isolated(id: WatcherId, callback: &Callback, record: &EventRecord) {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(record))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(
            watcher = %id,
            category = %record.category,
            error = %e,
            "watcher callback failed"
        ),
        Err(payload) => error!(
            watcher = %id,
            category = %record.category,
            panic = %panic_message(payload.as_ref()),
            "watcher callback panicked"
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
