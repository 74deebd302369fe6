//! The ingestion pipeline: chain extension and batched durable commit.
//!
//! ```text
//!   submit ──► canonicalize ──► [head lock: stamp, hash, advance, enqueue] ──► observer
//!                                                  │
//!                                    bounded queue ▼
//!                                           commit worker ──► EventStore::insert_batch
//! ```
//!
//! The chain-head mutex is the only point that orders the chain. Records are
//! pushed onto the queue while that mutex is still held, so queue order, and
//! therefore commit order, is exactly link order even with many concurrent
//! producers. The push is `try_send`, so the lock is never held across a
//! blocking operation.
//!
//! Overload policy: when the queue is full the record is dropped and a
//! warning logged. The head has already advanced past the dropped record, so
//! the persisted chain will show a break at the next committed record. A
//! failed batch commit is likewise logged and discarded, not retried.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use virax_chain::{canonicalize, Unsealed};
use virax_contracts::{
    error::{ViraxError, ViraxResult},
    record::now_timestamp,
    EventRecord, PipelineConfig,
};

use crate::{
    heartbeat::HeartbeatEmitter,
    traits::{EventStore, RecordObserver},
};

/// Lifecycle of an [`IngestionPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Constructed; submissions are queued but nothing is committed yet.
    Created,
    /// Background workers are running.
    Running,
    /// Shutdown requested; the queue is being flushed.
    Draining,
    /// Workers joined (or abandoned) and the store closed.
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Created => "created",
            PipelineState::Running => "running",
            PipelineState::Draining => "draining",
            PipelineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Records linked into the chain and queued.
    pub submitted: u64,
    /// Records refused: queue full, or submitted after shutdown began.
    pub dropped: u64,
    /// Records durably committed.
    pub committed: u64,
    /// Batches the store rejected; their records are lost.
    pub failed_batches: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    dropped: AtomicU64,
    committed: AtomicU64,
    failed_batches: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
        }
    }
}

// ── Worker handles ────────────────────────────────────────────────────────────

/// Sends on the worker's completion channel when dropped, including while
/// unwinding from a panic.
struct DoneSignal(Sender<()>);

impl Drop for DoneSignal {
    fn drop(&mut self) {
        let _ = self.0.try_send(());
    }
}

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    fn spawn(name: &'static str, body: impl FnOnce() + Send + 'static) -> ViraxResult<Self> {
        let (done_tx, done_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = DoneSignal(done_tx);
                body();
            })
            .map_err(|e| ViraxError::Lifecycle {
                reason: format!("failed to spawn {}: {}", name, e),
            })?;
        Ok(Self {
            name,
            handle,
            done: done_rx,
        })
    }

    /// Join if the worker finishes within `timeout`; otherwise detach it.
    fn join_within(self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    error!(worker = self.name, "worker panicked before shutdown");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    worker = self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "worker did not stop in time; abandoning it and any in-flight batch"
                );
                false
            }
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Accepts events, links them into the hash chain, and commits them to an
/// [`EventStore`] in batches on a background thread.
///
/// # Thread safety
///
/// `submit` takes `&self` and may be called from any number of threads. The
/// pipeline is usually shared behind an `Arc`.
pub struct IngestionPipeline {
    config: PipelineConfig,
    store: Arc<dyn EventStore>,
    observer: Option<Arc<dyn RecordObserver>>,

    /// Hash of the most recently submitted record.
    head: Mutex<String>,
    queue: Sender<EventRecord>,
    /// Interrupts the commit worker's idle wait when shutdown begins.
    wake: Sender<()>,
    wake_receiver: Receiver<()>,
    /// Held until `start` hands it to the commit worker.
    pending_receiver: Mutex<Option<Receiver<EventRecord>>>,

    state: Mutex<PipelineState>,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
    workers: Mutex<Vec<Worker>>,
}

impl IngestionPipeline {
    /// Build a pipeline in the `Created` state, resuming the chain from the
    /// store's last hash.
    ///
    /// Fails if the configuration is invalid or the store cannot be read.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn EventStore>,
        observer: Option<Arc<dyn RecordObserver>>,
    ) -> ViraxResult<Self> {
        config.validate()?;
        let head = store.last_hash()?;
        let (queue, receiver) = bounded(config.queue_capacity);
        let (wake, wake_receiver) = bounded(1);

        Ok(Self {
            config,
            store,
            observer,
            head: Mutex::new(head),
            queue,
            wake,
            wake_receiver,
            pending_receiver: Mutex::new(Some(receiver)),
            state: Mutex::new(PipelineState::Created),
            stop: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// [`new`](Self::new) followed by [`start`](Self::start).
    pub fn launch(
        config: PipelineConfig,
        store: Arc<dyn EventStore>,
        observer: Option<Arc<dyn RecordObserver>>,
    ) -> ViraxResult<Self> {
        let pipeline = Self::new(config, store, observer)?;
        pipeline.start()?;
        Ok(pipeline)
    }

    /// Start the commit worker and, if enabled, the heartbeat emitter.
    /// Moves `Created → Running`; calling it in any other state is an error.
    pub fn start(&self) -> ViraxResult<()> {
        let mut state = lock(&self.state);
        if *state != PipelineState::Created {
            return Err(ViraxError::Lifecycle {
                reason: format!("cannot start a pipeline that is {}", *state),
            });
        }

        let receiver = lock(&self.pending_receiver)
            .take()
            .ok_or_else(|| ViraxError::Lifecycle {
                reason: "commit queue receiver already taken".to_string(),
            })?;

        let mut workers = lock(&self.workers);

        let committer = CommitWorker {
            receiver,
            wake: self.wake_receiver.clone(),
            store: Arc::clone(&self.store),
            stop: Arc::clone(&self.stop),
            counters: Arc::clone(&self.counters),
            batch_size: self.config.batch_size,
            max_delay: self.config.max_delay(),
            poll_interval: self.config.poll_interval(),
        };
        workers.push(Worker::spawn("virax-commit", move || committer.run())?);

        if self.config.heartbeat_enabled {
            let emitter = HeartbeatEmitter::new(
                Arc::clone(&self.store),
                self.config.heartbeat_interval(),
                Arc::clone(&self.stop),
            );
            match Worker::spawn("virax-heartbeat", move || emitter.run()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    self.stop.store(true, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        *state = PipelineState::Running;
        let head = lock(&self.head);
        info!(
            session_id = %self.config.session_id,
            head = %short(&head),
            algorithm = %self.config.algorithm,
            "ingestion pipeline started"
        );
        Ok(())
    }

    /// Link an event into the chain and queue it for commit.
    ///
    /// Never blocks on I/O and never fails from the caller's point of view:
    /// a full queue or a pipeline that is shutting down drops the event with
    /// a warning. Accepted records are then handed to the observer.
    pub fn submit<P>(&self, level: &str, category: &str, source: &str, payload: &P)
    where
        P: Serialize + fmt::Debug + ?Sized,
    {
        let unsealed = Unsealed {
            timestamp: String::new(),
            session_id: self.config.session_id.clone(),
            level: level.to_uppercase(),
            category: category.to_string(),
            source: source.to_string(),
            payload: canonicalize(payload),
        };

        let record = {
            let mut head = lock(&self.head);

            if self.stop.load(Ordering::SeqCst) {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(category = %category, "pipeline is shutting down; event dropped");
                return;
            }

            let record = Unsealed {
                timestamp: now_timestamp(),
                ..unsealed
            }
            .seal(&head, self.config.algorithm);
            *head = record.hash.clone();

            match self.queue.try_send(record.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        category = %category,
                        capacity = self.config.queue_capacity,
                        "commit queue is full; event dropped"
                    );
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(category = %category, "commit worker is gone; event dropped");
                    return;
                }
            }
            record
        };

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        if let Some(observer) = &self.observer {
            observer.observe(&record);
        }
    }

    /// Drain the queue, stop the workers, and close the store.
    ///
    /// Workers get at most `timeout` in total to finish. A worker that is
    /// still running after that is abandoned, and whatever batch it holds
    /// may never be committed. Calling `shutdown` again is a no-op.
    pub fn shutdown(&self, timeout: Duration) -> ViraxResult<()> {
        {
            let mut state = lock(&self.state);
            match *state {
                PipelineState::Draining | PipelineState::Stopped => return Ok(()),
                PipelineState::Created | PipelineState::Running => *state = PipelineState::Draining,
            }
        }
        info!(session_id = %self.config.session_id, "ingestion pipeline draining");

        // Raised under the head lock: every record accepted before this
        // point is already in the queue.
        {
            let _head = lock(&self.head);
            self.stop.store(true, Ordering::SeqCst);
        }
        // Full means a wake-up is already pending.
        let _ = self.wake.try_send(());

        let deadline = Instant::now() + timeout;
        let workers = std::mem::take(&mut *lock(&self.workers));
        let mut abandoned = 0usize;
        for worker in workers {
            if !worker.join_within(deadline.saturating_duration_since(Instant::now())) {
                abandoned += 1;
            }
        }

        let unstarted = lock(&self.pending_receiver).take().map_or(0, |rx| rx.len());
        if unstarted > 0 {
            warn!(records = unstarted, "pipeline was never started; queued events discarded");
        }

        let closed = self.store.close();
        *lock(&self.state) = PipelineState::Stopped;

        let stats = self.stats();
        info!(
            submitted = stats.submitted,
            committed = stats.committed,
            dropped = stats.dropped,
            failed_batches = stats.failed_batches,
            abandoned_workers = abandoned,
            "ingestion pipeline stopped"
        );
        closed
    }

    pub fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Hash of the most recently submitted record (not necessarily committed).
    pub fn head(&self) -> String {
        lock(&self.head).clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        if matches!(self.state(), PipelineState::Created | PipelineState::Running) {
            if let Err(e) = self.shutdown(self.config.shutdown_timeout()) {
                error!(error = %e, "shutdown on drop failed");
            }
        }
    }
}

// ── Commit worker ─────────────────────────────────────────────────────────────

struct CommitWorker {
    receiver: Receiver<EventRecord>,
    wake: Receiver<()>,
    store: Arc<dyn EventStore>,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
    batch_size: usize,
    max_delay: Duration,
    poll_interval: Duration,
}

impl CommitWorker {
    /// Batch records until the batch is full or `max_delay` has passed since
    /// the last commit; flush partial batches whenever the queue goes quiet.
    /// A shutdown wake-up ends the wait at once; whatever is still queued is
    /// then drained and committed before the worker exits.
    fn run(self) {
        let mut batch: Vec<EventRecord> = Vec::with_capacity(self.batch_size);
        let mut last_commit = Instant::now();
        let mut disconnected = false;

        while !disconnected && !self.stop.load(Ordering::SeqCst) {
            select! {
                recv(self.receiver) -> message => match message {
                    Ok(record) => {
                        batch.push(record);
                        if batch.len() >= self.batch_size || last_commit.elapsed() >= self.max_delay {
                            self.commit(&mut batch);
                            last_commit = Instant::now();
                        }
                    }
                    Err(_) => disconnected = true,
                },
                recv(self.wake) -> _ => {}
                default(self.poll_interval) => {
                    if !batch.is_empty() {
                        self.commit(&mut batch);
                        last_commit = Instant::now();
                    }
                }
            }
        }

        // `stop` is raised under the head lock, so nothing is queued after it.
        for record in self.receiver.try_iter() {
            batch.push(record);
            if batch.len() >= self.batch_size {
                self.commit(&mut batch);
            }
        }
        if !batch.is_empty() {
            self.commit(&mut batch);
        }
        debug!("commit worker exited");
    }

    fn commit(&self, batch: &mut Vec<EventRecord>) {
        match self.store.insert_batch(batch) {
            Ok(()) => {
                self.counters
                    .committed
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                debug!(records = batch.len(), "batch committed");
            }
            Err(e) => {
                self.counters.failed_batches.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, records = batch.len(), "batch commit failed; batch discarded");
            }
        }
        batch.clear();
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Lock, recovering from poisoning. Every value guarded in this module stays
/// consistent even if a holder panicked mid-critical-section.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}
