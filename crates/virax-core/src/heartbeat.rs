//! Periodic liveness records.
//!
//! The heartbeat writes to its own table and never touches the chain head,
//! so a stalled or failing heartbeat cannot affect chain integrity.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use virax_contracts::record::now_timestamp;

use crate::traits::EventStore;

/// Status written with every heartbeat.
pub const STATUS_ALIVE: &str = "alive";

/// Writes an `alive` row every `interval` until `stop` is raised.
pub struct HeartbeatEmitter {
    store: Arc<dyn EventStore>,
    interval: Duration,
    stop: Arc<AtomicBool>,
}

impl HeartbeatEmitter {
    /// Granularity at which the sleep between beats checks for shutdown.
    pub const TICK: Duration = Duration::from_millis(100);

    pub fn new(store: Arc<dyn EventStore>, interval: Duration, stop: Arc<AtomicBool>) -> Self {
        Self {
            store,
            interval,
            stop,
        }
    }

    /// Write one heartbeat. Failures are logged and reported as `false`.
    pub fn beat(&self) -> bool {
        match self.store.insert_heartbeat(&now_timestamp(), STATUS_ALIVE) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "heartbeat write failed; retrying next interval");
                false
            }
        }
    }

    /// Beat, then sleep in short ticks until the interval elapses; repeat
    /// until stopped.
    pub fn run(&self) {
        debug!(interval_secs = self.interval.as_secs(), "heartbeat emitter started");
        while !self.stopped() {
            self.beat();
            let next = Instant::now() + self.interval;
            while !self.stopped() {
                let remaining = next.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                thread::sleep(remaining.min(Self::TICK));
            }
        }
        debug!("heartbeat emitter stopped");
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
