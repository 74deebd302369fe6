//! Fixed-size worker pool for watcher callbacks.

use std::{
    sync::{Mutex, MutexGuard},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, warn};

use virax_contracts::error::{ViraxError, ViraxResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// `size` threads pulling jobs from one shared queue.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> ViraxResult<Self> {
        if size == 0 {
            return Err(ViraxError::Config {
                reason: "watcher pool needs at least one worker".to_string(),
            });
        }

        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("virax-watch-{index}"))
                .spawn(move || {
                    // Ends once every sender is gone and the queue is empty.
                    for job in receiver.iter() {
                        job();
                    }
                })
                .map_err(|e| ViraxError::Lifecycle {
                    reason: format!("failed to spawn watcher worker: {e}"),
                })?;
            workers.push(handle);
        }
        debug!(workers = size, "watcher pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Queue `job`. Returns `false` once the pool is shut down.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match lock(&self.sender).as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs, let queued ones finish, and join the workers.
    pub fn shutdown(&self) {
        drop(lock(&self.sender).take());

        let workers = std::mem::take(&mut *lock(&self.workers));
        let current = thread::current().id();
        for handle in workers {
            // A callback that drops the last handle would otherwise join itself.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("watcher worker exited abnormally");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
