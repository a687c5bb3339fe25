//! Bounded pool of validation workers.
//!
//! Each worker is a dedicated OS thread that owns one
//! [`WorkerEngineCache`]. Jobs are closures sent over a channel; the worker
//! runs them against its cache and the result comes back through a
//! `tokio::sync::oneshot`, so async handlers can await validation without
//! blocking the runtime. Because workers are long-lived and bounded, each
//! forks at most one engine instance for its lifetime (plus one per reset).

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::cache::{EnginePrototype, WorkerEngineCache};
use crate::engine::Engine;
use crate::error::PoolError;

/// Stack size of worker threads. Deeply nested resources need more than the
/// default.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

type Job<E> = Box<dyn FnOnce(&mut WorkerEngineCache<E>) + Send + 'static>;

/// A fixed set of validation workers sharing one engine prototype.
pub struct ValidationPool<E: Engine> {
    sender: Option<mpsc::Sender<Job<E>>>,
    workers: Vec<JoinHandle<()>>,
    prototype: Arc<EnginePrototype<E>>,
}

impl<E: Engine> ValidationPool<E> {
    /// Starts `size` workers (at least one).
    pub fn new(prototype: Arc<EnginePrototype<E>>, size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job<E>>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for worker in 0..size {
            let receiver = Arc::clone(&receiver);
            let prototype = Arc::clone(&prototype);
            let handle = thread::Builder::new()
                .name(format!("hfv-worker-{worker}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || worker_loop(worker, receiver, prototype))?;
            workers.push(handle);
        }

        info!(workers = size, "Validation worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
            prototype,
        })
    }

    /// Runs `job` on the next free worker and returns its result.
    ///
    /// If the job panics the worker discards its engine instance, keeps
    /// serving, and this call fails with [`PoolError::WorkerLost`].
    pub async fn run<F, R>(&self, job: F) -> Result<R, PoolError>
    where
        F: FnOnce(&mut WorkerEngineCache<E>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job<E> = Box::new(move |cache| {
            // The receiver may be gone if the request was cancelled.
            let _ = tx.send(job(cache));
        });

        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;
        sender.send(job).map_err(|_| PoolError::Closed)?;
        rx.await.map_err(|_| PoolError::WorkerLost)
    }

    /// Returns the number of workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Returns the shared engine prototype slot.
    pub fn prototype(&self) -> &Arc<EnginePrototype<E>> {
        &self.prototype
    }
}

impl<E: Engine> Drop for ValidationPool<E> {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop once queued jobs finish.
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("Validation worker terminated abnormally");
            }
        }
        debug!("Validation worker pool stopped");
    }
}

fn worker_loop<E: Engine>(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job<E>>>>,
    prototype: Arc<EnginePrototype<E>>,
) {
    let mut cache = WorkerEngineCache::new(worker, prototype);
    debug!(worker, "Validation worker started");

    loop {
        let job = {
            let receiver = receiver.lock();
            receiver.recv()
        };
        let Ok(job) = job else { break };

        if catch_unwind(AssertUnwindSafe(|| job(&mut cache))).is_err() {
            error!(worker, "Validation job panicked, resetting worker engine");
            cache.invalidate();
        }
    }

    debug!(worker, "Validation worker stopped");
}
