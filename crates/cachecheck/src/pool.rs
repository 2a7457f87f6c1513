//! # Worker Pool
//!
//! A dynamically-scaled pool of OS threads with fire-and-forget submission
//! and polling retrieval of results.
//!
//! Workers are not pre-allocated. A manager thread waits for the "new job"
//! signal and spawns one worker per waiting job, never exceeding
//! `max_workers` live workers. Workers persist until [`WorkerPool::close`]
//! injects a termination marker, which every worker re-enqueues before
//! exiting so that its siblings observe it too.
//!
//! A job that panics does not take its worker down: the panic is caught and
//! delivered as [`JobError::Panicked`] in place of the job's result.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::error::{JobError, PoolError};

/// Outcome of a single job.
pub type JobResult<T> = Result<T, JobError>;

type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

enum Message<T> {
    Run(Job<T>),
    Terminate,
}

/// Auto-reset event: `set` wakes the waiter, `wait` consumes the flag.
#[derive(Default)]
struct Signal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    fn set(&self) {
        let mut flag = self.flag.lock();
        *flag = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut flag = self.flag.lock();
        while !*flag {
            self.cond.wait(&mut flag);
        }
        *flag = false;
    }
}

/// Handle to a worker thread spawned by the pool.
pub struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker thread exits.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

struct Shared<T> {
    max_workers: Option<usize>,
    in_tx: Sender<Message<T>>,
    in_rx: Receiver<Message<T>>,
    out_tx: Sender<JobResult<T>>,
    new_job: Signal,
    closing: AtomicBool,
    workers: Mutex<Vec<Worker>>,
    spawned: AtomicUsize,
}

/// Dynamically-scaled thread pool producing results of type `T`.
pub struct WorkerPool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    out_rx: Receiver<JobResult<T>>,
    manager: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool and start its manager thread.
    ///
    /// `None` lets the pool grow to one worker per waiting job.
    pub fn new(max_workers: Option<usize>) -> Result<Self, PoolError> {
        if max_workers == Some(0) {
            return Err(PoolError::InvalidSize);
        }

        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let shared = Arc::new(Shared {
            max_workers,
            in_tx,
            in_rx,
            out_tx,
            new_job: Signal::default(),
            closing: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            spawned: AtomicUsize::new(0),
        });

        let manager_shared = Arc::clone(&shared);
        let manager = thread::Builder::new()
            .name("cachecheck-pool-manager".to_string())
            .spawn(move || manage_workers(manager_shared))
            .map_err(|e| PoolError::Spawn(e.to_string()))?;
        debug!(max_workers = ?max_workers, "Pool manager started");

        Ok(Self {
            shared,
            out_rx,
            manager: Some(manager),
        })
    }

    /// Enqueue a job without blocking.
    pub fn request<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        self.shared
            .in_tx
            .send(Message::Run(Box::new(job)))
            .map_err(|_| PoolError::Closed)?;
        self.shared.new_job.set();
        Ok(())
    }

    /// Wait for the next finished job, in completion order.
    ///
    /// Returns `None` when `timeout` elapses first. `None` as the timeout
    /// waits indefinitely.
    pub fn receive(&self, timeout: Option<Duration>) -> Option<JobResult<T>> {
        match timeout {
            Some(timeout) => match self.out_rx.recv_timeout(timeout) {
                Ok(result) => Some(result),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(timeout = ?timeout, "Timed out waiting for job result");
                    None
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.out_rx.recv().ok(),
        }
    }

    /// Number of workers spawned and not yet reaped.
    pub fn worker_count(&self) -> usize {
        self.shared.workers.lock().len()
    }

    /// Jobs waiting for a worker.
    pub fn pending_jobs(&self) -> usize {
        self.shared.in_rx.len()
    }

    pub fn max_workers(&self) -> Option<usize> {
        self.shared.max_workers
    }

    /// Stop the pool and reap its workers.
    ///
    /// Jobs queued before the call still run. Workers are given up to `grace`
    /// to exit; the ones still alive afterwards are returned.
    pub fn close(&mut self, grace: Duration) -> Vec<Worker> {
        let Some(manager) = self.manager.take() else {
            return Vec::new();
        };

        self.shared.closing.store(true, Ordering::SeqCst);
        self.shared.new_job.set();
        let _ = self.shared.in_tx.send(Message::Terminate);

        if manager.join().is_err() {
            warn!("Pool manager panicked before shutdown");
        }

        let workers = std::mem::take(&mut *self.shared.workers.lock());
        reap_workers(workers, grace)
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        if self.manager.is_some() {
            let remaining = self.close(Duration::ZERO);
            if !remaining.is_empty() {
                debug!(
                    remaining = remaining.len(),
                    "Detaching workers still running at drop"
                );
            }
        }
    }
}

fn manage_workers<T: Send + 'static>(shared: Arc<Shared<T>>) {
    while !shared.closing.load(Ordering::SeqCst) {
        shared.new_job.wait();
        if shared.closing.load(Ordering::SeqCst) {
            break;
        }

        let pending = shared.in_rx.len();
        if pending == 0 {
            continue;
        }

        let mut workers = shared.workers.lock();
        let allowed = match shared.max_workers {
            Some(max) => max.saturating_sub(workers.len()),
            None => pending,
        };
        if allowed == 0 {
            continue;
        }

        let to_spawn = pending.min(allowed);
        debug!(
            requested = pending,
            allowed,
            pool_size = workers.len(),
            max_workers = ?shared.max_workers,
            "Growing worker pool"
        );

        for _ in 0..to_spawn {
            let id = shared.spawned.fetch_add(1, Ordering::SeqCst);
            let name = format!("cachecheck-worker-{id}");
            let worker_shared = Arc::clone(&shared);
            match thread::Builder::new()
                .name(name.clone())
                .spawn(move || consume(worker_shared))
            {
                Ok(handle) => {
                    workers.push(Worker { name, handle });
                }
                Err(e) => {
                    warn!(worker = %name, error = %e, pool_size = workers.len(), "Failed to spawn worker");
                }
            }
        }
    }
    debug!("Pool manager quitting");
}

fn consume<T: Send + 'static>(shared: Arc<Shared<T>>) {
    let me = thread::current();
    let name = me.name().unwrap_or("worker");

    while let Ok(message) = shared.in_rx.recv() {
        match message {
            Message::Terminate => {
                debug!(worker = %name, "Received termination marker");
                let _ = shared.in_tx.send(Message::Terminate);
                break;
            }
            Message::Run(job) => {
                let result = panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
                    let msg = panic_message(payload.as_ref());
                    error!(worker = %name, error = %msg, "Job panicked");
                    JobError::Panicked(msg)
                });
                if shared.out_tx.send(result).is_err() {
                    break;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Join workers that exit within `timeout`; return the ones still running.
pub fn reap_workers(workers: Vec<Worker>, timeout: Duration) -> Vec<Worker> {
    debug!(total = workers.len(), "Reaping workers");
    let deadline = Instant::now() + timeout;
    let mut alive = workers;

    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            alive.into_iter().partition(Worker::is_finished);
        for worker in finished {
            let name = worker.name.clone();
            if worker.join().is_err() {
                warn!(worker = %name, "Worker exited abnormally");
            }
        }
        alive = running;

        let now = Instant::now();
        if alive.is_empty() || now >= deadline {
            break;
        }
        thread::sleep(REAP_POLL_INTERVAL.min(deadline - now));
    }

    for worker in &alive {
        debug!(worker = %worker.name, "Worker still running");
    }
    alive
}
