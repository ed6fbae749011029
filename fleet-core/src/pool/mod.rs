/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Bounded worker pool.
//!
//! [`WorkerPool`] owns a fixed set of OS threads created at construction and
//! feeds them from an unbounded FIFO queue.  Every submission returns a
//! [`TaskHandle`] that resolves when *that* task completes, and
//! [`WorkerPool::wait`] parks the caller until the whole pool is quiescent.
//!
//! # Locking
//!
//! | Lock | Guards | Condvar |
//! |---|---|---|
//! | `queue` | pending tasks, `enabled` flag | `available` – a task was queued / shutdown |
//! | `activity` | running + outstanding counters | `quiescent` – outstanding reached zero |
//!
//! A worker never holds the queue lock while running user code.  The only
//! nested acquisition is `queue → activity` inside [`submit`](WorkerPool::submit),
//! which keeps "queued" and "outstanding" in step so [`wait`](WorkerPool::wait)
//! can never observe an empty queue while a task is in flight between the
//! two structures.
//!
//! # Shutdown
//! Dropping the pool (or calling [`shutdown`](WorkerPool::shutdown)) stops
//! accepting work, discards every task that has not started – their handles
//! resolve with [`PoolError::Cancelled`] – and joins all workers.  Tasks that
//! are already running are **not** interrupted; long-running cyclic loops
//! must be told to stop (see [`Port::terminate`](crate::port::Port::terminate))
//! before the pool is dropped.

pub mod error;
mod handle;

pub use error::PoolError;
pub use handle::TaskHandle;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};

use handle::{completion_pair, Completer};

// ── Internal state types ──────────────────────────────────────────────────────

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Task {
    job: Job,
    completer: Completer,
}

struct QueueState {
    tasks: VecDeque<Task>,
    enabled: bool,
}

#[derive(Default)]
struct Activity {
    /// Tasks currently executing on a worker.
    running: usize,
    /// Tasks submitted but not yet finished (queued + running).
    outstanding: usize,
}

struct Shared {
    queue: Mutex<QueueState>,
    available: Condvar,
    activity: Mutex<Activity>,
    quiescent: Condvar,
}

impl Shared {
    fn begin(&self) {
        self.activity.lock().running += 1;
    }

    fn finish(&self) {
        let mut activity = self.activity.lock();
        activity.running -= 1;
        activity.outstanding -= 1;
        if activity.outstanding == 0 {
            self.quiescent.notify_all();
        }
    }

    fn forget(&self, discarded: usize) {
        if discarded == 0 {
            return;
        }
        let mut activity = self.activity.lock();
        activity.outstanding -= discarded;
        if activity.outstanding == 0 {
            self.quiescent.notify_all();
        }
    }
}

// ── WorkerPool ────────────────────────────────────────────────────────────────

/// Fixed-size thread pool executing zero-argument tasks.
///
/// `Send + Sync`: tasks may be submitted concurrently from any thread, and a
/// component can [`wait`](Self::wait) on one thread while another thread
/// terminates its loops.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with exactly `size` worker threads.
    ///
    /// # Errors
    /// [`PoolError::NoWorkers`] for `size == 0`; [`PoolError::Spawn`] if a
    /// thread cannot be created (already-spawned workers are joined first).
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let pool = Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    enabled: true,
                }),
                available: Condvar::new(),
                activity: Mutex::new(Activity::default()),
                quiescent: Condvar::new(),
            }),
            workers: Mutex::new(Vec::with_capacity(size)),
            size,
        };

        for index in 0..size {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("fleet-worker-{index}"))
                .spawn(move || worker_loop(shared, index));

            match spawned {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(e) => {
                    error!(index, error = %e, "failed to spawn pool worker");
                    // dropping `pool` joins the workers created so far
                    return Err(PoolError::Spawn {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(workers = size, "worker pool started");
        Ok(pool)
    }

    /// Create a pool sized to the machine's hardware concurrency.
    pub fn with_default_size() -> Result<Self, PoolError> {
        Self::new(num_cpus::get())
    }

    /// Enqueue `f` and wake one idle worker.
    ///
    /// Arguments are bound by capture.  Returns a handle that resolves when
    /// this task finishes; after [`shutdown`](Self::shutdown) the handle is
    /// returned already resolved to [`PoolError::ShutDown`].
    pub fn submit<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let (completer, handle) = completion_pair();
        {
            let mut queue = self.shared.queue.lock();
            if !queue.enabled {
                drop(queue);
                // the completer must not report Cancelled for a rejected task
                completer.complete(Err(PoolError::ShutDown));
                warn!("task submitted to a shut-down worker pool – rejected");
                return handle;
            }
            self.shared.activity.lock().outstanding += 1;
            queue.tasks.push_back(Task {
                job: Box::new(f),
                completer,
            });
        }
        self.shared.available.notify_one();
        handle
    }

    /// Block until the queue is empty and no worker is running a task.
    ///
    /// Must not be called from inside a pool task (it would wait for itself).
    pub fn wait(&self) {
        let mut activity = self.shared.activity.lock();
        while activity.outstanding > 0 {
            self.shared.quiescent.wait(&mut activity);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.  Returns `true`
    /// if the pool became quiescent, `false` if tasks are still outstanding.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut activity = self.shared.activity.lock();
        while activity.outstanding > 0 {
            if self
                .shared
                .quiescent
                .wait_until(&mut activity, deadline)
                .timed_out()
            {
                return activity.outstanding == 0;
            }
        }
        true
    }

    /// Point-in-time number of executing tasks.  Diagnostic only – the value
    /// may be stale by the time the caller looks at it.
    pub fn active_count(&self) -> usize {
        self.shared.activity.lock().running
    }

    /// Point-in-time number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    pub fn worker_count(&self) -> usize {
        self.size
    }

    /// Stop accepting work, discard queued tasks and join every worker.
    ///
    /// Idempotent.  Blocks until running tasks return.
    pub fn shutdown(&self) {
        let discarded: Vec<Task> = {
            let mut queue = self.shared.queue.lock();
            queue.enabled = false;
            queue.tasks.drain(..).collect()
        };
        self.shared.available.notify_all();

        if !discarded.is_empty() {
            warn!(
                discarded = discarded.len(),
                "worker pool shutting down – queued tasks dropped without running"
            );
        }
        self.shared.forget(discarded.len());
        // resolves every discarded handle with PoolError::Cancelled
        drop(discarded);

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        if workers.is_empty() {
            return;
        }
        for worker in workers {
            if worker.join().is_err() {
                error!("pool worker terminated abnormally");
            }
        }
        debug!("worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.size)
            .field("active", &self.active_count())
            .field("queued", &self.queued())
            .finish()
    }
}

// ── Worker thread ─────────────────────────────────────────────────────────────

fn worker_loop(shared: Arc<Shared>, index: usize) {
    trace!(worker = index, "worker started");
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if !queue.enabled {
                    trace!(worker = index, "worker exiting");
                    return;
                }
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }
                shared.available.wait(&mut queue);
            }
        };

        let Task { job, completer } = task;
        shared.begin();
        let outcome = panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(worker = index, panic = %message, "pool task panicked");
            PoolError::Panicked(message)
        });
        // resolve before the counter drops so wait() implies resolved handles
        completer.complete(outcome);
        shared.finish();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
