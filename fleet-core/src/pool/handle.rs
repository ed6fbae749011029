/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Completion handle returned for every submitted task.
//!
//! The pool keeps a [`Completer`] next to the job; the caller keeps a
//! [`TaskHandle`].  If the job is dropped without running (pool shut down
//! with the task still queued) the completer resolves the handle with
//! [`PoolError::Cancelled`], so no waiter can block forever.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::PoolError;

type Outcome = Result<(), PoolError>;

#[derive(Debug, Default)]
struct Completion {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

impl Completion {
    /// First resolution wins; later ones are ignored.
    fn resolve(&self, outcome: Outcome) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }
}

/// Shared future for one task.  Cheap to clone; all clones resolve together.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    inner: Arc<Completion>,
}

impl TaskHandle {
    /// Block until the task has run (or was discarded) and return its outcome.
    pub fn wait(&self) -> Result<(), PoolError> {
        let mut slot = self.inner.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            self.inner.ready.wait(&mut slot);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`, returning
    /// `None` if the task has not resolved yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), PoolError>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.inner.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return Some(outcome.clone());
            }
            if self.inner.ready.wait_until(&mut slot, deadline).timed_out() {
                return (*slot).clone();
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.outcome.lock().is_some()
    }
}

/// Producer side of a [`TaskHandle`].
#[derive(Debug)]
pub(crate) struct Completer {
    inner: Arc<Completion>,
    done: bool,
}

impl Completer {
    pub(crate) fn complete(mut self, outcome: Outcome) {
        self.inner.resolve(outcome);
        self.done = true;
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if !self.done {
            self.inner.resolve(Err(PoolError::Cancelled));
        }
    }
}

pub(crate) fn completion_pair() -> (Completer, TaskHandle) {
    let inner = Arc::new(Completion::default());
    (
        Completer {
            inner: Arc::clone(&inner),
            done: false,
        },
        TaskHandle { inner },
    )
}
