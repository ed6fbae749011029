/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use thiserror::Error;

/// Failure outcomes of the worker pool.
///
/// `Clone` because a [`TaskHandle`](super::TaskHandle) is a shared future:
/// every clone observes the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The pool was constructed with zero workers.
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread {index}: {reason}")]
    Spawn { index: usize, reason: String },

    /// The task was still queued when the pool shut down and never ran.
    #[error("task was discarded before it started (pool shut down)")]
    Cancelled,

    /// The task was submitted after the pool stopped accepting work.
    #[error("worker pool is shut down, task rejected")]
    ShutDown,

    /// The task panicked; the worker survived.
    #[error("task panicked: {0}")]
    Panicked(String),
}
