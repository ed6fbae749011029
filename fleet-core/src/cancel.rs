/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Cooperative shutdown token.
//!
//! A [`ShutdownToken`] is created by the process entry point and handed to
//! every [`SoftwareComponent`](crate::component::SoftwareComponent) at
//! construction.  Nothing is interrupted forcibly: loops poll
//! [`is_cancelled`](ShutdownToken::is_cancelled) between sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable, thread-safe cancellation flag.  All clones observe the same
/// state; cancelling is one-way.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown.  Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
