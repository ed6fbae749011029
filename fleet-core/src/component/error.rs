/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Component-level failures.
//!
//! Unlike [`PortError`](crate::port::PortError), these do reach the caller:
//! they come out of construction and of lifecycle calls made in the wrong
//! order.  Runtime I/O failures never surface here.

use thiserror::Error;

use super::ComponentState;
use crate::pool::PoolError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The worker pool could not be created.
    #[error("worker pool unavailable: {0}")]
    Pool(#[from] PoolError),

    /// A port with this name is already owned by the component.
    #[error("port '{0}' is already registered")]
    DuplicatePort(String),

    /// Lifecycle call made out of order, e.g. `run()` before `initialize()`.
    #[error("cannot {operation} a component that is {state}")]
    InvalidState {
        operation: &'static str,
        state: ComponentState,
    },

    /// The application's own setup failed.
    #[error("initialization failed: {0}")]
    Initialization(String),
}
