/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Port failure taxonomy.
//!
//! Every variant is a value, never a fault: the port logs it where it
//! happens, skips the affected cycle and carries on.  The next poll cycle
//! is the retry.  Nothing escalates to the owning component.

use thiserror::Error;

use crate::middleware::{InstanceSpecifier, MiddlewareError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    /// Searching for, offering, or binding to `service` failed.
    #[error("port '{port}': discovery of '{service}' failed: {source}")]
    DiscoveryFailed {
        port: String,
        service: InstanceSpecifier,
        source: MiddlewareError,
    },

    #[error("port '{port}': subscribe failed: {source}")]
    SubscribeFailed {
        port: String,
        source: MiddlewareError,
    },

    #[error("port '{port}': publish failed: {source}")]
    PublishFailed {
        port: String,
        source: MiddlewareError,
    },

    #[error("port '{port}': reading new samples failed: {source}")]
    ReadFailed {
        port: String,
        source: MiddlewareError,
    },
}

impl PortError {
    /// Name of the port the failure happened on.
    pub fn port(&self) -> &str {
        match self {
            PortError::DiscoveryFailed { port, .. }
            | PortError::SubscribeFailed { port, .. }
            | PortError::PublishFailed { port, .. }
            | PortError::ReadFailed { port, .. } => port,
        }
    }
}
