/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fleet core – the template every software component is built from.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── pool/         – bounded worker pool with per-task completion handles
//! ├── middleware/   – abstract pub/sub collaborator + in-process LocalRuntime
//! ├── port/         – generic service port (discovery → subscription → cyclic I/O)
//! ├── component/    – SoftwareComponent orchestrator
//! ├── config/       – YAML component / port configuration
//! └── cancel        – cooperative shutdown token
//! ```

pub mod cancel;
pub mod component;
pub mod config;
pub mod middleware;
pub mod pool;
pub mod port;

pub use cancel::ShutdownToken;
pub use component::{Application, ComponentError, ComponentState, SoftwareComponent};
pub use config::{ComponentConfig, FleetConfigManager, PortSettings, ReceiveMode, SendMode};
pub use middleware::{
    ChannelKind, InstanceSpecifier, Middleware, MiddlewareError, ServiceHandle, SubscriptionState,
};
pub use pool::{PoolError, TaskHandle, WorkerPool};
pub use port::{Inbound, Outbound, Port, PortError, PortState};
