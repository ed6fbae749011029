/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Fleet node – the concrete components and the glue that runs them.
//!
//! ```text
//! lib.rs
//! ├── payload       – payload types, service and channel names
//! └── components/   – Sensor, SensorFusion, StateManager, Calc, Actuator / SimActuator
//! ```

pub mod components;
pub mod payload;

use fleet_core::{Application, ComponentConfig, ComponentError, ShutdownToken, SoftwareComponent};
use tracing::{error, info};

/// Create, initialize and start one component, then block until it has
/// been terminated (normally by cancelling `token`).
pub fn run_component(
    name: &str,
    app: &dyn Application,
    config: ComponentConfig,
    token: ShutdownToken,
) -> Result<(), ComponentError> {
    let mut component = SoftwareComponent::new(name, config, token)?;
    component.initialize(app)?;

    info!(component = name, ports = ?component.port_names(), "component ready");
    let result = component.start();
    if let Err(e) = &result {
        error!(component = name, error = %e, "component did not run");
    }
    result
}
