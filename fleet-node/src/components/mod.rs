/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Concrete fleet components.
//!
//! Each one is an [`Application`]: it only creates its ports, wires their
//! handlers and registers periodic work.  Lifecycle and scheduling come
//! from [`SoftwareComponent`](fleet_core::SoftwareComponent).

pub mod actuator;
pub mod calc;
pub mod sensor;
pub mod sensor_fusion;
pub mod state_manager;

pub use actuator::{Actuator, ActuatorStats};
pub use calc::Calc;
pub use sensor::Sensor;
pub use sensor_fusion::SensorFusion;
pub use state_manager::StateManager;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use fleet_core::middleware::LocalRuntime;
use fleet_core::Application;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ComponentKind {
    Sensor,
    SensorFusion,
    StateManager,
    Calc,
    Actuator,
    SimActuator,
}

impl ComponentKind {
    /// Pipeline order: providers before their consumers.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Sensor,
        ComponentKind::SensorFusion,
        ComponentKind::StateManager,
        ComponentKind::Calc,
        ComponentKind::Actuator,
        ComponentKind::SimActuator,
    ];

    /// Name used for logging and as the key in the configuration file.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Sensor => "sensor",
            ComponentKind::SensorFusion => "sensor_fusion",
            ComponentKind::StateManager => "state_manager",
            ComponentKind::Calc => "calc",
            ComponentKind::Actuator => "actuator",
            ComponentKind::SimActuator => "sim_actuator",
        }
    }

    /// Build the component's application with `interval` as its default
    /// port and task period.
    pub fn application(self, runtime: Arc<LocalRuntime>, interval: Duration) -> Box<dyn Application> {
        match self {
            ComponentKind::Sensor => Box::new(Sensor::new(runtime, interval)),
            ComponentKind::SensorFusion => Box::new(SensorFusion::new(runtime, interval)),
            ComponentKind::StateManager => Box::new(StateManager::new(runtime, interval)),
            ComponentKind::Calc => Box::new(Calc::new(runtime, interval)),
            ComponentKind::Actuator => Box::new(Actuator::new(runtime, interval)),
            ComponentKind::SimActuator => Box::new(Actuator::simulated(runtime, interval)),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
