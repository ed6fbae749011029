/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Actuator: applies control commands.
//!
//! With `simulated` set the component is the SimActuator: it integrates the
//! commanded speed into a simple vehicle model and publishes the result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleet_core::middleware::LocalRuntime;
use fleet_core::{Application, ChannelKind, ComponentError, Middleware, PortSettings, SoftwareComponent};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::payload::{
    ControlData, SimulationData, CONTROL_DATA, CONTROL_DATA_SERVICE, SIMULATION_DATA,
    SIMULATION_DATA_SERVICE,
};

/// Fraction of the speed error corrected per simulation step.
const RESPONSE: f32 = 0.5;

/// What the actuator has seen so far.  Shared with whoever built it.
#[derive(Debug, Default)]
pub struct ActuatorStats {
    commands: AtomicU64,
    last_command: Mutex<Option<ControlData>>,
    last_simulation: Mutex<Option<SimulationData>>,
}

impl ActuatorStats {
    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn last_command(&self) -> Option<ControlData> {
        *self.last_command.lock()
    }

    pub fn last_simulation(&self) -> Option<SimulationData> {
        *self.last_simulation.lock()
    }

    fn apply(&self, cmd: ControlData) {
        self.commands.fetch_add(1, Ordering::Relaxed);
        *self.last_command.lock() = Some(cmd);
    }
}

pub struct Actuator {
    runtime: Arc<LocalRuntime>,
    interval: Duration,
    simulated: bool,
    stats: Arc<ActuatorStats>,
}

impl Actuator {
    pub fn new(runtime: Arc<LocalRuntime>, interval: Duration) -> Self {
        Self {
            runtime,
            interval,
            simulated: false,
            stats: Arc::default(),
        }
    }

    pub fn simulated(runtime: Arc<LocalRuntime>, interval: Duration) -> Self {
        Self {
            simulated: true,
            ..Self::new(runtime, interval)
        }
    }

    pub fn stats(&self) -> Arc<ActuatorStats> {
        Arc::clone(&self.stats)
    }
}

/// One step of the vehicle model.
pub fn simulate(previous: SimulationData, commanded_mps: f32, dt: Duration) -> SimulationData {
    let speed_mps = previous.speed_mps + (commanded_mps - previous.speed_mps) * RESPONSE;
    SimulationData {
        seq: previous.seq + 1,
        speed_mps,
        travelled_m: previous.travelled_m + speed_mps * dt.as_secs_f32(),
    }
}

impl Application for Actuator {
    fn initialize(&self, component: &mut SoftwareComponent) -> Result<(), ComponentError> {
        let control_mw: Arc<dyn Middleware<ControlData>> = self.runtime.clone();
        let control = component.add_inbound(
            CONTROL_DATA,
            ChannelKind::Event,
            PortSettings::new(CONTROL_DATA_SERVICE).with_interval(self.interval),
            control_mw,
        )?;

        let stats = Arc::clone(&self.stats);
        control.set_handler(move |cmd| {
            trace!(seq = cmd.seq, speed = cmd.speed_mps, steering = cmd.steering_rad, "command applied");
            stats.apply(cmd);
        });

        if !self.simulated {
            return Ok(());
        }

        let sim_mw: Arc<dyn Middleware<SimulationData>> = self.runtime.clone();
        let feedback = component.add_outbound(
            SIMULATION_DATA,
            ChannelKind::Event,
            PortSettings::new(SIMULATION_DATA_SERVICE).with_interval(self.interval),
            sim_mw,
        )?;

        let stats = Arc::clone(&self.stats);
        let dt = self.interval;
        let mut vehicle = SimulationData::default();
        component.add_periodic("simulate", dt, move || {
            let commanded = stats.last_command().map_or(0.0, |c| c.speed_mps);
            vehicle = simulate(vehicle, commanded, dt);
            *stats.last_simulation.lock() = Some(vehicle);
            if vehicle.seq % 50 == 0 {
                debug!(speed = vehicle.speed_mps, travelled = vehicle.travelled_m, "simulation step");
            }
            feedback.write_data(vehicle);
        })
    }
}
