/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Calc: turns fused data and the current drive state into a control
//! command.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::middleware::LocalRuntime;
use fleet_core::{
    Application, ChannelKind, ComponentError, Middleware, PortSettings, ReceiveMode,
    SoftwareComponent,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::payload::{
    ControlData, DriveState, FusedData, CONTROL_DATA, CONTROL_DATA_SERVICE, DRIVE_STATE,
    DRIVE_STATE_SERVICE, FUSED_DATA, FUSED_DATA_SERVICE,
};

pub const CRUISE_SPEED_MPS: f32 = 10.0;
pub const CAUTIOUS_SPEED_MPS: f32 = 2.0;
/// Steering applied while an obstacle is within caution distance.
pub const EVASIVE_STEERING_RAD: f32 = 0.1;

pub struct Calc {
    runtime: Arc<LocalRuntime>,
    interval: Duration,
}

impl Calc {
    pub fn new(runtime: Arc<LocalRuntime>, interval: Duration) -> Self {
        Self { runtime, interval }
    }
}

/// Speed limited by the drive state and by the distance to the obstacle.
pub fn control(fused: &FusedData, state: DriveState) -> ControlData {
    let nearest = fused.nearest_obstacle_m;
    let speed_mps = match state {
        DriveState::Stopped | DriveState::Braking => 0.0,
        DriveState::Cautious => CAUTIOUS_SPEED_MPS.min(nearest * 0.5),
        DriveState::Cruising => CRUISE_SPEED_MPS.min(nearest * 2.0),
    };
    let steering_rad = match state {
        DriveState::Cautious | DriveState::Braking => EVASIVE_STEERING_RAD,
        DriveState::Stopped | DriveState::Cruising => 0.0,
    };
    ControlData {
        seq: fused.seq,
        speed_mps,
        steering_rad,
    }
}

impl Application for Calc {
    fn initialize(&self, component: &mut SoftwareComponent) -> Result<(), ComponentError> {
        let fused_mw: Arc<dyn Middleware<FusedData>> = self.runtime.clone();
        let state_mw: Arc<dyn Middleware<DriveState>> = self.runtime.clone();
        let control_mw: Arc<dyn Middleware<ControlData>> = self.runtime.clone();

        let fused = component.add_inbound(
            FUSED_DATA,
            ChannelKind::Event,
            PortSettings::new(FUSED_DATA_SERVICE).with_interval(self.interval),
            fused_mw,
        )?;
        // state changes are rare and must apply at once
        let drive_state = component.add_inbound(
            DRIVE_STATE,
            ChannelKind::Field,
            PortSettings::new(DRIVE_STATE_SERVICE)
                .with_interval(self.interval)
                .with_receive_mode(ReceiveMode::Triggered),
            state_mw,
        )?;
        let command = component.add_outbound(
            CONTROL_DATA,
            ChannelKind::Event,
            PortSettings::new(CONTROL_DATA_SERVICE).with_interval(self.interval),
            control_mw,
        )?;

        let state = Arc::new(Mutex::new(DriveState::default()));

        let latest = Arc::clone(&state);
        drive_state.set_handler(move |next| {
            debug!(state = %next, "drive state received");
            *latest.lock() = next;
        });

        fused.set_handler(move |data| {
            let current = *state.lock();
            let cmd = control(&data, current);
            trace!(seq = cmd.seq, speed = cmd.speed_mps, state = %current, "control computed");
            command.write_data(cmd);
        });
        Ok(())
    }
}
