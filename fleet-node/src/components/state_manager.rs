/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! State manager: derives the vehicle's drive state from fused data and
//! publishes it as a field, only when it changes.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::middleware::LocalRuntime;
use fleet_core::{
    Application, ChannelKind, ComponentError, Middleware, PortSettings, SendMode, SoftwareComponent,
};
use tracing::info;

use crate::payload::{
    DriveState, FusedData, DRIVE_STATE, DRIVE_STATE_SERVICE, FUSED_DATA, FUSED_DATA_SERVICE,
};

/// Closer than this: stop.
pub const BRAKING_DISTANCE_M: f32 = 1.0;
/// Closer than this: slow down.
pub const CAUTION_DISTANCE_M: f32 = 3.0;

pub struct StateManager {
    runtime: Arc<LocalRuntime>,
    interval: Duration,
}

impl StateManager {
    pub fn new(runtime: Arc<LocalRuntime>, interval: Duration) -> Self {
        Self { runtime, interval }
    }
}

pub fn classify(nearest_obstacle_m: f32) -> DriveState {
    if nearest_obstacle_m < BRAKING_DISTANCE_M {
        DriveState::Braking
    } else if nearest_obstacle_m < CAUTION_DISTANCE_M {
        DriveState::Cautious
    } else {
        DriveState::Cruising
    }
}

impl Application for StateManager {
    fn initialize(&self, component: &mut SoftwareComponent) -> Result<(), ComponentError> {
        let fused_mw: Arc<dyn Middleware<FusedData>> = self.runtime.clone();
        let state_mw: Arc<dyn Middleware<DriveState>> = self.runtime.clone();

        let fused = component.add_inbound(
            FUSED_DATA,
            ChannelKind::Event,
            PortSettings::new(FUSED_DATA_SERVICE).with_interval(self.interval),
            fused_mw,
        )?;
        let drive_state = component.add_outbound(
            DRIVE_STATE,
            ChannelKind::Field,
            PortSettings::new(DRIVE_STATE_SERVICE)
                .with_interval(self.interval)
                .with_send_mode(SendMode::OnUpdate),
            state_mw,
        )?;

        // initial field value, published on the first tick
        drive_state.write_data(DriveState::Stopped);

        let mut current = DriveState::Stopped;
        fused.set_handler(move |data| {
            let next = classify(data.nearest_obstacle_m);
            if next != current {
                info!(from = %current, to = %next, nearest_m = data.nearest_obstacle_m, "drive state changed");
                current = next;
                drive_state.write_data(next);
            }
        });
        Ok(())
    }
}
