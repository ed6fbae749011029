/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Sensor fusion: reduces each raw scan to the nearest obstacle.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::middleware::LocalRuntime;
use fleet_core::{Application, ChannelKind, ComponentError, Middleware, PortSettings, SoftwareComponent};
use tracing::trace;

use crate::payload::{FusedData, RawData, FUSED_DATA, FUSED_DATA_SERVICE, RAW_DATA, RAW_DATA_SERVICE};

pub struct SensorFusion {
    runtime: Arc<LocalRuntime>,
    interval: Duration,
}

impl SensorFusion {
    pub fn new(runtime: Arc<LocalRuntime>, interval: Duration) -> Self {
        Self { runtime, interval }
    }
}

/// Nearest valid return.  Non-finite and non-positive ranges are sensor
/// noise and ignored.
pub fn fuse(raw: &RawData) -> FusedData {
    let nearest = raw
        .ranges
        .iter()
        .copied()
        .filter(|r| r.is_finite() && *r > 0.0)
        .fold(f32::INFINITY, f32::min);
    FusedData {
        seq: raw.seq,
        nearest_obstacle_m: nearest,
    }
}

impl Application for SensorFusion {
    fn initialize(&self, component: &mut SoftwareComponent) -> Result<(), ComponentError> {
        let raw_mw: Arc<dyn Middleware<RawData>> = self.runtime.clone();
        let fused_mw: Arc<dyn Middleware<FusedData>> = self.runtime.clone();

        let raw = component.add_inbound(
            RAW_DATA,
            ChannelKind::Event,
            PortSettings::new(RAW_DATA_SERVICE).with_interval(self.interval),
            raw_mw,
        )?;
        let fused = component.add_outbound(
            FUSED_DATA,
            ChannelKind::Event,
            PortSettings::new(FUSED_DATA_SERVICE).with_interval(self.interval),
            fused_mw,
        )?;

        raw.set_handler(move |scan| {
            let data = fuse(&scan);
            trace!(seq = data.seq, nearest = data.nearest_obstacle_m, "scan fused");
            fused.write_data(data);
        });
        Ok(())
    }
}
