/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Range sensor: publishes a synthetic scan every sample period.

use std::sync::Arc;
use std::time::Duration;

use fleet_core::middleware::LocalRuntime;
use fleet_core::{Application, ChannelKind, ComponentError, Middleware, PortSettings, SoftwareComponent};
use tracing::trace;

use crate::payload::{RawData, RAW_DATA, RAW_DATA_SERVICE};

/// Beams per scan.
pub const BEAMS: usize = 16;

pub struct Sensor {
    runtime: Arc<LocalRuntime>,
    period: Duration,
}

impl Sensor {
    pub fn new(runtime: Arc<LocalRuntime>, period: Duration) -> Self {
        Self { runtime, period }
    }
}

/// Scan `seq` of an obstacle that slowly approaches and recedes.
pub fn synthetic_scan(seq: u64) -> RawData {
    let phase = seq as f32 * 0.05;
    let obstacle = 5.0 + 4.5 * phase.sin();
    let ranges = (0..BEAMS)
        .map(|beam| {
            // the centre beam sees the obstacle, the others see further
            let offset = (beam as f32 - (BEAMS / 2) as f32).abs();
            obstacle + offset * 0.5
        })
        .collect();
    RawData { seq, ranges }
}

impl Application for Sensor {
    fn initialize(&self, component: &mut SoftwareComponent) -> Result<(), ComponentError> {
        let middleware: Arc<dyn Middleware<RawData>> = self.runtime.clone();
        let raw = component.add_outbound(
            RAW_DATA,
            ChannelKind::Event,
            PortSettings::new(RAW_DATA_SERVICE).with_interval(self.period),
            middleware,
        )?;

        let mut seq = 0u64;
        component.add_periodic("sample", self.period, move || {
            seq += 1;
            trace!(seq, "scan sampled");
            raw.write_data(synthetic_scan(seq));
        })
    }
}
