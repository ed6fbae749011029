/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Payload types and service names of the fleet pipeline.
//!
//! ```text
//!  Sensor ──raw_data──► SensorFusion ──fused_data──┬──► Calc ──control_data──► Actuator
//!                                                  └──► StateManager             SimActuator ──simulation_data──►
//!                                   StateManager ──drive_state (field)──► Calc
//! ```
//!
//! A channel is identified by the provider's service plus the port name, so
//! producer and consumer ports of one channel share the same name.

use std::fmt;

// ── Services ──────────────────────────────────────────────────────────────────

pub const RAW_DATA_SERVICE: &str = "Sensor/RawData";
pub const FUSED_DATA_SERVICE: &str = "SensorFusion/FusedData";
pub const CONTROL_DATA_SERVICE: &str = "Calc/ControlData";
pub const DRIVE_STATE_SERVICE: &str = "StateManager/DriveState";
pub const SIMULATION_DATA_SERVICE: &str = "SimActuator/SimulationData";

// ── Channels ──────────────────────────────────────────────────────────────────

pub const RAW_DATA: &str = "raw_data";
pub const FUSED_DATA: &str = "fused_data";
pub const CONTROL_DATA: &str = "control_data";
pub const DRIVE_STATE: &str = "drive_state";
pub const SIMULATION_DATA: &str = "simulation_data";

// ── Payloads ──────────────────────────────────────────────────────────────────

/// One range scan, metres per beam.
#[derive(Debug, Clone, PartialEq)]
pub struct RawData {
    pub seq: u64,
    pub ranges: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedData {
    pub seq: u64,
    /// Closest valid return of the scan; `f32::INFINITY` if there was none.
    pub nearest_obstacle_m: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlData {
    pub seq: u64,
    pub speed_mps: f32,
    pub steering_rad: f32,
}

/// Vehicle-level driving mode, published as a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveState {
    #[default]
    Stopped,
    Cruising,
    Cautious,
    Braking,
}

impl fmt::Display for DriveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriveState::Stopped => "stopped",
            DriveState::Cruising => "cruising",
            DriveState::Cautious => "cautious",
            DriveState::Braking => "braking",
        };
        f.write_str(s)
    }
}

/// Feedback of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationData {
    pub seq: u64,
    pub speed_mps: f32,
    pub travelled_m: f32,
}
