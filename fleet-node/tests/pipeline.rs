/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! The full sensor-to-actuator pipeline in one process.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fleet_core::middleware::LocalRuntime;
use fleet_core::{Application, ComponentConfig, ShutdownToken};
use fleet_node::components::{Actuator, Calc, ComponentKind, Sensor, SensorFusion, StateManager};
use fleet_node::run_component;

const TICK: Duration = Duration::from_millis(10);

fn config(name: &str) -> ComponentConfig {
    ComponentConfig::default_config(name)
        .with_workers(4)
        .with_supervise_interval(TICK)
}

#[test]
fn commands_reach_the_simulated_actuator() {
    let runtime = LocalRuntime::initialize().unwrap();
    let token = ShutdownToken::new();

    let sim = Actuator::simulated(runtime.clone(), TICK);
    let stats = sim.stats();
    let apps: Vec<(ComponentKind, Box<dyn Application>)> = vec![
        (ComponentKind::Sensor, Box::new(Sensor::new(runtime.clone(), TICK))),
        (ComponentKind::SensorFusion, Box::new(SensorFusion::new(runtime.clone(), TICK))),
        (ComponentKind::StateManager, Box::new(StateManager::new(runtime.clone(), TICK))),
        (ComponentKind::Calc, Box::new(Calc::new(runtime.clone(), TICK))),
        (ComponentKind::SimActuator, Box::new(sim)),
    ];

    let threads: Vec<_> = apps
        .into_iter()
        .map(|(kind, app)| {
            let token = token.clone();
            thread::spawn(move || run_component(kind.name(), app.as_ref(), config(kind.name()), token))
        })
        .collect();

    let deadline = Instant::now() + Duration::from_secs(5);
    while stats.commands() < 10 || stats.last_simulation().map_or(true, |s| s.travelled_m <= 0.0) {
        assert!(Instant::now() < deadline, "pipeline produced no movement");
        thread::sleep(TICK);
    }

    token.cancel();
    for handle in threads {
        handle.join().unwrap().unwrap();
    }

    assert!(stats.last_command().is_some());
    assert!(runtime.offered_instances(&"Calc/ControlData".into()).is_empty());
    assert_eq!(runtime.active_searches(), 0);
}

#[test]
fn every_kind_has_a_distinct_config_name() {
    let mut names: Vec<_> = ComponentKind::ALL.iter().map(|k| k.name()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), ComponentKind::ALL.len());
}

#[test]
fn component_stops_when_token_is_already_cancelled() {
    let runtime = LocalRuntime::initialize().unwrap();
    let token = ShutdownToken::new();
    token.cancel();

    let app = Arc::new(Sensor::new(runtime.clone(), TICK));
    let started = Instant::now();
    run_component("sensor", app.as_ref(), config("sensor"), token).unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn shipped_configuration_covers_every_component() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../config/fleet.yaml");
    let mut manager = fleet_core::FleetConfigManager::new();
    manager.load_from_file(&path).unwrap();

    for kind in ComponentKind::ALL {
        let config = manager
            .get_component_config(kind.name())
            .unwrap_or_else(|| panic!("{kind} missing from fleet.yaml"));
        assert!(config.workers >= 2, "{kind} has too few workers");
    }
    let calc = manager.component_config("calc");
    assert!(calc.has_port("drive_state"));
}
