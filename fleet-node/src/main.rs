/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::{Path, PathBuf};
use std::process;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use fleet_core::config::DEFAULT_INTERVAL;
use fleet_core::middleware::LocalRuntime;
use fleet_core::{ComponentError, FleetConfigManager, ShutdownToken};
use fleet_node::components::ComponentKind;
use fleet_node::run_component;

// ── CLI argument definition ───────────────────────────────────────────────────

/// Fleet node: runs a set of software components over the in-process
/// middleware.
///
/// Example:
///   fleet-node --config config/fleet.yaml --components sensor,sensor-fusion,calc
#[derive(Debug, Parser)]
#[command(
    name = "fleet-node",
    about = "Fleet software components over an in-process pub/sub runtime",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML component configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Components to run, comma separated.  Default: all of them.
    #[arg(short = 'm', long = "components", value_enum, value_delimiter = ',')]
    components: Vec<ComponentKind>,

    /// Shut down after this many seconds instead of waiting for Ctrl-C.
    #[arg(short = 't', long = "run-for-secs")]
    run_for_secs: Option<u64>,
}

type ComponentThread = (ComponentKind, JoinHandle<Result<(), ComponentError>>);

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("fleet-node starting up...");

    let cli = Cli::parse();
    info!(
        config       = ?cli.config,
        components   = ?cli.components,
        run_for_secs = ?cli.run_for_secs,
        "Configuration"
    );

    // ── Load component configuration ──────────────────────────────────────────
    let config_manager = match load_config(cli.config.as_deref()) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to load component configuration: {:#}", e);
            process::exit(1);
        }
    };

    // ── Middleware bring-up ───────────────────────────────────────────────────
    // Nothing else may exist before this succeeded.
    let runtime = match LocalRuntime::initialize() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Middleware bring-up failed: {}", e);
            process::exit(1);
        }
    };

    // ── Start components ──────────────────────────────────────────────────────
    let kinds = selected(&cli.components);
    let token = ShutdownToken::new();
    let mut threads: Vec<ComponentThread> = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let app = kind.application(runtime.clone(), DEFAULT_INTERVAL);
        let config = config_manager.component_config(kind.name());
        let component_token = token.clone();
        let spawned = thread::Builder::new()
            .name(format!("fleet-{}", kind.name()))
            .spawn(move || run_component(kind.name(), app.as_ref(), config, component_token));

        match spawned {
            Ok(handle) => threads.push((kind, handle)),
            Err(e) => {
                error!(component = %kind, error = %e, "failed to spawn component thread");
                token.cancel();
                break;
            }
        }
    }
    info!("{} component(s) started", threads.len());

    // ── Wait for shutdown ─────────────────────────────────────────────────────
    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        },
        _ = run_for(cli.run_for_secs) => info!("Run time elapsed, shutting down"),
    }
    token.cancel();

    let failed = match tokio::task::spawn_blocking(move || join_all(threads)).await {
        Ok(failed) => failed,
        Err(e) => {
            error!("Joining component threads failed: {}", e);
            true
        }
    };
    runtime.deinitialize();

    if failed {
        process::exit(1);
    }
    info!("fleet-node stopped");
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>) -> Result<FleetConfigManager> {
    let mut manager = FleetConfigManager::new();
    match path {
        Some(path) => {
            manager
                .load_from_file(path)
                .with_context(|| format!("configuration '{}' rejected", path.display()))?;
            for name in manager.get_all_components().keys() {
                info!("  configured component: {}", name);
            }
        }
        None => warn!("No configuration file provided, using default component settings"),
    }
    Ok(manager)
}

/// Requested components in pipeline order, without duplicates.
fn selected(requested: &[ComponentKind]) -> Vec<ComponentKind> {
    if requested.is_empty() {
        return ComponentKind::ALL.to_vec();
    }
    ComponentKind::ALL
        .into_iter()
        .filter(|kind| requested.contains(kind))
        .collect()
}

async fn run_for(secs: Option<u64>) {
    match secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending::<()>().await,
    }
}

/// Join every component thread.  Returns `true` if any of them failed.
fn join_all(threads: Vec<ComponentThread>) -> bool {
    let mut failed = false;
    for (kind, handle) in threads {
        match handle.join() {
            Ok(Ok(())) => info!(component = %kind, "component stopped"),
            Ok(Err(e)) => {
                error!(component = %kind, error = %e, "component failed");
                failed = true;
            }
            Err(_) => {
                error!(component = %kind, "component thread panicked");
                failed = true;
            }
        }
    }
    failed
}
