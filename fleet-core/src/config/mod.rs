//! Component and port configuration loading.
//!
//! The expected YAML structure is:
//! ```yaml
//! components:
//!   calc:
//!     workers: 4
//!     supervise_interval_ms: 100
//!     ports:
//!       fused_data:
//!         service: "SensorFusion/FusedData"
//!         interval_ms: 100
//!         receive_mode: cyclic      # cyclic | triggered
//!         send_mode: periodic       # periodic | on_update
//!         queue_depth: 1
//! ```
//!
//! Every field is optional.  A component missing from the file gets
//! [`ComponentConfig::default_config`]; a port missing from its component
//! keeps the service specifier chosen by the component code and the default
//! timing.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::middleware::InstanceSpecifier;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Poll / send interval for high-rate channels.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// How often a component checks its [`ShutdownToken`](crate::ShutdownToken).
pub const DEFAULT_SUPERVISE_INTERVAL: Duration = Duration::from_millis(100);

/// Newest sample only – no backlog.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FleetConfigFile {
    #[serde(default)]
    components: HashMap<String, ComponentEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct ComponentEntry {
    workers: Option<usize>,
    supervise_interval_ms: Option<u64>,
    #[serde(default)]
    ports: HashMap<String, PortEntry>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct PortEntry {
    service: Option<String>,
    interval_ms: Option<u64>,
    receive_mode: Option<ReceiveMode>,
    send_mode: Option<SendMode>,
    queue_depth: Option<usize>,
}

// ── Public data structures ────────────────────────────────────────────────────

/// How an inbound port picks up new samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// Poll on a fixed interval from a pool task.
    #[default]
    Cyclic,
    /// Drain from the middleware's data-ready callback; no pool task.
    Triggered,
}

/// When an outbound port publishes its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Every tick publishes the current value (once one has been written).
    #[default]
    Periodic,
    /// A tick publishes only if the buffer was written since the last tick.
    OnUpdate,
}

/// Resolved settings for one port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSettings {
    pub service: InstanceSpecifier,
    pub interval: Duration,
    pub receive_mode: ReceiveMode,
    pub send_mode: SendMode,
    pub queue_depth: usize,
}

impl PortSettings {
    /// Defaults for a port bound to `service`.
    pub fn new(service: impl Into<InstanceSpecifier>) -> Self {
        Self {
            service: service.into(),
            interval: DEFAULT_INTERVAL,
            receive_mode: ReceiveMode::default(),
            send_mode: SendMode::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_receive_mode(mut self, mode: ReceiveMode) -> Self {
        self.receive_mode = mode;
        self
    }

    pub fn with_send_mode(mut self, mode: SendMode) -> Self {
        self.send_mode = mode;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    fn apply(mut self, entry: &PortEntry) -> Self {
        if let Some(service) = &entry.service {
            self.service = InstanceSpecifier::new(service.clone());
        }
        if let Some(ms) = entry.interval_ms {
            self.interval = Duration::from_millis(ms);
        }
        if let Some(mode) = entry.receive_mode {
            self.receive_mode = mode;
        }
        if let Some(mode) = entry.send_mode {
            self.send_mode = mode;
        }
        if let Some(depth) = entry.queue_depth {
            self.queue_depth = depth;
        }
        self
    }
}

/// Settings for one software component.
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    pub name: String,
    pub workers: usize,
    pub supervise_interval: Duration,
    port_overrides: HashMap<String, PortEntry>,
}

impl ComponentConfig {
    /// Fallback used when the component has no entry in the file: one worker
    /// per hardware thread, default intervals, no port overrides.
    pub fn default_config(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: num_cpus::get(),
            supervise_interval: DEFAULT_SUPERVISE_INTERVAL,
            port_overrides: HashMap::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_supervise_interval(mut self, interval: Duration) -> Self {
        self.supervise_interval = interval;
        self
    }

    /// Settings for `port`, starting from `base` and applying whatever the
    /// configuration file says about that port.
    pub fn port_settings(&self, port: &str, base: PortSettings) -> PortSettings {
        match self.port_overrides.get(port) {
            Some(entry) => base.apply(entry),
            None => base,
        }
    }

    /// Returns `true` if the file configured `port` explicitly.
    pub fn has_port(&self, port: &str) -> bool {
        self.port_overrides.contains_key(port)
    }
}

// ── FleetConfigManager ────────────────────────────────────────────────────────

/// Loads and manages component configurations from a YAML file.
#[derive(Debug, Default)]
pub struct FleetConfigManager {
    components: HashMap<String, ComponentConfig>,
    loaded: bool,
}

impl FleetConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and populates the component map.
    ///
    /// Calling this a second time replaces everything previously loaded.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is
    /// structurally invalid.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading fleet configuration from: {}", path.display());

        self.components.clear();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: FleetConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        for (name, entry) in file.components {
            let mut cfg = ComponentConfig::default_config(name.clone());
            if let Some(workers) = entry.workers {
                if workers == 0 {
                    warn!(component = %name, "workers: 0 is invalid, using hardware concurrency");
                } else {
                    cfg.workers = workers;
                }
            }
            if let Some(ms) = entry.supervise_interval_ms {
                cfg.supervise_interval = Duration::from_millis(ms);
            }
            cfg.port_overrides = entry.ports;

            debug!(
                "  Component: {} | workers: {} | ports configured: {}",
                cfg.name,
                cfg.workers,
                cfg.port_overrides.len(),
            );

            self.components.insert(name, cfg);
        }

        if self.components.is_empty() {
            warn!("No components found in configuration file, every component uses defaults");
        }

        self.loaded = true;
        info!(
            "Successfully loaded {} component configuration(s)",
            self.components.len()
        );
        Ok(())
    }

    pub fn get_component_config(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.get(name)
    }

    /// Configuration for `name`, falling back to
    /// [`ComponentConfig::default_config`].
    pub fn component_config(&self, name: &str) -> ComponentConfig {
        self.components
            .get(name)
            .cloned()
            .unwrap_or_else(|| ComponentConfig::default_config(name))
    }

    pub fn get_all_components(&self) -> &HashMap<String, ComponentConfig> {
        &self.components
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
