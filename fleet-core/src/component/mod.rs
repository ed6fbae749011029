/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! SoftwareComponent orchestrator.
//!
//! A component owns a [`WorkerPool`], a set of ports and optional periodic
//! business tasks.  Concrete components only describe *what* they own, via
//! [`Application::initialize`]; the orchestration is shared:
//!
//! ```text
//!  new()          Created      pool spawned, nothing else
//!  initialize()   Initialized  ports + periodic tasks created, no discovery yet
//!  start()                     every port starts discovery / offers, then run()
//!  run()          Running      one pool task per cyclic duty, then waits for quiescence
//!  terminate()    Terminated   running flag cleared, every port terminated
//! ```
//!
//! Every cyclic duty runs as a pool task, so `workers` equal to the number
//! of duties is enough.  The [`ShutdownToken`] is watched by the thread
//! blocked in `run()`: it waits for the pool in slices of
//! `supervise_interval` and calls [`terminate`](SoftwareComponent::terminate)
//! once the token is cancelled, so `run()` returns within roughly one
//! interval of the cancellation.

pub mod error;

pub use error::ComponentError;

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::cancel::ShutdownToken;
use crate::config::{ComponentConfig, PortSettings, ReceiveMode};
use crate::middleware::{ChannelKind, Middleware};
use crate::pool::{TaskHandle, WorkerPool};
use crate::port::{Inbound, Outbound, Port, PortState};

// ── Application hook ──────────────────────────────────────────────────────────

/// Business logic of one concrete component.
///
/// `initialize` is called exactly once, before any port starts.  It creates
/// the component's ports with [`SoftwareComponent::add_inbound`] /
/// [`SoftwareComponent::add_outbound`], wires their handlers and registers
/// periodic tasks.
pub trait Application: Send + Sync {
    fn initialize(&self, component: &mut SoftwareComponent) -> Result<(), ComponentError>;
}

// ── Lifecycle state ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Created,
    Initialized,
    Running,
    Terminated,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentState::Created => "created",
            ComponentState::Initialized => "initialized",
            ComponentState::Running => "running",
            ComponentState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

// ── Type-erased port view ─────────────────────────────────────────────────────

type Duty = Box<dyn FnOnce() + Send + 'static>;

/// What the orchestrator needs from a port, independent of payload and
/// direction.
trait ManagedPort: Send + Sync {
    fn port_name(&self) -> &str;
    fn port_state(&self) -> PortState;
    fn launch(&self);
    fn shutdown(&self);
    /// The loop to submit to the pool, if this port needs one.
    fn cyclic_duty(self: Arc<Self>) -> Option<Duty>;
}

impl<T: Send + 'static> ManagedPort for Port<T, Inbound> {
    fn port_name(&self) -> &str {
        self.name()
    }

    fn port_state(&self) -> PortState {
        self.state()
    }

    fn launch(&self) {
        self.start();
    }

    fn shutdown(&self) {
        self.terminate();
    }

    fn cyclic_duty(self: Arc<Self>) -> Option<Duty> {
        let mode = self.settings().receive_mode;
        match mode {
            ReceiveMode::Cyclic => Some(Box::new(move || self.receive_cyclic())),
            // driven by the middleware's data-ready callback
            ReceiveMode::Triggered => None,
        }
    }
}

impl<T: Clone + Send + 'static> ManagedPort for Port<T, Outbound> {
    fn port_name(&self) -> &str {
        self.name()
    }

    fn port_state(&self) -> PortState {
        self.state()
    }

    fn launch(&self) {
        self.start();
    }

    fn shutdown(&self) {
        self.terminate();
    }

    fn cyclic_duty(self: Arc<Self>) -> Option<Duty> {
        Some(Box::new(move || self.send_cyclic()))
    }
}

struct PeriodicTask {
    name: String,
    interval: Duration,
    body: Box<dyn FnMut() + Send + 'static>,
}

/// State shared with the periodic pool tasks.
struct Shared {
    name: String,
    state: Mutex<ComponentState>,
    running: AtomicBool,
    ports: Mutex<Vec<Arc<dyn ManagedPort>>>,
}

impl Shared {
    fn terminate(&self) {
        {
            let mut state = self.state.lock();
            if *state == ComponentState::Terminated {
                debug!(component = %self.name, "terminate: already terminated");
                return;
            }
            info!(component = %self.name, from = %*state, "terminating component");
            *state = ComponentState::Terminated;
            self.running.store(false, Ordering::SeqCst);
        }

        let ports = self.ports.lock().clone();
        for port in ports {
            port.shutdown();
        }
    }
}

// ── SoftwareComponent ─────────────────────────────────────────────────────────

pub struct SoftwareComponent {
    shared: Arc<Shared>,
    config: ComponentConfig,
    pool: WorkerPool,
    periodic: Mutex<Vec<PeriodicTask>>,
    token: ShutdownToken,
}

impl SoftwareComponent {
    /// Create the component and its worker pool (`config.workers` threads).
    ///
    /// # Errors
    /// [`ComponentError::Pool`] if the pool cannot be created.
    pub fn new(
        name: impl Into<String>,
        config: ComponentConfig,
        token: ShutdownToken,
    ) -> Result<Self, ComponentError> {
        let name = name.into();
        let pool = WorkerPool::new(config.workers).map_err(|e| {
            error!(component = %name, error = %e, "worker pool creation failed");
            ComponentError::from(e)
        })?;
        info!(component = %name, workers = config.workers, "component created");

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                state: Mutex::new(ComponentState::Created),
                running: AtomicBool::new(false),
                ports: Mutex::new(Vec::new()),
            }),
            config,
            pool,
            periodic: Mutex::new(Vec::new()),
            token,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    pub fn state(&self) -> ComponentState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn shutdown_token(&self) -> &ShutdownToken {
        &self.token
    }

    /// Names of every owned port, in registration order.
    pub fn port_names(&self) -> Vec<String> {
        self.shared.ports.lock()
            .iter()
            .map(|p| p.port_name().to_owned())
            .collect()
    }

    /// Lifecycle state of the named port.
    pub fn port_state(&self, port: &str) -> Option<PortState> {
        self.shared.ports.lock()
            .iter()
            .find(|p| p.port_name() == port)
            .map(|p| p.port_state())
    }

    /// Pool tasks executing right now.  Diagnostic only.
    pub fn active_tasks(&self) -> usize {
        self.pool.active_count()
    }

    /// Let `app` create the component's ports and periodic tasks.
    /// `Created → Initialized`.
    pub fn initialize(&mut self, app: &dyn Application) -> Result<(), ComponentError> {
        self.expect_state("initialize", ComponentState::Created)?;
        debug!(component = %self.shared.name, "initializing");

        if let Err(e) = app.initialize(self) {
            error!(component = %self.shared.name, error = %e, "application initialization failed");
            return Err(e);
        }

        *self.shared.state.lock() = ComponentState::Initialized;
        info!(
            component = %self.shared.name,
            ports = self.shared.ports.lock().len(),
            periodic = self.periodic.lock().len(),
            "component initialized"
        );
        Ok(())
    }

    /// Create an inbound port.  `base` carries the defaults chosen by the
    /// component; the configuration file may override any of them.
    pub fn add_inbound<T: Send + 'static>(
        &mut self,
        name: &str,
        kind: ChannelKind,
        base: PortSettings,
        middleware: Arc<dyn Middleware<T>>,
    ) -> Result<Arc<Port<T, Inbound>>, ComponentError> {
        self.check_new_port(name)?;
        let port = Port::<T, Inbound>::new(name, kind, self.config.port_settings(name, base), middleware);
        self.shared.ports.lock().push(port.clone());
        Ok(port)
    }

    /// Create an outbound port.  See [`add_inbound`](Self::add_inbound).
    pub fn add_outbound<T: Clone + Send + 'static>(
        &mut self,
        name: &str,
        kind: ChannelKind,
        base: PortSettings,
        middleware: Arc<dyn Middleware<T>>,
    ) -> Result<Arc<Port<T, Outbound>>, ComponentError> {
        self.check_new_port(name)?;
        let port = Port::<T, Outbound>::new(name, kind, self.config.port_settings(name, base), middleware);
        self.shared.ports.lock().push(port.clone());
        Ok(port)
    }

    /// Register component-specific work run every `interval` while the
    /// component is running.
    pub fn add_periodic<F>(&mut self, name: &str, interval: Duration, body: F) -> Result<(), ComponentError>
    where
        F: FnMut() + Send + 'static,
    {
        self.expect_state("add a periodic task to", ComponentState::Created)?;
        self.periodic.lock().push(PeriodicTask {
            name: name.to_owned(),
            interval,
            body: Box::new(body),
        });
        Ok(())
    }

    /// Start every port, then [`run`](Self::run).  Blocks until the
    /// component has been terminated and every loop has exited.
    pub fn start(&self) -> Result<(), ComponentError> {
        self.expect_state("start", ComponentState::Initialized)?;
        info!(component = %self.shared.name, "starting ports");

        let ports = self.shared.ports.lock().clone();
        for port in &ports {
            port.launch();
        }
        self.run()
    }

    /// Submit one pool task per cyclic duty and block until the pool is
    /// quiescent, terminating the component once the token is cancelled.
    /// `Initialized → Running`.
    pub fn run(&self) -> Result<(), ComponentError> {
        {
            let mut state = self.shared.state.lock();
            if *state != ComponentState::Initialized {
                warn!(component = %self.shared.name, state = %*state, "run ignored");
                return Err(ComponentError::InvalidState {
                    operation: "run",
                    state: *state,
                });
            }
            *state = ComponentState::Running;
            self.shared.running.store(true, Ordering::SeqCst);
        }

        let mut duties: Vec<(String, TaskHandle)> = Vec::new();
        let ports = self.shared.ports.lock().clone();
        for port in ports {
            let name = port.port_name().to_owned();
            if let Some(duty) = port.cyclic_duty() {
                duties.push((name, self.pool.submit(duty)));
            }
        }

        let periodic = mem::take(&mut *self.periodic.lock());
        for task in periodic {
            let name = task.name.clone();
            duties.push((name, self.submit_periodic(task)));
        }

        if duties.len() > self.pool.worker_count() {
            warn!(
                component = %self.shared.name,
                duties = duties.len(),
                workers = self.pool.worker_count(),
                "more cyclic duties than workers; some loops wait for a free worker"
            );
        }
        info!(component = %self.shared.name, duties = duties.len(), "component running");

        self.supervise();

        for (name, handle) in duties {
            if let Err(e) = handle.wait() {
                warn!(component = %self.shared.name, duty = %name, error = %e, "duty ended abnormally");
            }
        }
        info!(component = %self.shared.name, "all loops exited");
        Ok(())
    }

    /// Clear the running flag and terminate every port.  Loops notice within
    /// one interval and return, which lets [`run`](Self::run) return.
    ///
    /// Idempotent; safe in any state, including before `start()`.
    pub fn terminate(&self) {
        self.shared.terminate();
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    fn expect_state(&self, operation: &'static str, expected: ComponentState) -> Result<(), ComponentError> {
        let state = self.state();
        if state == expected {
            return Ok(());
        }
        warn!(component = %self.shared.name, operation, state = %state, "lifecycle call out of order, ignored");
        Err(ComponentError::InvalidState { operation, state })
    }

    fn check_new_port(&self, name: &str) -> Result<(), ComponentError> {
        self.expect_state("add a port to", ComponentState::Created)?;
        if self.shared.ports.lock().iter().any(|p| p.port_name() == name) {
            return Err(ComponentError::DuplicatePort(name.to_owned()));
        }
        Ok(())
    }

    /// Wait until the component is terminated and every loop has exited,
    /// checking the token between slices.  Runs on the caller's thread so it
    /// never competes with the duties for a worker.
    fn supervise(&self) {
        let interval = self.config.supervise_interval;
        loop {
            let running = self.shared.running.load(Ordering::SeqCst);
            if running && self.token.is_cancelled() {
                info!(component = %self.shared.name, "shutdown requested");
                self.shared.terminate();
            }
            if self.pool.wait_timeout(interval) {
                if !self.shared.running.load(Ordering::SeqCst) {
                    return;
                }
                // no loop left (e.g. only triggered ports): idle until terminated
                thread::sleep(interval);
            }
        }
    }

    fn submit_periodic(&self, mut task: PeriodicTask) -> TaskHandle {
        let shared = Arc::clone(&self.shared);
        let token = self.token.clone();
        self.pool.submit(move || {
            debug!(component = %shared.name, task = %task.name, "periodic task started");
            while shared.running.load(Ordering::SeqCst) && !token.is_cancelled() {
                (task.body)();
                thread::sleep(task.interval);
            }
            debug!(component = %shared.name, task = %task.name, "periodic task stopped");
        })
    }
}

impl Drop for SoftwareComponent {
    fn drop(&mut self) {
        // loops must be stopped before the pool joins its workers
        self.terminate();
    }
}

impl fmt::Debug for SoftwareComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareComponent")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("ports", &self.port_names())
            .field("pool", &self.pool)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
