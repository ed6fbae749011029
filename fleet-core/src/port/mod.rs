/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Generic service port.
//!
//! A [`Port<T, D>`] binds one logical data channel (event or field) carrying
//! payload `T` to a remote service.  `D` is the direction: [`Inbound`] ports
//! discover a provider and subscribe; [`Outbound`] ports offer a service and
//! publish a last-value buffer.
//!
//! # Lifecycle
//!
//! ```text
//! Inbound:   Idle ─start()─► Discovering ─find(handles)─► Found ─subscribe()─► Subscribed
//! Outbound:  Idle ─start()─► Discovering ─offer ok──────► Offered
//!                      any state ─terminate()─► Terminated
//! ```
//!
//! # Locking discipline
//! The bound consumer, the lifecycle state, the sample handler and the
//! output buffer all live in **one** state `Mutex` per port.  Every path
//! takes it: the discovery callback (including the initial bind in
//! [`Port::find`]), the cyclic loops, the data-ready callback and
//! [`Port::write_data`].  Within one port, "is it bound? is it subscribed?
//! drain" is therefore a single critical section and sample order is
//! preserved.
//!
//! An outbound port keeps its provider behind a second, send lock.
//! [`Port::send_once`] holds the state lock only to take the buffered value
//! and publishes with it released.  Publishing can run subscriber handlers
//! on the calling thread, and those handlers write into other outbound
//! ports, so the order is always
//!
//! ```text
//! send lock ──► (publish) ──► inbound state lock ──► outbound state lock
//! ```
//!
//! An outbound state lock is a leaf: nothing else is acquired while it is
//! held, which keeps ports wired in a loop from deadlocking.  A sample
//! handler must not publish or terminate an outbound port itself.
//!
//! The running flag is a separate atomic so a loop can be told to stop
//! without waiting for the lock.
//!
//! Middleware calls that can call back into ports (`start_find_service`,
//! `offer_service`, `stop_offer_service`) are made with the state lock
//! released.

pub mod error;
#[cfg(test)]
pub(crate) mod mock;

pub use error::PortError;

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, trace, warn};

use crate::config::{PortSettings, ReceiveMode, SendMode};
use crate::middleware::{
    ChannelKind, Consumer, FindCallback, FindHandle, InstanceSpecifier, Middleware, Provider,
    ReceiveHandler, ServiceHandle, SubscriptionState,
};

// ── Direction markers ─────────────────────────────────────────────────────────

mod sealed {
    pub trait Sealed {}
}

/// Data direction of a port.  Sealed: only [`Inbound`] and [`Outbound`].
pub trait Direction: sealed::Sealed + Send + Sync + 'static {
    const LABEL: &'static str;
}

/// Consumer side: discovers, subscribes, drains.
#[derive(Debug)]
pub enum Inbound {}

/// Provider side: offers, buffers, publishes.
#[derive(Debug)]
pub enum Outbound {}

impl sealed::Sealed for Inbound {}
impl sealed::Sealed for Outbound {}

impl Direction for Inbound {
    const LABEL: &'static str = "inbound";
}

impl Direction for Outbound {
    const LABEL: &'static str = "outbound";
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Idle,
    /// Inbound: search running, nothing bound yet.  Outbound: offer in progress.
    Discovering,
    /// Inbound: bound to a service instance, not (yet) subscribed.
    Found,
    Subscribed,
    /// Outbound: service offered, provider bound.
    Offered,
    Terminated,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortState::Idle => "idle",
            PortState::Discovering => "discovering",
            PortState::Found => "found",
            PortState::Subscribed => "subscribed",
            PortState::Offered => "offered",
            PortState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Callback receiving every sample drained by an inbound port.
pub type SampleHandler<T> = Box<dyn FnMut(T) + Send>;

struct PortInner<T> {
    state: PortState,
    service: Option<ServiceHandle>,
    consumer: Option<Box<dyn Consumer<T>>>,
    search: Option<FindHandle>,
    handler: Option<SampleHandler<T>>,
    /// Outbound last-value buffer.
    latest: Option<T>,
    /// Written since the last send tick.
    fresh: bool,
}

/// Snapshot of a port's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortMetrics {
    pub received: u64,
    pub published: u64,
    pub failures: u64,
}

#[derive(Debug, Default)]
struct AtomicPortMetrics {
    received: AtomicU64,
    published: AtomicU64,
    failures: AtomicU64,
}

impl AtomicPortMetrics {
    fn snapshot(&self) -> PortMetrics {
        PortMetrics {
            received: self.received.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

// ── Port ──────────────────────────────────────────────────────────────────────

/// One data channel bound to a remote service.  Always handled as
/// `Arc<Port<..>>`: discovery and data-ready callbacks hold a weak
/// reference to it.
pub struct Port<T, D> {
    this: Weak<Self>,
    name: String,
    kind: ChannelKind,
    settings: PortSettings,
    middleware: Arc<dyn Middleware<T>>,
    running: AtomicBool,
    inner: Mutex<PortInner<T>>,
    /// Outbound provider.  Held for the whole publish, never while waiting
    /// for `inner`'s owner.
    publisher: Mutex<Option<Box<dyn Provider<T>>>>,
    metrics: AtomicPortMetrics,
    _direction: PhantomData<fn() -> D>,
}

impl<T, D: Direction> fmt::Debug for Port<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("direction", &D::LABEL)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static, D: Direction> Port<T, D> {
    pub fn new(
        name: impl Into<String>,
        kind: ChannelKind,
        settings: PortSettings,
        middleware: Arc<dyn Middleware<T>>,
    ) -> Arc<Self> {
        let name = name.into();
        debug!(
            port = %name,
            direction = D::LABEL,
            service = %settings.service,
            interval_ms = settings.interval.as_millis() as u64,
            "port created"
        );
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            name,
            kind,
            settings,
            middleware,
            running: AtomicBool::new(false),
            inner: Mutex::new(PortInner {
                state: PortState::Idle,
                service: None,
                consumer: None,
                search: None,
                handler: None,
                latest: None,
                fresh: false,
            }),
            publisher: Mutex::new(None),
            metrics: AtomicPortMetrics::default(),
            _direction: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    pub fn service(&self) -> &InstanceSpecifier {
        &self.settings.service
    }

    pub fn interval(&self) -> Duration {
        self.settings.interval
    }

    pub fn state(&self) -> PortState {
        self.lock_inner().state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The service instance this port is bound to, if any.
    pub fn bound_service(&self) -> Option<ServiceHandle> {
        self.lock_inner().service
    }

    pub fn metrics(&self) -> PortMetrics {
        self.metrics.snapshot()
    }

    fn lock_inner(&self) -> MutexGuard<'_, PortInner<T>> {
        self.inner.lock()
    }

    fn record_failure(&self) {
        self.metrics.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Stop every loop, unsubscribe, cancel discovery / withdraw the offer
    /// and forget the bound service.
    ///
    /// Idempotent, and safe in any state – including before
    /// [`start`](Port::start) or while discovery is still running.  Loops
    /// notice within one interval.
    pub fn terminate(&self) {
        self.running.store(false, Ordering::SeqCst);

        let (consumer, search, service) = {
            let mut inner = self.lock_inner();
            if inner.state == PortState::Terminated {
                trace!(port = %self.name, "terminate: already terminated");
                return;
            }
            // again under the lock: a concurrent start() may have raised it
            self.running.store(false, Ordering::SeqCst);
            let previous = inner.state;
            inner.state = PortState::Terminated;
            inner.fresh = false;
            debug!(port = %self.name, from = %previous, "terminating port");
            (inner.consumer.take(), inner.search.take(), inner.service.take())
        };
        // waits for a publish in flight; none starts after this
        let provider = self.publisher.lock().take();

        if let Some(search) = search {
            self.middleware.stop_find_service(search);
        }
        if let Some(mut consumer) = consumer {
            consumer.unset_receive_handler();
            consumer.unsubscribe();
        }
        if provider.is_some() {
            if let Some(service) = service {
                self.middleware.stop_offer_service(service);
            }
        }
        info!(port = %self.name, "port terminated");
    }

    fn pause(&self) {
        thread::sleep(self.settings.interval);
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

impl<T: Send + 'static> Port<T, Inbound> {
    /// Begin asynchronous discovery of the configured service.
    /// Non-blocking; a no-op unless the port is `Idle`.
    pub fn start(&self) {
        {
            let mut inner = self.lock_inner();
            if inner.state != PortState::Idle {
                debug!(port = %self.name, state = %inner.state, "start ignored");
                return;
            }
            inner.state = PortState::Discovering;
            self.running.store(true, Ordering::SeqCst);
        }

        let weak = self.this.clone();
        let on_found: FindCallback = Arc::new(move |handles| {
            if let Some(port) = weak.upgrade() {
                port.find(handles);
            }
        });

        info!(port = %self.name, service = %self.settings.service, "starting service discovery");
        match self.middleware.start_find_service(&self.settings.service, on_found) {
            Ok(search) => {
                let mut inner = self.lock_inner();
                if inner.state == PortState::Terminated {
                    drop(inner);
                    // terminated while the search was being registered
                    self.middleware.stop_find_service(search);
                } else {
                    inner.search = Some(search);
                }
            }
            Err(source) => {
                self.record_failure();
                let err = PortError::DiscoveryFailed {
                    port: self.name.clone(),
                    service: self.settings.service.clone(),
                    source,
                };
                error!(port = %self.name, error = %err, "service discovery could not be started");
            }
        }
    }

    /// Discovery callback.  Binds to the **first** handle and subscribes.
    ///
    /// An empty list leaves the port discovering; a call while already bound
    /// is ignored so the port never binds twice.
    pub fn find(&self, handles: Vec<ServiceHandle>) {
        let Some(&first) = handles.first() else {
            debug!(port = %self.name, service = %self.settings.service, "no service instance available yet");
            return;
        };

        let mut inner = self.lock_inner();
        match inner.state {
            PortState::Discovering => {}
            PortState::Found | PortState::Subscribed => {
                trace!(port = %self.name, "find: already bound, ignoring");
                return;
            }
            other => {
                debug!(port = %self.name, state = %other, "find: port not discovering, ignoring");
                return;
            }
        }

        match self.middleware.consumer(first, &self.name, self.kind) {
            Ok(consumer) => {
                inner.consumer = Some(consumer);
                inner.service = Some(first);
                inner.state = PortState::Found;
                info!(port = %self.name, handle = %first, candidates = handles.len(), "service found");
                // failure is logged inside; the port stays Found
                let _ = self.subscribe_locked(&mut inner);
            }
            Err(source) => {
                self.record_failure();
                let err = PortError::DiscoveryFailed {
                    port: self.name.clone(),
                    service: self.settings.service.clone(),
                    source,
                };
                error!(port = %self.name, error = %err, "binding to discovered service failed");
            }
        }
    }

    /// Subscribe the bound channel with the configured queue depth.
    ///
    /// A no-op unless the port is `Found`.  Failure is logged and returned,
    /// not retried.
    pub fn subscribe(&self) -> Result<(), PortError> {
        let mut inner = self.lock_inner();
        self.subscribe_locked(&mut inner)
    }

    fn subscribe_locked(&self, inner: &mut PortInner<T>) -> Result<(), PortError> {
        if inner.state != PortState::Found {
            trace!(port = %self.name, state = %inner.state, "subscribe skipped");
            return Ok(());
        }
        let Some(consumer) = inner.consumer.as_mut() else {
            return Ok(());
        };

        if let Err(source) = consumer.subscribe(self.settings.queue_depth) {
            self.record_failure();
            let err = PortError::SubscribeFailed {
                port: self.name.clone(),
                source,
            };
            error!(port = %self.name, error = %err, "subscription failed");
            return Err(err);
        }
        inner.state = PortState::Subscribed;
        info!(port = %self.name, depth = self.settings.queue_depth, "subscribed");

        if self.settings.receive_mode == ReceiveMode::Triggered {
            self.register_trigger(inner);
        }
        Ok(())
    }

    /// Hook [`receive_triggered`](Self::receive_triggered) into the
    /// middleware's data-ready notification.
    fn register_trigger(&self, inner: &mut PortInner<T>) {
        let weak = self.this.clone();
        let handler: ReceiveHandler = Arc::new(move || {
            if let Some(port) = weak.upgrade() {
                port.receive_triggered();
            }
        });
        if let Some(consumer) = inner.consumer.as_mut() {
            if let Err(source) = consumer.set_receive_handler(handler) {
                self.record_failure();
                warn!(port = %self.name, error = %source, "data-ready handler not registered");
                return;
            }
        }
        // samples already buffered (e.g. a field's initial value) would
        // otherwise wait for the next notification
        let _ = self.drain_locked(inner);
    }

    /// Undo [`subscribe`](Self::subscribe).  `Subscribed → Found`.
    pub fn stop_subscribe(&self) {
        let mut inner = self.lock_inner();
        if inner.state != PortState::Subscribed {
            return;
        }
        if let Some(consumer) = inner.consumer.as_mut() {
            consumer.unset_receive_handler();
            consumer.unsubscribe();
        }
        inner.state = PortState::Found;
        info!(port = %self.name, "unsubscribed");
    }

    /// Route every drained sample to `handler`.  Replaces any previous one.
    ///
    /// The handler runs under this port's lock: it must not call back into
    /// the same port.  It may write into outbound ports but must not publish
    /// from them.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: FnMut(T) + Send + 'static,
    {
        self.lock_inner().handler = Some(Box::new(handler));
    }

    pub fn clear_handler(&self) {
        self.lock_inner().handler = None;
    }

    /// One receive step: if bound and the middleware reports `Subscribed`,
    /// drain every buffered sample through the handler.  Returns the number
    /// of samples drained (0 when not subscribed).
    pub fn receive_once(&self) -> Result<usize, PortError> {
        let mut inner = self.lock_inner();
        self.drain_locked(&mut inner)
    }

    fn drain_locked(&self, inner: &mut PortInner<T>) -> Result<usize, PortError> {
        let PortInner {
            consumer, handler, ..
        } = inner;
        let Some(consumer) = consumer.as_mut() else {
            return Ok(0);
        };
        let sub_state = consumer.subscription_state();
        if sub_state != SubscriptionState::Subscribed {
            trace!(port = %self.name, subscription = %sub_state, "not subscribed, nothing to drain");
            return Ok(0);
        }

        let name = &self.name;
        match consumer.drain_new_samples(&mut |sample| Self::read(name, handler, sample)) {
            Ok(count) => {
                if count > 0 {
                    self.metrics.received.fetch_add(count as u64, Ordering::Relaxed);
                    trace!(port = %self.name, count, "samples drained");
                }
                Ok(count)
            }
            Err(source) => {
                self.record_failure();
                let err = PortError::ReadFailed {
                    port: self.name.clone(),
                    source,
                };
                error!(port = %self.name, error = %err, "drain failed, retrying next cycle");
                Err(err)
            }
        }
    }

    /// Hand one sample to the registered handler, or drop it.
    fn read(name: &str, handler: &mut Option<SampleHandler<T>>, sample: T) {
        match handler.as_mut() {
            Some(handler) => handler(sample),
            None => trace!(port = %name, "no handler registered, sample discarded"),
        }
    }

    /// Poll loop: [`receive_once`](Self::receive_once), sleep one interval,
    /// repeat while the port is running.
    pub fn receive_cyclic(&self) {
        debug!(port = %self.name, "receive loop started");
        while self.is_running() {
            // errors are logged where they occur
            let _ = self.receive_once();
            self.pause();
        }
        debug!(port = %self.name, "receive loop stopped");
    }

    /// Data-ready entry point: one drain, if the port is still running.
    ///
    /// Meant for the middleware's notification (enabled with
    /// [`ReceiveMode::Triggered`]).  Do not combine with
    /// [`receive_cyclic`](Self::receive_cyclic) on the same port.
    pub fn receive_triggered(&self) {
        if self.is_running() {
            let _ = self.receive_once();
        }
    }
}

// ── Outbound ──────────────────────────────────────────────────────────────────

impl<T: Clone + Send + 'static> Port<T, Outbound> {
    /// Offer the configured service and bind the provider.  A no-op unless
    /// the port is `Idle`.  The running flag is raised either way so the
    /// send loop runs (and idles) even if the offer failed.
    pub fn start(&self) {
        {
            let mut inner = self.lock_inner();
            if inner.state != PortState::Idle {
                debug!(port = %self.name, state = %inner.state, "start ignored");
                return;
            }
            inner.state = PortState::Discovering;
            self.running.store(true, Ordering::SeqCst);
        }

        let offered = self
            .middleware
            .offer_service(&self.settings.service)
            .and_then(|service| {
                match self.middleware.provider(service, &self.name, self.kind) {
                    Ok(provider) => Ok((service, provider)),
                    Err(e) => {
                        self.middleware.stop_offer_service(service);
                        Err(e)
                    }
                }
            });

        match offered {
            Ok((service, provider)) => {
                // bound before the state says Offered; the state lock is
                // never held while taking the send lock
                *self.publisher.lock() = Some(provider);
                let mut inner = self.lock_inner();
                if inner.state == PortState::Terminated {
                    drop(inner);
                    // terminate() may already have taken it, leaving the
                    // withdrawal to us
                    self.publisher.lock().take();
                    self.middleware.stop_offer_service(service);
                    return;
                }
                inner.service = Some(service);
                inner.state = PortState::Offered;
                info!(port = %self.name, service = %self.settings.service, handle = %service, "service offered");
            }
            Err(source) => {
                self.record_failure();
                {
                    let mut inner = self.lock_inner();
                    if inner.state == PortState::Discovering {
                        inner.state = PortState::Idle;
                    }
                }
                let err = PortError::DiscoveryFailed {
                    port: self.name.clone(),
                    service: self.settings.service.clone(),
                    source,
                };
                error!(port = %self.name, error = %err, "offering service failed");
            }
        }
    }

    /// Overwrite the output buffer.  Does not publish.
    pub fn write_data(&self, value: T) {
        let mut inner = self.lock_inner();
        if inner.state == PortState::Terminated {
            trace!(port = %self.name, "write after terminate ignored");
            return;
        }
        inner.latest = Some(value);
        inner.fresh = true;
    }

    /// Current content of the output buffer.
    pub fn latest(&self) -> Option<T> {
        self.lock_inner().latest.clone()
    }

    /// One send step: publish the buffer if the port is offered and there is
    /// something to send under the configured [`SendMode`].  Returns `true`
    /// if a publish happened.
    ///
    /// The state lock is released before publishing, so subscribers run by
    /// the publish may write into this port or any other.
    pub fn send_once(&self) -> Result<bool, PortError> {
        let mut publisher = self.publisher.lock();
        let Some(provider) = publisher.as_mut() else {
            return Ok(false);
        };
        let value = {
            let mut inner = self.lock_inner();
            if inner.state != PortState::Offered {
                return Ok(false);
            }
            let value = match self.settings.send_mode {
                SendMode::Periodic => inner.latest.clone(),
                SendMode::OnUpdate if inner.fresh => inner.latest.clone(),
                SendMode::OnUpdate => None,
            };
            let Some(value) = value else {
                return Ok(false);
            };
            inner.fresh = false;
            value
        };

        match provider.publish(value) {
            Ok(()) => {
                self.metrics.published.fetch_add(1, Ordering::Relaxed);
                trace!(port = %self.name, "published");
                Ok(true)
            }
            Err(source) => {
                self.record_failure();
                let err = PortError::PublishFailed {
                    port: self.name.clone(),
                    source,
                };
                error!(port = %self.name, error = %err, "publish failed, retrying next cycle");
                Err(err)
            }
        }
    }

    /// Send loop: [`send_once`](Self::send_once), sleep one interval, repeat
    /// while the port is running.
    pub fn send_cyclic(&self) {
        debug!(port = %self.name, "send loop started");
        while self.is_running() {
            let _ = self.send_once();
            self.pause();
        }
        debug!(port = %self.name, "send loop stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::{handle, MockMiddleware};
    use super::*;
    use crate::middleware::{LocalRuntime, MiddlewareError};
    use std::time::Instant;

    const FAST: Duration = Duration::from_millis(10);

    fn inbound(mock: &Arc<MockMiddleware<u32>>, settings: PortSettings) -> Arc<Port<u32, Inbound>> {
        let middleware: Arc<dyn Middleware<u32>> = mock.clone();
        Port::new("raw_data", ChannelKind::Event, settings, middleware)
    }

    fn outbound(mock: &Arc<MockMiddleware<u32>>, settings: PortSettings) -> Arc<Port<u32, Outbound>> {
        let middleware: Arc<dyn Middleware<u32>> = mock.clone();
        Port::new("control_data", ChannelKind::Event, settings, middleware)
    }

    fn settings() -> PortSettings {
        PortSettings::new("Test/Service").with_interval(FAST)
    }

    fn collector(port: &Port<u32, Inbound>) -> Arc<Mutex<Vec<u32>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        port.set_handler(move |v| sink.lock().push(v));
        seen
    }

    // ── discovery ─────────────────────────────────────────────────────────────

    #[test]
    fn start_begins_discovery() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        assert_eq!(port.state(), PortState::Idle);

        port.start();

        assert_eq!(port.state(), PortState::Discovering);
        assert!(port.is_running());
        assert_eq!(mock.with(|s| s.find_started), 1);
    }

    #[test]
    fn empty_find_keeps_discovering() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();

        mock.found(vec![]);

        assert_eq!(port.state(), PortState::Discovering);
        assert!(port.bound_service().is_none());
        assert!(mock.with(|s| s.bound.is_empty()));
    }

    #[test]
    fn find_binds_first_handle_and_subscribes() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();

        mock.found(vec![handle(1, 2), handle(1, 1)]);

        assert_eq!(port.bound_service(), Some(handle(1, 2)));
        assert_eq!(port.state(), PortState::Subscribed);
        assert_eq!(mock.with(|s| s.subscribe_calls), 1);
    }

    #[test]
    fn second_find_does_not_rebind() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();

        mock.found(vec![handle(1, 1)]);
        let first = port.bound_service();
        mock.found(vec![handle(1, 7), handle(1, 1)]);

        assert_eq!(port.bound_service(), first);
        assert_eq!(mock.with(|s| s.bound.len()), 1);
        assert_eq!(mock.with(|s| s.subscribe_calls), 1);
    }

    #[test]
    fn find_before_start_is_ignored() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());

        port.find(vec![handle(1, 1)]);

        assert_eq!(port.state(), PortState::Idle);
        assert!(port.bound_service().is_none());
    }

    #[test]
    fn discovery_failure_is_logged_not_fatal() {
        let mock = MockMiddleware::new();
        mock.with(|s| s.fail_find = true);
        let port = inbound(&mock, settings());

        port.start();

        assert_eq!(port.state(), PortState::Discovering);
        assert_eq!(port.metrics().failures, 1);
        assert_eq!(port.receive_once(), Ok(0));
    }

    // ── subscription ──────────────────────────────────────────────────────────

    #[test]
    fn subscribe_failure_leaves_port_found_without_retry() {
        let mock = MockMiddleware::new();
        mock.with(|s| s.fail_subscribe = true);
        let port = inbound(&mock, settings());
        port.start();

        mock.found(vec![handle(1, 1)]);

        assert_eq!(port.state(), PortState::Found);
        assert_eq!(port.metrics().failures, 1);

        // polling does not re-subscribe and does not drain
        assert_eq!(port.receive_once(), Ok(0));
        assert_eq!(mock.with(|s| s.subscribe_calls), 1);
        assert_eq!(mock.drains(), 0);

        // an explicit subscribe does
        mock.with(|s| s.fail_subscribe = false);
        port.subscribe().unwrap();
        assert_eq!(port.state(), PortState::Subscribed);
    }

    #[test]
    fn subscribe_requires_found() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();

        assert_eq!(port.subscribe(), Ok(()));
        assert_eq!(mock.with(|s| s.subscribe_calls), 0);
    }

    #[test]
    fn stop_subscribe_returns_to_found() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();
        mock.found(vec![handle(1, 1)]);

        port.stop_subscribe();

        assert_eq!(port.state(), PortState::Found);
        assert_eq!(mock.with(|s| s.unsubscribe_calls), 1);
        mock.deliver(1);
        assert_eq!(port.receive_once(), Ok(0));
    }

    // ── receive ───────────────────────────────────────────────────────────────

    #[test]
    fn receive_once_drains_in_order_through_handler() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        let seen = collector(&port);
        port.start();
        mock.found(vec![handle(1, 1)]);

        for v in [3, 1, 2] {
            mock.deliver(v);
        }

        assert_eq!(port.receive_once(), Ok(3));
        assert_eq!(*seen.lock(), vec![3, 1, 2]);
        assert_eq!(port.metrics().received, 3);
    }

    #[test]
    fn samples_without_handler_are_discarded() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();
        mock.found(vec![handle(1, 1)]);
        mock.deliver(1);

        assert_eq!(port.receive_once(), Ok(1));
        assert_eq!(port.receive_once(), Ok(0));
    }

    #[test]
    fn drain_failure_is_reported_as_read_failed() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();
        mock.found(vec![handle(1, 1)]);
        mock.with(|s| s.fail_drain = true);

        let err = port.receive_once().unwrap_err();
        assert!(matches!(err, PortError::ReadFailed { .. }));
        assert_eq!(err.port(), "raw_data");

        mock.with(|s| s.fail_drain = false);
        assert_eq!(port.receive_once(), Ok(0));
    }

    #[test]
    fn triggered_mode_drains_on_data_ready() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings().with_receive_mode(ReceiveMode::Triggered));
        let seen = collector(&port);
        port.start();
        mock.found(vec![handle(1, 1)]);

        mock.deliver(42);

        assert_eq!(*seen.lock(), vec![42]);
    }

    #[test]
    fn cyclic_receive_without_discovery_idles_until_terminated() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();

        let worker = {
            let port = Arc::clone(&port);
            thread::spawn(move || port.receive_cyclic())
        };
        thread::sleep(FAST * 6);
        assert_eq!(mock.drains(), 0);
        assert_eq!(port.metrics().failures, 0);

        let stop = Instant::now();
        port.terminate();
        worker.join().unwrap();
        assert!(stop.elapsed() < FAST * 10);
    }

    #[test]
    fn no_drain_after_terminate() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();
        mock.found(vec![handle(1, 1)]);

        let worker = {
            let port = Arc::clone(&port);
            thread::spawn(move || port.receive_cyclic())
        };
        thread::sleep(FAST * 5);
        assert!(mock.drains() > 0);

        port.terminate();
        thread::sleep(FAST * 2);
        let after = mock.drains();
        thread::sleep(FAST * 5);
        assert_eq!(mock.drains(), after);
        worker.join().unwrap();
    }

    // ── terminate ─────────────────────────────────────────────────────────────

    #[test]
    fn terminate_before_start_is_harmless() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());

        port.terminate();
        port.terminate();
        port.start();

        assert_eq!(port.state(), PortState::Terminated);
        assert!(!port.is_running());
        assert_eq!(mock.with(|s| s.find_started), 0);
    }

    #[test]
    fn terminate_unsubscribes_and_cancels_discovery_once() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();
        mock.found(vec![handle(1, 1)]);

        port.terminate();
        port.terminate();

        assert_eq!(port.state(), PortState::Terminated);
        assert!(port.bound_service().is_none());
        assert_eq!(mock.with(|s| s.unsubscribe_calls), 1);
        assert_eq!(mock.with(|s| s.find_stopped), 1);
        assert_eq!(mock.with(|s| s.sub_state), SubscriptionState::Unsubscribed);
    }

    #[test]
    fn terminate_while_discovering() {
        let mock = MockMiddleware::new();
        let port = inbound(&mock, settings());
        port.start();

        port.terminate();
        mock.found(vec![handle(1, 1)]);

        assert_eq!(port.state(), PortState::Terminated);
        assert!(mock.with(|s| s.bound.is_empty()));
    }

    // ── outbound ──────────────────────────────────────────────────────────────

    #[test]
    fn outbound_start_offers_service() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings());

        port.start();

        assert_eq!(port.state(), PortState::Offered);
        assert_eq!(port.bound_service(), Some(handle(1, 1)));
    }

    #[test]
    fn bursts_of_writes_coalesce_to_one_publish_of_latest() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings());
        port.start();

        for v in 1..=5 {
            port.write_data(v);
        }
        assert_eq!(mock.published_count(), 0, "write_data must not publish");

        assert_eq!(port.send_once(), Ok(true));
        assert_eq!(mock.with(|s| s.published.clone()), vec![5]);
    }

    #[test]
    fn periodic_mode_republishes_current_value() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings());
        port.start();
        port.write_data(9);

        port.send_once().unwrap();
        port.send_once().unwrap();

        assert_eq!(mock.with(|s| s.published.clone()), vec![9, 9]);
    }

    #[test]
    fn on_update_mode_publishes_only_new_values() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings().with_send_mode(SendMode::OnUpdate));
        port.start();
        port.write_data(1);

        assert_eq!(port.send_once(), Ok(true));
        assert_eq!(port.send_once(), Ok(false));
        port.write_data(2);
        assert_eq!(port.send_once(), Ok(true));

        assert_eq!(mock.with(|s| s.published.clone()), vec![1, 2]);
    }

    #[test]
    fn nothing_written_nothing_published() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings());
        port.start();

        assert_eq!(port.send_once(), Ok(false));
        assert_eq!(mock.published_count(), 0);
    }

    #[test]
    fn publish_failure_is_retried_next_cycle() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings());
        port.start();
        port.write_data(4);
        mock.with(|s| s.fail_publish = true);

        let err = port.send_once().unwrap_err();
        assert_eq!(
            err,
            PortError::PublishFailed {
                port: "control_data".into(),
                source: MiddlewareError::Transport("publish failed".into()),
            }
        );

        mock.with(|s| s.fail_publish = false);
        assert_eq!(port.send_once(), Ok(true));
        assert_eq!(port.metrics().published, 1);
        assert_eq!(port.metrics().failures, 1);
    }

    #[test]
    fn outbound_terminate_withdraws_offer_and_stops_sending() {
        let mock = MockMiddleware::new();
        let port = outbound(&mock, settings());
        port.start();
        port.write_data(1);

        let worker = {
            let port = Arc::clone(&port);
            thread::spawn(move || port.send_cyclic())
        };
        thread::sleep(FAST * 5);
        assert!(mock.published_count() > 0);

        port.terminate();
        thread::sleep(FAST * 2);
        let after = mock.published_count();
        thread::sleep(FAST * 5);
        assert_eq!(mock.published_count(), after);
        worker.join().unwrap();

        assert_eq!(mock.with(|s| s.offers_withdrawn), 1);
        assert_eq!(port.send_once(), Ok(false));
    }

    #[test]
    fn subscriber_may_write_back_into_the_publishing_port() {
        let runtime = LocalRuntime::initialize().unwrap();
        let middleware: Arc<dyn Middleware<u32>> = runtime.clone();
        let out: Arc<Port<u32, Outbound>> = Port::new(
            "echo",
            ChannelKind::Event,
            settings().with_send_mode(SendMode::OnUpdate),
            Arc::clone(&middleware),
        );
        let input: Arc<Port<u32, Inbound>> = Port::new(
            "echo",
            ChannelKind::Event,
            settings().with_receive_mode(ReceiveMode::Triggered),
            middleware,
        );
        let echo = Arc::clone(&out);
        input.set_handler(move |v| echo.write_data(v + 1));
        out.start();
        input.start();
        assert_eq!(input.state(), PortState::Subscribed);

        out.write_data(1);
        // the handler runs on this thread, inside the publish
        assert_eq!(out.send_once(), Ok(true));
        assert_eq!(out.latest(), Some(2));
        assert_eq!(out.send_once(), Ok(true));
        assert_eq!(out.latest(), Some(3));
        assert_eq!(input.metrics().received, 2);

        input.terminate();
        out.terminate();
        assert!(runtime.offered_instances(&"Test/Service".into()).is_empty());
    }
}
