/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Abstract pub/sub middleware collaborator.
//!
//! Ports never talk to a transport directly; they go through
//! [`Middleware<T>`] and the two proxy traits it hands out:
//!
//! ```text
//!   consumer side                         provider side
//!   ─────────────                         ─────────────
//!   start_find_service ──► FindCallback   offer_service ──► ServiceHandle
//!   consumer(handle)   ──► Consumer<T>    provider(handle) ──► Provider<T>
//!        subscribe / drain_new_samples         publish
//! ```
//!
//! Every call returns a value or a [`MiddlewareError`]; none of them may
//! abort the process.  [`local::LocalRuntime`] is the in-process
//! implementation used by the fleet binary and the tests.

pub mod local;

pub use local::LocalRuntime;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

// ── Identities ────────────────────────────────────────────────────────────────

/// Name under which a service is offered and searched for,
/// e.g. `"SensorFusion/FusedData"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceSpecifier(String);

impl InstanceSpecifier {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self(specifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceSpecifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InstanceSpecifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of one discovered remote endpoint.  Transient: a port consumes
/// it once to bind its proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub service_id: u16,
    pub instance_id: u16,
}

impl fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}:{:#06x}", self.service_id, self.instance_id)
    }
}

/// Token returned by [`Middleware::start_find_service`], used to cancel the
/// search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FindHandle(pub u64);

// ── Channel / subscription model ──────────────────────────────────────────────

/// Events are transient samples; fields are notified state values whose
/// latest value is delivered to every new subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelKind {
    #[default]
    Event,
    Field,
}

/// Middleware-owned subscription state.  Ports poll it before every drain
/// and never cache it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    /// Subscribed, but the provider is not (or no longer) offering.
    Pending,
    Subscribed,
    Error,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionState::Unsubscribed => "unsubscribed",
            SubscriptionState::Pending => "pending",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Invoked with the full list of currently available instances whenever
/// that list may have changed (including once on registration).
pub type FindCallback = Arc<dyn Fn(Vec<ServiceHandle>) + Send + Sync>;

/// Native "data ready" notification registered on a [`Consumer`].
pub type ReceiveHandler = Arc<dyn Fn() + Send + Sync>;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure values returned by middleware calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    /// The runtime was never brought up or has been shut down.
    #[error("middleware runtime is not initialized")]
    NotInitialized,

    #[error("service {0} is not known to the runtime")]
    ServiceNotFound(ServiceHandle),

    #[error("service {0} is not offered")]
    NotOffered(ServiceHandle),

    /// The channel already exists with a different payload type.
    #[error("channel '{channel}' on {service} carries a different payload type")]
    TypeMismatch {
        service: ServiceHandle,
        channel: String,
    },

    #[error("no active subscription")]
    NotSubscribed,

    #[error("transport failure: {0}")]
    Transport(String),
}

// ── Proxy traits ──────────────────────────────────────────────────────────────

/// Consumer-side proxy for one channel of a bound service.
pub trait Consumer<T>: Send {
    /// Request delivery with at most `queue_depth` buffered samples.
    fn subscribe(&mut self, queue_depth: usize) -> Result<(), MiddlewareError>;

    fn unsubscribe(&mut self);

    fn subscription_state(&self) -> SubscriptionState;

    /// Hand every buffered sample to `on_sample`, oldest first, and return
    /// how many were delivered.
    fn drain_new_samples(&mut self, on_sample: &mut dyn FnMut(T)) -> Result<usize, MiddlewareError>;

    fn set_receive_handler(&mut self, handler: ReceiveHandler) -> Result<(), MiddlewareError>;

    fn unset_receive_handler(&mut self);
}

/// Provider-side proxy for one channel of an offered service.
pub trait Provider<T>: Send {
    /// Blocking publish to all current subscribers.
    fn publish(&mut self, value: T) -> Result<(), MiddlewareError>;
}

/// The pub/sub collaborator a [`Port`](crate::port::Port) is built on.
pub trait Middleware<T>: Send + Sync {
    fn start_find_service(
        &self,
        specifier: &InstanceSpecifier,
        on_found: FindCallback,
    ) -> Result<FindHandle, MiddlewareError>;

    fn stop_find_service(&self, handle: FindHandle);

    fn offer_service(&self, specifier: &InstanceSpecifier) -> Result<ServiceHandle, MiddlewareError>;

    fn stop_offer_service(&self, service: ServiceHandle);

    fn consumer(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<Box<dyn Consumer<T>>, MiddlewareError>;

    fn provider(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<Box<dyn Provider<T>>, MiddlewareError>;
}
