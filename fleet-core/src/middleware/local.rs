/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! In-process implementation of the [`Middleware`] collaborator.
//!
//! All components of one process share a single [`LocalRuntime`].  It keeps
//! a registry of offered services and running searches, and one
//! type-erased topic per `(service, channel)` pair:
//!
//! ```text
//! Registry ──► topics[(ServiceHandle, "raw_data")] ──► Topic<RawData>
//!                                                         ├── latest (fields only)
//!                                                         └── subscribers: [queue(depth), …]
//! ```
//!
//! Find callbacks and data-ready handlers are always invoked **after** the
//! registry / topic locks have been released, so a callback may call back
//! into the runtime.

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use super::{
    ChannelKind, Consumer, FindCallback, FindHandle, InstanceSpecifier, Middleware,
    MiddlewareError, Provider, ReceiveHandler, ServiceHandle, SubscriptionState,
};

// ── Topics ────────────────────────────────────────────────────────────────────

struct SubscriberQueue<T> {
    samples: VecDeque<T>,
    depth: usize,
    state: SubscriptionState,
    on_ready: Option<ReceiveHandler>,
}

struct Subscriber<T> {
    queue: Mutex<SubscriberQueue<T>>,
}

struct TopicState<T> {
    offered: bool,
    latest: Option<T>,
    subscribers: Vec<Arc<Subscriber<T>>>,
}

struct Topic<T> {
    kind: ChannelKind,
    state: Mutex<TopicState<T>>,
}

impl<T> Topic<T> {
    fn new(kind: ChannelKind, offered: bool) -> Self {
        Self {
            kind,
            state: Mutex::new(TopicState {
                offered,
                latest: None,
                subscribers: Vec::new(),
            }),
        }
    }
}

/// Payload-independent view of a topic so the registry can hold topics of
/// every payload type in one map.
trait ErasedTopic: Send + Sync {
    fn set_offered(&self, offered: bool);
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Send + 'static> ErasedTopic for Topic<T> {
    fn set_offered(&self, offered: bool) {
        let mut state = self.state.lock();
        state.offered = offered;
        for sub in &state.subscribers {
            let mut queue = sub.queue.lock();
            if queue.state != SubscriptionState::Unsubscribed {
                queue.state = if offered {
                    SubscriptionState::Subscribed
                } else {
                    SubscriptionState::Pending
                };
            }
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

struct Search {
    specifier: InstanceSpecifier,
    callback: FindCallback,
}

#[derive(Default)]
struct Registry {
    next_find: u64,
    next_service: u16,
    next_instance: u16,
    service_ids: HashMap<InstanceSpecifier, u16>,
    known: HashSet<ServiceHandle>,
    /// Offered instances per specifier, in offer order.
    offered: HashMap<InstanceSpecifier, Vec<ServiceHandle>>,
    searches: HashMap<FindHandle, Search>,
    topics: HashMap<(ServiceHandle, String), Arc<dyn ErasedTopic>>,
}

impl Registry {
    /// Stable id per specifier.  Ids are never reused, so running out is an
    /// error rather than a wrap onto an id another specifier holds.
    fn service_id(&mut self, specifier: &InstanceSpecifier) -> Result<u16, MiddlewareError> {
        if let Some(&id) = self.service_ids.get(specifier) {
            return Ok(id);
        }
        let id = self.next_service.checked_add(1).ok_or_else(|| {
            MiddlewareError::Transport(format!("no service id left for '{specifier}'"))
        })?;
        self.next_service = id;
        self.service_ids.insert(specifier.clone(), id);
        Ok(id)
    }

    fn instance_id(&mut self) -> Result<u16, MiddlewareError> {
        let id = self
            .next_instance
            .checked_add(1)
            .ok_or_else(|| MiddlewareError::Transport("instance ids exhausted".to_string()))?;
        self.next_instance = id;
        Ok(id)
    }

    fn instances(&self, specifier: &InstanceSpecifier) -> Vec<ServiceHandle> {
        self.offered.get(specifier).cloned().unwrap_or_default()
    }

    fn is_offered(&self, service: ServiceHandle) -> bool {
        self.offered.values().any(|v| v.contains(&service))
    }

    /// Callbacks of every search for `specifier`, paired with the current
    /// instance list.
    fn notifications(&self, specifier: &InstanceSpecifier) -> Vec<(FindCallback, Vec<ServiceHandle>)> {
        let instances = self.instances(specifier);
        self.searches
            .values()
            .filter(|s| &s.specifier == specifier)
            .map(|s| (Arc::clone(&s.callback), instances.clone()))
            .collect()
    }
}

// ── LocalRuntime ──────────────────────────────────────────────────────────────

/// Process-wide in-memory pub/sub runtime.
pub struct LocalRuntime {
    initialized: Arc<AtomicBool>,
    registry: Mutex<Registry>,
}

impl LocalRuntime {
    /// Bring up the runtime.  Components and pools must only be created after
    /// this succeeded.
    pub fn initialize() -> Result<Arc<Self>, MiddlewareError> {
        info!("local middleware runtime initialized");
        Ok(Arc::new(Self {
            initialized: Arc::new(AtomicBool::new(true)),
            registry: Mutex::new(Registry::default()),
        }))
    }

    /// Tear the runtime down.  Every later call fails with
    /// [`MiddlewareError::NotInitialized`].
    pub fn deinitialize(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        info!("local middleware runtime deinitialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<(), MiddlewareError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(MiddlewareError::NotInitialized)
        }
    }

    /// Currently offered instances of `specifier`.
    pub fn offered_instances(&self, specifier: &InstanceSpecifier) -> Vec<ServiceHandle> {
        self.registry.lock().instances(specifier)
    }

    pub fn active_searches(&self) -> usize {
        self.registry.lock().searches.len()
    }

    // ── Discovery ─────────────────────────────────────────────────────────────

    /// Register `on_found` for `specifier`.  It fires immediately with the
    /// instances available right now (possibly none) and again on every
    /// offer / stop-offer of that specifier.
    pub fn start_find_service(
        &self,
        specifier: &InstanceSpecifier,
        on_found: FindCallback,
    ) -> Result<FindHandle, MiddlewareError> {
        self.ensure_initialized()?;
        let (handle, current) = {
            let mut reg = self.registry.lock();
            reg.next_find += 1;
            let handle = FindHandle(reg.next_find);
            reg.searches.insert(
                handle,
                Search {
                    specifier: specifier.clone(),
                    callback: Arc::clone(&on_found),
                },
            );
            (handle, reg.instances(specifier))
        };
        debug!(service = %specifier, search = handle.0, "find service started");
        on_found(current);
        Ok(handle)
    }

    pub fn stop_find_service(&self, handle: FindHandle) {
        if self.registry.lock().searches.remove(&handle).is_some() {
            debug!(search = handle.0, "find service stopped");
        }
    }

    pub fn offer_service(&self, specifier: &InstanceSpecifier) -> Result<ServiceHandle, MiddlewareError> {
        self.ensure_initialized()?;
        let (service, notify) = {
            let mut reg = self.registry.lock();
            let service = ServiceHandle {
                service_id: reg.service_id(specifier)?,
                instance_id: reg.instance_id()?,
            };
            reg.known.insert(service);
            reg.offered.entry(specifier.clone()).or_default().push(service);
            (service, reg.notifications(specifier))
        };
        info!(service = %specifier, handle = %service, "service offered");
        for (callback, instances) in notify {
            callback(instances);
        }
        Ok(service)
    }

    pub fn stop_offer_service(&self, service: ServiceHandle) {
        let (topics, notify) = {
            let mut reg = self.registry.lock();
            let specifier = reg
                .offered
                .iter()
                .find(|(_, v)| v.contains(&service))
                .map(|(k, _)| k.clone());
            let Some(specifier) = specifier else {
                trace!(handle = %service, "stop offer for a service that is not offered");
                return;
            };
            if let Some(list) = reg.offered.get_mut(&specifier) {
                list.retain(|h| *h != service);
            }
            let topics: Vec<Arc<dyn ErasedTopic>> = reg
                .topics
                .iter()
                .filter(|((h, _), _)| *h == service)
                .map(|(_, t)| Arc::clone(t))
                .collect();
            (topics, reg.notifications(&specifier))
        };
        info!(handle = %service, "service offer withdrawn");
        for topic in topics {
            topic.set_offered(false);
        }
        for (callback, instances) in notify {
            callback(instances);
        }
    }

    // ── Channels ──────────────────────────────────────────────────────────────

    fn topic<T: Send + 'static>(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<Arc<Topic<T>>, MiddlewareError> {
        self.ensure_initialized()?;
        let mut reg = self.registry.lock();
        if !reg.known.contains(&service) {
            return Err(MiddlewareError::ServiceNotFound(service));
        }
        let offered = reg.is_offered(service);
        let erased = Arc::clone(
            reg.topics
                .entry((service, channel.to_string()))
                .or_insert_with(|| Arc::new(Topic::<T>::new(kind, offered)) as Arc<dyn ErasedTopic>),
        );
        erased
            .into_any()
            .downcast::<Topic<T>>()
            .map_err(|_| MiddlewareError::TypeMismatch {
                service,
                channel: channel.to_string(),
            })
    }

    pub fn consumer<T: Clone + Send + 'static>(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<LocalConsumer<T>, MiddlewareError> {
        let topic = self.topic::<T>(service, channel, kind)?;
        Ok(LocalConsumer {
            topic,
            subscriber: None,
        })
    }

    pub fn provider<T: Clone + Send + 'static>(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<LocalProvider<T>, MiddlewareError> {
        let topic = self.topic::<T>(service, channel, kind)?;
        Ok(LocalProvider {
            initialized: Arc::clone(&self.initialized),
            service,
            topic,
        })
    }
}

impl<T: Clone + Send + 'static> Middleware<T> for LocalRuntime {
    fn start_find_service(
        &self,
        specifier: &InstanceSpecifier,
        on_found: FindCallback,
    ) -> Result<FindHandle, MiddlewareError> {
        LocalRuntime::start_find_service(self, specifier, on_found)
    }

    fn stop_find_service(&self, handle: FindHandle) {
        LocalRuntime::stop_find_service(self, handle)
    }

    fn offer_service(&self, specifier: &InstanceSpecifier) -> Result<ServiceHandle, MiddlewareError> {
        LocalRuntime::offer_service(self, specifier)
    }

    fn stop_offer_service(&self, service: ServiceHandle) {
        LocalRuntime::stop_offer_service(self, service)
    }

    fn consumer(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<Box<dyn Consumer<T>>, MiddlewareError> {
        Ok(Box::new(LocalRuntime::consumer::<T>(self, service, channel, kind)?))
    }

    fn provider(
        &self,
        service: ServiceHandle,
        channel: &str,
        kind: ChannelKind,
    ) -> Result<Box<dyn Provider<T>>, MiddlewareError> {
        Ok(Box::new(LocalRuntime::provider::<T>(self, service, channel, kind)?))
    }
}

// ── Proxies ───────────────────────────────────────────────────────────────────

/// Consumer proxy over a local topic.  Unsubscribes on drop.
pub struct LocalConsumer<T> {
    topic: Arc<Topic<T>>,
    subscriber: Option<Arc<Subscriber<T>>>,
}

impl<T> LocalConsumer<T> {
    fn detach(&mut self) {
        if let Some(sub) = self.subscriber.take() {
            {
                let mut queue = sub.queue.lock();
                queue.state = SubscriptionState::Unsubscribed;
                queue.samples.clear();
                queue.on_ready = None;
            }
            self.topic.state.lock()
                .subscribers
                .retain(|s| !Arc::ptr_eq(s, &sub));
        }
    }
}

impl<T> Drop for LocalConsumer<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<T: Clone + Send + 'static> Consumer<T> for LocalConsumer<T> {
    fn subscribe(&mut self, queue_depth: usize) -> Result<(), MiddlewareError> {
        if self.subscriber.is_some() {
            return Ok(());
        }
        let mut state = self.topic.state.lock();
        let mut queue = SubscriberQueue {
            samples: VecDeque::new(),
            depth: queue_depth.max(1),
            state: if state.offered {
                SubscriptionState::Subscribed
            } else {
                SubscriptionState::Pending
            },
            on_ready: None,
        };
        if self.topic.kind == ChannelKind::Field {
            if let Some(latest) = &state.latest {
                queue.samples.push_back(latest.clone());
            }
        }
        let sub = Arc::new(Subscriber {
            queue: Mutex::new(queue),
        });
        state.subscribers.push(Arc::clone(&sub));
        self.subscriber = Some(sub);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.detach();
    }

    fn subscription_state(&self) -> SubscriptionState {
        self.subscriber
            .as_ref()
            .map(|s| s.queue.lock().state)
            .unwrap_or(SubscriptionState::Unsubscribed)
    }

    fn drain_new_samples(&mut self, on_sample: &mut dyn FnMut(T)) -> Result<usize, MiddlewareError> {
        let sub = self.subscriber.as_ref().ok_or(MiddlewareError::NotSubscribed)?;
        let samples: Vec<T> = sub.queue.lock().samples.drain(..).collect();
        let count = samples.len();
        for sample in samples {
            on_sample(sample);
        }
        Ok(count)
    }

    fn set_receive_handler(&mut self, handler: ReceiveHandler) -> Result<(), MiddlewareError> {
        let sub = self.subscriber.as_ref().ok_or(MiddlewareError::NotSubscribed)?;
        sub.queue.lock().on_ready = Some(handler);
        Ok(())
    }

    fn unset_receive_handler(&mut self) {
        if let Some(sub) = &self.subscriber {
            sub.queue.lock().on_ready = None;
        }
    }
}

/// Provider proxy over a local topic.
pub struct LocalProvider<T> {
    initialized: Arc<AtomicBool>,
    service: ServiceHandle,
    topic: Arc<Topic<T>>,
}

impl<T: Clone + Send + 'static> Provider<T> for LocalProvider<T> {
    fn publish(&mut self, value: T) -> Result<(), MiddlewareError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(MiddlewareError::NotInitialized);
        }
        let ready: Vec<ReceiveHandler> = {
            let mut state = self.topic.state.lock();
            if !state.offered {
                return Err(MiddlewareError::NotOffered(self.service));
            }
            let mut ready = Vec::new();
            for sub in &state.subscribers {
                let mut queue = sub.queue.lock();
                if queue.state != SubscriptionState::Subscribed {
                    continue;
                }
                if queue.samples.len() >= queue.depth {
                    // newest wins
                    queue.samples.pop_front();
                }
                queue.samples.push_back(value.clone());
                if let Some(handler) = &queue.on_ready {
                    ready.push(Arc::clone(handler));
                }
            }
            if self.topic.kind == ChannelKind::Field {
                state.latest = Some(value);
            }
            ready
        };
        for handler in ready {
            handler();
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
