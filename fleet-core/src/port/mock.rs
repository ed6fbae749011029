/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scriptable middleware for port and component tests.
//!
//! Discovery never fires on its own: a test calls [`MockMiddleware::found`]
//! to play the middleware invoking the find callback.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::middleware::{
    ChannelKind, Consumer, FindCallback, FindHandle, InstanceSpecifier, Middleware,
    MiddlewareError, Provider, ReceiveHandler, ServiceHandle, SubscriptionState,
};

pub(crate) struct MockState<T> {
    pub find_callback: Option<FindCallback>,
    pub find_started: usize,
    pub find_stopped: usize,
    pub fail_find: bool,
    pub offered: Vec<ServiceHandle>,
    pub offers_withdrawn: usize,
    pub bound: Vec<ServiceHandle>,
    pub sub_state: SubscriptionState,
    pub subscribe_calls: usize,
    pub unsubscribe_calls: usize,
    pub fail_subscribe: bool,
    pub incoming: VecDeque<T>,
    pub drains: usize,
    pub fail_drain: bool,
    pub published: Vec<T>,
    pub fail_publish: bool,
    pub receive_handler: Option<ReceiveHandler>,
}

impl<T> Default for MockState<T> {
    fn default() -> Self {
        Self {
            find_callback: None,
            find_started: 0,
            find_stopped: 0,
            fail_find: false,
            offered: Vec::new(),
            offers_withdrawn: 0,
            bound: Vec::new(),
            sub_state: SubscriptionState::Unsubscribed,
            subscribe_calls: 0,
            unsubscribe_calls: 0,
            fail_subscribe: false,
            incoming: VecDeque::new(),
            drains: 0,
            fail_drain: false,
            published: Vec::new(),
            fail_publish: false,
            receive_handler: None,
        }
    }
}

pub(crate) struct MockMiddleware<T> {
    state: Arc<Mutex<MockState<T>>>,
}

impl<T> MockMiddleware<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(MockState::default())),
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState<T>) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Play the middleware reporting `handles` for the running search.
    pub fn found(&self, handles: Vec<ServiceHandle>) {
        let callback = self.with(|s| s.find_callback.clone());
        if let Some(callback) = callback {
            callback(handles);
        }
    }

    /// Queue a sample and fire the data-ready handler if one is registered.
    pub fn deliver(&self, sample: T) {
        let handler = self.with(|s| {
            s.incoming.push_back(sample);
            s.receive_handler.clone()
        });
        if let Some(handler) = handler {
            handler();
        }
    }

    pub fn drains(&self) -> usize {
        self.with(|s| s.drains)
    }

    pub fn published_count(&self) -> usize {
        self.with(|s| s.published.len())
    }
}

pub(crate) fn handle(service_id: u16, instance_id: u16) -> ServiceHandle {
    ServiceHandle {
        service_id,
        instance_id,
    }
}

struct MockConsumer<T> {
    state: Arc<Mutex<MockState<T>>>,
}

impl<T: Send> Consumer<T> for MockConsumer<T> {
    fn subscribe(&mut self, _queue_depth: usize) -> Result<(), MiddlewareError> {
        let mut s = self.state.lock();
        s.subscribe_calls += 1;
        if s.fail_subscribe {
            return Err(MiddlewareError::Transport("subscribe refused".into()));
        }
        s.sub_state = SubscriptionState::Subscribed;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let mut s = self.state.lock();
        s.unsubscribe_calls += 1;
        s.sub_state = SubscriptionState::Unsubscribed;
    }

    fn subscription_state(&self) -> SubscriptionState {
        self.state.lock().sub_state
    }

    fn drain_new_samples(&mut self, on_sample: &mut dyn FnMut(T)) -> Result<usize, MiddlewareError> {
        let samples: Vec<T> = {
            let mut s = self.state.lock();
            s.drains += 1;
            if s.fail_drain {
                return Err(MiddlewareError::Transport("drain failed".into()));
            }
            s.incoming.drain(..).collect()
        };
        let n = samples.len();
        samples.into_iter().for_each(|x| on_sample(x));
        Ok(n)
    }

    fn set_receive_handler(&mut self, handler: ReceiveHandler) -> Result<(), MiddlewareError> {
        self.state.lock().receive_handler = Some(handler);
        Ok(())
    }

    fn unset_receive_handler(&mut self) {
        self.state.lock().receive_handler = None;
    }
}

struct MockProvider<T> {
    state: Arc<Mutex<MockState<T>>>,
}

impl<T: Send> Provider<T> for MockProvider<T> {
    fn publish(&mut self, value: T) -> Result<(), MiddlewareError> {
        let mut s = self.state.lock();
        if s.fail_publish {
            return Err(MiddlewareError::Transport("publish failed".into()));
        }
        s.published.push(value);
        Ok(())
    }
}

impl<T: Send + 'static> Middleware<T> for MockMiddleware<T> {
    fn start_find_service(
        &self,
        _specifier: &InstanceSpecifier,
        on_found: FindCallback,
    ) -> Result<FindHandle, MiddlewareError> {
        let mut s = self.state.lock();
        if s.fail_find {
            return Err(MiddlewareError::Transport("discovery unavailable".into()));
        }
        s.find_started += 1;
        s.find_callback = Some(on_found);
        Ok(FindHandle(s.find_started as u64))
    }

    fn stop_find_service(&self, _handle: FindHandle) {
        let mut s = self.state.lock();
        s.find_stopped += 1;
        s.find_callback = None;
    }

    fn offer_service(&self, _specifier: &InstanceSpecifier) -> Result<ServiceHandle, MiddlewareError> {
        let mut s = self.state.lock();
        let service = handle(1, s.offered.len() as u16 + 1);
        s.offered.push(service);
        Ok(service)
    }

    fn stop_offer_service(&self, _service: ServiceHandle) {
        self.state.lock().offers_withdrawn += 1;
    }

    fn consumer(
        &self,
        service: ServiceHandle,
        _channel: &str,
        _kind: ChannelKind,
    ) -> Result<Box<dyn Consumer<T>>, MiddlewareError> {
        self.state.lock().bound.push(service);
        Ok(Box::new(MockConsumer {
            state: Arc::clone(&self.state),
        }))
    }

    fn provider(
        &self,
        _service: ServiceHandle,
        _channel: &str,
        _kind: ChannelKind,
    ) -> Result<Box<dyn Provider<T>>, MiddlewareError> {
        Ok(Box::new(MockProvider {
            state: Arc::clone(&self.state),
        }))
    }
}
