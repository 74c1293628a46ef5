//! In-process broadcast bus
//!
//! Peers join a named group and every value posted by one subscriber is
//! queued, in posting order, for every *other* subscriber of that group.
//! Queues are unbounded so a slow peer never loses messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Handle to a set of named broadcast groups. Clones share the same groups.
#[derive(Clone, Default)]
pub struct Bus {
    inner: Arc<Mutex<BusInner>>,
}

#[derive(Default)]
struct BusInner {
    groups: HashMap<String, HashMap<u64, mpsc::UnboundedSender<Value>>>,
    next_id: u64,
    closed: bool,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the group called `name`
    pub fn subscribe(&self, name: &str) -> AppResult<Subscription> {
        if name.trim().is_empty() {
            return Err(AppError::channel_unavailable("channel name is empty"));
        }

        let mut inner = self.lock();
        if inner.closed {
            return Err(AppError::channel_unavailable("bus is closed"));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let group = inner.groups.entry(name.to_string()).or_default();
        group.insert(id, tx);
        debug!("bus: subscriber {} joined '{}' (members={})", id, name, group.len());

        Ok(Subscription {
            id,
            name: name.to_string(),
            bus: self.clone(),
            rx,
            closed: false,
        })
    }

    /// Shut the bus down: every subscriber's queue ends and new subscriptions fail
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.groups.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.lock().groups.get(name).map(|g| g.len()).unwrap_or(0)
    }

    fn publish(&self, name: &str, from: u64, value: &Value) -> usize {
        let mut inner = self.lock();
        let Some(group) = inner.groups.get_mut(name) else {
            return 0;
        };

        let mut delivered = 0;
        group.retain(|&id, tx| {
            if id == from {
                return true;
            }
            match tx.send(value.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                // Receiver gone without unsubscribing
                Err(_) => false,
            }
        });
        delivered
    }

    fn unsubscribe(&self, name: &str, id: u64) {
        let mut inner = self.lock();
        if let Some(group) = inner.groups.get_mut(name) {
            group.remove(&id);
            if group.is_empty() {
                inner.groups.remove(name);
            }
        }
    }
}

/// Membership of one group
pub struct Subscription {
    id: u64,
    name: String,
    bus: Bus,
    rx: mpsc::UnboundedReceiver<Value>,
    closed: bool,
}

impl Subscription {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `value` for every other member; returns how many received it
    pub fn post(&self, value: &Value) -> usize {
        if self.closed {
            return 0;
        }
        self.bus.publish(&self.name, self.id, value)
    }

    /// Next value posted by another member, or `None` once the subscription
    /// or the bus is closed
    pub async fn recv(&mut self) -> Option<Value> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    /// Next value already queued, without waiting
    pub fn try_recv(&mut self) -> Option<Value> {
        if self.closed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Leave the group. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rx.close();
        self.bus.unsubscribe(&self.name, self.id);
        debug!("bus: subscriber {} left '{}'", self.id, self.name);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
