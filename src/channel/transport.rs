//! Peer-facing transport: a live bus subscription or an isolated no-op

use futures::future;
use serde_json::Value;
use tracing::{debug, warn};

use super::bus::{Bus, Subscription};
use super::message::Message;

/// The broadcast capability a coordinator talks through
pub enum Transport {
    /// Member of a shared group
    Channel(Subscription),
    /// No group could be joined; posting and closing do nothing and nothing
    /// is ever received
    Null,
}

impl Transport {
    /// Join `name` on `bus`, degrading to [`Transport::Null`] when the group
    /// cannot be joined
    pub fn connect(bus: &Bus, name: &str) -> Self {
        match bus.subscribe(name) {
            Ok(subscription) => Transport::Channel(subscription),
            Err(e) => {
                warn!("Failed to join channel '{}': {}. Running isolated.", name, e);
                Transport::Null
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Transport::Null)
    }

    /// Broadcast a message to every other member; returns the number of
    /// members it was queued for
    pub fn post(&self, message: &Message) -> usize {
        let Transport::Channel(subscription) = self else {
            return 0;
        };
        match message.encode() {
            Ok(value) => {
                let delivered = subscription.post(&value);
                debug!(
                    "posted {} to {} peer(s) on '{}'",
                    message.tag(),
                    delivered,
                    subscription.name()
                );
                delivered
            }
            Err(e) => {
                warn!("Failed to encode {} message: {}", message.tag(), e);
                0
            }
        }
    }

    /// Next raw value from the group. `None` means the group went away.
    pub async fn recv(&mut self) -> Option<Value> {
        match self {
            Transport::Channel(subscription) => subscription.recv().await,
            Transport::Null => future::pending().await,
        }
    }

    pub fn close(&mut self) {
        if let Transport::Channel(subscription) = self {
            subscription.close();
        }
    }
}
