//! In-process loopback bus
//!
//! A minimal broker living inside the process: topic → subscriber handlers,
//! synchronous fan-out on the publisher's thread. Used by tests and by
//! standalone runs where no external broker is wired in.
//!
//! Handlers are invoked outside the broker lock, so a handler may itself
//! publish (e.g. a device answering `gather` from inside its command
//! handler) without deadlocking.

use super::{BusConnection, BusConnector, MessageHandler};
use crate::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct Subscription {
    client: u64,
    handler: MessageHandler,
}

#[derive(Default)]
struct Broker {
    topics: HashMap<String, Vec<Subscription>>,
}

/// In-memory pub/sub broker shared by every connection it hands out
#[derive(Clone, Default)]
pub struct MemoryBus {
    broker: Arc<Mutex<Broker>>,
    next_client: Arc<AtomicU64>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BusConnector for MemoryBus {
    fn connect(&self, client_id: &str) -> Result<Arc<dyn BusConnection>> {
        let client = self.next_client.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(client_id, "memory bus client connected");
        Ok(Arc::new(MemoryBusConnection {
            broker: Arc::clone(&self.broker),
            client,
            client_id: client_id.to_string(),
            connected: AtomicBool::new(true),
        }))
    }
}

/// One client's handle on the [`MemoryBus`]
pub struct MemoryBusConnection {
    broker: Arc<Mutex<Broker>>,
    client: u64,
    client_id: String,
    connected: AtomicBool,
}

impl MemoryBusConnection {
    fn ensure_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            anyhow::bail!("Bus client \"{}\" is disconnected", self.client_id);
        }
        Ok(())
    }
}

impl BusConnection for MemoryBusConnection {
    fn publish(&self, topic: &str, payload: &[u8], _qos: u8) -> Result<()> {
        self.ensure_connected()?;

        // Snapshot the handlers so they run outside the broker lock
        let handlers: Vec<MessageHandler> = {
            let broker = self.broker.lock().unwrap();
            match broker.topics.get(topic) {
                Some(subs) => subs.iter().map(|s| Arc::clone(&s.handler)).collect(),
                None => Vec::new(),
            }
        };

        for handler in handlers {
            handler(payload);
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<()> {
        self.ensure_connected()?;
        let mut broker = self.broker.lock().unwrap();
        broker.topics.entry(topic.to_string()).or_default().push(Subscription {
            client: self.client,
            handler,
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::Relaxed) {
            let mut broker = self.broker.lock().unwrap();
            for subs in broker.topics.values_mut() {
                subs.retain(|s| s.client != self.client);
            }
            tracing::debug!(client_id = %self.client_id, "memory bus client disconnected");
        }
        Ok(())
    }
}
