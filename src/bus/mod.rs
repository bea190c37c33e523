//! Pub/sub bus abstraction
//!
//! The transport is an external collaborator: an opaque, best-effort
//! publish/subscribe bus addressed by topic strings. The core only needs the
//! two traits here; [`memory::MemoryBus`] provides an in-process loopback
//! implementation for standalone runs and tests, and a broker-backed
//! connector can be plugged in from outside the crate.
//!
//! # Delivery semantics assumed by the core
//!
//! - A published message reaches all *current* subscribers of the topic at
//!   least once (or not at all on a lossy transport)
//! - No ordering across different publishers
//! - No replay for late subscribers
//! - Inbound messages are delivered to the subscription handler on the bus's
//!   own delivery context, which may not be the subscriber's thread

pub mod memory;

use crate::Result;
use std::sync::Arc;

/// Callback invoked with each inbound message payload
///
/// Runs on the bus delivery context; anything it touches must be safe for
/// concurrent access with the owning device's loop.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// One client's connection to the bus
///
/// Exclusively owned by one device (or controller), but shared between that
/// device's tick loop and its command-handler closure, hence `&self` methods
/// and `Send + Sync`.
pub trait BusConnection: Send + Sync {
    /// Publish `payload` on `topic` with a delivery hint `qos` (0..=2)
    fn publish(&self, topic: &str, payload: &[u8], qos: u8) -> Result<()>;

    /// Register `handler` for every subsequent message on `topic`
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<()>;

    /// Tear the connection down; publishing afterwards is an error
    fn disconnect(&self) -> Result<()>;
}

/// Factory producing one connection per client
pub trait BusConnector: Send + Sync {
    fn connect(&self, client_id: &str) -> Result<Arc<dyn BusConnection>>;
}
