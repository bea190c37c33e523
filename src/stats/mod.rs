//! Per-device statistics
//!
//! Four monotone counters per device: packets/bytes sent and packets/bytes
//! dropped. The sampling loop is the only writer; the command-handling path
//! reads a snapshot when answering `gather`. Plain atomics with relaxed
//! ordering are enough - each counter is independent and counters are never
//! reset during a session.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic packet/byte counters for one device
///
/// Increments happen only after the corresponding publish decision is
/// finalized, so a snapshot is never fresher than the device's actual
/// publish history.
#[derive(Debug, Default)]
pub struct DeviceStats {
    sent_packets: AtomicU64,
    sent_size: AtomicU64,
    dropped_packets: AtomicU64,
    dropped_size: AtomicU64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one published packet of `bytes` serialized size
    #[inline]
    pub fn record_sent(&self, bytes: u64) {
        self.sent_packets.fetch_add(1, Ordering::Relaxed);
        self.sent_size.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one dropped packet and the size it would have had
    #[inline]
    pub fn record_dropped(&self, bytes: u64) {
        self.dropped_packets.fetch_add(1, Ordering::Relaxed);
        self.dropped_size.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn sent_packets(&self) -> u64 {
        self.sent_packets.load(Ordering::Relaxed)
    }

    pub fn dropped_packets(&self) -> u64 {
        self.dropped_packets.load(Ordering::Relaxed)
    }

    /// Consistent-enough snapshot for a `gather` response
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent_packets: self.sent_packets.load(Ordering::Relaxed),
            sent_size: self.sent_size.load(Ordering::Relaxed),
            dropped_packets: self.dropped_packets.load(Ordering::Relaxed),
            dropped_size: self.dropped_size.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot, embedded in `gather` responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub sent_packets: u64,
    pub sent_size: u64,
    pub dropped_packets: u64,
    pub dropped_size: u64,
}

impl StatsSnapshot {
    pub fn total_packets(&self) -> u64 {
        self.sent_packets + self.dropped_packets
    }
}
