//! Session command protocol
//!
//! Shared vocabulary between the controller and every device in one session:
//! topic names and the JSON message shapes exchanged on them. All payloads
//! are serde-tagged records; the tag field is `"cmd"`.
//!
//! # Topics
//!
//! ```text
//! session:{session_id}            controller → devices (broadcast commands)
//! session:{session_id}:response   devices → controller
//! <device.topic>                  device → any subscriber (telemetry)
//! ```
//!
//! # Message Flow
//!
//! ```text
//! Controller                          Device
//!     |                                 |
//!     |-------- gather ---------------->|
//!     |<------- gather(data, stats) ----|
//!     |                                 |
//!     |-------- stop_device(id) ------->|
//!     |<------- stop_device(id, msg) ---|   (matching device only)
//!     |                                 |
//!     |-------- stop_session ---------->|   (no response, loops exit)
//! ```
//!
//! The bus carries no sender identity; a controller tells responses apart by
//! the `id`/`name` embedded in the payload. Delivery is at-least-once at
//! best, unordered across devices, with no replay for late subscribers.

use crate::config::DeviceConfig;
use crate::stats::StatsSnapshot;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Broadcast topic a session's devices listen on for commands
pub fn command_topic(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Topic devices publish command responses on
pub fn response_topic(session_id: &str) -> String {
    format!("session:{session_id}:response")
}

/// Controller → device command, broadcast to the whole session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Stop every device in the session
    StopSession,
    /// Stop the single device whose id matches
    StopDevice { id: u64 },
    /// Ask every device for its configuration and statistics
    Gather,
}

impl Command {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to encode command")
    }

    /// Decode an inbound command payload
    ///
    /// Malformed or unrecognized payloads are an error here; the device
    /// runtime ignores them (protocol errors are never fatal).
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).context("Unrecognized command payload")
    }
}

/// Device → controller response, mirroring the command tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Response {
    /// Confirmation that one device stopped
    StopDevice { id: u64, msg: String },
    /// Configuration snapshot plus current statistics
    Gather {
        data: DeviceConfig,
        stats: StatsSnapshot,
    },
}

impl Response {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).context("Failed to encode response")
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).context("Unrecognized response payload")
    }
}

/// One measurement inside a telemetry batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "type")]
    pub data_type: String,
    pub grade: String,
    pub value: f64,
    /// Wall-clock seconds since the Unix epoch
    pub timestamp: f64,
}

/// Encode a telemetry batch (one message per tick, one entry per channel)
pub fn encode_batch(samples: &[Sample]) -> Result<Vec<u8>> {
    serde_json::to_vec(samples).context("Failed to encode telemetry batch")
}

/// Decode a telemetry batch
pub fn decode_batch(payload: &[u8]) -> Result<Vec<Sample>> {
    serde_json::from_slice(payload).context("Malformed telemetry batch")
}
