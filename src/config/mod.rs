//! Configuration module
//!
//! Handles CLI argument parsing, JSON configuration files, and validation.
//!
//! Three files describe one simulation run:
//!
//! - `config.json`: bus connection parameters ([`BusConfig`])
//! - `devices.json`: the fleet, one [`DeviceConfig`] per device
//! - `distributions.json`: named [`DistributionConfig`] entries referenced
//!   by devices
//!
//! All loading errors are fatal at startup, before any device starts.

pub mod cli;
pub mod validator;

use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Closed interval `[lo, hi]`, serialized as a two-element JSON array
///
/// Used both for a distribution's support range and for a device's output
/// value range. Rescaling between the two is an affine map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Range {
    pub lo: f64,
    pub hi: f64,
}

impl Range {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Width of the interval
    pub fn span(&self) -> f64 {
        self.hi - self.lo
    }

    /// Affine map of `raw` (a point in `from`) into this range
    ///
    /// `(raw - from.lo) / from.span() * self.span() + self.lo`
    pub fn rescale_from(&self, from: &Range, raw: f64) -> f64 {
        (raw - from.lo) / from.span() * self.span() + self.lo
    }
}

impl From<[f64; 2]> for Range {
    fn from(v: [f64; 2]) -> Self {
        Self { lo: v[0], hi: v[1] }
    }
}

impl From<Range> for [f64; 2] {
    fn from(r: Range) -> Self {
        [r.lo, r.hi]
    }
}

/// Bus connection parameters (`config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker hostname or address
    pub hostname: String,
    /// Broker port
    pub port: u16,
    /// Keepalive interval in seconds
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
}

fn default_keepalive() -> u64 {
    20
}

/// One simulated device (`devices.json` entry)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique, stable for the session
    pub id: u64,
    /// Human-readable device name
    pub name: String,
    /// Telemetry publish topic
    pub topic: String,
    /// Sampling frequency in Hz (ticks per second)
    pub frequency: f64,
    /// Probability that a tick's packet is dropped, in [0, 1]
    pub drop_rate: f64,
    /// Samples per published batch
    pub data_channels: usize,
    /// Reported sample type (e.g. "temperature")
    pub data_type: String,
    /// Reported sample grade (e.g. "celsius")
    pub data_grade: String,
    /// Output value range the distribution's raw output is rescaled into
    pub range: Range,
    /// Name of the configured distribution this device samples from
    pub distribution: String,
    /// Bus delivery hint (0..=2)
    #[serde(default)]
    pub qos: u8,
}

impl DeviceConfig {
    /// "name (id N)" form used in logs and stop confirmations
    pub fn full_name(&self) -> String {
        format!("{} (id {})", self.name, self.id)
    }
}

/// One configured distribution (`distributions.json` entry), tagged by kind
///
/// An unknown `type` tag fails deserialization, so a bad distribution kind is
/// caught at load time before any device references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DistributionConfig {
    /// Closed-form inverse CDF, looked up by name in the compiled-in law registry
    Continuous { range: Range, inv_cdf: String },
    /// Weighted histogram over equal-width buckets
    Discrete { range: Range, points: Vec<f64> },
}

impl DistributionConfig {
    pub fn range(&self) -> Range {
        match self {
            DistributionConfig::Continuous { range, .. } => *range,
            DistributionConfig::Discrete { range, .. } => *range,
        }
    }
}

/// Load bus connection config from a JSON file
pub fn load_bus_config(path: &Path) -> Result<BusConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot load bus config file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Malformed bus config in {}", path.display()))
}

/// Load the device fleet from a JSON file (array of device records)
pub fn load_devices(path: &Path) -> Result<Vec<DeviceConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("No devices were provided ({})", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Malformed device list in {}", path.display()))
}

/// Load the distribution registry config from a JSON file (name → entry map)
pub fn load_distributions(path: &Path) -> Result<BTreeMap<String, DistributionConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("No distributions were provided ({})", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Malformed distribution list in {}", path.display()))
}
