//! simpulse - device-fleet simulator
//!
//! simpulse simulates a fleet of data-emitting devices. Each device publishes
//! batches of synthetic measurements on its own pub/sub topic and answers
//! session-wide commands from a controller (stop the session, stop one device,
//! gather configuration and statistics).
//!
//! # Architecture
//!
//! - **Inverse-CDF sampling**: closed-form continuous laws and weighted-histogram
//!   discrete distributions, configured once at startup
//! - **Per-device runtime**: independent tick loop with probabilistic packet
//!   drops and atomic packet/byte accounting
//! - **Session protocol**: tagged command/response messages on namespaced topics
//! - **Orchestrator**: start-all, wait-for-signal, join-all fleet lifecycle

pub mod bus;
pub mod config;
pub mod device;
pub mod orchestrator;
pub mod protocol;
pub mod sampler;
pub mod session;
pub mod stats;

// Re-export commonly used types
pub use config::{BusConfig, DeviceConfig, DistributionConfig};
pub use sampler::DistributionRegistry;
pub use session::SessionContext;

/// Result type used throughout simpulse
pub type Result<T> = anyhow::Result<T>;
