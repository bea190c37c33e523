//! Inverse-CDF sampling
//!
//! This module turns a uniform draw in `[0, 1)` into a value from a configured
//! distribution by evaluating the inverse of its cumulative distribution
//! function. Two kinds are supported:
//!
//! - **Continuous**: a compiled-in closed-form inverse CDF, looked up by name
//!   (see [`linear`])
//! - **Discrete**: an empirically-specified weighted histogram, interpolated
//!   over equal-width buckets (see [`histogram`])
//!
//! # Purity
//!
//! The draw is supplied by the caller, never generated here. Given the same
//! draw a distribution always returns the same value, which keeps sampling
//! trivially testable and lets each device own its RNG.
//!
//! # Example
//!
//! ```
//! use simpulse::config::{DistributionConfig, Range};
//! use simpulse::sampler::DistributionRegistry;
//! use std::collections::BTreeMap;
//!
//! let mut configs = BTreeMap::new();
//! configs.insert(
//!     "linear".to_string(),
//!     DistributionConfig::Continuous {
//!         range: Range::new(0.0, 1.0),
//!         inv_cdf: "linear".to_string(),
//!     },
//! );
//!
//! let registry = DistributionRegistry::build(&configs).unwrap();
//! let dist = registry.get("linear").unwrap();
//! assert_eq!(dist.sample(0.25), 0.5); // sqrt(0.25)
//! ```

pub mod histogram;
pub mod linear;

use crate::config::{DistributionConfig, Range};
use anyhow::Context;
use histogram::DiscreteSampler;
use linear::LinearLaw;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors constructing a distribution from its configuration
#[derive(Debug, Error, PartialEq)]
pub enum DistributionError {
    /// Continuous law name not present in the compiled-in registry
    #[error("unknown continuous inverse-CDF law \"{0}\"")]
    UnknownLaw(String),

    /// Discrete histogram with no buckets
    #[error("histogram has no points")]
    EmptyHistogram,

    /// Discrete histogram weight below zero
    #[error("histogram weight {0} is negative")]
    NegativeWeight(f64),

    /// Discrete histogram weights sum to zero, no bucket is reachable
    #[error("histogram weights sum to zero")]
    ZeroWeightSum,

    /// Support range with non-positive width
    #[error("support range [{0}, {1}] is empty")]
    EmptyRange(f64, f64),
}

/// Inverse cumulative distribution function
///
/// Maps a uniform draw in `[0, 1)` to a value inside the distribution's
/// support range. Implementations must be deterministic and are shared
/// read-only across all device threads.
pub trait InverseCdf: Send + Sync {
    fn eval(&self, draw: f64) -> f64;
}

/// One configured distribution: a support range plus its inverse CDF
///
/// Immutable after construction. The raw sample lies in `range`; devices
/// rescale it into their own value range before emission.
pub struct Distribution {
    range: Range,
    law: Box<dyn InverseCdf>,
}

impl std::fmt::Debug for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distribution")
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

impl Distribution {
    fn new(range: Range, law: Box<dyn InverseCdf>) -> Result<Self, DistributionError> {
        if !(range.span() > 0.0) {
            return Err(DistributionError::EmptyRange(range.lo, range.hi));
        }
        Ok(Self { range, law })
    }

    /// Build from a config entry
    pub fn from_config(config: &DistributionConfig) -> Result<Self, DistributionError> {
        match config {
            DistributionConfig::Continuous { range, inv_cdf } => {
                let law = continuous_law(inv_cdf)
                    .ok_or_else(|| DistributionError::UnknownLaw(inv_cdf.clone()))?;
                Self::new(*range, law)
            }
            DistributionConfig::Discrete { range, points } => {
                let sampler = DiscreteSampler::new(points, *range)?;
                Self::new(*range, Box::new(sampler))
            }
        }
    }

    /// Sample the distribution at a uniform draw in `[0, 1)`
    ///
    /// Returns a raw value in [`Self::range`].
    pub fn sample(&self, draw: f64) -> f64 {
        self.law.eval(draw)
    }

    /// Support range of the raw sample
    pub fn range(&self) -> Range {
        self.range
    }
}

/// Look up a compiled-in continuous inverse-CDF law by name
///
/// The original design imported laws from user-supplied files at runtime;
/// here they are a static table, extended by adding a module and an arm.
fn continuous_law(name: &str) -> Option<Box<dyn InverseCdf>> {
    match name {
        "linear" => Some(Box::new(LinearLaw)),
        _ => None,
    }
}

/// Named distributions, built once at startup and shared by all devices
///
/// Read-only after construction, so no locking is needed.
#[derive(Debug)]
pub struct DistributionRegistry {
    distributions: BTreeMap<String, Arc<Distribution>>,
}

impl DistributionRegistry {
    /// Build the registry from loaded configuration
    ///
    /// Fails on the first invalid entry; a distribution definition error is
    /// fatal before any device references it.
    pub fn build(configs: &BTreeMap<String, DistributionConfig>) -> crate::Result<Self> {
        let mut distributions = BTreeMap::new();
        for (name, config) in configs {
            let dist = Distribution::from_config(config)
                .with_context(|| format!("Distribution \"{name}\" is invalid"))?;
            distributions.insert(name.clone(), Arc::new(dist));
        }
        Ok(Self { distributions })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Distribution>> {
        self.distributions.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.distributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distributions.is_empty()
    }
}
