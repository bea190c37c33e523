//! Discrete (weighted histogram) sampler
//!
//! An empirically-specified distribution: an ordered sequence of non-negative
//! weights, one per equal-width bucket of the output domain. Construction
//! normalizes the weights to probabilities and accumulates them; sampling
//! finds the bucket whose cumulative slice contains the draw and
//! interpolates linearly inside it.
//!
//! ```text
//! points  [1, 3]          acc = [0.25, 1.0]      k = 2 buckets
//!
//! draw    0.0 ... 0.25    bucket 0, maps into [0.0, 0.5)
//! draw    0.25 ... 1.0    bucket 1, maps into [0.5, 1.0)
//! ```
//!
//! Bucket 0 extrapolates down to 0 so the full output domain stays reachable.
//! The unit-interval result is finally rescaled into the configured support
//! range.

use super::{DistributionError, InverseCdf};
use crate::config::Range;

/// Inverse CDF computed from a weighted histogram
///
/// Immutable after construction; the cumulative weights are normalized so the
/// last entry is 1 (up to floating-point rounding).
#[derive(Debug)]
pub struct DiscreteSampler {
    /// Cumulative normalized weights, one entry per bucket, non-decreasing
    acc: Vec<f64>,
    range: Range,
}

impl DiscreteSampler {
    /// Build from raw bucket weights
    ///
    /// Weights must be non-empty, non-negative, and sum to a positive value.
    pub fn new(points: &[f64], range: Range) -> Result<Self, DistributionError> {
        if points.is_empty() {
            return Err(DistributionError::EmptyHistogram);
        }
        if let Some(&weight) = points.iter().find(|w| **w < 0.0) {
            return Err(DistributionError::NegativeWeight(weight));
        }

        let sum: f64 = points.iter().sum();
        if sum <= 0.0 {
            return Err(DistributionError::ZeroWeightSum);
        }

        let mut acc = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for weight in points {
            total += weight / sum;
            acc.push(total);
        }

        Ok(Self { acc, range })
    }

    /// Number of buckets
    pub fn buckets(&self) -> usize {
        self.acc.len()
    }
}

impl InverseCdf for DiscreteSampler {
    fn eval(&self, draw: f64) -> f64 {
        let k = self.acc.len();

        // Smallest bucket i with acc[i-1] <= draw < acc[i]. Draws at or past
        // the last cumulative value (floating-point edge effects) clamp to
        // the final bucket.
        let bucket = self.acc.partition_point(|&a| a <= draw).min(k - 1);

        let bucket_size = 1.0 / k as f64;
        let x = if bucket == 0 {
            // Extrapolate down to 0 within the first bucket
            if self.acc[0] > 0.0 {
                draw / self.acc[0] * bucket_size
            } else {
                0.0
            }
        } else {
            let lo = self.acc[bucket - 1];
            let hi = self.acc[bucket];
            let width = hi - lo;
            // Zero-width bucket: interpolation fraction is 0, never NaN
            let s = if width > 0.0 {
                (draw - lo) / width * bucket_size
            } else {
                0.0
            };
            bucket as f64 * bucket_size + s
        };

        x * self.range.span() + self.range.lo
    }
}
