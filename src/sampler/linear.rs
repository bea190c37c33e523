//! Linearly increasing density on the unit interval
//!
//! The built-in closed-form continuous law:
//!
//! ```text
//! pdf(x)    = 2x          x in [0, 1]
//! cdf(x)    = x^2         x in [0, 1]
//! inv_cdf(e) = sqrt(e)    e in [0, 1]
//! ```
//!
//! Registered under the name `"linear"`.

use super::InverseCdf;

/// Inverse CDF of the linearly increasing density, `sqrt(e)` on `[0, 1]`
pub struct LinearLaw;

impl InverseCdf for LinearLaw {
    #[inline]
    fn eval(&self, draw: f64) -> f64 {
        draw.sqrt()
    }
}
