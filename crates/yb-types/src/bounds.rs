//! Parameter bounds and the policy applied to out-of-range vectors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{GeometryError, GeometryResult};

/// What to do with a parameter that falls outside its interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Refuse the vector with [`GeometryError::OutOfBounds`].
    Reject,
    /// Pull the offending value onto the nearest bound.
    Clamp,
}

impl Default for BoundsPolicy {
    fn default() -> Self {
        Self::Reject
    }
}

/// Closed interval for one optimisation variable, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Per-parameter intervals for a control-point vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    intervals: Vec<Interval>,
}

impl ParameterBounds {
    /// The same interval for every parameter.
    pub fn uniform(count: usize, lower: f64, upper: f64) -> Self {
        Self {
            intervals: vec![Interval::new(lower, upper); count],
        }
    }

    pub fn from_intervals(intervals: Vec<Interval>) -> Self {
        Self { intervals }
    }

    /// Override the interval of a single parameter.
    pub fn with_interval(mut self, index: usize, lower: f64, upper: f64) -> Self {
        if let Some(slot) = self.intervals.get_mut(index) {
            *slot = Interval::new(lower, upper);
        }
        self
    }

    /// Concatenate two bound sets (outer edge followed by inner edge).
    pub fn chain(mut self, other: ParameterBounds) -> Self {
        self.intervals.extend(other.intervals);
        self
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn lower(&self) -> Vec<f64> {
        self.intervals.iter().map(|i| i.lower).collect()
    }

    pub fn upper(&self) -> Vec<f64> {
        self.intervals.iter().map(|i| i.upper).collect()
    }

    /// Check a vector against the bounds, applying `policy` to values that
    /// fall outside. Wrong length and non-finite values are always errors.
    pub fn enforce(&self, params: &[f64], policy: BoundsPolicy) -> GeometryResult<Vec<f64>> {
        if params.len() != self.intervals.len() {
            return Err(GeometryError::ParameterCount {
                expected: self.intervals.len(),
                actual: params.len(),
            });
        }

        let mut out = Vec::with_capacity(params.len());
        for (index, (&value, interval)) in params.iter().zip(&self.intervals).enumerate() {
            if !value.is_finite() {
                return Err(GeometryError::NonFinite { index });
            }
            if interval.contains(value) {
                out.push(value);
                continue;
            }
            match policy {
                BoundsPolicy::Reject => {
                    return Err(GeometryError::OutOfBounds {
                        index,
                        value,
                        lower: interval.lower,
                        upper: interval.upper,
                    })
                }
                BoundsPolicy::Clamp => {
                    let clamped = interval.clamp(value);
                    debug!(index, value, clamped, "clamped out-of-bounds parameter");
                    out.push(clamped);
                }
            }
        }
        Ok(out)
    }
}
