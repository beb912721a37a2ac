//! `PiecewiseConstant`: step function over right-closed time intervals.

use fb_core::{ensure_config, Real, Result, Time};
use serde::{Deserialize, Serialize};

use crate::term_structure::TermStructure;

/// A step curve: `values[i]` applies on `(times[i-1], times[i]]`.
///
/// For `t <= times[0]` the first value applies; beyond the last knot the
/// last value is extrapolated flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPiecewise", into = "RawPiecewise")]
pub struct PiecewiseConstant {
    times: Vec<Time>,
    values: Vec<Real>,
}

#[derive(Serialize, Deserialize)]
struct RawPiecewise {
    times: Vec<Time>,
    values: Vec<Real>,
}

impl TryFrom<RawPiecewise> for PiecewiseConstant {
    type Error = fb_core::Error;

    fn try_from(raw: RawPiecewise) -> Result<Self> {
        Self::new(raw.times, raw.values)
    }
}

impl From<PiecewiseConstant> for RawPiecewise {
    fn from(pc: PiecewiseConstant) -> Self {
        Self {
            times: pc.times,
            values: pc.values,
        }
    }
}

impl PiecewiseConstant {
    /// Build a step curve from knot times and the values ending at them.
    pub fn new(times: Vec<Time>, values: Vec<Real>) -> Result<Self> {
        ensure_config!(!times.is_empty(), "times", "at least one knot is required");
        ensure_config!(
            times.len() == values.len(),
            "values",
            "expected {} values, got {}",
            times.len(),
            values.len()
        );
        ensure_config!(
            times.windows(2).all(|w| w[0] < w[1]),
            "times",
            "knot times must be strictly increasing"
        );
        ensure_config!(
            times.iter().chain(values.iter()).all(|v| v.is_finite()),
            "values",
            "knots and values must be finite"
        );
        Ok(Self { times, values })
    }

    /// Knot times.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Values, one per knot.
    pub fn values(&self) -> &[Real] {
        &self.values
    }

    /// Smallest and largest value on the curve.
    pub fn range(&self) -> (Real, Real) {
        self.values
            .iter()
            .fold((Real::INFINITY, Real::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Index of the interval containing `t` (lower bound search).
    fn segment(&self, t: Time) -> usize {
        let idx = self.times.partition_point(|&knot| knot < t);
        idx.min(self.values.len() - 1)
    }

    /// Antiderivative from 0 to `t` (negative `t` integrates backwards).
    fn primitive(&self, t: Time) -> Real {
        let mut acc = 0.0;
        let mut left = 0.0;
        if t <= 0.0 {
            return t * self.value(t);
        }
        for (i, &knot) in self.times.iter().enumerate() {
            if knot <= left {
                continue;
            }
            let right = knot.min(t);
            acc += (right - left) * self.values[i];
            left = right;
            if left >= t {
                return acc;
            }
        }
        acc + (t - left) * self.values[self.values.len() - 1]
    }
}

impl TermStructure for PiecewiseConstant {
    fn value(&self, t: Time) -> Real {
        self.values[self.segment(t)]
    }

    fn integral(&self, t0: Time, t1: Time) -> Real {
        self.primitive(t1) - self.primitive(t0)
    }
}
