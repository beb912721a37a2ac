//! `TermStructure`: lookup-by-time contract for market curves.
//!
//! Times are year fractions measured from the valuation date. Engines only
//! ever read a curve; they never build or validate one.

use fb_core::{DiscountFactor, Real, Time};

/// A scalar curve parameterised by time.
pub trait TermStructure: std::fmt::Debug + Send + Sync {
    /// Pointwise value at time `t`.
    fn value(&self, t: Time) -> Real;

    /// `∫_{t0}^{t1} value(s) ds`.
    ///
    /// The default uses the midpoint rule; curves with a closed form
    /// override it.
    fn integral(&self, t0: Time, t1: Time) -> Real {
        (t1 - t0) * self.value(0.5 * (t0 + t1))
    }

    /// Average value over `[t0, t1]`, or the pointwise value when the
    /// interval is empty.
    fn average(&self, t0: Time, t1: Time) -> Real {
        if t1 > t0 {
            self.integral(t0, t1) / (t1 - t0)
        } else {
            self.value(t0)
        }
    }

    /// `exp(−∫_{t0}^{t1} value(s) ds)`, i.e. a discount factor when the curve
    /// holds a short rate or yield.
    fn discount(&self, t0: Time, t1: Time) -> DiscountFactor {
        (-self.integral(t0, t1)).exp()
    }
}
