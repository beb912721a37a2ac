//! Bundle of the three curves a one-factor Black-Scholes model reads.

use fb_core::{DiscountFactor, Rate, Time, Volatility};

use crate::TermStructure;

/// Borrowed rate, dividend and volatility curves.
#[derive(Debug, Clone, Copy)]
pub struct MarketCurves<'a> {
    /// Risk-free short rate.
    pub rate: &'a dyn TermStructure,
    /// Continuous dividend yield.
    pub dividend: &'a dyn TermStructure,
    /// Black volatility.
    pub vol: &'a dyn TermStructure,
}

impl<'a> MarketCurves<'a> {
    /// Bundle three curves.
    pub fn new(
        rate: &'a dyn TermStructure,
        dividend: &'a dyn TermStructure,
        vol: &'a dyn TermStructure,
    ) -> Self {
        Self { rate, dividend, vol }
    }

    /// `(r, q, σ)` at time `t`.
    pub fn at(&self, t: Time) -> (Rate, Rate, Volatility) {
        (self.rate.value(t), self.dividend.value(t), self.vol.value(t))
    }

    /// Risk-free discount factor from `t0` to `t1`.
    pub fn discount(&self, t0: Time, t1: Time) -> DiscountFactor {
        self.rate.discount(t0, t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Curve, PiecewiseConstant};
    use approx::assert_relative_eq;

    #[test]
    fn reads_each_curve_pointwise() {
        let r = Curve::from(PiecewiseConstant::new(vec![0.5, 1.0], vec![0.01, 0.03]).unwrap());
        let q = Curve::from(0.02);
        let v = Curve::from(0.25);
        let m = MarketCurves::new(&r, &q, &v);
        assert_eq!(m.at(0.25), (0.01, 0.02, 0.25));
        assert_eq!(m.at(0.75), (0.03, 0.02, 0.25));
        assert_relative_eq!(m.discount(0.0, 1.0), (-0.02_f64).exp(), epsilon = 1e-14);
    }
}
