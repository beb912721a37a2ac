//! Payoff families evaluated on simulated paths.
//!
//! Every pricer returns the payoff discounted to the valuation date.
//! Path statistics (averages, extrema) use the observation points after
//! `t = 0`, except lookback extrema, which include the initial spot.
//!
//! The control variates at the bottom pair with these pricers: the
//! discounted terminal spot, and the geometric-average Asian option whose
//! price is known exactly for the simulated fixings.

use fb_core::{BarrierKind, DiscountFactor, OptionType, Real, Time};
use fb_math::normal_cdf;
use fb_termstructures::MarketCurves;
use serde::{Deserialize, Serialize};

use super::{ControlVariate, GbmPathGenerator, Path, PathPricer};

/// Strike convention of path-dependent payoffs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrikeKind {
    /// Fixed strike `K`.
    Fixed(Real),
    /// Strike set by the path itself (average or extremum).
    Floating,
}

/// Averaging rule of Asian payoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Arithmetic mean.
    #[default]
    Arithmetic,
    /// Geometric mean.
    Geometric,
}

// ─── European ─────────────────────────────────────────────────────────────────

/// `payoff(S_T) · discount`.
#[derive(Debug, Clone, Copy)]
pub struct EuropeanPathPricer {
    option_type: OptionType,
    strike: Real,
    discount: DiscountFactor,
}

impl EuropeanPathPricer {
    /// Create a European pricer.
    pub fn new(option_type: OptionType, strike: Real, discount: DiscountFactor) -> Self {
        Self {
            option_type,
            strike,
            discount,
        }
    }
}

impl PathPricer for EuropeanPathPricer {
    fn value(&self, path: &Path<'_>) -> Real {
        self.option_type.intrinsic(path.back(), self.strike) * self.discount
    }
}

// ─── Asian ────────────────────────────────────────────────────────────────────

/// Average-price (fixed strike) or average-strike (floating) option.
#[derive(Debug, Clone, Copy)]
pub struct AsianPathPricer {
    option_type: OptionType,
    averaging: Averaging,
    strike: StrikeKind,
    discount: DiscountFactor,
}

impl AsianPathPricer {
    /// Create an Asian pricer.
    pub fn new(
        option_type: OptionType,
        averaging: Averaging,
        strike: StrikeKind,
        discount: DiscountFactor,
    ) -> Self {
        Self {
            option_type,
            averaging,
            strike,
            discount,
        }
    }
}

impl PathPricer for AsianPathPricer {
    fn value(&self, path: &Path<'_>) -> Real {
        let fixings = &path.values[1..];
        if fixings.is_empty() {
            return 0.0;
        }
        let n = fixings.len() as Real;
        let average = match self.averaging {
            Averaging::Arithmetic => fixings.iter().sum::<Real>() / n,
            Averaging::Geometric => (fixings.iter().map(|s| s.ln()).sum::<Real>() / n).exp(),
        };
        let payoff = match self.strike {
            StrikeKind::Fixed(k) => self.option_type.intrinsic(average, k),
            StrikeKind::Floating => self.option_type.intrinsic(path.back(), average),
        };
        payoff * self.discount
    }
}

// ─── Lookback ─────────────────────────────────────────────────────────────────

/// Lookback option on the path extrema.
///
/// Fixed strike pays `max(S_max − K, 0)` (call) or `max(K − S_min, 0)` (put);
/// floating strike pays `S_T − S_min` (call) or `S_max − S_T` (put).
#[derive(Debug, Clone, Copy)]
pub struct LookbackPathPricer {
    option_type: OptionType,
    strike: StrikeKind,
    discount: DiscountFactor,
}

impl LookbackPathPricer {
    /// Create a lookback pricer.
    pub fn new(option_type: OptionType, strike: StrikeKind, discount: DiscountFactor) -> Self {
        Self {
            option_type,
            strike,
            discount,
        }
    }
}

impl PathPricer for LookbackPathPricer {
    fn value(&self, path: &Path<'_>) -> Real {
        let (lo, hi) = path
            .values
            .iter()
            .fold((Real::INFINITY, Real::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        let payoff = match (self.strike, self.option_type) {
            (StrikeKind::Fixed(k), OptionType::Call) => (hi - k).max(0.0),
            (StrikeKind::Fixed(k), OptionType::Put) => (k - lo).max(0.0),
            (StrikeKind::Floating, OptionType::Call) => path.back() - lo,
            (StrikeKind::Floating, OptionType::Put) => hi - path.back(),
        };
        payoff * self.discount
    }
}

// ─── Discrete barrier ─────────────────────────────────────────────────────────

/// Barrier option monitored at the path's observation times.
///
/// A knock-out pays the rebate at the first monitoring time at or beyond
/// the barrier. A knock-in pays the vanilla payoff if the barrier was
/// touched and the rebate at maturity otherwise.
#[derive(Debug, Clone)]
pub struct BarrierPathPricer {
    option_type: OptionType,
    strike: Real,
    kind: BarrierKind,
    level: Real,
    rebate: Real,
    discounts: Vec<DiscountFactor>,
}

impl BarrierPathPricer {
    /// Create a barrier pricer for paths observed at `times` (excluding 0).
    pub fn new(
        option_type: OptionType,
        strike: Real,
        kind: BarrierKind,
        level: Real,
        rebate: Real,
        curves: MarketCurves<'_>,
        times: &[Time],
    ) -> Self {
        let discounts = std::iter::once(1.0)
            .chain(times.iter().map(|&t| curves.discount(0.0, t)))
            .collect();
        Self {
            option_type,
            strike,
            kind,
            level,
            rebate,
            discounts,
        }
    }
}

impl PathPricer for BarrierPathPricer {
    fn value(&self, path: &Path<'_>) -> Real {
        let last = path.values.len() - 1;
        let hit = path.values[1..]
            .iter()
            .position(|&s| self.kind.is_triggered(s, self.level))
            .map(|i| i + 1);
        let vanilla = self.option_type.intrinsic(path.back(), self.strike) * self.discounts[last];
        match (self.kind.is_knock_out(), hit) {
            (true, Some(i)) => self.rebate * self.discounts[i],
            (true, None) => vanilla,
            (false, Some(_)) => vanilla,
            (false, None) => self.rebate * self.discounts[last],
        }
    }
}

// ─── Control variates ─────────────────────────────────────────────────────────

/// `discount · S_T`, with expectation `discount · E[S_T]`.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSpotControl {
    discount: DiscountFactor,
    expectation: Real,
}

impl TerminalSpotControl {
    /// Control for paths of `generator`, discounted by `discount`.
    pub fn new(generator: &GbmPathGenerator, discount: DiscountFactor) -> Self {
        Self {
            discount,
            expectation: discount * generator.forward(),
        }
    }
}

impl ControlVariate for TerminalSpotControl {
    fn observe(&self, path: &Path<'_>) -> Real {
        self.discount * path.back()
    }

    fn expectation(&self) -> Real {
        self.expectation
    }
}

/// Fixed-strike geometric-average Asian option on the same fixings as
/// [`AsianPathPricer`].
///
/// `ln G` is normal with the moments of
/// [`GbmPathGenerator::geometric_average_log_moments`], so the price is
/// Black's formula on the forward `exp(m + v/2)`.
#[derive(Debug, Clone, Copy)]
pub struct GeometricAsianControl {
    pricer: AsianPathPricer,
    expectation: Real,
}

impl GeometricAsianControl {
    /// Control for paths of `generator`, discounted by `discount`.
    pub fn new(
        generator: &GbmPathGenerator,
        option_type: OptionType,
        strike: Real,
        discount: DiscountFactor,
    ) -> Self {
        let (m, v) = generator.geometric_average_log_moments();
        let forward = (m + 0.5 * v).exp();
        let sd = v.sqrt();
        let d1 = (m - strike.ln() + v) / sd;
        let d2 = d1 - sd;
        let undiscounted = match option_type {
            OptionType::Call => forward * normal_cdf(d1) - strike * normal_cdf(d2),
            OptionType::Put => strike * normal_cdf(-d2) - forward * normal_cdf(-d1),
        };
        Self {
            pricer: AsianPathPricer::new(
                option_type,
                Averaging::Geometric,
                StrikeKind::Fixed(strike),
                discount,
            ),
            expectation: discount * undiscounted,
        }
    }
}

impl ControlVariate for GeometricAsianControl {
    fn observe(&self, path: &Path<'_>) -> Real {
        self.pricer.value(path)
    }

    fn expectation(&self) -> Real {
        self.expectation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::Sampler;
    use approx::assert_relative_eq;
    use fb_termstructures::Curve;

    fn path(values: &[Real]) -> Path<'_> {
        Path { values }
    }

    const TIMES: [Time; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

    #[test]
    fn asian_averages_skip_the_initial_spot() {
        let values = [100.0, 90.0, 110.0, 120.0, 80.0];
        let p = path(&values);
        let fixed = AsianPathPricer::new(OptionType::Call, Averaging::Arithmetic, StrikeKind::Fixed(95.0), 1.0);
        assert_relative_eq!(fixed.value(&p), 5.0);
        let floating = AsianPathPricer::new(OptionType::Put, Averaging::Arithmetic, StrikeKind::Floating, 0.5);
        assert_relative_eq!(floating.value(&p), 10.0);
        let geo = AsianPathPricer::new(OptionType::Call, Averaging::Geometric, StrikeKind::Fixed(0.0), 1.0);
        let expected = (90.0_f64 * 110.0 * 120.0 * 80.0).powf(0.25);
        assert_relative_eq!(geo.value(&p), expected, epsilon = 1e-10);
    }

    #[test]
    fn lookback_uses_extrema_including_spot() {
        let values = [100.0, 90.0, 110.0, 120.0, 105.0];
        let p = path(&values);
        assert_relative_eq!(LookbackPathPricer::new(OptionType::Call, StrikeKind::Floating, 1.0).value(&p), 15.0);
        assert_relative_eq!(LookbackPathPricer::new(OptionType::Put, StrikeKind::Floating, 1.0).value(&p), 15.0);
        assert_relative_eq!(LookbackPathPricer::new(OptionType::Call, StrikeKind::Fixed(100.0), 1.0).value(&p), 20.0);
        assert_relative_eq!(LookbackPathPricer::new(OptionType::Put, StrikeKind::Fixed(100.0), 1.0).value(&p), 10.0);
    }

    #[test]
    fn barrier_pays_rebate_at_first_touch() {
        let (r, q, v) = (Curve::from(0.04), Curve::from(0.0), Curve::from(0.2));
        let curves = MarketCurves::new(&r, &q, &v);
        let ko = BarrierPathPricer::new(OptionType::Call, 100.0, BarrierKind::UpOut, 115.0, 2.0, curves, &TIMES[1..]);
        let touched = [100.0, 105.0, 116.0, 100.0, 130.0];
        assert_relative_eq!(ko.value(&path(&touched)), 2.0 * (-0.04_f64 * 0.5).exp(), epsilon = 1e-12);
        let clean = [100.0, 105.0, 110.0, 100.0, 112.0];
        assert_relative_eq!(ko.value(&path(&clean)), 12.0 * (-0.04_f64).exp(), epsilon = 1e-12);

        let ki = BarrierPathPricer::new(OptionType::Call, 100.0, BarrierKind::UpIn, 115.0, 2.0, curves, &TIMES[1..]);
        assert_relative_eq!(ki.value(&path(&touched)), 30.0 * (-0.04_f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(ki.value(&path(&clean)), 2.0 * (-0.04_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn single_fixing_geometric_control_is_black_scholes() {
        // one fixing at T: the geometric average is S_T itself
        let (r, q, v) = (Curve::from(0.05), Curve::from(0.02), Curve::from(0.25));
        let curves = MarketCurves::new(&r, &q, &v);
        let g = GbmPathGenerator::uniform(100.0, curves, 1.0, 1, Sampler::default(), 1).unwrap();
        let df = (-0.05_f64).exp();
        let call = GeometricAsianControl::new(&g, OptionType::Call, 95.0, df);
        let put = GeometricAsianControl::new(&g, OptionType::Put, 95.0, df);
        let forward = 100.0 * (0.03_f64).exp();
        // put-call parity on the forward
        assert_relative_eq!(
            call.expectation() - put.expectation(),
            df * (forward - 95.0),
            max_relative = 1e-9
        );
        let values = [100.0, 120.0];
        assert_relative_eq!(call.observe(&path(&values)), 25.0 * df, epsilon = 1e-12);
        let terminal = TerminalSpotControl::new(&g, df);
        assert_relative_eq!(terminal.expectation(), df * forward, max_relative = 1e-12);
        assert_relative_eq!(terminal.observe(&path(&values)), 120.0 * df, epsilon = 1e-12);
    }
}
