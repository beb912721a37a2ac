//! Monte Carlo engine for European and path-dependent payoffs under GBM.
//!
//! A [`PayoffSpec`] picks the path pricer; [`run_mc`] simulates the paths
//! through [`MonteCarloModel`] and returns the Welford summary.
//!
//! With `mc.control_variate` set, European and knock-out payoffs are
//! controlled by the discounted terminal spot and fixed-strike arithmetic
//! Asians by their geometric counterpart. Knock-ins, lookbacks and the
//! other Asian variants run uncontrolled.
//!
//! [`mc_greeks`] estimates European delta and vega pathwise and gamma by
//! the likelihood-ratio method.

use fb_core::{ensure_config, CancellationToken, Error, OptionType, Real, Result, Time};
use fb_math::{McStatistic, Welford};
use fb_methods::monte_carlo::{
    AsianPathPricer, Averaging, BarrierPathPricer, ControlVariate, EuropeanPathPricer,
    GeometricAsianControl, LookbackPathPricer, McOutcome, McParams, MonteCarloModel, PathPricer,
    StrikeKind, TerminalSpotControl,
};
use fb_termstructures::{Curve, MarketCurves};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::validate_contract;
use crate::fd_barrier_engine::BarrierSpec;

/// Payoff family priced by [`run_mc`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoffSpec {
    /// `payoff(S_T)`.
    European {
        /// Call or put.
        option_type: OptionType,
        /// Strike.
        strike: Real,
    },
    /// Payoff on the average over the monitoring dates.
    Asian {
        /// Call or put.
        option_type: OptionType,
        /// Arithmetic or geometric.
        averaging: Averaging,
        /// Fixed strike, or the average as strike.
        strike: StrikeKind,
    },
    /// Payoff on the path extremum.
    Lookback {
        /// Call or put.
        option_type: OptionType,
        /// Fixed strike, or the extremum as strike.
        strike: StrikeKind,
    },
    /// Discretely monitored single barrier.
    Barrier {
        /// Call or put.
        option_type: OptionType,
        /// Strike.
        strike: Real,
        /// The barrier.
        barrier: BarrierSpec,
    },
}

impl Default for PayoffSpec {
    fn default() -> Self {
        PayoffSpec::European {
            option_type: OptionType::Call,
            strike: 100.0,
        }
    }
}

impl PayoffSpec {
    fn strike(&self) -> Option<Real> {
        match *self {
            PayoffSpec::European { strike, .. } | PayoffSpec::Barrier { strike, .. } => Some(strike),
            PayoffSpec::Asian { strike, .. } | PayoffSpec::Lookback { strike, .. } => match strike {
                StrikeKind::Fixed(k) => Some(k),
                StrikeKind::Floating => None,
            },
        }
    }
}

/// Inputs of [`run_mc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McEngineParams {
    /// Spot price.
    pub spot: Real,
    /// Risk-free rate curve.
    pub rate: Curve,
    /// Continuous dividend yield curve.
    pub dividend: Curve,
    /// Volatility curve.
    pub vol: Curve,
    /// Time to maturity in years.
    pub maturity: Time,
    /// What is paid.
    pub payoff: PayoffSpec,
    /// Simulation settings; `mc.steps` are the monitoring dates.
    pub mc: McParams,
}

impl Default for McEngineParams {
    fn default() -> Self {
        Self {
            spot: 100.0,
            rate: Curve::Flat(0.05),
            dividend: Curve::Flat(0.0),
            vol: Curve::Flat(0.2),
            maturity: 1.0,
            payoff: PayoffSpec::default(),
            mc: McParams::default(),
        }
    }
}

impl McEngineParams {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        let strike = self.payoff.strike().unwrap_or(self.spot);
        validate_contract(
            self.spot,
            strike,
            self.maturity,
            &self.rate,
            &self.dividend,
            &self.vol,
        )?;
        if let PayoffSpec::Barrier { barrier, .. } = self.payoff {
            ensure_config!(
                barrier.level > 0.0 && barrier.level.is_finite(),
                "barrier.level",
                "barrier level must be positive, got {}",
                barrier.level
            );
            ensure_config!(
                barrier.rebate >= 0.0 && barrier.rebate.is_finite(),
                "barrier.rebate",
                "rebate must be non-negative, got {}",
                barrier.rebate
            );
            ensure_config!(
                !barrier.kind.is_triggered(self.spot, barrier.level),
                "spot",
                "spot {} is already at or beyond the barrier {}",
                self.spot,
                barrier.level
            );
        }
        self.mc.validate()
    }
}

/// Price `params.payoff` by Monte Carlo.
pub fn run_mc(params: &McEngineParams, cancel: &CancellationToken) -> Result<McOutcome> {
    params.validate()?;
    let curves = MarketCurves::new(&params.rate, &params.dividend, &params.vol);
    let model = MonteCarloModel::new(params.spot, curves, params.maturity, &params.mc)?;
    let discount = curves.discount(0.0, params.maturity);
    debug!(payoff = ?params.payoff, "pricing by Monte Carlo");

    let generator = model.generator();
    let control: Option<Box<dyn ControlVariate>> = if params.mc.control_variate {
        match params.payoff {
            PayoffSpec::European { .. } => Some(Box::new(TerminalSpotControl::new(generator, discount))),
            PayoffSpec::Asian {
                option_type,
                averaging: Averaging::Arithmetic,
                strike: StrikeKind::Fixed(k),
            } => Some(Box::new(GeometricAsianControl::new(generator, option_type, k, discount))),
            PayoffSpec::Barrier { barrier, .. } if barrier.kind.is_knock_out() => {
                Some(Box::new(TerminalSpotControl::new(generator, discount)))
            }
            _ => None,
        }
    } else {
        None
    };

    let pricer: Box<dyn PathPricer> = match params.payoff {
        PayoffSpec::European {
            option_type,
            strike,
        } => Box::new(EuropeanPathPricer::new(option_type, strike, discount)),
        PayoffSpec::Asian {
            option_type,
            averaging,
            strike,
        } => Box::new(AsianPathPricer::new(option_type, averaging, strike, discount)),
        PayoffSpec::Lookback {
            option_type,
            strike,
        } => Box::new(LookbackPathPricer::new(option_type, strike, discount)),
        PayoffSpec::Barrier {
            option_type,
            strike,
            barrier,
        } => Box::new(BarrierPathPricer::new(
            option_type,
            strike,
            barrier.kind,
            barrier.level,
            barrier.rebate,
            curves,
            generator.times(),
        )),
    };
    model.simulate_controlled(pricer.as_ref(), control.as_deref(), cancel)
}

/// Monte Carlo price and Greeks of a European option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McGreeks {
    /// Discounted payoff.
    pub price: McStatistic,
    /// Pathwise `∂V/∂S`.
    pub delta: McStatistic,
    /// Pathwise `∂V/∂σ` for a parallel shift of the vol curve.
    pub vega: McStatistic,
    /// Likelihood-ratio `∂²V/∂S²`.
    pub gamma: McStatistic,
}

/// Estimate price, delta, vega and gamma of the European payoff in `params`.
///
/// Delta and vega differentiate each path: `∂S_T/∂S₀ = S_T/S₀` and
/// `∂ln S_T/∂σ = W_T − Σσ_iΔt_i`. Gamma weights the payoff by the second
/// score of the lognormal terminal density, `(z² − 1 − √v·z)/(S₀²v)`, where
/// `v` is the total log variance. The control variate is not applied.
pub fn mc_greeks(params: &McEngineParams, cancel: &CancellationToken) -> Result<McGreeks> {
    params.validate()?;
    let PayoffSpec::European {
        option_type,
        strike,
    } = params.payoff
    else {
        return Err(Error::config(
            "payoff",
            "Monte Carlo Greeks are available for European payoffs only",
        ));
    };
    let curves = MarketCurves::new(&params.rate, &params.dividend, &params.vol);
    let model = MonteCarloModel::new(params.spot, curves, params.maturity, &params.mc)?;
    let discount = curves.discount(0.0, params.maturity);
    let generator = model.generator();
    let (spot, drift, variance, vol_time) = (
        params.spot,
        generator.log_drift(),
        generator.log_variance(),
        generator.vol_time(),
    );
    let sd = variance.sqrt();
    let sign = option_type.sign();
    debug!(?option_type, strike, "Monte Carlo Greeks");

    let sample = |s_t: Real, w_t: Real| -> [Real; 4] {
        let payoff = discount * option_type.intrinsic(s_t, strike);
        let slope = if payoff > 0.0 { sign * discount * s_t } else { 0.0 };
        let z = ((s_t / spot).ln() - drift) / sd;
        [
            payoff,
            slope / spot,
            slope * (w_t - vol_time),
            payoff * (z * z - 1.0 - sd * z) / (spot * spot * variance),
        ]
    };
    let partials = model.fold_draws(
        || [Welford::new(); 4],
        |acc, draw| {
            let w_t: Real = draw.increments.iter().sum();
            let mut x = sample(draw.path.back(), w_t);
            if let Some(mirror) = draw.mirror {
                let y = sample(mirror.back(), -w_t);
                for (a, b) in x.iter_mut().zip(y) {
                    *a = 0.5 * (*a + b);
                }
            }
            for (a, v) in acc.iter_mut().zip(x) {
                a.add(v);
            }
        },
        cancel,
    )?;
    let mut total = [Welford::new(); 4];
    for chunk in &partials {
        for (t, c) in total.iter_mut().zip(chunk) {
            t.merge(c);
        }
    }
    let [price, delta, vega, gamma] = total.map(|acc| McStatistic::from_welford(&acc));
    Ok(McGreeks {
        price,
        delta,
        vega,
        gamma,
    })
}
