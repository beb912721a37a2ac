//! Monte Carlo simulation framework.
//!
//! # Overview
//!
//! * [`GbmPathGenerator`]: chunked, reproducible GBM paths
//! * [`PathPricer`]: trait for evaluating payoffs on generated paths
//! * [`ControlVariate`]: path functional with a known expectation
//! * [`MonteCarloModel`]: parallel driver collecting [`Welford`] statistics
//! * [`Path`]: a single realisation of the process

pub mod path_generator;
pub mod pricers;

pub use path_generator::{GbmPathGenerator, IncrementSource, PathMatrix, Sampler, CHUNK_DRAWS};
pub use pricers::{
    AsianPathPricer, Averaging, BarrierPathPricer, EuropeanPathPricer, GeometricAsianControl,
    LookbackPathPricer, StrikeKind, TerminalSpotControl,
};

use fb_core::{ensure_config, CancellationToken, Real, Result, Time};
use fb_math::{BivariateWelford, McStatistic, Welford};
use fb_termstructures::MarketCurves;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ─── Path ─────────────────────────────────────────────────────────────────────

/// A single sample path: the spot at `t = 0` and at every observation time.
#[derive(Debug, Clone, Copy)]
pub struct Path<'a> {
    /// Spot at each time point.
    pub values: &'a [Real],
}

impl Path<'_> {
    /// Number of time steps (= len − 1).
    pub fn steps(&self) -> usize {
        self.values.len() - 1
    }

    /// The final value.
    pub fn back(&self) -> Real {
        self.values[self.values.len() - 1]
    }

    /// The initial value.
    pub fn front(&self) -> Real {
        self.values[0]
    }

    /// Length of the path (number of points including initial).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the path is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ─── PathPricer ───────────────────────────────────────────────────────────────

/// A trait for computing the discounted payoff from a sample path.
pub trait PathPricer: Send + Sync {
    /// Evaluate the discounted payoff for a given path.
    fn value(&self, path: &Path<'_>) -> Real;
}

/// A path functional whose expectation is known in closed form.
pub trait ControlVariate: Send + Sync {
    /// The functional on one path.
    fn observe(&self, path: &Path<'_>) -> Real;

    /// Its exact expectation under the simulated dynamics.
    fn expectation(&self) -> Real;
}

/// One normal draw: its Brownian increments and the paths they drive.
#[derive(Debug, Clone, Copy)]
pub struct Draw<'a> {
    /// `W(t_i) − W(t_{i−1})` per step.
    pub increments: &'a [Real],
    /// The path driven by `+increments`.
    pub path: Path<'a>,
    /// The path driven by `−increments`, with antithetic sampling.
    pub mirror: Option<Path<'a>>,
}

impl Draw<'_> {
    /// Apply `f` to the path, or average it over the antithetic pair.
    pub fn average(&self, f: impl Fn(&Path<'_>) -> Real) -> Real {
        match &self.mirror {
            Some(mirror) => 0.5 * (f(&self.path) + f(mirror)),
            None => f(&self.path),
        }
    }
}

// ─── McParams ─────────────────────────────────────────────────────────────────

/// Simulation settings shared by every payoff family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct McParams {
    /// Simulated paths. With antithetic sampling an odd count is rounded up.
    pub num_paths: usize,
    /// Time steps (monitoring dates) per path.
    pub steps: usize,
    /// Master seed.
    pub seed: u64,
    /// Pair every path with its mirror image.
    pub antithetic: bool,
    /// Normal source.
    pub sampler: Sampler,
    /// Keep the per-draw discounted payoffs.
    pub record_samples: bool,
    /// Use the payoff family's control variate, when it has one.
    pub control_variate: bool,
}

impl Default for McParams {
    fn default() -> Self {
        Self {
            num_paths: 100_000,
            steps: 1,
            seed: 42,
            antithetic: true,
            sampler: Sampler::PseudoRandom,
            record_samples: false,
            control_variate: true,
        }
    }
}

impl McParams {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        ensure_config!(self.num_paths > 0, "num_paths", "need at least one path");
        ensure_config!(self.steps > 0, "steps", "need at least one time step");
        Ok(())
    }

    /// Independent normal vectors drawn.
    pub fn draws(&self) -> usize {
        if self.antithetic {
            self.num_paths.div_ceil(2)
        } else {
            self.num_paths
        }
    }
}

/// Result of [`MonteCarloModel::simulate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McOutcome {
    /// Estimate with standard error and 95% interval; control-adjusted
    /// when a control variate was used.
    pub statistic: McStatistic,
    /// Accumulator of the raw discounted payoffs, for merging with further runs.
    pub accumulator: Welford,
    /// Control-variate details, when one was used.
    pub control: Option<ControlOutcome>,
    /// Per-draw samples (antithetic pair averages) when requested,
    /// control-adjusted with the final slope.
    pub samples: Option<Vec<Real>>,
}

/// How a control variate entered an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlOutcome {
    /// Fitted slope `β`; the estimate is `x̄ − β(ȳ − E[y])`.
    pub beta: Real,
    /// Known expectation of the control.
    pub expectation: Real,
    /// The estimate without the control.
    pub uncontrolled: McStatistic,
}

// ─── MonteCarloModel ──────────────────────────────────────────────────────────

/// A Monte Carlo simulation orchestrator.
///
/// Combines a path generator with a pricer and collects statistics across
/// many simulated paths. Chunks run on the rayon pool; their accumulators
/// are merged in chunk order.
#[derive(Debug, Clone)]
pub struct MonteCarloModel {
    generator: GbmPathGenerator,
    params: McParams,
}

impl MonteCarloModel {
    /// Create a new Monte Carlo model on `params.steps` equal steps.
    pub fn new(spot: Real, curves: MarketCurves<'_>, maturity: Time, params: &McParams) -> Result<Self> {
        params.validate()?;
        let generator =
            GbmPathGenerator::uniform(spot, curves, maturity, params.steps, params.sampler, params.seed)?;
        Ok(Self {
            generator,
            params: *params,
        })
    }

    /// The underlying path generator.
    pub fn generator(&self) -> &GbmPathGenerator {
        &self.generator
    }

    /// Run the simulation, checking `cancel` before every chunk.
    pub fn simulate(&self, pricer: &dyn PathPricer, cancel: &CancellationToken) -> Result<McOutcome> {
        self.simulate_controlled(pricer, None, cancel)
    }

    /// Run the simulation with an optional control variate.
    ///
    /// The slope `β` is fitted on the same draws from the merged
    /// [`BivariateWelford`] of payoff and control.
    pub fn simulate_controlled(
        &self,
        pricer: &dyn PathPricer,
        control: Option<&dyn ControlVariate>,
        cancel: &CancellationToken,
    ) -> Result<McOutcome> {
        let record = self.params.record_samples;
        let partials = self.fold_draws(
            || (Welford::new(), BivariateWelford::new(), Vec::new()),
            |(raw, paired, samples), draw| {
                let value = draw.average(|p| pricer.value(p));
                raw.add(value);
                let observed = control.map_or(0.0, |c| draw.average(|p| c.observe(p)));
                if control.is_some() {
                    paired.add(value, observed);
                }
                if record {
                    samples.push((value, observed));
                }
            },
            cancel,
        )?;

        let mut accumulator = Welford::new();
        let mut paired = BivariateWelford::new();
        let mut pairs = record.then(|| Vec::with_capacity(self.params.draws()));
        for (raw, chunk_paired, chunk_samples) in partials {
            accumulator.merge(&raw);
            paired.merge(&chunk_paired);
            if let Some(all) = pairs.as_mut() {
                all.extend(chunk_samples);
            }
        }

        let uncontrolled = McStatistic::from_welford(&accumulator);
        let (statistic, control) = match control {
            Some(c) => {
                let expectation = c.expectation();
                let (statistic, beta) = paired.controlled(expectation);
                let outcome = ControlOutcome {
                    beta,
                    expectation,
                    uncontrolled,
                };
                (statistic, Some(outcome))
            }
            None => (uncontrolled, None),
        };
        let samples = pairs.map(|all| {
            let (beta, expectation) = control.map_or((0.0, 0.0), |c| (c.beta, c.expectation));
            all.into_iter()
                .map(|(x, y)| x - beta * (y - expectation))
                .collect()
        });
        debug!(
            value = statistic.value,
            std_error = statistic.std_error,
            beta = control.map(|c| c.beta),
            "Monte Carlo run finished"
        );
        Ok(McOutcome {
            statistic,
            accumulator,
            control,
            samples,
        })
    }

    /// Fold every draw into per-chunk accumulators, returned in chunk order.
    ///
    /// Chunks run on the rayon pool; `cancel` is checked before each one.
    pub fn fold_draws<A, I, F>(&self, init: I, visit: F, cancel: &CancellationToken) -> Result<Vec<A>>
    where
        A: Send,
        I: Fn() -> A + Sync,
        F: Fn(&mut A, &Draw<'_>) + Sync,
    {
        let draws = self.params.draws();
        let chunks = draws.div_ceil(CHUNK_DRAWS);
        debug!(draws, chunks, antithetic = self.params.antithetic, "starting Monte Carlo run");
        (0..chunks)
            .into_par_iter()
            .map(|chunk| {
                cancel.check()?;
                let first = chunk * CHUNK_DRAWS;
                let count = CHUNK_DRAWS.min(draws - first);
                let columns = self.generator.steps() + 1;
                let mut source = self.generator.source(chunk)?;
                let mut dw = vec![0.0; self.generator.steps()];
                let mut plus = vec![0.0; columns];
                let mut minus = vec![0.0; columns];
                let mut acc = init();
                for _ in 0..count {
                    source.next_increments(&mut dw);
                    self.generator.evolve(&dw, 1.0, &mut plus);
                    if self.params.antithetic {
                        self.generator.evolve(&dw, -1.0, &mut minus);
                    }
                    let draw = Draw {
                        increments: &dw,
                        path: Path { values: &plus },
                        mirror: self.params.antithetic.then_some(Path { values: &minus }),
                    };
                    visit(&mut acc, &draw);
                }
                Ok(acc)
            })
            .collect()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fb_core::OptionType;
    use fb_termstructures::Curve;

    fn curves() -> (Curve, Curve, Curve) {
        (Curve::from(0.05), Curve::from(0.0), Curve::from(0.2))
    }

    #[test]
    fn mc_european_call_converges_to_bs() {
        let (r, q, v) = curves();
        let params = McParams { num_paths: 200_000, ..McParams::default() };
        let model = MonteCarloModel::new(100.0, MarketCurves::new(&r, &q, &v), 1.0, &params).unwrap();
        let pricer = EuropeanPathPricer::new(OptionType::Call, 100.0, (-0.05_f64).exp());
        let out = model.simulate(&pricer, &CancellationToken::new()).unwrap();

        // BS ≈ 10.4506
        let bs_ref = 10.4506;
        let stat = out.statistic;
        assert!(
            stat.within(bs_ref, 4.0),
            "MC call = {:.4} ± {:.4}, expected ~{bs_ref}",
            stat.value,
            stat.std_error
        );
        assert_eq!(stat.count, 100_000);
        assert!(out.samples.is_none());
    }

    #[test]
    fn mc_antithetic_reduces_variance() {
        let (r, q, v) = curves();
        let pricer = EuropeanPathPricer::new(OptionType::Call, 100.0, (-0.05_f64).exp());
        let plain = McParams { num_paths: 20_000, antithetic: false, ..McParams::default() };
        let anti = McParams { num_paths: 20_000, antithetic: true, ..McParams::default() };
        let m = MarketCurves::new(&r, &q, &v);
        let token = CancellationToken::new();
        let a = MonteCarloModel::new(100.0, m, 1.0, &plain).unwrap().simulate(&pricer, &token).unwrap();
        let b = MonteCarloModel::new(100.0, m, 1.0, &anti).unwrap().simulate(&pricer, &token).unwrap();
        assert!(
            b.statistic.std_error < a.statistic.std_error,
            "antithetic err={:.4} should be < plain err={:.4}",
            b.statistic.std_error,
            a.statistic.std_error
        );
    }

    #[test]
    fn fixed_seed_is_reproducible_and_samples_match() {
        let (r, q, v) = curves();
        let params = McParams {
            num_paths: 5_000,
            steps: 12,
            record_samples: true,
            sampler: Sampler::Sobol { scrambled: true, brownian_bridge: true },
            ..McParams::default()
        };
        let m = MarketCurves::new(&r, &q, &v);
        let pricer = AsianPathPricer::new(OptionType::Call, Averaging::Arithmetic, StrikeKind::Fixed(100.0), (-0.05_f64).exp());
        let token = CancellationToken::new();
        let a = MonteCarloModel::new(100.0, m, 1.0, &params).unwrap().simulate(&pricer, &token).unwrap();
        let b = MonteCarloModel::new(100.0, m, 1.0, &params).unwrap().simulate(&pricer, &token).unwrap();
        assert_eq!(a, b);
        let samples = a.samples.unwrap();
        assert_eq!(samples.len(), 2_500);
        let mean = samples.iter().sum::<Real>() / samples.len() as Real;
        assert_relative_eq!(mean, a.statistic.value, max_relative = 1e-10);
        // Asian call is cheaper than the vanilla (~10.45)
        assert!(a.statistic.value > 4.0 && a.statistic.value < 7.5, "Asian = {}", a.statistic.value);
    }

    #[test]
    fn terminal_spot_control_shrinks_the_error() {
        let (r, q, v) = curves();
        let params = McParams { num_paths: 20_000, record_samples: true, ..McParams::default() };
        let model = MonteCarloModel::new(100.0, MarketCurves::new(&r, &q, &v), 1.0, &params).unwrap();
        let df = (-0.05_f64).exp();
        let pricer = EuropeanPathPricer::new(OptionType::Call, 100.0, df);
        let control = TerminalSpotControl::new(model.generator(), df);
        let token = CancellationToken::new();
        let out = model.simulate_controlled(&pricer, Some(&control), &token).unwrap();
        let c = out.control.unwrap();
        assert!(c.beta > 0.0, "beta = {}", c.beta);
        assert_relative_eq!(c.expectation, 100.0, max_relative = 1e-12);
        assert!(
            out.statistic.std_error < 0.6 * c.uncontrolled.std_error,
            "controlled {:.4} vs plain {:.4}",
            out.statistic.std_error,
            c.uncontrolled.std_error
        );
        assert!(out.statistic.within(10.4506, 4.0), "MC call = {:.4}", out.statistic.value);
        let samples = out.samples.unwrap();
        let mean = samples.iter().sum::<Real>() / samples.len() as Real;
        assert_relative_eq!(mean, out.statistic.value, max_relative = 1e-10);
        // plain run sees the same draws
        let plain = model.simulate(&pricer, &token).unwrap();
        assert_eq!(plain.accumulator, out.accumulator);
        assert!(plain.control.is_none());
    }

    #[test]
    fn draws_expose_increments_of_both_paths() {
        let (r, q, v) = curves();
        let params = McParams { num_paths: 64, steps: 4, ..McParams::default() };
        let model = MonteCarloModel::new(100.0, MarketCurves::new(&r, &q, &v), 1.0, &params).unwrap();
        let drift = model.generator().log_drift();
        let chunks = model
            .fold_draws(
                || 0usize,
                |n, draw| {
                    let w: Real = draw.increments.iter().sum();
                    let up = (draw.path.back() / 100.0).ln() - drift;
                    let down = (draw.mirror.unwrap().back() / 100.0).ln() - drift;
                    assert_relative_eq!(up, 0.2 * w, epsilon = 1e-10);
                    assert_relative_eq!(down, -0.2 * w, epsilon = 1e-10);
                    *n += 1;
                },
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(chunks, vec![32]);
    }

    #[test]
    fn zero_paths_is_rejected() {
        let p = McParams { num_paths: 0, ..McParams::default() };
        assert_eq!(p.validate().unwrap_err().field(), Some("num_paths"));
    }

    #[test]
    fn cancellation_reports_abort() {
        let (r, q, v) = curves();
        let model = MonteCarloModel::new(100.0, MarketCurves::new(&r, &q, &v), 1.0, &McParams::default()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let pricer = EuropeanPathPricer::new(OptionType::Put, 100.0, 1.0);
        assert!(model.simulate(&pricer, &token).unwrap_err().is_cancelled());
    }
}
