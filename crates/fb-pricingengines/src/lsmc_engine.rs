//! Longstaff-Schwartz least-squares Monte Carlo for American options.
//!
//! Paths are simulated on the exercise dates (pseudo-random or Sobol with
//! an optional Brownian bridge, optionally antithetic). The backward pass
//! regresses the discounted realised cash flow of in-the-money paths on a
//! basis in `S/K` and exercises where intrinsic value beats the fitted
//! continuation. A path's cash flow is overwritten each time it exercises
//! at an earlier date, so it exercises at most once.
//!
//! A date whose regression cannot be trusted (too few in-the-money paths,
//! or a rank-deficient design) falls back to "no exercise at this date"
//! and is reported in the diagnostics.
//!
//! References: Longstaff and Schwartz (2001); Glasserman (2004) §8.6.

use fb_core::{
    ensure_config, ensure_finite, CancellationToken, OptionType, Real, Result, TieBreak, Time,
};
use fb_math::{LinearLeastSquaresRegression, McStatistic, Welford, MAX_DIMENSION};
use fb_methods::monte_carlo::{GbmPathGenerator, PathMatrix, Sampler};
use fb_termstructures::{Curve, MarketCurves};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::contract::validate_contract;

/// Highest supported basis degree.
pub const MAX_BASIS_DEGREE: usize = 8;

/// Fitted continuation within this multiple of the strike of the intrinsic
/// value counts as a tie.
pub const TIE_TOLERANCE: Real = 1e-10;

// ─── Basis ────────────────────────────────────────────────────────────────────

/// Regression basis in the moneyness `x = S/K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisKind {
    /// `1, x, x², …`.
    #[default]
    Monomial,
    /// Weighted Laguerre polynomials `e^{−x/2} L_k(x)`.
    Laguerre,
}

impl BasisKind {
    /// Write the `degree + 1` basis values at `x` into `row`.
    pub fn fill(self, x: Real, row: &mut [Real]) {
        match self {
            BasisKind::Monomial => {
                let mut p = 1.0;
                for v in row.iter_mut() {
                    *v = p;
                    p *= x;
                }
            }
            BasisKind::Laguerre => {
                let w = (-0.5 * x).exp();
                let (mut prev, mut cur) = (0.0, 1.0);
                for (k, v) in row.iter_mut().enumerate() {
                    *v = w * cur;
                    // (k+1) L_{k+1} = (2k+1−x) L_k − k L_{k−1}
                    let kf = k as Real;
                    let next = ((2.0 * kf + 1.0 - x) * cur - kf * prev) / (kf + 1.0);
                    prev = cur;
                    cur = next;
                }
            }
        }
    }
}

// ─── Parameters ───────────────────────────────────────────────────────────────

/// Inputs of [`run_lsmc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsmcParams {
    /// Spot price.
    pub spot: Real,
    /// Strike.
    pub strike: Real,
    /// Risk-free rate curve.
    pub rate: Curve,
    /// Continuous dividend yield curve.
    pub dividend: Curve,
    /// Volatility curve.
    pub vol: Curve,
    /// Time to maturity in years.
    pub maturity: Time,
    /// Call or put.
    pub option_type: OptionType,
    /// Simulated paths; rounded up to even with antithetic sampling.
    pub num_paths: usize,
    /// Equally spaced exercise dates, the last one at maturity.
    pub num_exercise_dates: usize,
    /// Master seed.
    pub seed: u64,
    /// Pair every path with its mirror image.
    pub antithetic: bool,
    /// Normal source.
    pub sampler: Sampler,
    /// Regression basis.
    pub basis: BasisKind,
    /// Highest basis order; the basis has `basis_degree + 1` functions.
    pub basis_degree: usize,
    /// Ridge penalty on the non-constant coefficients.
    pub ridge_lambda: Real,
    /// Fewest regression paths for a date to be trusted.
    pub min_itm: usize,
    /// A path enters the regression when its intrinsic value exceeds
    /// `itm_moneyness_eps · strike`.
    pub itm_moneyness_eps: Real,
    /// Exercise decision at equality.
    pub tie_break: TieBreak,
    /// Keep every path's present value in the result.
    pub record_path_values: bool,
}

impl Default for LsmcParams {
    fn default() -> Self {
        Self {
            spot: 100.0,
            strike: 100.0,
            rate: Curve::Flat(0.05),
            dividend: Curve::Flat(0.0),
            vol: Curve::Flat(0.2),
            maturity: 1.0,
            option_type: OptionType::Put,
            num_paths: 100_000,
            num_exercise_dates: 50,
            seed: 42,
            antithetic: true,
            sampler: Sampler::PseudoRandom,
            basis: BasisKind::Monomial,
            basis_degree: 3,
            ridge_lambda: 0.0,
            min_itm: 32,
            itm_moneyness_eps: 0.0,
            tie_break: TieBreak::ExerciseOnTie,
            record_path_values: false,
        }
    }
}

impl LsmcParams {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        validate_contract(
            self.spot,
            self.strike,
            self.maturity,
            &self.rate,
            &self.dividend,
            &self.vol,
        )?;
        ensure_config!(self.num_paths > 0, "num_paths", "need at least one path");
        ensure_config!(
            self.num_exercise_dates > 0,
            "num_exercise_dates",
            "need at least one exercise date"
        );
        if let Sampler::Sobol { .. } = self.sampler {
            ensure_config!(
                self.num_exercise_dates <= MAX_DIMENSION,
                "num_exercise_dates",
                "Sobol sampling supports at most {MAX_DIMENSION} dates, got {}",
                self.num_exercise_dates
            );
        }
        ensure_config!(
            (1..=MAX_BASIS_DEGREE).contains(&self.basis_degree),
            "basis_degree",
            "basis degree must lie in 1..={MAX_BASIS_DEGREE}, got {}",
            self.basis_degree
        );
        ensure_config!(
            self.ridge_lambda >= 0.0 && self.ridge_lambda.is_finite(),
            "ridge_lambda",
            "ridge penalty must be finite and non-negative, got {}",
            self.ridge_lambda
        );
        ensure_config!(
            self.itm_moneyness_eps >= 0.0 && self.itm_moneyness_eps.is_finite(),
            "itm_moneyness_eps",
            "moneyness threshold must be finite and non-negative, got {}",
            self.itm_moneyness_eps
        );
        Ok(())
    }

    /// Independent normal vectors drawn.
    fn draws(&self) -> usize {
        if self.antithetic {
            self.num_paths.div_ceil(2)
        } else {
            self.num_paths
        }
    }

    fn basis_size(&self) -> usize {
        self.basis_degree + 1
    }
}

// ─── Results ──────────────────────────────────────────────────────────────────

/// Regression and exercise statistics of one exercise date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LsmcDateDiagnostics {
    /// Date in years.
    pub time: Time,
    /// Paths with positive intrinsic value.
    pub itm_count: usize,
    /// Paths entering the regression.
    pub regression_count: usize,
    /// Paths exercising at this date.
    pub exercised_count: usize,
    /// `exercised_count` over all simulated paths.
    pub exercised_fraction: Real,
    /// R² of the fit; `None` when no fit was attempted.
    pub r_squared: Option<Real>,
    /// Condition number of the design; `None` when no fit was attempted.
    pub condition_number: Option<Real>,
    /// Whether the date fell back to no exercise.
    pub fallback: bool,
    /// Highest exercised spot for a put, lowest for a call.
    pub boundary: Option<Real>,
}

/// Run-level diagnostics of [`run_lsmc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LsmcDiagnostics {
    /// One entry per exercise date before maturity, in ascending time.
    pub dates: Vec<LsmcDateDiagnostics>,
    /// Dates that fell back to no exercise.
    pub degraded_dates: usize,
    /// European (exercise at maturity only) estimate from the same paths.
    pub european: McStatistic,
    /// Whether immediate exercise beat the continuation estimate.
    pub immediate_exercise: bool,
    /// Simulated paths, antithetic mirrors included.
    pub num_paths: usize,
}

/// Output of [`run_lsmc`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LsmcResult {
    /// `max(continuation estimate, intrinsic(spot))`.
    pub price: Real,
    /// Standard error of the continuation estimate.
    pub std_error: Real,
    /// Continuation estimate with its 95% interval.
    pub statistic: McStatistic,
    /// Per-date and run-level diagnostics.
    pub diagnostics: LsmcDiagnostics,
    /// Present value of every path, when requested.
    pub path_values: Option<Vec<Real>>,
}

// ─── Engine ───────────────────────────────────────────────────────────────────

/// Price an American option by least-squares Monte Carlo.
///
/// Deterministic for a fixed seed regardless of the rayon pool size.
/// `cancel` is checked between path chunks and between exercise dates.
pub fn run_lsmc(params: &LsmcParams, cancel: &CancellationToken) -> Result<LsmcResult> {
    params.validate()?;
    let curves = MarketCurves::new(&params.rate, &params.dividend, &params.vol);
    let generator = GbmPathGenerator::uniform(
        params.spot,
        curves,
        params.maturity,
        params.num_exercise_dates,
        params.sampler,
        params.seed,
    )?;
    let draws = params.draws();
    debug!(
        draws,
        dates = params.num_exercise_dates,
        antithetic = params.antithetic,
        basis = ?params.basis,
        degree = params.basis_degree,
        "starting LSMC"
    );

    let paths = generator.simulate(draws, params.antithetic, cancel)?;
    let times = generator.times();
    let last = times.len();
    let kind = params.option_type;
    let strike = params.strike;

    // cash[i]: path i's realised cash flow, discounted to the current date
    let mut cash: Vec<Real> = paths
        .column(last)
        .map(|s| kind.intrinsic(s, strike))
        .collect();
    let discount_all = curves.discount(0.0, times[last - 1]);
    let european = pair_statistic(
        &cash.iter().map(|c| c * discount_all).collect::<Vec<_>>(),
        params.antithetic,
    );

    let mut dates = Vec::with_capacity(last.saturating_sub(1));
    for col in (1..last).rev() {
        cancel.check()?;
        let df = curves.discount(times[col - 1], times[col]);
        cash.par_iter_mut().for_each(|c| *c *= df);
        let date = exercise_date(params, &paths, col, times[col - 1], &mut cash)?;
        trace!(
            time = date.time,
            itm = date.itm_count,
            exercised = date.exercised_count,
            fallback = date.fallback,
            "LSMC date"
        );
        dates.push(date);
    }
    dates.reverse();

    let df0 = curves.discount(0.0, times[0]);
    cash.par_iter_mut().for_each(|c| *c *= df0);
    ensure_finite!(cash, "LSMC path values");

    let statistic = pair_statistic(&cash, params.antithetic);
    let intrinsic0 = kind.intrinsic(params.spot, strike);
    let immediate_exercise =
        intrinsic0 > 0.0 && params.tie_break.exercises(intrinsic0, statistic.value);
    let degraded_dates = dates.iter().filter(|d| d.fallback).count();
    if degraded_dates > 0 {
        debug!(degraded_dates, "LSMC finished with degraded dates");
    }
    debug!(
        price = statistic.value,
        std_error = statistic.std_error,
        european = european.value,
        "LSMC finished"
    );

    Ok(LsmcResult {
        price: statistic.value.max(intrinsic0),
        std_error: statistic.std_error,
        statistic,
        diagnostics: LsmcDiagnostics {
            dates,
            degraded_dates,
            european,
            immediate_exercise,
            num_paths: paths.num_paths(),
        },
        path_values: params.record_path_values.then_some(cash),
    })
}

/// Regress and exercise at column `col`, updating `cash` in place.
fn exercise_date(
    params: &LsmcParams,
    paths: &PathMatrix,
    col: usize,
    time: Time,
    cash: &mut [Real],
) -> Result<LsmcDateDiagnostics> {
    let kind = params.option_type;
    let strike = params.strike;
    let threshold = params.itm_moneyness_eps * strike;
    let m = params.basis_size();

    let mut itm_count = 0;
    let mut regression: Vec<usize> = Vec::new();
    for (i, s) in paths.column(col).enumerate() {
        let intrinsic = kind.intrinsic(s, strike);
        if intrinsic > 0.0 {
            itm_count += 1;
            if intrinsic > threshold {
                regression.push(i);
            }
        }
    }

    let mut date = LsmcDateDiagnostics {
        time,
        itm_count,
        regression_count: regression.len(),
        exercised_count: 0,
        exercised_fraction: 0.0,
        r_squared: None,
        condition_number: None,
        fallback: false,
        boundary: None,
    };

    if regression.len() < params.min_itm.max(m + 1) {
        warn!(
            time,
            regression_count = regression.len(),
            "too few in-the-money paths; no exercise at this date"
        );
        date.fallback = true;
        return Ok(date);
    }

    let features: Vec<Real> = regression
        .par_iter()
        .flat_map_iter(|&i| {
            let mut row = vec![0.0; m];
            params.basis.fill(paths.at(i, col) / strike, &mut row);
            row
        })
        .collect();
    let design = DMatrix::from_row_slice(regression.len(), m, &features);
    let targets: Vec<Real> = regression.iter().map(|&i| cash[i]).collect();
    let fit = LinearLeastSquaresRegression::from_design_matrix(&design, &targets, params.ridge_lambda)?;
    date.r_squared = Some(fit.r_squared());
    date.condition_number = Some(fit.condition_number());
    if !fit.is_full_rank() {
        warn!(
            time,
            rank = fit.rank(),
            basis = m,
            "rank-deficient regression; no exercise at this date"
        );
        date.fallback = true;
        return Ok(date);
    }

    let exercised: Vec<(usize, Real, Real)> = regression
        .par_iter()
        .enumerate()
        .filter_map(|(r, &i)| {
            let s = paths.at(i, col);
            let intrinsic = kind.intrinsic(s, strike);
            let mut continuation = fit.predict(&features[r * m..(r + 1) * m]);
            if (continuation - intrinsic).abs() <= TIE_TOLERANCE * strike {
                continuation = intrinsic;
            }
            params
                .tie_break
                .exercises(intrinsic, continuation)
                .then_some((i, s, intrinsic))
        })
        .collect();

    for &(i, _, intrinsic) in &exercised {
        cash[i] = intrinsic;
    }
    let spots = exercised.iter().map(|&(_, s, _)| s);
    date.boundary = match kind {
        OptionType::Put => spots.reduce(Real::max),
        OptionType::Call => spots.reduce(Real::min),
    };
    date.exercised_count = exercised.len();
    date.exercised_fraction = exercised.len() as Real / paths.num_paths() as Real;
    Ok(date)
}

/// Welford summary, averaging antithetic pairs first.
fn pair_statistic(values: &[Real], antithetic: bool) -> McStatistic {
    let acc: Welford = if antithetic {
        values.chunks_exact(2).map(|p| 0.5 * (p[0] + p[1])).collect()
    } else {
        values.iter().copied().collect()
    };
    McStatistic::from_welford(&acc)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
