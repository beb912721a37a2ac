//! Finite-difference engine for vanilla European and American options.
//!
//! Solves the Black-Scholes PDE backward on a stretched grid with a
//! Rannacher-started Crank-Nicolson scheme. American exercise is enforced
//! by PSOR at every step. Price, delta and gamma are read off the final
//! slice by quadratic interpolation around spot; theta uses the slice one
//! step later. Vega is a central bump-and-revalue of the volatility curve,
//! with the two bumped solves running alongside the base solve.

use fb_core::{ensure_finite, CancellationToken, ExerciseStyle, OptionType, Real, Result, Time};
use fb_methods::finite_differences::{
    terminal_payoff, BoundaryKind, EdgeSpec, FdProblem, FdSolution, GridSpec, PsorParams, PsorResult,
    SpaceGrid, ThetaSolver,
};
use fb_termstructures::{Curve, MarketCurves};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::validate_contract;

/// Absolute volatility bump of the vega revaluation.
pub const VEGA_BUMP: Real = 0.01;

/// Inputs of [`solve_pde`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdeParams {
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
    /// European or American.
    pub exercise: ExerciseStyle,
    /// Grid resolution and boundary choice.
    pub grid: GridSpec,
    /// PSOR settings for American solves.
    pub psor: PsorParams,
    /// Revalue with bumped volatility to get vega.
    pub compute_vega: bool,
}

impl Default for PdeParams {
    fn default() -> Self {
        Self {
            spot: 100.0,
            strike: 100.0,
            rate: Curve::Flat(0.05),
            dividend: Curve::Flat(0.0),
            vol: Curve::Flat(0.2),
            maturity: 1.0,
            option_type: OptionType::Put,
            exercise: ExerciseStyle::American,
            grid: GridSpec::default(),
            psor: PsorParams::default(),
            compute_vega: true,
        }
    }
}

impl PdeParams {
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
        self.grid.validate()?;
        self.psor.validate()
    }

    /// The three curves as borrowed term structures.
    pub fn curves(&self) -> MarketCurves<'_> {
        MarketCurves::new(&self.rate, &self.dividend, &self.vol)
    }
}

/// Output of [`solve_pde`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdeResult {
    /// Present value at spot.
    pub price: Real,
    /// ∂V/∂S.
    pub delta: Real,
    /// ∂²V/∂S².
    pub gamma: Real,
    /// ∂V/∂t per year of calendar time.
    pub theta: Real,
    /// ∂V/∂σ per unit of volatility; `None` unless requested.
    pub vega: Option<Real>,
    /// Final slice and iteration diagnostics of the base solve.
    pub diagnostics: PsorResult,
}

/// Price a vanilla option on the PDE grid.
///
/// Fails with a configuration error before any work if a parameter is
/// invalid, and with [`fb_core::Error::Cancelled`] if `cancel` fires.
pub fn solve_pde(params: &PdeParams, cancel: &CancellationToken) -> Result<PdeResult> {
    params.validate()?;
    debug!(
        option_type = %params.option_type,
        exercise = ?params.exercise,
        nodes = params.grid.num_space,
        steps = params.grid.num_time,
        "solving vanilla PDE"
    );

    let (base, vega) = if params.compute_vega {
        let bump = vega_bump(&params.vol);
        let up = params.vol.shifted(bump);
        let down = params.vol.shifted(-bump);
        let (base, (p_up, p_down)) = rayon::join(
            || solve_vanilla(params, &params.vol, cancel),
            || {
                rayon::join(
                    || price_vanilla(params, &up, cancel),
                    || price_vanilla(params, &down, cancel),
                )
            },
        );
        let (base, p_up, p_down) = (base?, p_up?, p_down?);
        (base, Some((p_up - p_down) / (2.0 * bump)))
    } else {
        (solve_vanilla(params, &params.vol, cancel)?, None)
    };

    let (greeks, theta) = base.greeks_at(params.spot);
    // quadratic interpolation next to the exercise boundary can dip below the obstacle
    let price = match params.exercise {
        ExerciseStyle::American => greeks.value.max(params.option_type.intrinsic(params.spot, params.strike)),
        ExerciseStyle::European => greeks.value,
    };
    let result = PdeResult {
        price,
        delta: greeks.delta,
        gamma: greeks.gamma,
        theta,
        vega,
        diagnostics: base.result,
    };
    ensure_finite!(
        [result.price, result.delta, result.gamma, result.theta, result.vega.unwrap_or(0.0)],
        "PDE Greeks"
    );
    debug!(
        price = result.price,
        total_iterations = result.diagnostics.total_iterations,
        converged = result.diagnostics.converged,
        "vanilla PDE solved"
    );
    Ok(result)
}

/// Bump size: 1 vol point, reduced so the down-bumped curve stays positive.
pub(crate) fn vega_bump(vol: &Curve) -> Real {
    VEGA_BUMP.min(0.5 * vol.range().0)
}

pub(crate) fn solve_vanilla(
    params: &PdeParams,
    vol: &Curve,
    cancel: &CancellationToken,
) -> Result<FdSolution> {
    let grid = SpaceGrid::build(&params.grid.space_params(params.spot, params.strike))?;
    let terminal = terminal_payoff(&grid, params.option_type, params.strike);
    let obstacle = match params.exercise {
        ExerciseStyle::American => Some(terminal.clone()),
        ExerciseStyle::European => None,
    };
    let problem = FdProblem {
        grid,
        terminal,
        obstacle,
        lower: EdgeSpec::Payoff(BoundaryKind::Dirichlet),
        upper: EdgeSpec::Payoff(params.grid.upper_boundary),
        option_type: params.option_type,
        strike: params.strike,
        exercise: params.exercise,
        curves: MarketCurves::new(&params.rate, &params.dividend, vol),
        maturity: params.maturity,
        num_time: params.grid.num_time,
        rannacher_steps: params.grid.rannacher_steps,
        psor: params.psor,
    };
    ThetaSolver::new(problem)?.run(cancel)
}

fn price_vanilla(params: &PdeParams, vol: &Curve, cancel: &CancellationToken) -> Result<Real> {
    let solution = solve_vanilla(params, vol, cancel)?;
    Ok(solution.grid.greeks_at(&solution.result.values, params.spot).value)
}
