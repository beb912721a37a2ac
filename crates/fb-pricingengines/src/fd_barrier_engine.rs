//! Finite-difference engine for single-barrier options.
//!
//! Knock-outs are solved on a log-spot grid that ends at the barrier; the
//! barrier node holds the rebate, paid when the barrier is touched. Both
//! European and American exercise are supported.
//!
//! European knock-ins use parity with a knock-in rebate paid at maturity
//! when the barrier was never touched:
//!
//! `knock_in = vanilla − knock_out(no rebate) + rebate · no_touch`
//!
//! where `no_touch` is the present value of 1 paid at maturity if the
//! barrier is not touched. Greeks are combined the same way. Parity fails
//! with early exercise, so American knock-ins are rejected.

use fb_core::{
    ensure_config, ensure_finite, BarrierKind, CancellationToken, ExerciseStyle, Real, Result,
};
use fb_methods::finite_differences::{
    terminal_payoff, BoundaryKind, EdgeSpec, FdProblem, FdSolution, PsorResult, SpaceGrid,
    StretchedGridParams, ThetaSolver,
};
use fb_termstructures::{Curve, MarketCurves};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fd_american_engine::{solve_vanilla, vega_bump, PdeParams};

/// Barrier type, level and rebate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarrierSpec {
    /// Up/down and in/out.
    pub kind: BarrierKind,
    /// Barrier level.
    pub level: Real,
    /// Cash rebate: at touch for knock-outs, at maturity for knock-ins.
    pub rebate: Real,
}

impl Default for BarrierSpec {
    fn default() -> Self {
        Self {
            kind: BarrierKind::UpOut,
            level: 120.0,
            rebate: 0.0,
        }
    }
}

/// Inputs of [`solve_barrier_pde`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierPdeParams {
    /// Underlying vanilla contract, market data and numerical settings.
    pub option: PdeParams,
    /// The barrier.
    pub barrier: BarrierSpec,
}

impl BarrierPdeParams {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        self.option.validate()?;
        let b = &self.barrier;
        ensure_config!(
            b.level > 0.0 && b.level.is_finite(),
            "barrier.level",
            "barrier level must be positive, got {}",
            b.level
        );
        ensure_config!(
            b.rebate >= 0.0 && b.rebate.is_finite(),
            "barrier.rebate",
            "rebate must be non-negative, got {}",
            b.rebate
        );
        ensure_config!(
            !b.kind.is_triggered(self.option.spot, b.level),
            "spot",
            "spot {} is already at or beyond the {:?} barrier {}",
            self.option.spot,
            b.kind,
            b.level
        );
        ensure_config!(
            b.kind.is_knock_out() || self.option.exercise == ExerciseStyle::European,
            "exercise",
            "American knock-in options are not supported"
        );
        Ok(())
    }
}

/// Output of [`solve_barrier_pde`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierPdeGreeksResult {
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
    /// Diagnostics of the knock-out solve.
    pub diagnostics: PsorResult,
}

/// Price a barrier option on the PDE grid.
pub fn solve_barrier_pde(
    params: &BarrierPdeParams,
    cancel: &CancellationToken,
) -> Result<BarrierPdeGreeksResult> {
    params.validate()?;
    debug!(
        kind = ?params.barrier.kind,
        level = params.barrier.level,
        exercise = ?params.option.exercise,
        "solving barrier PDE"
    );

    let vol = &params.option.vol;
    let (base, vega) = if params.option.compute_vega {
        let bump = vega_bump(vol);
        let (up, down) = (vol.shifted(bump), vol.shifted(-bump));
        let (base, (p_up, p_down)) = rayon::join(
            || value_barrier(params, vol, cancel),
            || {
                rayon::join(
                    || value_barrier(params, &up, cancel),
                    || value_barrier(params, &down, cancel),
                )
            },
        );
        let (base, p_up, p_down) = (base?, p_up?, p_down?);
        (base, Some((p_up.0.value - p_down.0.value) / (2.0 * bump)))
    } else {
        (value_barrier(params, vol, cancel)?, None)
    };

    let (g, diagnostics) = base;
    let result = BarrierPdeGreeksResult {
        price: g.value,
        delta: g.delta,
        gamma: g.gamma,
        theta: g.theta,
        vega,
        diagnostics,
    };
    ensure_finite!(
        [result.price, result.delta, result.gamma, result.theta, result.vega.unwrap_or(0.0)],
        "barrier PDE Greeks"
    );
    debug!(price = result.price, "barrier PDE solved");
    Ok(result)
}

/// Value with its grid Greeks.
#[derive(Debug, Clone, Copy, Default)]
struct Sensitivities {
    value: Real,
    delta: Real,
    gamma: Real,
    theta: Real,
}

impl Sensitivities {
    fn read(solution: &FdSolution, spot: Real) -> Self {
        let (g, theta) = solution.greeks_at(spot);
        Self {
            value: g.value,
            delta: g.delta,
            gamma: g.gamma,
            theta,
        }
    }

    /// `self + w · other`.
    fn add_scaled(self, other: Self, w: Real) -> Self {
        Self {
            value: self.value + w * other.value,
            delta: self.delta + w * other.delta,
            gamma: self.gamma + w * other.gamma,
            theta: self.theta + w * other.theta,
        }
    }
}

fn value_barrier(
    params: &BarrierPdeParams,
    vol: &Curve,
    cancel: &CancellationToken,
) -> Result<(Sensitivities, PsorResult)> {
    let spot = params.option.spot;
    let b = params.barrier;
    if b.kind.is_knock_out() {
        let ko = knock_out(params, vol, KnockOutPayoff::Vanilla { rebate: b.rebate }, cancel)?;
        return Ok((Sensitivities::read(&ko, spot), ko.result));
    }

    let vanilla = solve_vanilla(&params.option, vol, cancel)?;
    let ko = knock_out(params, vol, KnockOutPayoff::Vanilla { rebate: 0.0 }, cancel)?;
    let mut g =
        Sensitivities::read(&vanilla, spot).add_scaled(Sensitivities::read(&ko, spot), -1.0);
    if b.rebate > 0.0 {
        let no_touch = knock_out(params, vol, KnockOutPayoff::NoTouch, cancel)?;
        g = g.add_scaled(Sensitivities::read(&no_touch, spot), b.rebate);
    }
    Ok((g, ko.result))
}

#[derive(Debug, Clone, Copy)]
enum KnockOutPayoff {
    /// Vanilla payoff, `rebate` paid at touch.
    Vanilla { rebate: Real },
    /// 1 at maturity if never touched.
    NoTouch,
}

/// Log grid from the far side of spot up to the barrier.
fn truncated_grid(params: &BarrierPdeParams) -> Result<(SpaceGrid, usize)> {
    let o = &params.option;
    let level = params.barrier.level;
    let mult = o.grid.s_max_mult;
    let (lower, upper) = if params.barrier.kind.is_up() {
        (o.spot / mult, level)
    } else {
        (level, o.spot * mult)
    };
    let anchor = if o.strike > lower && o.strike < upper {
        o.strike
    } else {
        level
    };
    let grid = SpaceGrid::build(&StretchedGridParams {
        nodes: o.grid.num_space,
        lower,
        upper,
        anchor,
        stretch: o.grid.stretch,
        log_space: true,
    })?;
    let barrier_node = if params.barrier.kind.is_up() {
        grid.len() - 1
    } else {
        0
    };
    Ok((grid, barrier_node))
}

fn knock_out(
    params: &BarrierPdeParams,
    vol: &Curve,
    payoff: KnockOutPayoff,
    cancel: &CancellationToken,
) -> Result<FdSolution> {
    let o = &params.option;
    let (grid, barrier_node) = truncated_grid(params)?;

    let (mut terminal, barrier_value, far_edge, exercise) = match payoff {
        KnockOutPayoff::Vanilla { rebate } => {
            let far = if params.barrier.kind.is_up() {
                EdgeSpec::Payoff(BoundaryKind::Dirichlet)
            } else {
                EdgeSpec::Payoff(o.grid.upper_boundary)
            };
            (terminal_payoff(&grid, o.option_type, o.strike), rebate, far, o.exercise)
        }
        KnockOutPayoff::NoTouch => (
            vec![1.0; grid.len()],
            0.0,
            EdgeSpec::Discounted(1.0),
            ExerciseStyle::European,
        ),
    };
    terminal[barrier_node] = barrier_value;

    let obstacle = (exercise == ExerciseStyle::American).then(|| {
        let mut floor = terminal_payoff(&grid, o.option_type, o.strike);
        floor[barrier_node] = Real::NEG_INFINITY;
        floor
    });

    let (lower, upper) = if barrier_node == 0 {
        (EdgeSpec::Fixed(barrier_value), far_edge)
    } else {
        (far_edge, EdgeSpec::Fixed(barrier_value))
    };
    let problem = FdProblem {
        grid,
        terminal,
        obstacle,
        lower,
        upper,
        option_type: o.option_type,
        strike: o.strike,
        exercise,
        curves: MarketCurves::new(&o.rate, &o.dividend, vol),
        maturity: o.maturity,
        num_time: o.grid.num_time,
        rannacher_steps: o.grid.rannacher_steps,
        psor: o.psor,
    };
    ThetaSolver::new(problem)?.run(cancel)
}
