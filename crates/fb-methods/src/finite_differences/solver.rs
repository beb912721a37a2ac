//! Backward theta-scheme time stepping with Rannacher start-up.
//!
//! [`ThetaSolver`] walks from maturity to the valuation date one step at a
//! time. Each step assembles the operator at the step's calendar midpoint,
//! imposes the edge conditions and then either solves the tridiagonal
//! system exactly (no exercise constraint) or runs PSOR against the
//! obstacle.

use fb_core::{
    ensure, ensure_config, ensure_finite, CancellationToken, ExerciseStyle, OptionType, Real,
    Result, Time,
};
use fb_termstructures::MarketCurves;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::boundary::{apply_edge, payoff_edge, BoundaryKind, EdgeCondition, PayoffBoundaryParams, Side};
use super::grid::{SpaceGrid, SpotGreeks, StretchedGridParams};
use super::operator::{assemble_operator, DiffusionCoefficients, OperatorWorkspace};
use super::psor::{psor_solve, PsorParams, PsorStep};

// ─── Grid specification ───────────────────────────────────────────────────────

/// Space and time resolution of a PDE solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSpec {
    /// Spatial nodes.
    pub num_space: usize,
    /// Time steps.
    pub num_time: usize,
    /// Width of the spot domain as a multiple of spot (and strike).
    pub s_max_mult: Real,
    /// Concentration of nodes around the anchor; `0` is uniform.
    pub stretch: Real,
    /// Discretise in `ln S` instead of `S`.
    pub log_space: bool,
    /// Condition at the upper spot edge.
    pub upper_boundary: BoundaryKind,
    /// Fully implicit steps before switching to Crank-Nicolson.
    pub rannacher_steps: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            num_space: 201,
            num_time: 200,
            s_max_mult: 4.0,
            stretch: 1.5,
            log_space: true,
            upper_boundary: BoundaryKind::Neumann,
            rannacher_steps: 2,
        }
    }
}

impl GridSpec {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.num_space >= 3,
            "grid.num_space",
            "need at least 3 nodes, got {}",
            self.num_space
        );
        ensure_config!(self.num_time >= 1, "grid.num_time", "need at least one time step");
        ensure_config!(
            self.s_max_mult > 1.0 && self.s_max_mult.is_finite(),
            "grid.s_max_mult",
            "domain multiple must exceed 1, got {}",
            self.s_max_mult
        );
        ensure_config!(
            self.stretch >= 0.0 && self.stretch.is_finite(),
            "grid.stretch",
            "stretch must be finite and non-negative, got {}",
            self.stretch
        );
        Ok(())
    }

    /// Grid parameters for a vanilla solve around `spot`, concentrated at
    /// `anchor`.
    ///
    /// Spot space covers `[0, max(spot, anchor)·mult]`; log space covers
    /// `[spot/mult, spot·mult]`.
    pub fn space_params(&self, spot: Real, anchor: Real) -> StretchedGridParams {
        let (lower, upper) = if self.log_space {
            (spot / self.s_max_mult, spot * self.s_max_mult)
        } else {
            (0.0, spot.max(anchor) * self.s_max_mult)
        };
        StretchedGridParams {
            nodes: self.num_space,
            lower,
            upper,
            anchor,
            stretch: self.stretch,
            log_space: self.log_space,
        }
    }
}

// ─── Problem & result ─────────────────────────────────────────────────────────

/// Condition held at one grid edge for the whole solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeSpec {
    /// Vanilla edge of the given kind, re-evaluated every step.
    Payoff(BoundaryKind),
    /// Constant value, e.g. a rebate paid when a barrier is touched.
    Fixed(Real),
    /// Amount paid at maturity, discounted to the slice time.
    Discounted(Real),
}

/// Everything one backward solve needs.
#[derive(Debug, Clone)]
pub struct FdProblem<'a> {
    /// Spatial grid.
    pub grid: SpaceGrid,
    /// Values at maturity.
    pub terminal: Vec<Real>,
    /// Early-exercise floor per node; `−∞` leaves a node free. `None`
    /// switches PSOR off.
    pub obstacle: Option<Vec<Real>>,
    /// Lower edge condition.
    pub lower: EdgeSpec,
    /// Upper edge condition.
    pub upper: EdgeSpec,
    /// Payoff type used by [`EdgeSpec::Payoff`] edges and the exercise boundary.
    pub option_type: OptionType,
    /// Strike used by [`EdgeSpec::Payoff`] edges.
    pub strike: Real,
    /// Exercise style used by [`EdgeSpec::Payoff`] edges.
    pub exercise: ExerciseStyle,
    /// Market data.
    pub curves: MarketCurves<'a>,
    /// Time to maturity.
    pub maturity: Time,
    /// Number of time steps.
    pub num_time: usize,
    /// Fully implicit start-up steps.
    pub rannacher_steps: usize,
    /// PSOR settings.
    pub psor: PsorParams,
}

/// Critical spot at one time level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseBoundaryPoint {
    /// Calendar time of the slice.
    pub time: Time,
    /// Highest exercised spot for a put, lowest for a call; `None` when no
    /// interior node is exercised.
    pub spot: Option<Real>,
}

/// Final slice of a backward solve together with its iteration diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsorResult {
    /// Values at the valuation date, one per node.
    pub values: Vec<Real>,
    /// PSOR sweeps summed over all steps; `0` for exact tridiagonal solves.
    pub total_iterations: usize,
    /// Largest final-sweep change over all steps.
    pub max_residual: Real,
    /// Steps that hit the iteration cap.
    pub capped_steps: usize,
    /// Sweeps of the most expensive step.
    pub max_step_iterations: usize,
    /// `false` when any step hit the cap.
    pub converged: bool,
    /// Early-exercise boundary, ascending in time. Empty without an obstacle.
    pub exercise_boundary: Vec<ExerciseBoundaryPoint>,
}

/// Output of [`ThetaSolver::run`].
#[derive(Debug, Clone)]
pub struct FdSolution {
    /// Grid the values live on.
    pub grid: SpaceGrid,
    /// Slice one step after the valuation date.
    pub previous: Vec<Real>,
    /// Time step.
    pub dt: Time,
    /// Valuation-date slice and diagnostics.
    pub result: PsorResult,
}

impl FdSolution {
    /// Value, delta and gamma at `spot`, plus theta from the next slice.
    pub fn greeks_at(&self, spot: Real) -> (SpotGreeks, Real) {
        let now = self.grid.greeks_at(&self.result.values, spot);
        let later = self.grid.interpolate(&self.previous, spot);
        (now, (later - now.value) / self.dt)
    }
}

// ─── Stepper ──────────────────────────────────────────────────────────────────

/// Where the stepper is in its backward sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Holding the terminal slice.
    Initialized,
    /// Some but not all steps taken.
    Stepping,
    /// Valuation date reached.
    Terminal,
}

/// Theta-scheme stepper over one [`FdProblem`].
#[derive(Debug)]
pub struct ThetaSolver<'a> {
    problem: FdProblem<'a>,
    dt: Time,
    step: usize,
    values: Vec<Real>,
    previous: Vec<Real>,
    exercised: Vec<bool>,
    op: OperatorWorkspace,
    total_iterations: usize,
    max_residual: Real,
    capped_steps: usize,
    max_step_iterations: usize,
    boundary: Vec<ExerciseBoundaryPoint>,
}

impl<'a> ThetaSolver<'a> {
    /// Validate `problem` and load the terminal slice.
    pub fn new(problem: FdProblem<'a>) -> Result<Self> {
        let n = problem.grid.len();
        ensure_config!(
            problem.maturity > 0.0 && problem.maturity.is_finite(),
            "maturity",
            "maturity must be positive, got {}",
            problem.maturity
        );
        ensure_config!(problem.num_time >= 1, "grid.num_time", "need at least one time step");
        problem.psor.validate()?;
        ensure!(
            problem.terminal.len() == n,
            "terminal slice has {} values for {n} nodes",
            problem.terminal.len()
        );
        if let Some(obstacle) = &problem.obstacle {
            ensure!(obstacle.len() == n, "obstacle has {} values for {n} nodes", obstacle.len());
        }
        ensure_finite!(problem.terminal, "terminal values");

        let dt = problem.maturity / problem.num_time as Real;
        let values = problem.terminal.clone();
        Ok(Self {
            dt,
            step: 0,
            previous: values.clone(),
            values,
            exercised: vec![false; n],
            op: OperatorWorkspace::new(n),
            total_iterations: 0,
            max_residual: 0.0,
            capped_steps: 0,
            max_step_iterations: 0,
            boundary: Vec::new(),
            problem,
        })
    }

    /// Current state.
    pub fn state(&self) -> SolverState {
        match self.step {
            0 => SolverState::Initialized,
            k if k < self.problem.num_time => SolverState::Stepping,
            _ => SolverState::Terminal,
        }
    }

    /// Calendar time of the current slice.
    pub fn time(&self) -> Time {
        self.problem.maturity - self.step as Real * self.dt
    }

    /// Current slice.
    pub fn values(&self) -> &[Real] {
        &self.values
    }

    /// Take one step back. Returns the PSOR outcome, or `None` for an
    /// exact solve.
    pub fn step(&mut self) -> Result<Option<PsorStep>> {
        ensure!(self.state() != SolverState::Terminal, "solver already reached the valuation date");

        let p = &self.problem;
        let t_hi = self.time();
        let t_lo = if self.step + 1 == p.num_time {
            0.0
        } else {
            p.maturity - (self.step + 1) as Real * self.dt
        };
        let t_mid = 0.5 * (t_lo + t_hi);
        let theta = if self.step < p.rannacher_steps { 1.0 } else { 0.5 };
        let (rate, dividend, sigma) = p.curves.at(t_mid);
        let coeffs = DiffusionCoefficients {
            sigma,
            rate,
            dividend,
            log_space: p.grid.is_log_space(),
        };

        self.previous.copy_from_slice(&self.values);
        assemble_operator(&p.grid, &coeffs, self.dt, theta, &self.previous, &mut self.op)?;

        let edge_params = PayoffBoundaryParams {
            option_type: p.option_type,
            strike: p.strike,
            rate: p.curves.rate.average(t_lo, p.maturity),
            dividend: p.curves.dividend.average(t_lo, p.maturity),
            tau: p.maturity - t_lo,
            exercise: p.exercise,
        };
        for (side, spec) in [(Side::Lower, p.lower), (Side::Upper, p.upper)] {
            let condition = match spec {
                EdgeSpec::Payoff(kind) => {
                    // a slope at the lower edge is meaningless for vanilla payoffs
                    let kind = if side == Side::Lower { BoundaryKind::Dirichlet } else { kind };
                    payoff_edge(&edge_params, &p.grid, side, kind)
                }
                EdgeSpec::Fixed(v) => EdgeCondition::Value(v),
                EdgeSpec::Discounted(amount) => {
                    EdgeCondition::Value(amount * (-edge_params.rate * edge_params.tau).exp())
                }
            };
            apply_edge(&mut self.op, &p.grid, side, condition);
        }

        let outcome = match &p.obstacle {
            None => {
                self.op.solve_tridiagonal(&mut self.values)?;
                None
            }
            Some(obstacle) => {
                let step = psor_solve(&self.op, obstacle, &mut self.values, &mut self.exercised, &p.psor);
                self.total_iterations += step.iterations;
                self.max_step_iterations = self.max_step_iterations.max(step.iterations);
                self.max_residual = self.max_residual.max(step.residual);
                if !step.converged {
                    self.capped_steps += 1;
                    warn!(
                        time = t_lo,
                        iterations = step.iterations,
                        residual = step.residual,
                        "PSOR hit its iteration cap"
                    );
                }
                self.boundary.push(ExerciseBoundaryPoint {
                    time: t_lo,
                    spot: critical_spot(p.grid.spots(), &self.exercised, p.option_type),
                });
                Some(step)
            }
        };
        trace!(step = self.step, time = t_lo, theta, "theta step done");
        self.step += 1;
        Ok(outcome)
    }

    /// Step to the valuation date, checking `cancel` before every step.
    pub fn run(mut self, cancel: &CancellationToken) -> Result<FdSolution> {
        debug!(
            nodes = self.problem.grid.len(),
            steps = self.problem.num_time,
            american = self.problem.obstacle.is_some(),
            "starting backward solve"
        );
        while self.state() != SolverState::Terminal {
            cancel.check()?;
            self.step()?;
        }
        ensure_finite!(self.values, "solution values");

        let converged = self.capped_steps == 0;
        debug!(
            total_iterations = self.total_iterations,
            capped_steps = self.capped_steps,
            max_residual = self.max_residual,
            "backward solve finished"
        );
        self.boundary.reverse();
        Ok(FdSolution {
            grid: self.problem.grid,
            previous: self.previous,
            dt: self.dt,
            result: PsorResult {
                values: self.values,
                total_iterations: self.total_iterations,
                max_residual: self.max_residual,
                capped_steps: self.capped_steps,
                max_step_iterations: self.max_step_iterations,
                converged,
                exercise_boundary: self.boundary,
            },
        })
    }
}

/// Boundary of the exercised interior nodes on one slice.
fn critical_spot(spots: &[Real], exercised: &[bool], option_type: OptionType) -> Option<Real> {
    let n = spots.len();
    let mut interior = (1..n - 1).filter(|&i| exercised[i]);
    match option_type {
        OptionType::Put => interior.last().map(|i| spots[i]),
        OptionType::Call => interior.next().map(|i| spots[i]),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
