//! Projected successive over-relaxation for the linear complementarity
//! problem `A V >= rhs`, `V >= g`, `(A V − rhs)·(V − g) = 0`.

use fb_core::{ensure_config, Real, Result, TieBreak};
use serde::{Deserialize, Serialize};

use super::operator::OperatorWorkspace;

/// Relaxation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsorParams {
    /// Relaxation factor ω, in (0, 2).
    pub omega: Real,
    /// Stop once the largest nodal change of a sweep is at most this.
    pub tolerance: Real,
    /// Sweep cap per time step. Reaching it is reported, not an error.
    pub max_iterations: usize,
    /// How a node whose continuation equals its exercise value is labelled.
    pub tie_break: TieBreak,
}

impl Default for PsorParams {
    fn default() -> Self {
        Self {
            omega: 1.2,
            tolerance: 1e-8,
            max_iterations: 10_000,
            tie_break: TieBreak::ExerciseOnTie,
        }
    }
}

impl PsorParams {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.omega > 0.0 && self.omega < 2.0,
            "psor.omega",
            "relaxation factor must lie in (0, 2), got {}",
            self.omega
        );
        ensure_config!(
            self.tolerance > 0.0 && self.tolerance.is_finite(),
            "psor.tolerance",
            "tolerance must be positive, got {}",
            self.tolerance
        );
        ensure_config!(
            self.max_iterations > 0,
            "psor.max_iterations",
            "iteration cap must be positive"
        );
        Ok(())
    }
}

/// Outcome of the iteration for one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsorStep {
    /// Sweeps performed.
    pub iterations: usize,
    /// Largest nodal change in the last sweep.
    pub residual: Real,
    /// `false` when the cap was hit first.
    pub converged: bool,
}

/// Solve the projected system held in `op` for `values`, starting from the
/// current contents of `values`.
///
/// Nodes are swept in increasing order. Edge rows are solved exactly;
/// interior rows are over-relaxed. Every node is then projected up to
/// `obstacle[i]` (use `−∞` to leave a node unconstrained). After the final
/// sweep `exercised[i]` tells whether the obstacle bound at node `i` under
/// `params.tie_break`; a zero obstacle never counts as exercise.
pub fn psor_solve(
    op: &OperatorWorkspace,
    obstacle: &[Real],
    values: &mut [Real],
    exercised: &mut [bool],
    params: &PsorParams,
) -> PsorStep {
    let n = op.len();
    debug_assert!(values.len() == n && obstacle.len() == n && exercised.len() == n);
    let omega = params.omega;

    let mut iterations = 0;
    let mut residual = Real::INFINITY;
    while iterations < params.max_iterations {
        iterations += 1;
        residual = 0.0;
        for i in 0..n {
            let mut sum = op.rhs[i];
            if i > 0 {
                sum -= op.lower[i] * values[i - 1];
            }
            if i + 1 < n {
                sum -= op.upper[i] * values[i + 1];
            }
            let gauss_seidel = sum / op.diag[i];
            let old = values[i];
            let candidate = if i == 0 || i == n - 1 {
                gauss_seidel
            } else {
                old + omega * (gauss_seidel - old)
            };
            let bound = obstacle[i];
            exercised[i] =
                bound > 0.0 && bound.is_finite() && params.tie_break.exercises(bound, candidate);
            let new = candidate.max(bound);
            residual = residual.max((new - old).abs());
            values[i] = new;
        }
        if residual <= params.tolerance {
            return PsorStep {
                iterations,
                residual,
                converged: true,
            };
        }
    }
    PsorStep {
        iterations,
        residual,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// −V'' = f on a uniform grid, scaled to unit diagonal dominance.
    fn poisson(n: usize, rhs: Real) -> OperatorWorkspace {
        let mut op = OperatorWorkspace::new(n);
        for i in 1..n - 1 {
            op.lower[i] = -1.0;
            op.diag[i] = 2.0;
            op.upper[i] = -1.0;
            op.rhs[i] = rhs;
        }
        op.diag[0] = 1.0;
        op.diag[n - 1] = 1.0;
        op
    }

    #[test]
    fn unconstrained_solution_matches_thomas() {
        let mut op = poisson(20, 0.01);
        let mut exact = vec![0.0; 20];
        op.solve_tridiagonal(&mut exact).unwrap();

        let mut v = vec![0.0; 20];
        let mut ex = vec![false; 20];
        let params = PsorParams {
            omega: 1.7,
            tolerance: 1e-13,
            ..PsorParams::default()
        };
        let step = psor_solve(&op, &[Real::NEG_INFINITY; 20], &mut v, &mut ex, &params);
        assert!(step.converged);
        for (a, b) in v.iter().zip(&exact) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
        assert!(ex.iter().all(|&e| !e));
    }

    #[test]
    fn solution_respects_obstacle() {
        let op = poisson(21, -0.02);
        // unconstrained solution sags below zero; obstacle at 0.05 in the middle
        let obstacle: Vec<Real> = (0..21).map(|i| if (8..=12).contains(&i) { 0.05 } else { 0.0 }).collect();
        let mut v = vec![0.0; 21];
        let mut ex = vec![false; 21];
        let step = psor_solve(&op, &obstacle, &mut v, &mut ex, &PsorParams::default());
        assert!(step.converged);
        for (vi, gi) in v.iter().zip(&obstacle) {
            assert!(vi >= gi);
        }
        assert!(ex[10]);
    }

    #[test]
    fn cap_is_reported_not_fatal() {
        let op = poisson(200, 0.01);
        let mut v = vec![0.0; 200];
        let mut ex = vec![false; 200];
        let params = PsorParams {
            max_iterations: 3,
            tolerance: 1e-14,
            ..PsorParams::default()
        };
        let step = psor_solve(&op, &[Real::NEG_INFINITY; 200], &mut v, &mut ex, &params);
        assert!(!step.converged);
        assert_eq!(step.iterations, 3);
        assert!(v.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn tie_break_labels_equality() {
        let mut op = OperatorWorkspace::new(3);
        op.diag.fill(1.0);
        op.rhs.copy_from_slice(&[1.0, 2.0, 3.0]);
        let obstacle = [1.0, 2.0, 3.0];
        let mut ex = [false; 3];

        let mut v = [0.0; 3];
        psor_solve(&op, &obstacle, &mut v, &mut ex, &PsorParams::default());
        assert_eq!(ex, [true; 3]);

        let mut v = [0.0; 3];
        let params = PsorParams {
            tie_break: TieBreak::ContinueOnTie,
            ..PsorParams::default()
        };
        psor_solve(&op, &obstacle, &mut v, &mut ex, &params);
        assert_eq!(ex, [false; 3]);
        assert_eq!(v, obstacle);
    }

    #[test]
    fn omega_outside_open_interval_is_rejected() {
        for omega in [0.0, 2.0, -0.5, 2.5] {
            let p = PsorParams {
                omega,
                ..PsorParams::default()
            };
            assert_eq!(p.validate().unwrap_err().field(), Some("psor.omega"));
        }
        assert!(PsorParams::default().validate().is_ok());
    }
}
