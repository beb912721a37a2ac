//! Terminal payoff and edge conditions.

use fb_core::{ExerciseStyle, OptionType, Real, Time};
use serde::{Deserialize, Serialize};

use super::grid::SpaceGrid;
use super::operator::OperatorWorkspace;

/// Kind of condition imposed at the upper grid edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    /// Prescribed value: the discounted intrinsic value.
    Dirichlet,
    /// Prescribed slope: the asymptotic delta of the option.
    #[default]
    Neumann,
}

/// Contract data needed to evaluate edge values at a remaining time `tau`.
///
/// `rate` and `dividend` are the averages over the remaining life, so
/// `exp(−rate·tau)` is the exact discount factor for term-structured inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffBoundaryParams {
    /// Call or put.
    pub option_type: OptionType,
    /// Strike.
    pub strike: Real,
    /// Average risk-free rate over the remaining life.
    pub rate: Real,
    /// Average dividend yield over the remaining life.
    pub dividend: Real,
    /// Remaining time to maturity.
    pub tau: Time,
    /// European edges are discounted intrinsic; American ones are further
    /// floored at intrinsic.
    pub exercise: ExerciseStyle,
}

impl PayoffBoundaryParams {
    /// Edge value at spot `s`.
    pub fn dirichlet_value(&self, s: Real) -> Real {
        let df_r = (-self.rate * self.tau).exp();
        let df_q = (-self.dividend * self.tau).exp();
        let european = (self.option_type.sign() * (s * df_q - self.strike * df_r)).max(0.0);
        match self.exercise {
            ExerciseStyle::European => european,
            ExerciseStyle::American => european.max(self.option_type.intrinsic(s, self.strike)),
        }
    }

    /// `dV/dS` far in the money (call) or far out of the money (put).
    pub fn asymptotic_delta(&self) -> Real {
        match self.option_type {
            OptionType::Call => (-self.dividend * self.tau).exp(),
            OptionType::Put => 0.0,
        }
    }
}

/// Condition applied to one edge row of the system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeCondition {
    /// `V = value`.
    Value(Real),
    /// `dV/dx = slope` in the grid coordinate.
    Slope(Real),
}

/// Which edge of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Lowest spot.
    Lower,
    /// Highest spot.
    Upper,
}

/// Edge condition of kind `kind` at `side` for a vanilla payoff.
pub fn payoff_edge(
    params: &PayoffBoundaryParams,
    grid: &SpaceGrid,
    side: Side,
    kind: BoundaryKind,
) -> EdgeCondition {
    let s = match side {
        Side::Lower => grid.spots()[0],
        Side::Upper => grid.spots()[grid.len() - 1],
    };
    match kind {
        BoundaryKind::Dirichlet => EdgeCondition::Value(params.dirichlet_value(s)),
        BoundaryKind::Neumann => {
            let ds = params.asymptotic_delta();
            let slope = if grid.is_log_space() { s * ds } else { ds };
            EdgeCondition::Slope(slope)
        }
    }
}

/// Overwrite an edge row of `op` with `condition`.
///
/// A slope uses the one-sided difference to the neighbouring node.
pub fn apply_edge(op: &mut OperatorWorkspace, grid: &SpaceGrid, side: Side, condition: EdgeCondition) {
    let n = op.len();
    let x = grid.coordinates();
    let (row, h) = match side {
        Side::Lower => (0, x[1] - x[0]),
        Side::Upper => (n - 1, x[n - 1] - x[n - 2]),
    };
    op.lower[row] = 0.0;
    op.upper[row] = 0.0;
    op.diag[row] = 1.0;
    match (condition, side) {
        (EdgeCondition::Value(v), _) => op.rhs[row] = v,
        (EdgeCondition::Slope(d), Side::Lower) => {
            // V0 − V1 = −h d
            op.upper[row] = -1.0;
            op.rhs[row] = -h * d;
        }
        (EdgeCondition::Slope(d), Side::Upper) => {
            // V[n−1] − V[n−2] = h d
            op.lower[row] = -1.0;
            op.rhs[row] = h * d;
        }
    }
}

/// Vanilla payoff at every node.
pub fn terminal_payoff(grid: &SpaceGrid, option_type: OptionType, strike: Real) -> Vec<Real> {
    grid.spots()
        .iter()
        .map(|&s| option_type.intrinsic(s, strike))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::grid::StretchedGridParams;
    use approx::assert_abs_diff_eq;

    fn put_params(exercise: ExerciseStyle) -> PayoffBoundaryParams {
        PayoffBoundaryParams {
            option_type: OptionType::Put,
            strike: 100.0,
            rate: 0.05,
            dividend: 0.0,
            tau: 1.0,
            exercise,
        }
    }

    #[test]
    fn dirichlet_put_edges() {
        let p = put_params(ExerciseStyle::European);
        assert!(p.dirichlet_value(0.0) > 0.0);
        assert_abs_diff_eq!(p.dirichlet_value(0.0), 100.0 * (-0.05f64).exp(), epsilon = 1e-12);
        assert_eq!(p.dirichlet_value(400.0), 0.0);
    }

    #[test]
    fn american_edges_are_floored_at_intrinsic() {
        let p = put_params(ExerciseStyle::American);
        assert_eq!(p.dirichlet_value(0.0), 100.0);
        assert_eq!(p.dirichlet_value(50.0), 50.0);
    }

    #[test]
    fn neumann_slope_in_log_space() {
        let grid = SpaceGrid::build(&StretchedGridParams {
            nodes: 11,
            lower: 25.0,
            upper: 400.0,
            anchor: 100.0,
            stretch: 0.0,
            log_space: true,
        })
        .unwrap();
        let call = PayoffBoundaryParams {
            option_type: OptionType::Call,
            dividend: 0.02,
            ..put_params(ExerciseStyle::European)
        };
        match payoff_edge(&call, &grid, Side::Upper, BoundaryKind::Neumann) {
            EdgeCondition::Slope(d) => {
                assert_abs_diff_eq!(d, 400.0 * (-0.02f64).exp(), epsilon = 1e-9)
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut op = OperatorWorkspace::new(grid.len());
        apply_edge(&mut op, &grid, Side::Upper, EdgeCondition::Slope(2.0));
        let n = grid.len();
        let h = grid.coordinates()[n - 1] - grid.coordinates()[n - 2];
        assert_eq!((op.lower[n - 1], op.diag[n - 1]), (-1.0, 1.0));
        assert_abs_diff_eq!(op.rhs[n - 1], 2.0 * h, epsilon = 1e-15);
    }
}
