//! Finite difference methods for the one-factor Black-Scholes PDE.
//!
//! # Overview
//!
//! * [`SpaceGrid`]: stretched spot grid with the strike or barrier on a node
//! * [`OperatorWorkspace`]: tridiagonal theta-scheme system and Thomas solver
//! * [`apply_edge`] / [`terminal_payoff`]: boundary and terminal conditions
//! * [`psor_solve`]: projected SOR for the early-exercise constraint
//! * [`ThetaSolver`]: backward stepper with Rannacher start-up

pub mod boundary;
pub mod grid;
pub mod operator;
pub mod psor;
pub mod solver;

pub use boundary::{
    apply_edge, payoff_edge, terminal_payoff, BoundaryKind, EdgeCondition, PayoffBoundaryParams,
    Side,
};
pub use grid::{stretch_map, SpaceGrid, SpotGreeks, StretchedGridParams};
pub use operator::{assemble_operator, DiffusionCoefficients, OperatorWorkspace};
pub use psor::{psor_solve, PsorParams, PsorStep};
pub use solver::{
    EdgeSpec, ExerciseBoundaryPoint, FdProblem, FdSolution, GridSpec, PsorResult,
    SolverState, ThetaSolver,
};
