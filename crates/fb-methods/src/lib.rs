//! # fb-methods
//!
//! Numerical methods: finite-difference grids and the PSOR free-boundary
//! solver, a binomial lattice, and the Monte Carlo simulation framework.
//!
//! # Modules
//!
//! * [`finite_differences`]: stretched grids, theta-scheme operator, PSOR
//! * [`lattice`]: CRR binomial tree and backward-induction pricing
//! * [`monte_carlo`]: path generation, path pricing, MC model orchestrator

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Finite difference methods: grids, operators, boundaries, PSOR, stepping.
pub mod finite_differences;

/// Lattice methods: binomial trees, backward induction.
pub mod lattice;

/// Monte Carlo simulation: path generation, pricing, statistics.
pub mod monte_carlo;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use finite_differences::{
    BoundaryKind, ExerciseBoundaryPoint, FdProblem, FdSolution, GridSpec, OperatorWorkspace,
    PsorParams, PsorResult, SpaceGrid, StretchedGridParams, ThetaSolver,
};
pub use lattice::{price_american, price_european, BinomialTree};
pub use monte_carlo::{
    GbmPathGenerator, McOutcome, McParams, MonteCarloModel, Path, PathMatrix, PathPricer, Sampler,
};
