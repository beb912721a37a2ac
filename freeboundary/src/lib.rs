//! # freeboundary
//!
//! American option valuation: a PSOR finite-difference solver on stretched
//! grids and a Longstaff-Schwartz Monte Carlo engine, with Sobol /
//! Brownian-bridge path generation and Welford statistics underneath.
//!
//! This crate is a **façade** that re-exports the workspace crates.
//! Application code should depend on this crate rather than the individual
//! `fb-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use freeboundary::core::CancellationToken;
//! use freeboundary::pricingengines::{solve_pde, PdeParams};
//!
//! // American put, S = K = 100, r = 5%, σ = 20%, T = 1
//! let params = PdeParams { compute_vega: false, ..PdeParams::default() };
//! let res = solve_pde(&params, &CancellationToken::new()).unwrap();
//! assert!((res.price - 6.09).abs() < 0.02);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, errors and cancellation.
pub use fb_core as core;

/// Rate, dividend and volatility term structures.
pub use fb_termstructures as termstructures;

/// Normal distribution, Sobol, Brownian bridge, statistics, regression.
pub use fb_math as math;

/// Finite differences, lattices and Monte Carlo.
pub use fb_methods as methods;

/// Pricing engines.
pub use fb_pricingengines as pricingengines;

pub use fb_core::{CancellationToken, Error, Real, Result};
pub use fb_pricingengines::{
    mc_greeks, run_lsmc, run_mc, solve_barrier_pde, solve_pde, BarrierPdeParams, LsmcParams,
    McEngineParams, PdeParams,
};
