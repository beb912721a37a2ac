//! # fb-pricingengines
//!
//! Pricing engines built on the numerical methods of `fb-methods`.
//!
//! ## Engines
//!
//! - [`solve_pde`]: theta-scheme finite differences with PSOR for European and American vanillas
//! - [`solve_barrier_pde`]: finite differences for single barriers (knock-out direct, knock-in by parity)
//! - [`run_lsmc`]: Longstaff-Schwartz least-squares Monte Carlo for American options
//! - [`run_mc`]: Monte Carlo for European, Asian, lookback and barrier payoffs, with control variates
//! - [`mc_greeks`]: pathwise delta and vega, likelihood-ratio gamma for European payoffs
//! - [`binomial_price`]: Cox-Ross-Rubinstein tree, used to cross-check the PDE engine
//! - [`black_scholes_merton`]: closed-form European reference with Greeks
//!
//! Every entry point validates its parameters first, reports configuration
//! errors by field name, and returns [`fb_core::Error::Cancelled`] when its
//! [`fb_core::CancellationToken`] fires.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod contract;

pub mod analytic_european_engine;
pub mod binomial_engine;
pub mod fd_american_engine;
pub mod fd_barrier_engine;
pub mod lsmc_engine;
pub mod mc_engine;

pub use analytic_european_engine::{black_scholes_merton, BlackScholesGreeks};
pub use binomial_engine::binomial_price;
pub use fd_american_engine::{solve_pde, PdeParams, PdeResult, VEGA_BUMP};
pub use fd_barrier_engine::{
    solve_barrier_pde, BarrierPdeGreeksResult, BarrierPdeParams, BarrierSpec,
};
pub use lsmc_engine::{
    run_lsmc, BasisKind, LsmcDateDiagnostics, LsmcDiagnostics, LsmcParams, LsmcResult,
};
pub use mc_engine::{mc_greeks, run_mc, McEngineParams, McGreeks, PayoffSpec};
