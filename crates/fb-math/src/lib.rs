//! # fb-math
//!
//! Numerical building blocks for the pricing engines: the standard normal
//! distribution, Sobol low-discrepancy points and Brownian-bridge path
//! construction, seeded pseudo-random normal streams, the Welford online
//! accumulator, and least-squares regression with fit diagnostics.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// Probability distributions.
pub mod distributions;

/// Linear least-squares regression (SVD, optional ridge).
pub mod linear_least_squares;

/// Random and quasi-random number generators.
pub mod random_numbers;

/// Statistics accumulators.
pub mod statistics;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use distributions::{normal_cdf, normal_cdf_inverse, normal_pdf, normal_quantile};
pub use linear_least_squares::LinearLeastSquaresRegression;
pub use random_numbers::{
    derive_seed, uniforms_to_normals, BrownianBridge, PseudoRandomNormal, SobolSequence,
    SobolState, MAX_DIMENSION,
};
pub use statistics::{BivariateWelford, McStatistic, Welford, Z_95};
