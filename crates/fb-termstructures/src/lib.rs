//! # fb-termstructures
//!
//! Time-indexed market inputs: the [`TermStructure`] lookup contract, the
//! [`PiecewiseConstant`] step curve, and the [`Curve`] wrapper every engine
//! takes for rates, dividend yields and volatilities.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// `TermStructure`: lookup-by-time trait.
pub mod term_structure;

/// `PiecewiseConstant`: right-closed step curve.
pub mod piecewise_constant;

/// `Curve`: flat or piecewise input.
pub mod curve;

/// `MarketCurves`: rate, dividend and volatility bundle.
pub mod market;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use curve::Curve;
pub use market::MarketCurves;
pub use piecewise_constant::PiecewiseConstant;
pub use term_structure::TermStructure;
