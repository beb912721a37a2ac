//! # fb-core
//!
//! Core types and error definitions shared by every `freeboundary` crate.
//!
//! This crate provides the scalar aliases, the error hierarchy with its
//! `ensure!` family of macros, the option contract enums, and the
//! [`CancellationToken`] polled by long-running engines.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Cooperative cancellation token.
pub mod cancellation;

/// Error types and the `ensure!` / `ensure_config!` / `fail!` macros.
pub mod errors;

/// Option type, exercise style, barrier kind, and exercise tie-break policy.
pub mod option;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

/// A rate expressed as a decimal (e.g. 0.05 = 5 %).
pub type Rate = Real;

/// A discount factor in [0, 1].
pub type DiscountFactor = Real;

/// A volatility level expressed as a decimal.
pub type Volatility = Real;

/// A time measurement in years.
pub type Time = Real;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use cancellation::CancellationToken;
pub use errors::{Error, Result};
pub use option::{BarrierKind, ExerciseStyle, OptionType, TieBreak};
