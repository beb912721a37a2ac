//! Error types for the pricing core.
//!
//! Every fallible entry point returns [`Result`]. Configuration problems are
//! reported before any computation starts and name the offending field;
//! numerical pathologies found after a solve are reported as
//! [`Error::Computation`]; a cooperative cancellation surfaces as
//! [`Error::Cancelled`] and never carries a partial price.

use thiserror::Error;

/// The top-level error type used throughout the workspace.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// An input parameter is invalid. Raised before any computation.
    #[error("invalid configuration for `{field}`: {message}")]
    Configuration {
        /// Dotted path of the offending parameter, e.g. `psor.omega`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A solve produced non-finite or otherwise unusable numbers.
    #[error("computation error: {0}")]
    Computation(String),

    /// The calculation was aborted through a [`crate::CancellationToken`].
    #[error("calculation aborted")]
    Cancelled,

    /// General runtime error.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Postcondition violated.
    #[error("postcondition not satisfied: {0}")]
    Postcondition(String),
}

impl Error {
    /// Build a [`Error::Configuration`] for `field`.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// `true` for the aborted outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// `true` for errors raised while validating inputs.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    /// The offending field of a configuration error.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Configuration { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Shorthand `Result` type used throughout the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use fb_core::{ensure, errors::Error};
/// fn positive(x: f64) -> fb_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Configuration { field, .. })` if `$cond` is false.
///
/// # Example
/// ```
/// use fb_core::{ensure_config, errors::Error};
/// fn omega(w: f64) -> fb_core::errors::Result<f64> {
///     ensure_config!(w > 0.0 && w < 2.0, "psor.omega", "must lie in (0, 2), got {w}");
///     Ok(w)
/// }
/// assert!(omega(1.5).is_ok());
/// assert_eq!(omega(2.5).unwrap_err().field(), Some("psor.omega"));
/// ```
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $field:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Configuration {
                field: ::std::string::String::from($field),
                message: format!($($msg)*),
            });
        }
    };
}

/// Returns `Err(Error::Postcondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use fb_core::{ensure_post, errors::Error};
/// fn compute(x: f64) -> fb_core::errors::Result<f64> {
///     let result = x * 2.0;
///     ensure_post!(result > 0.0, "result must be positive, got {result}");
///     Ok(result)
/// }
/// assert!(compute(1.0).is_ok());
/// assert!(compute(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure_post {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Postcondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use fb_core::{fail, errors::Error};
/// fn always_err() -> fb_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}

/// Returns `Err(Error::Computation(...))` unless every value is finite.
///
/// # Example
/// ```
/// use fb_core::ensure_finite;
/// fn check(v: &[f64]) -> fb_core::errors::Result<()> {
///     ensure_finite!(v, "grid values");
///     Ok(())
/// }
/// assert!(check(&[1.0, 2.0]).is_ok());
/// assert!(check(&[1.0, f64::NAN]).is_err());
/// ```
#[macro_export]
macro_rules! ensure_finite {
    ($values:expr, $what:expr) => {
        if let Some(pos) = $values.iter().position(|v: &f64| !v.is_finite()) {
            return Err($crate::errors::Error::Computation(format!(
                "{} contain a non-finite value at index {}",
                $what, pos
            )));
        }
    };
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_field() {
        let e = Error::config("grid.num_space", "need at least 3 nodes");
        assert!(e.is_configuration());
        assert!(!e.is_cancelled());
        assert_eq!(e.field(), Some("grid.num_space"));
        assert_eq!(
            e.to_string(),
            "invalid configuration for `grid.num_space`: need at least 3 nodes"
        );
    }

    #[test]
    fn cancelled_is_distinct() {
        let e = Error::Cancelled;
        assert!(e.is_cancelled());
        assert!(!e.is_configuration());
        assert_eq!(e.field(), None);
    }

    #[test]
    fn every_variant_renders_a_message() {
        let all = [
            Error::config("spot", "must be positive"),
            Error::Computation("NaN in slice".into()),
            Error::Cancelled,
            Error::Runtime("boom".into()),
            Error::Precondition("x > 0".into()),
            Error::Postcondition("finite price".into()),
        ];
        for e in &all {
            let kind = match e {
                Error::Configuration { .. } => "configuration",
                Error::Computation(_) => "computation",
                Error::Cancelled => "cancelled",
                Error::Runtime(_) => "runtime",
                Error::Precondition(_) => "precondition",
                Error::Postcondition(_) => "postcondition",
            };
            assert!(!e.to_string().is_empty(), "{kind} has an empty message");
        }
    }

    #[test]
    fn ensure_finite_reports_position() {
        fn check(v: &[f64]) -> Result<()> {
            ensure_finite!(v, "slice");
            Ok(())
        }
        let err = check(&[0.0, 1.0, f64::INFINITY]).unwrap_err();
        assert_eq!(
            err,
            Error::Computation("slice contain a non-finite value at index 2".into())
        );
    }
}
