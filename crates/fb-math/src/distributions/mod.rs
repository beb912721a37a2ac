//! Probability distributions.
//!
//! Only the standard normal is needed by the pricing core; the quantile used
//! for confidence intervals is taken from `statrs`.

pub mod normal;

pub use normal::{normal_cdf, normal_cdf_inverse, normal_pdf, normal_quantile};
