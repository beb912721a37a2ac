//! General linear least-squares regression with fit diagnostics.
//!
//! Solves `y = A β + ε` through an SVD of the design matrix, optionally with
//! a ridge penalty on every column but the first (the intercept). Along with
//! the coefficients the fit reports its numerical rank, the condition number
//! of the design and R², which Longstaff-Schwartz regression uses to decide
//! whether a date's continuation estimate can be trusted.

use fb_core::{ensure, Real, Result};
use nalgebra::{DMatrix, DVector};

/// Singular values below this fraction of the largest one count as zero.
pub const DEFAULT_RANK_TOLERANCE: Real = 1e-10;

/// Result of a general linear least-squares regression.
#[derive(Debug, Clone)]
pub struct LinearLeastSquaresRegression {
    coefficients: Vec<Real>,
    residuals: Vec<Real>,
    rank: usize,
    condition_number: Real,
    r_squared: Real,
}

impl LinearLeastSquaresRegression {
    /// Fit the model using the given data and basis functions.
    ///
    /// Builds the *n × m* design matrix $A_{ij} = \phi_j(x_i)$.
    pub fn new<F>(x: &[Real], y: &[Real], basis: &[F]) -> Result<Self>
    where
        F: Fn(Real) -> Real,
    {
        ensure!(x.len() == y.len(), "x and y must have the same length");
        let design = DMatrix::from_fn(x.len(), basis.len(), |i, j| basis[j](x[i]));
        Self::from_design_matrix(&design, y, 0.0)
    }

    /// Fit the model given a pre-built *n × m* design matrix.
    ///
    /// `ridge_lambda > 0` adds `λ Σ_{j≥1} β_j²` to the objective.
    pub fn from_design_matrix(a: &DMatrix<Real>, y: &[Real], ridge_lambda: Real) -> Result<Self> {
        Self::with_tolerance(a, y, ridge_lambda, DEFAULT_RANK_TOLERANCE)
    }

    /// As [`Self::from_design_matrix`] with an explicit relative rank tolerance.
    pub fn with_tolerance(
        a: &DMatrix<Real>,
        y: &[Real],
        ridge_lambda: Real,
        rank_tolerance: Real,
    ) -> Result<Self> {
        let n = a.nrows();
        let m = a.ncols();
        ensure!(m > 0, "design matrix has no columns");
        ensure!(y.len() == n, "y length must equal number of rows of A");
        ensure!(n >= m, "more basis functions ({m}) than observations ({n})");
        ensure!(ridge_lambda >= 0.0, "ridge penalty must be non-negative");

        // ridge as extra rows sqrt(λ) e_j with zero targets
        let (design, target) = if ridge_lambda > 0.0 {
            let extra = m - 1;
            let root = ridge_lambda.sqrt();
            let mut aug = DMatrix::zeros(n + extra, m);
            aug.rows_mut(0, n).copy_from(a);
            for j in 1..m {
                aug[(n + j - 1, j)] = root;
            }
            let mut t = DVector::zeros(n + extra);
            t.rows_mut(0, n).copy_from_slice(y);
            (aug, t)
        } else {
            (a.clone(), DVector::from_column_slice(y))
        };

        let svd = design.svd(true, true);
        let (u, v_t) = match (&svd.u, &svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => fb_core::fail!("SVD did not produce singular vectors"),
        };
        let sv = &svd.singular_values;

        let sv_max = sv.iter().copied().fold(0.0, Real::max);
        let sv_min = sv.iter().copied().fold(Real::INFINITY, Real::min);
        let threshold = (rank_tolerance * sv_max).max(n.max(m) as Real * Real::EPSILON * sv_max);

        // β = V diag(1/s) Uᵀ y over the retained singular values
        let ut_y = u.transpose() * &target;
        let mut coefficients = vec![0.0; m];
        let mut rank = 0;
        for (k, &s) in sv.iter().enumerate() {
            if s > threshold && s > 0.0 {
                rank += 1;
                let ratio = ut_y[k] / s;
                for (j, c) in coefficients.iter_mut().enumerate() {
                    *c += ratio * v_t[(k, j)];
                }
            }
        }

        let beta = DVector::from_column_slice(&coefficients);
        let fitted = a * &beta;
        let residuals: Vec<Real> = y.iter().zip(fitted.iter()).map(|(yi, fi)| yi - fi).collect();

        let y_mean = y.iter().sum::<Real>() / n as Real;
        let ss_tot: Real = y.iter().map(|&yi| (yi - y_mean).powi(2)).sum();
        let ss_res: Real = residuals.iter().map(|r| r * r).sum();
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

        let condition_number = if sv_min > 0.0 { sv_max / sv_min } else { Real::INFINITY };

        Ok(Self {
            coefficients,
            residuals,
            rank,
            condition_number,
            r_squared,
        })
    }

    /// Fitted coefficients β.
    pub fn coefficients(&self) -> &[Real] {
        &self.coefficients
    }

    /// Residuals (y − A β) on the observations.
    pub fn residuals(&self) -> &[Real] {
        &self.residuals
    }

    /// Numerical rank of the (possibly ridge-augmented) design.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// `true` when every basis column contributes.
    pub fn is_full_rank(&self) -> bool {
        self.rank == self.coefficients.len()
    }

    /// Ratio of the largest to the smallest singular value.
    pub fn condition_number(&self) -> Real {
        self.condition_number
    }

    /// R² statistic (coefficient of determination).
    pub fn r_squared(&self) -> Real {
        self.r_squared
    }

    /// `Σ_j β_j row_j`.
    #[inline]
    pub fn predict(&self, row: &[Real]) -> Real {
        self.coefficients.iter().zip(row).map(|(b, r)| b * r).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linear_fit() {
        // y = 2 + 3x
        let x: Vec<Real> = (0..20).map(|i| i as Real).collect();
        let y: Vec<Real> = x.iter().map(|&xi| 2.0 + 3.0 * xi).collect();

        let basis: Vec<Box<dyn Fn(Real) -> Real>> = vec![Box::new(|_| 1.0), Box::new(|x| x)];

        let reg = LinearLeastSquaresRegression::new(&x, &y, &basis).unwrap();
        let c = reg.coefficients();
        assert_abs_diff_eq!(c[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(c[1], 3.0, epsilon = 1e-10);
        assert_abs_diff_eq!(reg.r_squared(), 1.0, epsilon = 1e-10);
        assert!(reg.is_full_rank());
    }

    #[test]
    fn quadratic_fit() {
        // y = 1 - 2x + 0.5x²
        let x: Vec<Real> = (0..30).map(|i| -5.0 + i as Real * 0.5).collect();
        let y: Vec<Real> = x.iter().map(|&xi| 1.0 - 2.0 * xi + 0.5 * xi * xi).collect();

        let basis: Vec<Box<dyn Fn(Real) -> Real>> =
            vec![Box::new(|_| 1.0), Box::new(|x| x), Box::new(|x| x * x)];

        let reg = LinearLeastSquaresRegression::new(&x, &y, &basis).unwrap();
        let c = reg.coefficients();
        assert_abs_diff_eq!(c[0], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(c[1], -2.0, epsilon = 1e-8);
        assert_abs_diff_eq!(c[2], 0.5, epsilon = 1e-8);
        assert_abs_diff_eq!(reg.predict(&[1.0, 2.0, 4.0]), -1.0, epsilon = 1e-8);
    }

    #[test]
    fn noisy_fit_has_r_squared_below_one() {
        let x: Vec<Real> = (0..100).map(|i| i as Real * 0.1).collect();
        let noise = [0.01, -0.02, 0.015, -0.005, 0.03, -0.01, 0.02, -0.03, 0.005, 0.01];
        let y: Vec<Real> = x
            .iter()
            .enumerate()
            .map(|(i, &xi)| 1.0 + 2.0 * xi + noise[i % noise.len()])
            .collect();
        let basis: Vec<Box<dyn Fn(Real) -> Real>> = vec![Box::new(|_| 1.0), Box::new(|x| x)];
        let reg = LinearLeastSquaresRegression::new(&x, &y, &basis).unwrap();
        assert_abs_diff_eq!(reg.coefficients()[1], 2.0, epsilon = 0.01);
        assert!(reg.r_squared() < 1.0 && reg.r_squared() > 0.99);
    }

    #[test]
    fn duplicate_columns_are_rank_deficient() {
        let a = DMatrix::from_row_slice(4, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0]);
        let y = [1.0, 2.0, 3.0, 4.0];
        let reg = LinearLeastSquaresRegression::from_design_matrix(&a, &y, 0.0).unwrap();
        assert_eq!(reg.rank(), 1);
        assert!(!reg.is_full_rank());
        assert!(reg.condition_number() > 1e10);
    }

    #[test]
    fn ridge_shrinks_slope_and_restores_rank() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let y = [3.0, 5.0, 7.0];
        let plain = LinearLeastSquaresRegression::from_design_matrix(&a, &y, 0.0).unwrap();
        let ridge = LinearLeastSquaresRegression::from_design_matrix(&a, &y, 10.0).unwrap();
        assert_abs_diff_eq!(plain.coefficients()[1], 2.0, epsilon = 1e-10);
        assert!(ridge.coefficients()[1] < plain.coefficients()[1]);
        assert!(ridge.r_squared() < 1.0);

        let flat = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let reg = LinearLeastSquaresRegression::from_design_matrix(&flat, &y, 1e-2).unwrap();
        assert!(reg.is_full_rank());
    }

    #[test]
    fn too_few_observations() {
        let basis: Vec<Box<dyn Fn(Real) -> Real>> = vec![Box::new(|_| 1.0), Box::new(|x| x)];
        assert!(LinearLeastSquaresRegression::new(&[1.0], &[2.0], &basis).is_err());
    }
}
