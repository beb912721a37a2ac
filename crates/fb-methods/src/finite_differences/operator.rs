//! Three-point discretisation of the Black-Scholes operator on a
//! non-uniform grid, and the scratch buffers it is assembled into.
//!
//! In the PDE coordinate `x` (either `S` or `ln S`) the operator is
//! `L V = a V_xx + b V_x + c V` with
//!
//! | coordinate | `a` | `b` | `c` |
//! |---|---|---|---|
//! | `S` | `½σ²S²` | `(r − q)S` | `−r` |
//! | `ln S` | `½σ²` | `r − q − ½σ²` | `−r` |
//!
//! Derivatives use divided differences that stay second-order accurate
//! for smoothly varying spacing.

use fb_core::{ensure, ensure_config, Error, Real, Result};

use super::grid::SpaceGrid;

/// Local PDE coefficients for one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffusionCoefficients {
    /// Volatility.
    pub sigma: Real,
    /// Risk-free rate.
    pub rate: Real,
    /// Continuous dividend yield.
    pub dividend: Real,
    /// Whether the grid coordinate is `ln S`.
    pub log_space: bool,
}

impl DiffusionCoefficients {
    /// `(a, b, c)` at a node with spot `s`.
    #[inline]
    fn at(&self, s: Real) -> (Real, Real, Real) {
        let var = self.sigma * self.sigma;
        if self.log_space {
            (0.5 * var, self.rate - self.dividend - 0.5 * var, -self.rate)
        } else {
            (0.5 * var * s * s, (self.rate - self.dividend) * s, -self.rate)
        }
    }
}

/// Tridiagonal system `A Vⁿ = rhs` for one theta-scheme step, plus the
/// scratch space of the Thomas solver.
///
/// Row `i` reads `lower[i] V[i−1] + diag[i] V[i] + upper[i] V[i+1]`;
/// `lower[0]` and `upper[n−1]` are unused. Buffers are sized once per solve
/// and overwritten in place every step.
#[derive(Debug, Clone, Default)]
pub struct OperatorWorkspace {
    /// Sub-diagonal.
    pub lower: Vec<Real>,
    /// Main diagonal.
    pub diag: Vec<Real>,
    /// Super-diagonal.
    pub upper: Vec<Real>,
    /// Right-hand side.
    pub rhs: Vec<Real>,
    c_prime: Vec<Real>,
    d_prime: Vec<Real>,
}

impl OperatorWorkspace {
    /// Zeroed workspace for `n` nodes.
    pub fn new(n: usize) -> Self {
        let mut ws = Self::default();
        ws.reset(n);
        ws
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.diag.len()
    }

    /// `true` for a workspace with no rows.
    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// Zero every buffer for `n` rows, reusing the allocations.
    pub fn reset(&mut self, n: usize) {
        for buf in [
            &mut self.lower,
            &mut self.diag,
            &mut self.upper,
            &mut self.rhs,
            &mut self.c_prime,
            &mut self.d_prime,
        ] {
            buf.clear();
            buf.resize(n, 0.0);
        }
    }

    /// `y = A x` for the assembled system.
    pub fn apply(&self, x: &[Real], y: &mut [Real]) {
        let n = self.len();
        y[0] = self.diag[0] * x[0] + self.upper[0] * x[1];
        for i in 1..n - 1 {
            y[i] = self.lower[i] * x[i - 1] + self.diag[i] * x[i] + self.upper[i] * x[i + 1];
        }
        y[n - 1] = self.lower[n - 1] * x[n - 2] + self.diag[n - 1] * x[n - 1];
    }

    /// Solve `A x = rhs` with the Thomas algorithm.
    ///
    /// Fails with [`Error::Computation`] on a vanishing pivot.
    pub fn solve_tridiagonal(&mut self, x: &mut [Real]) -> Result<()> {
        let n = self.len();
        ensure!(x.len() == n, "solution length {} != system size {n}", x.len());
        const PIVOT_EPS: Real = 1e-14;

        let mut m = self.diag[0];
        if m.abs() < PIVOT_EPS {
            return Err(Error::Computation("singular tridiagonal pivot in row 0".into()));
        }
        self.c_prime[0] = self.upper[0] / m;
        self.d_prime[0] = self.rhs[0] / m;
        for i in 1..n {
            m = self.diag[i] - self.lower[i] * self.c_prime[i - 1];
            if m.abs() < PIVOT_EPS {
                return Err(Error::Computation(format!(
                    "singular tridiagonal pivot in row {i}"
                )));
            }
            self.c_prime[i] = if i < n - 1 { self.upper[i] / m } else { 0.0 };
            self.d_prime[i] = (self.rhs[i] - self.lower[i] * self.d_prime[i - 1]) / m;
        }

        x[n - 1] = self.d_prime[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = self.d_prime[i] - self.c_prime[i] * x[i + 1];
        }
        Ok(())
    }
}

/// Fill `op` with the theta-scheme system for one backward step of size
/// `dt`, given the later time slice `v_curr`.
///
/// Interior rows get `A = I − θ dt L` and `rhs = v + (1 − θ) dt L v`. The
/// two edge rows are left as identity rows carrying `v_curr`; boundary
/// conditions overwrite them afterwards.
pub fn assemble_operator(
    grid: &SpaceGrid,
    coeffs: &DiffusionCoefficients,
    dt: Real,
    theta: Real,
    v_curr: &[Real],
    op: &mut OperatorWorkspace,
) -> Result<()> {
    let n = grid.len();
    ensure_config!(
        coeffs.sigma > 0.0 && coeffs.sigma.is_finite(),
        "vol",
        "volatility must be positive, got {}",
        coeffs.sigma
    );
    ensure_config!(dt > 0.0 && dt.is_finite(), "grid.num_time", "time step must be positive, got {dt}");
    ensure_config!((0.0..=1.0).contains(&theta), "theta", "theta must lie in [0, 1], got {theta}");
    ensure!(v_curr.len() == n, "slice length {} != grid size {n}", v_curr.len());
    ensure!(coeffs.log_space == grid.is_log_space(), "coefficients and grid disagree on log-space");

    if op.len() != n {
        op.reset(n);
    }

    let x = grid.coordinates();
    let s = grid.spots();
    for i in 1..n - 1 {
        let h_minus = x[i] - x[i - 1];
        let h_plus = x[i + 1] - x[i];
        let den = h_minus + h_plus;
        let (a, b, c) = coeffs.at(s[i]);

        let diff_im1 = 2.0 * a / (h_minus * den);
        let diff_ip1 = 2.0 * a / (h_plus * den);
        let diff_i = -diff_im1 - diff_ip1;

        let conv_im1 = -b * h_plus / (h_minus * den);
        let conv_ip1 = b * h_minus / (h_plus * den);
        let conv_i = -conv_im1 - conv_ip1;

        let l_im1 = diff_im1 + conv_im1;
        let l_i = diff_i + conv_i + c;
        let l_ip1 = diff_ip1 + conv_ip1;

        op.lower[i] = -theta * dt * l_im1;
        op.diag[i] = 1.0 - theta * dt * l_i;
        op.upper[i] = -theta * dt * l_ip1;

        let lv = l_im1 * v_curr[i - 1] + l_i * v_curr[i] + l_ip1 * v_curr[i + 1];
        op.rhs[i] = v_curr[i] + (1.0 - theta) * dt * lv;
    }

    for i in [0, n - 1] {
        op.lower[i] = 0.0;
        op.diag[i] = 1.0;
        op.upper[i] = 0.0;
        op.rhs[i] = v_curr[i];
    }
    Ok(())
}
