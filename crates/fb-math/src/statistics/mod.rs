//! Online statistics.
//!
//! [`Welford`] accumulates count, mean and the sum of squared deviations in
//! a single numerically stable pass, and merges partial accumulators built
//! on different threads. [`BivariateWelford`] does the same for paired
//! samples and yields control-variate estimates. [`McStatistic`] is the
//! summary every Monte Carlo engine reports.

use fb_core::{Real, Result};
use serde::{Deserialize, Serialize};

use crate::distributions::normal_quantile;

/// Two-sided 95% normal quantile used for reported confidence intervals.
pub const Z_95: Real = 1.96;

/// Welford's online mean/variance accumulator.
///
/// Reads never modify the state, so intermediate results can be inspected
/// while samples keep arriving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Welford {
    count: u64,
    mean: Real,
    m2: Real,
    min: Real,
    max: Real,
}

impl Default for Welford {
    fn default() -> Self {
        Self::new()
    }
}

impl Welford {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: Real::INFINITY,
            max: Real::NEG_INFINITY,
        }
    }

    /// Add a single sample.
    #[inline]
    pub fn add(&mut self, x: Real) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as Real;
        self.m2 += delta * (x - self.mean);
        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Combine with an accumulator built from a disjoint set of samples.
    pub fn merge(&mut self, other: &Welford) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as Real;
        let n_b = other.count as Real;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Number of samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sample mean.  Returns `None` if no samples have been added.
    pub fn mean(&self) -> Option<Real> {
        (self.count > 0).then_some(self.mean)
    }

    /// Unbiased (Bessel-corrected) variance.  Returns `None` for fewer than
    /// 2 samples.
    pub fn variance(&self) -> Option<Real> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as Real)
    }

    /// Standard deviation.  Returns `None` for fewer than 2 samples.
    pub fn std_dev(&self) -> Option<Real> {
        self.variance().map(Real::sqrt)
    }

    /// Standard error of the mean.  Returns `None` for fewer than 2 samples.
    pub fn std_error(&self) -> Option<Real> {
        self.variance()
            .map(|v| (v / self.count as Real).sqrt())
    }

    /// Minimum sample value.  Returns `None` if no samples have been added.
    pub fn minimum(&self) -> Option<Real> {
        (self.count > 0).then_some(self.min)
    }

    /// Maximum sample value.  Returns `None` if no samples have been added.
    pub fn maximum(&self) -> Option<Real> {
        (self.count > 0).then_some(self.max)
    }

    /// Normal-approximation confidence interval for the mean at `level`.
    /// Returns `Ok(None)` for fewer than 2 samples.
    pub fn confidence_interval(&self, level: Real) -> Result<Option<(Real, Real)>> {
        let z = normal_quantile(level)?;
        Ok(self
            .std_error()
            .map(|se| (self.mean - z * se, self.mean + z * se)))
    }

    /// Reset the accumulator to its initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Extend<Real> for Welford {
    fn extend<I: IntoIterator<Item = Real>>(&mut self, iter: I) {
        for x in iter {
            self.add(x);
        }
    }
}

impl FromIterator<Real> for Welford {
    fn from_iter<I: IntoIterator<Item = Real>>(iter: I) -> Self {
        let mut acc = Welford::new();
        acc.extend(iter);
        acc
    }
}

/// Online means, variances and covariance of paired samples `(x, y)`.
///
/// Merging follows the same pairwise update as [`Welford::merge`], with
/// the co-moment corrected by `δx·δy·n_a·n_b/n`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BivariateWelford {
    count: u64,
    mean_x: Real,
    mean_y: Real,
    m2_x: Real,
    m2_y: Real,
    c_xy: Real,
}

impl BivariateWelford {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pair.
    #[inline]
    pub fn add(&mut self, x: Real, y: Real) {
        self.count += 1;
        let n = self.count as Real;
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.mean_x += dx / n;
        self.mean_y += dy / n;
        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    /// Combine with an accumulator built from a disjoint set of pairs.
    pub fn merge(&mut self, other: &BivariateWelford) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as Real;
        let n_b = other.count as Real;
        let n = n_a + n_b;
        let dx = other.mean_x - self.mean_x;
        let dy = other.mean_y - self.mean_y;
        let w = n_a * n_b / n;
        self.mean_x += dx * n_b / n;
        self.mean_y += dy * n_b / n;
        self.m2_x += other.m2_x + dx * dx * w;
        self.m2_y += other.m2_y + dy * dy * w;
        self.c_xy += other.c_xy + dx * dy * w;
        self.count += other.count;
    }

    /// Number of pairs.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Means `(x̄, ȳ)`.  Returns `None` if no pairs have been added.
    pub fn means(&self) -> Option<(Real, Real)> {
        (self.count > 0).then_some((self.mean_x, self.mean_y))
    }

    /// Unbiased sample covariance.  Returns `None` for fewer than 2 pairs.
    pub fn covariance(&self) -> Option<Real> {
        (self.count > 1).then(|| self.c_xy / (self.count - 1) as Real)
    }

    /// Unbiased variances `(s²_x, s²_y)`.  Returns `None` for fewer than 2 pairs.
    pub fn variances(&self) -> Option<(Real, Real)> {
        (self.count > 1).then(|| {
            let d = (self.count - 1) as Real;
            (self.m2_x / d, self.m2_y / d)
        })
    }

    /// Regression slope `β = cov(x, y) / var(y)`; `None` when `y` is constant.
    pub fn beta(&self) -> Option<Real> {
        (self.count > 1 && self.m2_y > 0.0).then(|| self.c_xy / self.m2_y)
    }

    /// Estimate `E[x]` using `y` as a control with known mean `expectation`.
    ///
    /// Returns the summary and the slope used. Without a usable slope the
    /// plain estimate of `x` is returned with `β = 0`. The residual
    /// variance carries `n − 2` degrees of freedom.
    pub fn controlled(&self, expectation: Real) -> (McStatistic, Real) {
        let n = self.count as Real;
        let (value, std_error, beta) = match self.beta().filter(|_| self.count > 2) {
            Some(beta) => {
                let residual = (self.m2_x - beta * self.c_xy).max(0.0) / (n - 2.0);
                (self.mean_x - beta * (self.mean_y - expectation), (residual / n).sqrt(), beta)
            }
            None => {
                let se = self
                    .variances()
                    .map_or(0.0, |(vx, _)| (vx / n).sqrt());
                (self.mean_x, se, 0.0)
            }
        };
        let statistic = McStatistic {
            value,
            std_error,
            ci_low: value - Z_95 * std_error,
            ci_high: value + Z_95 * std_error,
            count: self.count,
        };
        (statistic, beta)
    }
}

/// Mean, standard error and 95% interval of a Monte Carlo estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McStatistic {
    /// Estimated value (sample mean).
    pub value: Real,
    /// Standard error of the mean; zero when fewer than 2 samples.
    pub std_error: Real,
    /// Lower end of the 95% confidence interval.
    pub ci_low: Real,
    /// Upper end of the 95% confidence interval.
    pub ci_high: Real,
    /// Number of independent samples behind the estimate.
    pub count: u64,
}

impl McStatistic {
    /// Summarise an accumulator with a 95% normal interval.
    pub fn from_welford(acc: &Welford) -> Self {
        let value = acc.mean().unwrap_or(0.0);
        let std_error = acc.std_error().unwrap_or(0.0);
        Self {
            value,
            std_error,
            ci_low: value - Z_95 * std_error,
            ci_high: value + Z_95 * std_error,
            count: acc.count(),
        }
    }

    /// Whether `x` lies within `k` standard errors of the estimate.
    pub fn within(&self, x: Real, k: Real) -> bool {
        (x - self.value).abs() <= k * self.std_error
    }
}

impl From<&Welford> for McStatistic {
    fn from(acc: &Welford) -> Self {
        McStatistic::from_welford(acc)
    }
}
