//! Brownian-bridge path construction.
//!
//! The bridge fills a Wiener path by bisection: the first variate sets the
//! terminal value, the next one the midpoint, and so on. Quasi-random
//! sequences have their best-distributed coordinates first, so this ordering
//! spends them on the coarse structure that dominates path variance.

use fb_core::{ensure_config, Real, Result, Time};

/// Brownian-bridge path construction over a fixed time partition.
///
/// Construction precomputes the fill order and the conditional weights;
/// [`BrownianBridge::transform`] is then a pure function of its input.
#[derive(Debug, Clone)]
pub struct BrownianBridge {
    times: Vec<Time>,
    /// `bridge_index[i]` is the path point filled by variate `i`.
    bridge_index: Vec<usize>,
    /// Left neighbour is point `left_index[i] - 1`, or time 0 when zero.
    left_index: Vec<usize>,
    right_index: Vec<usize>,
    left_weight: Vec<Real>,
    right_weight: Vec<Real>,
    std_dev: Vec<Real>,
}

impl BrownianBridge {
    /// Bridge over `steps` equal steps ending at `maturity`.
    pub fn new(steps: usize, maturity: Time) -> Result<Self> {
        ensure_config!(steps > 0, "steps", "need at least one step");
        ensure_config!(
            maturity > 0.0 && maturity.is_finite(),
            "maturity",
            "must be positive, got {maturity}"
        );
        let dt = maturity / steps as Real;
        let times: Vec<Time> = (1..=steps).map(|i| i as Real * dt).collect();
        Self::with_times(&times)
    }

    /// Bridge over arbitrary observation times `t_1 < … < t_n` (time 0 is
    /// implicit and must not be included).
    pub fn with_times(times: &[Time]) -> Result<Self> {
        ensure_config!(!times.is_empty(), "times", "need at least one time point");
        ensure_config!(
            times[0] > 0.0 && times.windows(2).all(|w| w[0] < w[1]),
            "times",
            "observation times must be positive and strictly increasing"
        );

        let n = times.len();
        let mut bridge_index = vec![0; n];
        let mut left_index = vec![0; n];
        let mut right_index = vec![0; n];
        let mut left_weight = vec![0.0; n];
        let mut right_weight = vec![0.0; n];
        let mut std_dev = vec![0.0; n];

        // filled[k] != 0 once point k has been assigned a variate
        let mut filled = vec![0usize; n];
        filled[n - 1] = 1;
        bridge_index[0] = n - 1;
        std_dev[0] = times[n - 1].sqrt();

        let mut j = 0;
        for i in 1..n {
            while filled[j] != 0 {
                j += 1;
            }
            let mut k = j;
            while filled[k] == 0 {
                k += 1;
            }
            // points j..k-1 are empty, k is the next filled point
            let l = j + ((k - 1 - j) >> 1);
            filled[l] = i;
            bridge_index[i] = l;
            left_index[i] = j;
            right_index[i] = k;
            let t_left = if j == 0 { 0.0 } else { times[j - 1] };
            let span = times[k] - t_left;
            left_weight[i] = (times[k] - times[l]) / span;
            right_weight[i] = (times[l] - t_left) / span;
            std_dev[i] = ((times[l] - t_left) * (times[k] - times[l]) / span).sqrt();
            j = k + 1;
            if j >= n {
                j = 0;
            }
        }

        Ok(Self {
            times: times.to_vec(),
            bridge_index,
            left_index,
            right_index,
            left_weight,
            right_weight,
            std_dev,
        })
    }

    /// Number of path points (and of variates consumed per path).
    pub fn size(&self) -> usize {
        self.times.len()
    }

    /// Observation times.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Map independent standard normals to path levels `W(t_1), …, W(t_n)`.
    pub fn transform(&self, normals: &[Real], path: &mut [Real]) {
        debug_assert_eq!(normals.len(), self.size());
        debug_assert_eq!(path.len(), self.size());
        path[self.bridge_index[0]] = self.std_dev[0] * normals[0];
        for i in 1..self.size() {
            let j = self.left_index[i];
            let k = self.right_index[i];
            let l = self.bridge_index[i];
            let anchor = self.right_weight[i] * path[k];
            path[l] = if j == 0 {
                anchor + self.std_dev[i] * normals[i]
            } else {
                self.left_weight[i] * path[j - 1] + anchor + self.std_dev[i] * normals[i]
            };
        }
    }

    /// Map independent standard normals to increments `W(t_i) − W(t_{i−1})`.
    pub fn transform_increments(&self, normals: &[Real], increments: &mut [Real]) {
        self.transform(normals, increments);
        for i in (1..increments.len()).rev() {
            increments[i] -= increments[i - 1];
        }
    }
}
