//! Non-uniform spatial grids concentrated around a point of interest.
//!
//! Nodes are uniform in a computational variable `ξ ∈ [0, 1]` and mapped
//! through a tanh stretching transform that is flattest at the anchor (the
//! strike or barrier), so spacing there is finest. The anchor itself is
//! always a grid node: the payoff kink then sits on a node and the scheme
//! keeps its second-order convergence.

use fb_core::{ensure_config, ensure_post, Real, Result};
use serde::{Deserialize, Serialize};

/// Inputs of [`SpaceGrid::build`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchedGridParams {
    /// Number of nodes, at least 3.
    pub nodes: usize,
    /// Lowest spot on the grid.
    pub lower: Real,
    /// Highest spot on the grid.
    pub upper: Real,
    /// Spot where nodes concentrate; clamped into `[lower, upper]`.
    pub anchor: Real,
    /// Concentration strength; `0` gives a uniform grid.
    pub stretch: Real,
    /// Uniform in `ln S` rather than in `S` before stretching.
    pub log_space: bool,
}

impl StretchedGridParams {
    /// Check every field, naming the first offending one.
    pub fn validate(&self) -> Result<()> {
        ensure_config!(self.nodes >= 3, "grid.num_space", "need at least 3 nodes, got {}", self.nodes);
        ensure_config!(
            self.lower.is_finite() && self.upper.is_finite() && self.upper > self.lower,
            "grid.upper",
            "upper bound {} must exceed lower bound {}",
            self.upper,
            self.lower
        );
        ensure_config!(
            !self.log_space || self.lower > 0.0,
            "grid.lower",
            "log-space grid requires a positive lower bound, got {}",
            self.lower
        );
        ensure_config!(
            self.lower >= 0.0,
            "grid.lower",
            "spot grid cannot extend below zero, got {}",
            self.lower
        );
        ensure_config!(
            self.stretch.is_finite() && self.stretch >= 0.0,
            "grid.stretch",
            "stretch must be finite and non-negative, got {}",
            self.stretch
        );
        ensure_config!(self.anchor.is_finite(), "grid.anchor", "anchor must be finite");
        Ok(())
    }
}

/// Monotone map of `[0, 1]` onto itself with `anchor ↦ anchor` and the
/// smallest slope at the anchor.
///
/// `stretch <= 0` returns `xi` unchanged.
pub fn stretch_map(xi: Real, anchor: Real, stretch: Real) -> Real {
    if stretch <= 0.0 {
        return xi;
    }
    const EPS: Real = 1e-10;
    let anchor = anchor.clamp(EPS, 1.0 - EPS);
    let norm = stretch.tanh();
    if xi <= anchor {
        anchor * (stretch * xi / anchor).tanh() / norm
    } else {
        let ratio = (1.0 - xi) / (1.0 - anchor);
        1.0 - (1.0 - anchor) * (stretch * ratio).tanh() / norm
    }
}

/// Spot value with first and second spot derivatives at one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotGreeks {
    /// Interpolated value.
    pub value: Real,
    /// ∂V/∂S.
    pub delta: Real,
    /// ∂²V/∂S².
    pub gamma: Real,
}

/// Strictly increasing 1-D grid of spot nodes.
///
/// `coordinate` is the PDE variable (`S`, or `ln S` for log grids) and
/// `spot` is always the spot level of each node.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGrid {
    coordinate: Vec<Real>,
    spot: Vec<Real>,
    log_space: bool,
    anchor_index: usize,
}

impl SpaceGrid {
    /// Build a stretched grid.
    pub fn build(params: &StretchedGridParams) -> Result<Self> {
        params.validate()?;

        let n = params.nodes;
        let anchor = params.anchor.clamp(params.lower, params.upper);
        let (x_lower, x_upper, x_anchor) = if params.log_space {
            (params.lower.ln(), params.upper.ln(), anchor.ln())
        } else {
            (params.lower, params.upper, anchor)
        };
        let span = x_upper - x_lower;
        let xi0 = ((x_anchor - x_lower) / span).clamp(0.0, 1.0);

        // split the nodes so that one of them lands on ξ0
        let last = (n - 1) as Real;
        let anchor_index = if xi0 <= 0.0 || xi0 >= 1.0 {
            (xi0 * last).round() as usize
        } else {
            ((xi0 * last).round() as usize).clamp(1, n - 2)
        };
        let xi = |i: usize| -> Real {
            if xi0 <= 0.0 || xi0 >= 1.0 {
                i as Real / last
            } else if i <= anchor_index {
                xi0 * i as Real / anchor_index as Real
            } else {
                xi0 + (1.0 - xi0) * (i - anchor_index) as Real / (n - 1 - anchor_index) as Real
            }
        };

        let mut coordinate = Vec::with_capacity(n);
        let mut spot = Vec::with_capacity(n);
        for i in 0..n {
            let x = x_lower + span * stretch_map(xi(i), xi0, params.stretch);
            coordinate.push(x);
            spot.push(if params.log_space { x.exp() } else { x });
        }
        // pin the ends and the anchor against rounding in the map
        coordinate[0] = x_lower;
        coordinate[n - 1] = x_upper;
        spot[0] = params.lower;
        spot[n - 1] = params.upper;
        if xi0 > 0.0 && xi0 < 1.0 {
            coordinate[anchor_index] = x_anchor;
            spot[anchor_index] = anchor;
        }

        ensure_post!(
            coordinate.windows(2).all(|w| w[1] > w[0]),
            "grid nodes are not strictly increasing (stretch {} too strong for {} nodes)",
            params.stretch,
            n
        );

        Ok(Self {
            coordinate,
            spot,
            log_space: params.log_space,
            anchor_index,
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.spot.len()
    }

    /// Always `false`: a built grid has at least 3 nodes.
    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }

    /// PDE coordinates (`S` or `ln S`).
    pub fn coordinates(&self) -> &[Real] {
        &self.coordinate
    }

    /// Spot level of each node.
    pub fn spots(&self) -> &[Real] {
        &self.spot
    }

    /// Whether the PDE coordinate is `ln S`.
    pub fn is_log_space(&self) -> bool {
        self.log_space
    }

    /// Index of the node placed on the anchor.
    pub fn anchor_index(&self) -> usize {
        self.anchor_index
    }

    /// Whether `s` lies within the grid.
    pub fn contains(&self, s: Real) -> bool {
        s >= self.spot[0] && s <= self.spot[self.len() - 1]
    }

    /// Index `i` with `spot[i] <= s <= spot[i + 1]`, clamped to the grid.
    pub fn locate(&self, s: Real) -> usize {
        let idx = self.spot.partition_point(|&x| x <= s);
        idx.saturating_sub(1).min(self.len() - 2)
    }

    /// Linear interpolation of nodal `values` at spot `s`.
    pub fn interpolate(&self, values: &[Real], s: Real) -> Real {
        let i = self.locate(s);
        let (s0, s1) = (self.spot[i], self.spot[i + 1]);
        let w = ((s - s0) / (s1 - s0)).clamp(0.0, 1.0);
        values[i] * (1.0 - w) + values[i + 1] * w
    }

    /// Value, delta and gamma at `s` from the quadratic through the three
    /// nodes nearest to `s`.
    pub fn greeks_at(&self, values: &[Real], s: Real) -> SpotGreeks {
        let n = self.len();
        let i = self.locate(s);
        // centre on the nearer of the bracketing nodes
        let mut c = if s - self.spot[i] <= self.spot[i + 1] - s { i } else { i + 1 };
        c = c.clamp(1, n - 2);
        let (x0, x1, x2) = (self.spot[c - 1], self.spot[c], self.spot[c + 1]);
        let (f0, f1, f2) = (values[c - 1], values[c], values[c + 1]);

        let d0 = (x0 - x1) * (x0 - x2);
        let d1 = (x1 - x0) * (x1 - x2);
        let d2 = (x2 - x0) * (x2 - x1);

        let value = f0 * (s - x1) * (s - x2) / d0
            + f1 * (s - x0) * (s - x2) / d1
            + f2 * (s - x0) * (s - x1) / d2;
        let delta = f0 * ((s - x1) + (s - x2)) / d0
            + f1 * ((s - x0) + (s - x2)) / d1
            + f2 * ((s - x0) + (s - x1)) / d2;
        let gamma = 2.0 * (f0 / d0 + f1 / d1 + f2 / d2);

        SpotGreeks { value, delta, gamma }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn params(nodes: usize, stretch: Real, log_space: bool) -> StretchedGridParams {
        StretchedGridParams {
            nodes,
            lower: if log_space { 25.0 } else { 0.0 },
            upper: 400.0,
            anchor: 100.0,
            stretch,
            log_space,
        }
    }

    #[test]
    fn uniform_grid_without_stretch() {
        let g = SpaceGrid::build(&params(5, 0.0, false)).unwrap();
        for (s, e) in g.spots().iter().zip([0.0, 100.0, 200.0, 300.0, 400.0]) {
            assert_abs_diff_eq!(*s, e, epsilon = 1e-12);
        }
        assert_eq!(g.anchor_index(), 1);
    }

    #[test]
    fn anchor_is_a_node() {
        for &log_space in &[false, true] {
            let g = SpaceGrid::build(&params(101, 2.0, log_space)).unwrap();
            assert_abs_diff_eq!(g.spots()[g.anchor_index()], 100.0, epsilon = 1e-12);
            assert_eq!(g.spots()[0], if log_space { 25.0 } else { 0.0 });
            assert_eq!(g.spots()[100], 400.0);
        }
    }

    #[test]
    fn stretching_clusters_near_anchor() {
        let p = StretchedGridParams {
            nodes: 21,
            lower: 0.0,
            upper: 400.0,
            anchor: 250.0,
            stretch: 3.0,
            log_space: false,
        };
        let g = SpaceGrid::build(&p).unwrap();
        let nearest = g
            .spots()
            .iter()
            .map(|s| (s - 250.0).abs())
            .fold(Real::INFINITY, Real::min);
        assert!(nearest < 25.0);
        let k = g.anchor_index();
        let h_anchor = g.spots()[k + 1] - g.spots()[k];
        let h_edge = g.spots()[1] - g.spots()[0];
        assert!(h_anchor < h_edge, "anchor spacing {h_anchor} vs edge {h_edge}");
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(
            SpaceGrid::build(&params(2, 1.0, false)).unwrap_err().field(),
            Some("grid.num_space")
        );
        assert_eq!(
            SpaceGrid::build(&params(11, -1.0, false)).unwrap_err().field(),
            Some("grid.stretch")
        );
        let mut p = params(11, 1.0, true);
        p.lower = 0.0;
        assert_eq!(SpaceGrid::build(&p).unwrap_err().field(), Some("grid.lower"));
        let mut p = params(11, 1.0, false);
        p.upper = -1.0;
        assert_eq!(SpaceGrid::build(&p).unwrap_err().field(), Some("grid.upper"));
    }

    #[test]
    fn quadratic_interpolation_is_exact_for_parabolas() {
        let g = SpaceGrid::build(&params(41, 1.5, true)).unwrap();
        let v: Vec<Real> = g.spots().iter().map(|s| 3.0 + 0.5 * s + 0.01 * s * s).collect();
        let r = g.greeks_at(&v, 123.4);
        assert_abs_diff_eq!(r.value, 3.0 + 0.5 * 123.4 + 0.01 * 123.4 * 123.4, epsilon = 1e-8);
        assert_abs_diff_eq!(r.delta, 0.5 + 0.02 * 123.4, epsilon = 1e-8);
        assert_abs_diff_eq!(r.gamma, 0.02, epsilon = 1e-8);
        assert_abs_diff_eq!(g.interpolate(&v, g.spots()[7]), v[7], epsilon = 1e-12);
    }

    #[test]
    fn locate_clamps_to_grid() {
        let g = SpaceGrid::build(&params(5, 0.0, false)).unwrap();
        assert_eq!(g.locate(-5.0), 0);
        assert_eq!(g.locate(150.0), 1);
        assert_eq!(g.locate(400.0), 3);
        assert_eq!(g.locate(1e6), 3);
    }

    proptest! {
        #[test]
        fn grids_are_strictly_increasing(
            nodes in 3usize..400,
            stretch in 0.0f64..3.0,
            anchor in 30.0f64..390.0,
            log_space in any::<bool>(),
        ) {
            let p = StretchedGridParams {
                nodes,
                lower: if log_space { 25.0 } else { 0.0 },
                upper: 400.0,
                anchor,
                stretch,
                log_space,
            };
            let g = SpaceGrid::build(&p).unwrap();
            prop_assert_eq!(g.len(), nodes);
            prop_assert!(g.spots().windows(2).all(|w| w[1] > w[0]));
            prop_assert!(g.contains(anchor));
        }
    }
}
