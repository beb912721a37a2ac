//! Cox-Ross-Rubinstein recombining binomial tree.

use fb_core::{ensure_config, Error, Rate, Real, Result, Time, Volatility};

/// A recombining CRR tree for geometric Brownian motion.
///
/// The tree has `steps + 1` time layers, with layer `i` having `i + 1` nodes.
/// Node `(i, j)` is the state after `j` up-moves and `i − j` down-moves.
#[derive(Debug, Clone)]
pub struct BinomialTree {
    x0: Real,
    dt: Time,
    steps: usize,
    up: Real,
    pu: Real,
    pd: Real,
}

impl BinomialTree {
    /// Cox-Ross-Rubinstein tree: `u = e^{σ√Δt}`, `d = 1/u` and
    /// `p_up = (e^{(r−q)Δt} − d)/(u − d)`.
    ///
    /// Fails when the step is too coarse for `p_up` to be a probability.
    pub fn cox_ross_rubinstein(
        spot: Real,
        rate: Rate,
        dividend: Rate,
        vol: Volatility,
        end: Time,
        steps: usize,
    ) -> Result<Self> {
        ensure_config!(spot > 0.0, "spot", "spot must be positive, got {spot}");
        ensure_config!(vol > 0.0, "vol", "volatility must be positive, got {vol}");
        ensure_config!(end > 0.0, "maturity", "maturity must be positive, got {end}");
        ensure_config!(steps > 0, "steps", "need at least one step");

        let dt = end / steps as Real;
        let up = (vol * dt.sqrt()).exp();
        let down = 1.0 / up;
        let growth = ((rate - dividend) * dt).exp();
        let pu = (growth - down) / (up - down);
        if !(0.0..=1.0).contains(&pu) {
            return Err(Error::config(
                "steps",
                format!("CRR up probability {pu} outside [0, 1]; use more steps"),
            ));
        }
        Ok(Self {
            x0: spot,
            dt,
            steps,
            up,
            pu,
            pd: 1.0 - pu,
        })
    }

    /// Number of time steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Time increment per step.
    pub fn dt(&self) -> Time {
        self.dt
    }

    /// Initial underlying value.
    pub fn x0(&self) -> Real {
        self.x0
    }

    /// Number of nodes at step `i`.
    pub fn size(&self, i: usize) -> usize {
        i + 1
    }

    /// Index of the descendant at step `i + 1`; `branch = 0` is down, `1` up.
    pub fn descendant(&self, index: usize, branch: usize) -> usize {
        index + branch
    }

    /// Underlying value at node `(i, index)`.
    pub fn underlying(&self, i: usize, index: usize) -> Real {
        let j = 2 * index as i32 - i as i32;
        self.x0 * self.up.powi(j)
    }

    /// Transition probability for `branch` (0 = down, 1 = up).
    pub fn probability(&self, branch: usize) -> Real {
        if branch == 1 {
            self.pu
        } else {
            self.pd
        }
    }
}
