//! Lattice methods for option pricing.
//!
//! * [`BinomialTree`]: recombining Cox-Ross-Rubinstein tree
//! * [`price_european`] / [`price_american`]: backward-induction pricing

pub mod binomial_tree;

pub use binomial_tree::BinomialTree;

use fb_core::{CancellationToken, Real, Result};

// ─── Backward-induction pricing ───────────────────────────────────────────────

/// Price a European option by backward induction on a binomial tree.
///
/// # Arguments
/// * `tree`: the binomial tree (already constructed)
/// * `payoff`: payoff function `S → value` (e.g. `|s| (s - K).max(0.0)`)
/// * `discount`: per-step discount factor, typically `exp(−r · Δt)`
pub fn price_european(tree: &BinomialTree, payoff: &dyn Fn(Real) -> Real, discount: Real) -> Real {
    roll_back(tree, payoff, discount, false)
}

/// Price an American option by backward induction on a binomial tree.
///
/// Same as European pricing, but allows early exercise at every node.
/// Ties are exercised.
pub fn price_american(tree: &BinomialTree, payoff: &dyn Fn(Real) -> Real, discount: Real) -> Real {
    roll_back(tree, payoff, discount, true)
}

/// [`price_american`] that checks `cancel` every step.
pub fn price_american_cancellable(
    tree: &BinomialTree,
    payoff: &dyn Fn(Real) -> Real,
    discount: Real,
    cancel: &CancellationToken,
) -> Result<Real> {
    let n = tree.steps();
    let mut values = terminal_values(tree, payoff);
    for i in (0..n).rev() {
        cancel.check()?;
        step_back(tree, payoff, discount, true, i, &mut values);
    }
    Ok(values[0])
}

fn roll_back(tree: &BinomialTree, payoff: &dyn Fn(Real) -> Real, discount: Real, american: bool) -> Real {
    let mut values = terminal_values(tree, payoff);
    for i in (0..tree.steps()).rev() {
        step_back(tree, payoff, discount, american, i, &mut values);
    }
    values[0]
}

fn terminal_values(tree: &BinomialTree, payoff: &dyn Fn(Real) -> Real) -> Vec<Real> {
    let n = tree.steps();
    (0..tree.size(n)).map(|j| payoff(tree.underlying(n, j))).collect()
}

fn step_back(
    tree: &BinomialTree,
    payoff: &dyn Fn(Real) -> Real,
    discount: Real,
    american: bool,
    i: usize,
    values: &mut [Real],
) {
    let (pu, pd) = (tree.probability(1), tree.probability(0));
    // ascending j only reads j and j+1, which are not yet overwritten
    for j in 0..tree.size(i) {
        let hold = discount * (pu * values[tree.descendant(j, 1)] + pd * values[tree.descendant(j, 0)]);
        values[j] = if american {
            hold.max(payoff(tree.underlying(i, j)))
        } else {
            hold
        };
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
