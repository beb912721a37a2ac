//! Cox-Ross-Rubinstein binomial engine for vanilla options.
//!
//! Term structures enter as their averages over the life of the option,
//! which is exact for flat curves. Used mainly to cross-check the PDE
//! engine.

use fb_core::{ensure_config, CancellationToken, ExerciseStyle, Real, Result};
use fb_methods::lattice::{price_american_cancellable, price_european, BinomialTree};
use fb_termstructures::TermStructure;
use tracing::debug;

use crate::fd_american_engine::PdeParams;

/// Price the vanilla option in `params` on a `steps`-step CRR tree.
///
/// Only the contract and market fields of `params` are read.
pub fn binomial_price(params: &PdeParams, steps: usize, cancel: &CancellationToken) -> Result<Real> {
    params.validate()?;
    ensure_config!(steps >= 1, "steps", "need at least one tree step");
    cancel.check()?;

    let t = params.maturity;
    let rate = params.rate.average(0.0, t);
    let dividend = params.dividend.average(0.0, t);
    let vol = params.vol.average(0.0, t);
    let tree = BinomialTree::cox_ross_rubinstein(params.spot, rate, dividend, vol, t, steps)?;
    let discount = (-rate * tree.dt()).exp();
    let (option_type, strike) = (params.option_type, params.strike);
    let payoff = move |s: Real| option_type.intrinsic(s, strike);
    debug!(steps, exercise = ?params.exercise, "pricing on binomial tree");

    match params.exercise {
        ExerciseStyle::European => Ok(price_european(&tree, &payoff, discount)),
        ExerciseStyle::American => price_american_cancellable(&tree, &payoff, discount, cancel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::black_scholes_merton;
    use fb_core::OptionType;

    #[test]
    fn european_call_converges_to_black_scholes() {
        let params = PdeParams {
            option_type: OptionType::Call,
            exercise: ExerciseStyle::European,
            ..PdeParams::default()
        };
        let price = binomial_price(&params, 800, &CancellationToken::new()).unwrap();
        let bs = black_scholes_merton(OptionType::Call, 100.0, 100.0, 0.05, 0.0, 0.2, 1.0);
        assert!((price - bs.price).abs() < 1e-2, "CRR call = {:.4}, BS = {:.4}", price, bs.price);
    }

    #[test]
    fn american_put_exceeds_european() {
        let token = CancellationToken::new();
        let am = binomial_price(&PdeParams::default(), 500, &token).unwrap();
        let eu = binomial_price(
            &PdeParams {
                exercise: ExerciseStyle::European,
                ..PdeParams::default()
            },
            500,
            &token,
        )
        .unwrap();
        assert!(am > eu);
        assert!((am - 6.09).abs() < 0.02, "CRR American put = {:.4}", am);
    }

    #[test]
    fn zero_steps_is_rejected() {
        let err = binomial_price(&PdeParams::default(), 0, &CancellationToken::new()).unwrap_err();
        assert_eq!(err.field(), Some("steps"));
    }
}
