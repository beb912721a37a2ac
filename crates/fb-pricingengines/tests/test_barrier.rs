//! Finite-difference barrier engine: ordering against vanillas, parity,
//! rebates and agreement with a finely monitored Monte Carlo.

use fb_core::{BarrierKind, CancellationToken, ExerciseStyle, OptionType};
use fb_methods::monte_carlo::McParams;
use fb_pricingengines::{
    run_mc, solve_barrier_pde, solve_pde, BarrierPdeParams, BarrierSpec, McEngineParams, PayoffSpec,
    PdeParams,
};

fn barrier(kind: BarrierKind, level: f64, option_type: OptionType, exercise: ExerciseStyle) -> BarrierPdeParams {
    BarrierPdeParams {
        option: PdeParams {
            option_type,
            exercise,
            compute_vega: false,
            ..PdeParams::default()
        },
        barrier: BarrierSpec {
            kind,
            level,
            rebate: 0.0,
        },
    }
}

#[test]
fn knock_outs_are_cheaper_than_vanillas() {
    let token = CancellationToken::new();
    let cases = [
        (BarrierKind::UpOut, 120.0, OptionType::Put),
        (BarrierKind::UpOut, 130.0, OptionType::Call),
        (BarrierKind::DownOut, 80.0, OptionType::Put),
        (BarrierKind::DownOut, 90.0, OptionType::Call),
    ];
    for (kind, level, option_type) in cases {
        for exercise in [ExerciseStyle::European, ExerciseStyle::American] {
            let p = barrier(kind, level, option_type, exercise);
            let ko = solve_barrier_pde(&p, &token).unwrap();
            let vanilla = solve_pde(&p.option, &token).unwrap();
            assert!(
                ko.price <= vanilla.price + 1e-8,
                "{kind:?} {option_type} {exercise:?}: KO {:.4} > vanilla {:.4}",
                ko.price,
                vanilla.price
            );
            assert!(ko.price >= 0.0);
        }
    }
}

#[test]
fn american_knock_out_dominates_european() {
    let token = CancellationToken::new();
    let am = solve_barrier_pde(&barrier(BarrierKind::UpOut, 120.0, OptionType::Put, ExerciseStyle::American), &token)
        .unwrap();
    let eu = solve_barrier_pde(&barrier(BarrierKind::UpOut, 120.0, OptionType::Put, ExerciseStyle::European), &token)
        .unwrap();
    assert!(am.price > eu.price, "American {:.4} vs European {:.4}", am.price, eu.price);
}

#[test]
fn knock_in_rebate_is_worth_its_no_touch_value() {
    let token = CancellationToken::new();
    let plain = barrier(BarrierKind::DownIn, 80.0, OptionType::Put, ExerciseStyle::European);
    let mut paid = plain.clone();
    paid.barrier.rebate = 3.0;
    let a = solve_barrier_pde(&plain, &token).unwrap().price;
    let b = solve_barrier_pde(&paid, &token).unwrap().price;
    // rebate · P(no touch) · e^{−rT}, with P(no touch) well inside (0, 1)
    let uplift = b - a;
    let max = 3.0 * (-0.05_f64).exp();
    assert!(uplift > 0.3 * max && uplift < max, "rebate uplift {uplift:.4}");
}

#[test]
fn vega_is_reported_on_request() {
    let mut p = barrier(BarrierKind::UpOut, 130.0, OptionType::Call, ExerciseStyle::European);
    p.option.compute_vega = true;
    let res = solve_barrier_pde(&p, &CancellationToken::new()).unwrap();
    assert!(res.vega.is_some());
    assert!(res.vega.unwrap().is_finite());
}

#[test]
fn continuously_monitored_pde_is_below_discrete_monte_carlo() {
    let token = CancellationToken::new();
    let pde = solve_barrier_pde(&barrier(BarrierKind::UpOut, 130.0, OptionType::Call, ExerciseStyle::European), &token)
        .unwrap();
    let mc = run_mc(
        &McEngineParams {
            payoff: PayoffSpec::Barrier {
                option_type: OptionType::Call,
                strike: 100.0,
                barrier: BarrierSpec {
                    kind: BarrierKind::UpOut,
                    level: 130.0,
                    rebate: 0.0,
                },
            },
            mc: McParams {
                num_paths: 40_000,
                steps: 250,
                control_variate: false,
                ..McParams::default()
            },
            ..McEngineParams::default()
        },
        &token,
    )
    .unwrap();
    // daily monitoring misses some crossings, so the MC knock-out is worth a
    // little more than the continuous one
    let gap = mc.statistic.value - pde.price;
    assert!(
        gap > -3.0 * mc.statistic.std_error && gap < 0.5,
        "PDE {:.4}, MC {:.4} ± {:.4}",
        pde.price,
        mc.statistic.value,
        mc.statistic.std_error
    );
}

#[test]
fn cancelled_barrier_solve_aborts() {
    let token = CancellationToken::new();
    token.cancel();
    let p = barrier(BarrierKind::DownIn, 90.0, OptionType::Call, ExerciseStyle::European);
    assert!(solve_barrier_pde(&p, &token).unwrap_err().is_cancelled());
}
