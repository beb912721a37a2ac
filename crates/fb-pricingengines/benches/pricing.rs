use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fb_core::{CancellationToken, ExerciseStyle};
use fb_methods::finite_differences::GridSpec;
use fb_pricingengines::{
    binomial_price, run_lsmc, solve_barrier_pde, solve_pde, BarrierPdeParams, LsmcParams,
    PdeParams,
};
use std::hint::black_box;

fn pde(num_space: usize, num_time: usize) -> PdeParams {
    PdeParams {
        grid: GridSpec {
            num_space,
            num_time,
            ..GridSpec::default()
        },
        compute_vega: false,
        ..PdeParams::default()
    }
}

fn bench_psor_american_put(c: &mut Criterion) {
    let token = CancellationToken::new();
    let mut group = c.benchmark_group("psor_american_put");
    for nodes in [101_usize, 201, 401] {
        let params = pde(nodes, nodes);
        group.bench_with_input(BenchmarkId::from_parameter(nodes), &params, |b, p| {
            b.iter(|| {
                let res = solve_pde(black_box(p), &token).expect("PDE solve should succeed");
                black_box(res.price)
            })
        });
    }
    group.finish();
}

fn bench_european_thomas(c: &mut Criterion) {
    let token = CancellationToken::new();
    let params = PdeParams {
        exercise: ExerciseStyle::European,
        ..pde(201, 200)
    };
    c.bench_function("thomas_european_put_201x200", |b| {
        b.iter(|| {
            let res = solve_pde(black_box(&params), &token).expect("PDE solve should succeed");
            black_box(res.price)
        })
    });
}

fn bench_pde_with_vega(c: &mut Criterion) {
    let token = CancellationToken::new();
    let params = PdeParams::default();
    c.bench_function("psor_american_put_with_vega", |b| {
        b.iter(|| {
            let res = solve_pde(black_box(&params), &token).expect("PDE solve should succeed");
            black_box(res.vega)
        })
    });
}

fn bench_barrier(c: &mut Criterion) {
    let token = CancellationToken::new();
    let mut params = BarrierPdeParams::default();
    params.option.compute_vega = false;
    c.bench_function("psor_up_and_out_put", |b| {
        b.iter(|| {
            let res = solve_barrier_pde(black_box(&params), &token)
                .expect("barrier solve should succeed");
            black_box(res.price)
        })
    });
}

fn bench_lsmc(c: &mut Criterion) {
    let token = CancellationToken::new();
    let mut group = c.benchmark_group("lsmc_american_put");
    group.sample_size(10);
    for paths in [10_000_usize, 50_000] {
        let params = LsmcParams {
            num_paths: paths,
            ..LsmcParams::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(paths), &params, |b, p| {
            b.iter(|| {
                let res = run_lsmc(black_box(p), &token).expect("LSMC should succeed");
                black_box(res.price)
            })
        });
    }
    group.finish();
}

fn bench_binomial(c: &mut Criterion) {
    let token = CancellationToken::new();
    let params = PdeParams::default();
    c.bench_function("crr_american_put_500", |b| {
        b.iter(|| {
            let px = binomial_price(black_box(&params), 500, &token).expect("tree should succeed");
            black_box(px)
        })
    });
}

criterion_group!(
    benches,
    bench_psor_american_put,
    bench_european_thomas,
    bench_pde_with_vega,
    bench_barrier,
    bench_lsmc,
    bench_binomial
);
criterion_main!(benches);
