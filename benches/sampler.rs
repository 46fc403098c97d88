use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mhfit::params::ParamVector;
use mhfit::sampler::{MetropolisHastings, Settings};

fn standard_gaussian(theta: &ParamVector) -> f64 {
    -0.5 * theta.values().iter().map(|v| v * v).sum::<f64>()
}

fn make_settings(dim: usize, iterations: usize, adaptive: bool) -> (ParamVector, Settings) {
    let init = ParamVector::from_pairs((0..dim).map(|i| (format!("p{i}"), 0.5))).unwrap();
    let settings = Settings {
        iterations,
        proposal_sd: (0..dim).map(|i| (format!("p{i}"), 1.0)).collect(),
        adapt_size_start: adaptive.then_some(100),
        adapt_shape_start: adaptive.then_some(100),
        ..Settings::default()
    };
    (init, settings)
}

fn run_chain(dim: usize, iterations: usize, adaptive: bool) -> f64 {
    let (init, settings) = make_settings(dim, iterations, adaptive);
    let output = MetropolisHastings::new(standard_gaussian, init, settings)
        .unwrap()
        .set_seed(42)
        .run()
        .unwrap();
    output.acceptance_rate
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("fixed kernel 2d 1000", |b| {
        b.iter(|| run_chain(black_box(2), black_box(1000), false))
    });
    c.bench_function("adaptive 2d 1000", |b| {
        b.iter(|| run_chain(black_box(2), black_box(1000), true))
    });
    c.bench_function("adaptive 10d 1000", |b| {
        b.iter(|| run_chain(black_box(10), black_box(1000), true))
    });

    let (init, settings) = make_settings(10, 1000, true);
    c.bench_function("constructor 10d", |b| {
        b.iter(|| {
            MetropolisHastings::new(standard_gaussian, init.clone(), settings.clone()).unwrap()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
