use criterion::{criterion_group, criterion_main, Criterion};
use krigr::{likelihood_surface, neg_log_likelihood, Hyperparameters, Kriging, SampleSet};
use ndarray::{Array, Array1, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

fn sample_set(nt: usize, dim: usize) -> SampleSet<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let xt = Array2::<f64>::random_using((nt, dim), Uniform::new(0., 10.), &mut rng);
    let yt: Array1<f64> = xt.map_axis(Axis(1), |x| {
        x.mapv(|v| v.sin() + 0.075 * v * v).sum()
    });
    SampleSet::new(xt, yt).expect("valid sample set")
}

fn criterion_likelihood(c: &mut Criterion) {
    let mut group = c.benchmark_group("likelihood");
    for nt in [20, 100] {
        let samples = sample_set(nt, 2);
        group.bench_function(format!("nll {nt}"), |b| {
            b.iter(|| std::hint::black_box(neg_log_likelihood(&samples, 0.5, 2.)))
        });
    }
    let samples = sample_set(20, 2);
    let thetas = Array::logspace(10., -2., 1., 20);
    let ps = Array::linspace(1., 2., 5);
    group.bench_function("surface 20x5", |b| {
        b.iter(|| std::hint::black_box(likelihood_surface(&samples, &thetas, &ps)))
    });
    group.finish();
}

fn criterion_kriging(c: &mut Criterion) {
    let mut group = c.benchmark_group("kriging");
    group.sample_size(20);
    for nt in [20, 50] {
        let samples = sample_set(nt, 2);
        group.bench_function(format!("fit {nt}"), |b| {
            b.iter(|| {
                std::hint::black_box(
                    Kriging::params()
                        .fit_samples(&samples)
                        .expect("Kriging fitted"),
                )
            })
        });
    }

    let samples = sample_set(50, 2);
    let kriging = Kriging::params()
        .fixed(Hyperparameters::new(0.5, 2.).expect("valid hyperparameters"))
        .fit_samples(&samples)
        .expect("Kriging fitted");
    let mut rng = Xoshiro256Plus::seed_from_u64(43);
    let xtest = Array2::random_using((1000, 2), Uniform::new(0., 10.), &mut rng);
    group.bench_function("predict_valvar 1000", |b| {
        b.iter(|| std::hint::black_box(kriging.predict_valvar(&xtest)))
    });
    group.finish();
}

criterion_group!(benches, criterion_likelihood, criterion_kriging);
criterion_main!(benches);
