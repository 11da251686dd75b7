use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spkrec_data::FeatureVector;
use spkrec_model::{AcousticModel, Gmm, Lbg, TrainingParams, VqModel};

fn noise(dim: usize, seed: u64) -> Vec<f64> {
    let mut v = Vec::with_capacity(dim);
    let mut state = seed;
    for _ in 0..dim {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push(((state >> 33) as f64) / (u32::MAX as f64) - 0.5);
    }
    v
}

fn make_speaker(dim: usize, n: usize, offset: f64, base_seed: u64) -> Vec<FeatureVector> {
    (0..n)
        .map(|i| {
            let v: Vec<f64> = noise(dim, base_seed.wrapping_add(i as u64 * 997))
                .into_iter()
                .map(|x| x + offset)
                .collect();
            FeatureVector::from(v)
        })
        .collect()
}

fn bench_lbg(c: &mut Criterion) {
    let samples = make_speaker(13, 1000, 0.0, 1);

    c.bench_function("lbg_cluster_13d_1000pts_k32", |b| {
        let lbg = Lbg::new(32);
        b.iter(|| {
            let _ = black_box(lbg.cluster(black_box(&samples)));
        });
    });
}

fn bench_gmm_train(c: &mut Criterion) {
    let samples = make_speaker(13, 500, 0.0, 2);
    let params = TrainingParams {
        max_iterations: 20,
        threshold: 0.001,
    };

    c.bench_function("gmm_train_13d_500pts_order16", |b| {
        b.iter_with_setup(
            || Gmm::with_order(16),
            |mut gmm| {
                let _ = black_box(gmm.train(&samples, &params));
            },
        );
    });
}

fn bench_scoring(c: &mut Criterion) {
    let train = make_speaker(13, 1000, 0.0, 3);
    let test = make_speaker(13, 200, 0.1, 4);

    let mut gmm = Gmm::with_order(32);
    let mut vq = VqModel::with_order(32);
    if gmm.train(&train, &TrainingParams::default()).is_err()
        || vq.train(&train, &TrainingParams::default()).is_err()
    {
        return;
    }

    c.bench_function("gmm_log_score_13d_200pts_order32", |b| {
        b.iter(|| black_box(gmm.log_score(black_box(&test))));
    });
    c.bench_function("vq_score_13d_200pts_order32", |b| {
        b.iter(|| black_box(vq.score(black_box(&test))));
    });
}

criterion_group!(benches, bench_lbg, bench_gmm_train, bench_scoring);
criterion_main!(benches);
