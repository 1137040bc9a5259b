use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dyclee::{Context, DyClee};
use rand::prelude::*;
use rand_distr::Normal;

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");

    // Synthetic stream: four drifting Gaussian processes in 2-D.
    let mut rng = StdRng::seed_from_u64(42);
    let n = 10_000;
    let centers = [(2.0f32, 2.0f32), (8.0, 2.0), (2.0, 8.0), (8.0, 8.0)];

    let data: Vec<Vec<f32>> = (0..n)
        .map(|i| {
            let (cx, cy) = centers[(i * centers.len()) / n];
            let dx = Normal::new(cx, 0.3).unwrap();
            let dy = Normal::new(cy, 0.3).unwrap();
            vec![dx.sample(&mut rng), dy.sample(&mut rng)]
        })
        .collect();

    group.bench_function("stream_n10000_d2_tglobal1000", |b| {
        b.iter(|| {
            let context = Context::new(0.06, &[(0.0, 10.0), (0.0, 10.0)]).unwrap();
            let mut engine = DyClee::new(context).with_t_global(1000);
            for (t, x) in data.iter().enumerate() {
                engine.ingest(black_box(x), t as u64).unwrap();
            }
            engine.finalize().len()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
