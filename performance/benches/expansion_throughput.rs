use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;

pub fn expansion_throughput_bench(c: &mut Criterion) {
    let kb = match std::env::var("EXPANSION_THROUGHPUT_KB") {
        Ok(val) => match val.parse::<usize>() {
            Ok(val) => val,
            Err(_) => panic!["Failed to parse env var EXPANSION_THROUGHPUT_KB={} as an integer", val],
        },
        Err(_) => 100,
    };
    let weights = Default::default();
    let mut rng = rand::prelude::StdRng::seed_from_u64(43);
    let input = performance::generate_random_document(&mut rng, kb * 1000, &weights);

    let mut group = c.benchmark_group("expansion-throughput");
    group.sample_size(10);
    group.bench_function("expansion_throughput_weave", |b| {
        b.iter(|| performance::run_in_weave(&input))
    });
}

criterion_group!(benches, expansion_throughput_bench);
criterion_main!(benches);
