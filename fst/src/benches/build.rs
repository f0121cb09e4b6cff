use super::sorted_keys;
use criterion::{black_box, criterion_group, Criterion};
use quire_fst::{Builder, Config, PositiveIntOutputs};

const N_KEYS: [usize; 2] = [10_000, 100_000];

fn bench_build(c: &mut Criterion) {
    for n in N_KEYS {
        let keys = sorted_keys(n);
        for (name, config) in [
            ("default", Config::default()),
            (
                "trie",
                Config {
                    share_suffix: false,
                    ..Config::default()
                },
            ),
            (
                "no_direct_addressing",
                Config {
                    direct_addressing_max_oversizing_factor: -1.0,
                    ..Config::default()
                },
            ),
        ] {
            c.bench_function(
                &format!("{}/n={} config={}", module_path!(), keys.len(), name),
                |b| {
                    b.iter(|| {
                        let mut builder = Builder::new(config.clone(), PositiveIntOutputs);
                        for (ordinal, key) in keys.iter().enumerate() {
                            builder.add(key.as_slice(), ordinal as u64).unwrap();
                        }
                        black_box(builder.finish().unwrap())
                    });
                },
            );
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_build
}
