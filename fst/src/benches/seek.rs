use super::sorted_keys;
use criterion::{black_box, criterion_group, Criterion};
use quire_fst::{Builder, Config, Fst, PositiveIntOutputs};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

const N_KEYS: usize = 100_000;

const SAMPLE_SIZE: usize = 1_000;

fn build(keys: &[Vec<u8>], config: Config) -> Fst<PositiveIntOutputs> {
    let mut builder = Builder::new(config, PositiveIntOutputs);
    for (ordinal, key) in keys.iter().enumerate() {
        builder.add(key.as_slice(), ordinal as u64).unwrap();
    }
    builder.finish().unwrap().unwrap()
}

fn bench_seek(c: &mut Criterion) {
    let keys = sorted_keys(N_KEYS);
    let mut rng = StdRng::seed_from_u64(1);
    let present: Vec<Vec<u8>> = keys.choose_multiple(&mut rng, SAMPLE_SIZE).cloned().collect();
    let random: Vec<Vec<u8>> = (0..SAMPLE_SIZE)
        .map(|_| {
            let len = rng.gen_range(1..=16);
            (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect()
        })
        .collect();

    for (name, factor) in [("direct_addressing", 1.0), ("binary_search", -1.0)] {
        let fst = build(
            &keys,
            Config {
                direct_addressing_max_oversizing_factor: factor,
                ..Config::default()
            },
        );
        c.bench_function(&format!("{}/op=get layout={}", module_path!(), name), |b| {
            b.iter(|| {
                for key in &present {
                    black_box(fst.get(key.as_slice()).unwrap());
                }
            });
        });
        c.bench_function(
            &format!("{}/op=seek_ceil layout={}", module_path!(), name),
            |b| {
                let mut enumerator = fst.enumerator::<u8>();
                b.iter(|| {
                    for key in &random {
                        black_box(enumerator.seek_ceil(key).unwrap());
                    }
                });
            },
        );
        c.bench_function(
            &format!("{}/op=seek_floor layout={}", module_path!(), name),
            |b| {
                let mut enumerator = fst.enumerator::<u8>();
                b.iter(|| {
                    for key in &random {
                        black_box(enumerator.seek_floor(key).unwrap());
                    }
                });
            },
        );
        c.bench_function(&format!("{}/op=next layout={}", module_path!(), name), |b| {
            b.iter(|| {
                let mut enumerator = fst.enumerator::<u8>();
                let mut count = 0;
                while enumerator.next().unwrap().is_some() {
                    count += 1;
                }
                black_box(count)
            });
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_seek
}
