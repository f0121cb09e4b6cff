#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use quire_fst::{Builder, Config, Fst, PositiveIntOutputs};
use std::collections::BTreeMap;

const MAX_KEYS: usize = 256;

#[derive(Arbitrary, Debug)]
enum Seek {
    Exact(Vec<u8>),
    Ceil(Vec<u8>),
    Floor(Vec<u8>),
    Next,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    keys: Vec<(Vec<u8>, u32)>,
    seeks: Vec<Seek>,
    share_suffix: bool,
    allow_fixed_length_arcs: bool,
    direct_addressing: bool,
    bytes_page_bits: u8,
}

fn fuzz(input: FuzzInput) {
    let keys: BTreeMap<Vec<u8>, u64> = input
        .keys
        .into_iter()
        .take(MAX_KEYS)
        .map(|(key, output)| (key, output as u64))
        .collect();
    let config = Config {
        share_suffix: input.share_suffix,
        allow_fixed_length_arcs: input.allow_fixed_length_arcs,
        direct_addressing_max_oversizing_factor: if input.direct_addressing { 1.0 } else { -1.0 },
        bytes_page_bits: 1 + (input.bytes_page_bits % 16) as u32,
        ..Config::default()
    };
    let mut builder = Builder::new(config, PositiveIntOutputs);
    for (key, output) in &keys {
        builder.add(key.as_slice(), *output).unwrap();
    }
    let Some(fst) = builder.finish().unwrap() else {
        assert!(keys.is_empty());
        return;
    };

    // Serialized copies behave identically.
    let bytes = fst.to_bytes().unwrap();
    let loaded = Fst::read_from(bytes, PositiveIntOutputs).unwrap();

    for (key, output) in &keys {
        assert_eq!(fst.get(key.as_slice()).unwrap(), Some(*output));
        assert_eq!(loaded.get(key.as_slice()).unwrap(), Some(*output));
    }

    let mut enumerator = fst.enumerator::<u8>();
    let mut position: Option<Vec<u8>> = None;
    for seek in input.seeks {
        let (found, expected) = match seek {
            Seek::Exact(target) => (
                enumerator.seek_exact(&target).unwrap().map(|(k, o)| (k.to_vec(), *o)),
                keys.get(&target).map(|o| (target.clone(), *o)),
            ),
            Seek::Ceil(target) => (
                enumerator.seek_ceil(&target).unwrap().map(|(k, o)| (k.to_vec(), *o)),
                keys.range(target..).next().map(|(k, o)| (k.clone(), *o)),
            ),
            Seek::Floor(target) => (
                enumerator.seek_floor(&target).unwrap().map(|(k, o)| (k.to_vec(), *o)),
                keys.range(..=target).next_back().map(|(k, o)| (k.clone(), *o)),
            ),
            Seek::Next => {
                let expected = match &position {
                    Some(current) => keys
                        .range::<Vec<u8>, _>((
                            std::ops::Bound::Excluded(current),
                            std::ops::Bound::Unbounded,
                        ))
                        .next(),
                    None => keys.iter().next(),
                };
                (
                    enumerator.next().unwrap().map(|(k, o)| (k.to_vec(), *o)),
                    expected.map(|(k, o)| (k.clone(), *o)),
                )
            }
        };
        assert_eq!(found, expected);
        position = found.map(|(key, _)| key);
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
