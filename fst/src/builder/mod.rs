//! Compile sorted keys into an [Fst].
//!
//! A [Builder] keeps the path of the last added key as a frontier of [UnCompiledNode]s. When a
//! key is added, the part of the frontier that the new key does not share with the previous one
//! can never change again: it is frozen bottom up, each node written to the store (or replaced
//! by an equal node written earlier) and the arc leading to it pointed at its address. Outputs
//! are pushed towards the root along the shared prefix so that every arc carries the longest
//! output common to the keys below it.
//!
//! # Example
//!
//! ```rust
//! use quire_fst::{Builder, Config, InputType, ByteSequenceOutputs};
//! use bytes::Bytes;
//!
//! let config = Config {
//!     input_type: InputType::Byte2,
//!     ..Config::default()
//! };
//! let mut builder = Builder::new(config, ByteSequenceOutputs);
//! builder.add(&[1u16, 500], Bytes::from_static(b"first")).unwrap();
//! builder.add(&[1u16, 501], Bytes::from_static(b"fist")).unwrap();
//! assert_eq!(builder.term_count(), 2);
//!
//! let fst = builder.finish().unwrap().unwrap();
//! assert_eq!(fst.get(&[1u16, 501]).unwrap(), Some(Bytes::from_static(b"fist")));
//! ```

use crate::{
    arc::{Address, Label, FINAL_END_NODE},
    automaton::{Fst, Nodes},
    input::{InputType, Symbol},
    outputs::Outputs,
    Error,
};
use prometheus_client::registry::Registry;
use tracing::debug;

mod hash;
mod metrics;
mod node;
mod writer;

pub use metrics::Metrics;

use hash::NodeHash;
use node::UnCompiledNode;
use writer::NodeWriter;

/// Configuration for a [Builder].
#[derive(Clone, Debug)]
pub struct Config {
    /// How labels are encoded.
    pub input_type: InputType,

    /// Whether to share suffixes by deduplicating frozen nodes. Without it the result is a
    /// (prefix shared) trie, built with less memory.
    pub share_suffix: bool,

    /// Whether to deduplicate nodes with more than one arc (only relevant with `share_suffix`).
    pub share_non_singleton_nodes: bool,

    /// Only deduplicate nodes whose frozen tail is at most this long (only relevant with
    /// `share_suffix`).
    pub share_max_tail_length: u32,

    /// Whether nodes with many arcs may be written with fixed length arcs.
    pub allow_fixed_length_arcs: bool,

    /// How much larger than its binary search encoding a direct addressing node may be. Negative
    /// values disable direct addressing.
    pub direct_addressing_max_oversizing_factor: f32,

    /// Nodes are written to blocks of `1 << bytes_page_bits` bytes.
    pub bytes_page_bits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_type: InputType::Byte1,
            share_suffix: true,
            share_non_singleton_nodes: true,
            share_max_tail_length: u32::MAX,
            allow_fixed_length_arcs: true,
            direct_addressing_max_oversizing_factor: 1.0,
            bytes_page_bits: 15,
        }
    }
}

/// Builds an [Fst] from keys added in strictly increasing order.
pub struct Builder<O: Outputs> {
    input_type: InputType,
    outputs: O,
    no_output: O::Value,

    writer: NodeWriter<O>,
    dedup: Option<NodeHash>,
    share_non_singleton_nodes: bool,
    share_max_tail_length: usize,

    // frontier[i] is the node reached by the first i labels of the last key.
    frontier: Vec<UnCompiledNode<O::Value>>,
    last_input: Vec<Label>,
    input: Vec<Label>,

    empty_output: Option<O::Value>,
    term_count: u64,
}

impl<O: Outputs> Builder<O> {
    /// Create a builder.
    ///
    /// # Panics
    ///
    /// Panics if `config.bytes_page_bits` is not in `1..=30`.
    pub fn new(config: Config, outputs: O) -> Self {
        let no_output = outputs.no_output();
        let writer = NodeWriter::new(
            outputs.clone(),
            config.input_type,
            config.bytes_page_bits,
            config.allow_fixed_length_arcs,
            config.direct_addressing_max_oversizing_factor,
        );
        Self {
            input_type: config.input_type,
            outputs,
            no_output: no_output.clone(),
            writer,
            dedup: config.share_suffix.then(NodeHash::new),
            share_non_singleton_nodes: config.share_non_singleton_nodes,
            share_max_tail_length: config.share_max_tail_length as usize,
            frontier: vec![UnCompiledNode::new(no_output, 0)],
            last_input: Vec::new(),
            input: Vec::new(),
            empty_output: None,
            term_count: 0,
        }
    }

    /// Add `key` with `output`.
    ///
    /// # Panics
    ///
    /// Panics if `key` is not greater than the previously added key or contains a symbol that
    /// does not fit the configured [InputType].
    pub fn add<K: Symbol>(&mut self, key: &[K], output: O::Value) -> Result<(), Error> {
        let max_label = self.input_type.max_label();
        let mut input = std::mem::take(&mut self.input);
        input.clear();
        for symbol in key {
            let label = symbol.to_label();
            assert!(
                label.is_some_and(|label| label <= max_label),
                "label exceeds {:?}: {:?}",
                self.input_type,
                symbol
            );
            input.extend(label);
        }
        assert!(
            self.term_count == 0 || input > self.last_input,
            "keys added out of order: {:?} after {:?}",
            input,
            self.last_input
        );

        // Only the first key may be empty, and it is stored outside the nodes.
        if input.is_empty() {
            self.frontier[0].is_final = true;
            self.empty_output = Some(output);
            self.term_count += 1;
            self.input = input;
            return Ok(());
        }

        // Length of the prefix shared with the previous key, plus one.
        let shared = input
            .iter()
            .zip(&self.last_input)
            .take_while(|(a, b)| a == b)
            .count();
        let prefix_len_plus1 = shared + 1;

        while self.frontier.len() <= input.len() {
            let depth = self.frontier.len();
            self.frontier
                .push(UnCompiledNode::new(self.no_output.clone(), depth));
        }

        // The previous key's nodes past the shared prefix are complete.
        self.freeze_tail(prefix_len_plus1)?;

        for idx in prefix_len_plus1..=input.len() {
            self.frontier[idx - 1].add_arc(input[idx - 1], self.no_output.clone());
        }
        let last = &mut self.frontier[input.len()];
        last.is_final = true;
        last.output = self.no_output.clone();

        // Push the common part of the outputs towards the root.
        let mut output = output;
        for idx in 1..prefix_len_plus1 {
            let label = input[idx - 1];
            let (parents, rest) = self.frontier.split_at_mut(idx);
            let parent = &mut parents[idx - 1];
            let node = &mut rest[0];
            let last_output = parent.last_output(label);
            let common = if *last_output != self.no_output {
                let common = self.outputs.common(&output, last_output);
                let suffix = self.outputs.subtract(last_output, &common);
                parent.set_last_output(label, common.clone());
                node.prepend_output(&self.outputs, &suffix);
                common
            } else {
                self.no_output.clone()
            };
            output = self.outputs.subtract(&output, &common);
        }
        self.frontier[prefix_len_plus1 - 1].set_last_output(input[prefix_len_plus1 - 1], output);

        self.input = std::mem::replace(&mut self.last_input, input);
        self.term_count += 1;
        Ok(())
    }

    /// Freeze the nodes of the last key deeper than `prefix_len_plus1 - 1`.
    fn freeze_tail(&mut self, prefix_len_plus1: usize) -> Result<(), Error> {
        let down_to = prefix_len_plus1.max(1);
        let last_len = self.last_input.len();
        for idx in (down_to..=last_len).rev() {
            let node = &self.frontier[idx];
            let next_final_output = node.output.clone();
            let is_final = node.is_final || node.arcs.is_empty();
            let address = self.compile_node(idx, 1 + last_len - idx)?;
            self.frontier[idx - 1].replace_last(
                self.last_input[idx - 1],
                address,
                next_final_output,
                is_final,
            );
        }
        Ok(())
    }

    /// Write (or deduplicate) `frontier[idx]` and reset it for reuse.
    fn compile_node(&mut self, idx: usize, tail_len: usize) -> Result<Address, Error> {
        let start = self.writer.store.position();
        let node = &self.frontier[idx];
        let address = match &mut self.dedup {
            Some(dedup)
                if (self.share_non_singleton_nodes || node.arcs.len() <= 1)
                    && tail_len <= self.share_max_tail_length =>
            {
                if node.arcs.is_empty() {
                    let address = self.writer.add_node(node);
                    self.writer.last_frozen_node = address;
                    address
                } else {
                    dedup.add(&mut self.writer, node)?
                }
            }
            _ => self.writer.add_node(node),
        };
        if self.writer.store.position() != start {
            self.writer.last_frozen_node = address;
        } else if !node.arcs.is_empty() {
            self.writer.metrics.deduplicated.inc();
        }
        self.frontier[idx].clear(self.no_output.clone());
        Ok(address)
    }

    /// Freeze the remaining nodes and return the [Fst], or `None` if no key was added.
    pub fn finish(mut self) -> Result<Option<Fst<O>>, Error> {
        self.freeze_tail(0)?;
        if self.frontier[0].arcs.is_empty() && self.empty_output.is_none() {
            return Ok(None);
        }
        let mut start_node = self.compile_node(0, self.last_input.len())?;

        // A root without arcs is only reachable through the empty key.
        if start_node == FINAL_END_NODE && self.empty_output.is_some() {
            start_node = 0;
        }

        let mut store = self.writer.store;
        store.finish();
        debug!(
            terms = self.term_count,
            nodes = self.writer.metrics.nodes.get(),
            arcs = self.writer.metrics.arcs.get(),
            deduplicated = self.writer.metrics.deduplicated.get(),
            shareable = self.dedup.as_ref().map_or(0, NodeHash::len),
            bytes = store.position(),
            ram = store.ram_bytes_used(),
            start_node,
            "finished fst"
        );
        Ok(Some(Fst::new(
            self.input_type,
            self.outputs,
            start_node,
            self.empty_output,
            Nodes::Store(store),
        )))
    }

    /// Register the builder's [Metrics] in `registry`.
    pub fn register(&self, registry: &mut Registry) {
        self.writer.metrics.register(registry);
    }

    /// Number of keys added.
    pub fn term_count(&self) -> u64 {
        self.term_count
    }

    /// Number of nodes written so far.
    pub fn node_count(&self) -> u64 {
        self.writer.metrics.nodes.get()
    }

    /// Number of arcs written so far.
    pub fn arc_count(&self) -> u64 {
        self.writer.metrics.arcs.get()
    }

    /// Number of nodes written with fixed length arcs for binary search.
    pub fn binary_search_node_count(&self) -> u64 {
        self.writer.metrics.binary_search_nodes.get()
    }

    /// Number of nodes written with fixed length arcs for direct addressing.
    pub fn direct_addressing_node_count(&self) -> u64 {
        self.writer.metrics.direct_addressing_nodes.get()
    }

    /// Bytes written so far.
    pub fn num_bytes(&self) -> u64 {
        self.writer.store.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arc::{Arc, ARCS_FOR_BINARY_SEARCH, ARCS_FOR_DIRECT_ADDRESSING},
        outputs::{ByteSequenceOutputs, NoOutputs, Pair, PairOutputs, PositiveIntOutputs},
    };
    use bytes::Bytes;
    use commonware_macros::test_traced;
    use prometheus_client::encoding::text::encode;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::BTreeMap;
    use test_case::test_case;

    const FIXTURE: &[(&str, u64)] = &[
        ("mop", 100),
        ("moth", 91),
        ("pop", 72),
        ("star", 83),
        ("stop", 54),
        ("top", 55),
    ];

    /// Node bytes of [FIXTURE] built with the default configuration.
    const FIXTURE_BYTES: &[u8] = &[
        0, 104, 15, 116, 6, 9, 112, 25, 111, 6, 112, 15, 111, 6, 114, 15, 11, 111, 2, 15, 29, 97,
        16, 116, 6, 13, 55, 116, 18, 24, 54, 115, 16, 13, 72, 112, 16, 9, 91, 109, 16,
    ];

    fn build(config: Config, keys: &[(&str, u64)]) -> Fst<PositiveIntOutputs> {
        let mut builder = Builder::new(config, PositiveIntOutputs);
        for (key, output) in keys {
            builder.add(key.as_bytes(), *output).unwrap();
        }
        builder.finish().unwrap().unwrap()
    }

    fn node_bytes<O: Outputs>(fst: &Fst<O>) -> Vec<u8> {
        match fst.nodes() {
            Nodes::Store(store) => store.to_vec(),
            _ => panic!("fst was not built in memory"),
        }
    }

    /// Node flags of the node reached by `key`.
    fn node_flags(fst: &Fst<PositiveIntOutputs>, key: &[u8]) -> u8 {
        let mut reader = fst.reader();
        let mut follow = Arc::new(0);
        fst.first_arc(&mut follow);
        let mut arc = Arc::new(0);
        for label in key {
            assert!(fst
                .find_target_arc(*label as Label, &follow, &mut arc, &mut reader)
                .unwrap());
            follow.copy_from(&arc);
        }
        fst.read_first_real_target_arc(follow.target(), &mut arc, &mut reader)
            .unwrap();
        arc.node_flags()
    }

    #[test_traced]
    fn test_fixture_bytes() {
        let fst = build(Config::default(), FIXTURE);
        assert_eq!(node_bytes(&fst), FIXTURE_BYTES);
        assert_eq!(fst.start_node(), 40);
        for (key, output) in FIXTURE {
            assert_eq!(fst.get(key.as_bytes()).unwrap(), Some(*output));
        }
        for key in ["", "m", "mo", "mops", "moth ", "stap", "to", "u"] {
            assert_eq!(fst.get(key.as_bytes()).unwrap(), None);
        }

        // Building again yields the same bytes.
        let again = build(Config::default(), FIXTURE);
        assert_eq!(node_bytes(&again), FIXTURE_BYTES);
    }

    #[test_traced]
    fn test_fixture_shares_suffixes() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        for (key, output) in FIXTURE {
            builder.add(key.as_bytes(), *output).unwrap();
        }
        assert_eq!(builder.term_count(), FIXTURE.len() as u64);

        let deduplicated = builder.writer.metrics.deduplicated.clone();
        assert_eq!(deduplicated.get(), 1);
        let fst = builder.finish().unwrap().unwrap();
        assert_eq!(deduplicated.get(), 3);
        let shared = fst.num_bytes();

        let trie = build(
            Config {
                share_suffix: false,
                ..Config::default()
            },
            FIXTURE,
        );
        assert!(shared < trie.num_bytes());
        for (key, output) in FIXTURE {
            assert_eq!(trie.get(key.as_bytes()).unwrap(), Some(*output));
        }
    }

    #[test_case(1.0, ARCS_FOR_DIRECT_ADDRESSING; "direct addressing")]
    #[test_case(-1.0, ARCS_FOR_BINARY_SEARCH; "binary search")]
    fn test_fixed_length_arcs(factor: f32, expected: u8) {
        let keys: Vec<(String, u64)> = "123456789abc"
            .chars()
            .zip([100, 92, 85, 77, 70, 61, 55, 47, 39, 31, 22, 14])
            .map(|(c, output)| (format!("m{c}"), output))
            .collect();
        let mut builder = Builder::new(
            Config {
                direct_addressing_max_oversizing_factor: factor,
                ..Config::default()
            },
            PositiveIntOutputs,
        );
        for (key, output) in &keys {
            builder.add(key.as_bytes(), *output).unwrap();
        }
        let (binary_search, direct_addressing) = (
            builder.binary_search_node_count(),
            builder.direct_addressing_node_count(),
        );
        let fst = builder.finish().unwrap().unwrap();
        if expected == ARCS_FOR_BINARY_SEARCH {
            assert_eq!((binary_search, direct_addressing), (1, 0));
        } else {
            assert_eq!((binary_search, direct_addressing), (0, 1));
        }
        assert_eq!(node_flags(&fst, b"m"), expected);

        let mut enumerator = fst.enumerator::<u8>();
        assert_eq!(
            enumerator.seek_exact(b"m1").unwrap(),
            Some((&b"m1"[..], &100))
        );
        assert_eq!(
            enumerator.seek_exact(b"mc").unwrap(),
            Some((&b"mc"[..], &14))
        );
        for (key, output) in &keys {
            assert_eq!(fst.get(key.as_bytes()).unwrap(), Some(*output));
        }
        for key in ["m0", "m:", "m`", "md", "m"] {
            assert_eq!(fst.get(key.as_bytes()).unwrap(), None);
        }
    }

    #[test_traced]
    fn test_random_round_trip() {
        let configs = [
            Config::default(),
            Config {
                share_suffix: false,
                ..Config::default()
            },
            Config {
                share_non_singleton_nodes: false,
                ..Config::default()
            },
            Config {
                share_max_tail_length: 2,
                ..Config::default()
            },
            Config {
                allow_fixed_length_arcs: false,
                ..Config::default()
            },
            Config {
                direct_addressing_max_oversizing_factor: -1.0,
                bytes_page_bits: 3,
                ..Config::default()
            },
        ];
        let mut rng = StdRng::seed_from_u64(0);
        for config in configs {
            let keys: BTreeMap<Vec<u8>, u64> = (0..2_000)
                .map(|_| {
                    let len = rng.gen_range(0..10);
                    let key = (0..len).map(|_| rng.gen_range(b'a'..=b'p')).collect();
                    (key, rng.gen_range(0..10_000))
                })
                .collect();
            let mut builder = Builder::new(config.clone(), PositiveIntOutputs);
            for (key, output) in &keys {
                builder.add(key, *output).unwrap();
            }
            let fst = builder.finish().unwrap().unwrap();

            for (key, output) in &keys {
                assert_eq!(fst.get(key).unwrap(), Some(*output), "{config:?}");
            }
            for _ in 0..2_000 {
                let len = rng.gen_range(0..10);
                let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'q')).collect();
                assert_eq!(fst.get(&key).unwrap(), keys.get(&key).copied());
            }

            let mut enumerator = fst.enumerator::<u8>();
            let mut expected = keys.iter();
            while let Some((key, output)) = enumerator.next().unwrap() {
                assert_eq!(Some((&key.to_vec(), output)), expected.next());
            }
            assert!(expected.next().is_none());
        }
    }

    #[test_traced]
    fn test_suffix_sharing_deduplicates() {
        let mut keys: Vec<String> = ["bar", "car", "far", "jar", "tar", "war"]
            .iter()
            .flat_map(|stem| ["ring", "red", "s"].map(|suffix| format!("{stem}{suffix}")))
            .collect();
        keys.sort();

        let mut shared = Builder::new(Config::default(), NoOutputs);
        let mut trie = Builder::new(
            Config {
                share_suffix: false,
                ..Config::default()
            },
            NoOutputs,
        );
        for key in &keys {
            shared.add(key.as_bytes(), ()).unwrap();
            trie.add(key.as_bytes(), ()).unwrap();
        }
        assert!(shared.writer.metrics.deduplicated.get() > 0);
        assert!(shared.node_count() < trie.node_count());
        assert!(shared.arc_count() < trie.arc_count());

        let shared = shared.finish().unwrap().unwrap();
        let trie = trie.finish().unwrap().unwrap();
        assert!(shared.num_bytes() < trie.num_bytes());
        for key in &keys {
            assert!(shared.contains(key.as_bytes()).unwrap());
            assert!(trie.contains(key.as_bytes()).unwrap());
        }
        assert!(!shared.contains(b"bas").unwrap());
    }

    #[test]
    #[should_panic(expected = "keys added out of order")]
    fn test_out_of_order() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        builder.add(b"b", 1).unwrap();
        builder.add(b"a", 2).unwrap();
    }

    #[test]
    #[should_panic(expected = "keys added out of order")]
    fn test_duplicate_key() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        builder.add(b"a", 1).unwrap();
        builder.add(b"a", 2).unwrap();
    }

    #[test]
    #[should_panic(expected = "keys added out of order")]
    fn test_duplicate_empty_key() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        builder.add(b"", 1).unwrap();
        builder.add(b"", 2).unwrap();
    }

    #[test]
    #[should_panic(expected = "label exceeds")]
    fn test_label_exceeds_input_type() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        builder.add(&[300u16], 1).unwrap();
    }

    #[test]
    #[should_panic(expected = "label exceeds Byte4")]
    fn test_symbol_exceeds_any_label() {
        let config = Config {
            input_type: InputType::Byte4,
            ..Config::default()
        };
        let mut builder = Builder::new(config, PositiveIntOutputs);
        builder.add(&[u32::MAX], 1).unwrap();
    }

    #[test_traced]
    fn test_no_keys() {
        let builder = Builder::new(Config::default(), PositiveIntOutputs);
        assert!(builder.finish().unwrap().is_none());
    }

    #[test_traced]
    fn test_empty_key_only() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        builder.add(b"", 42).unwrap();
        let fst = builder.finish().unwrap().unwrap();
        assert_eq!(fst.start_node(), 0);
        assert_eq!(fst.empty_output(), Some(&42));
        assert_eq!(fst.get(b"").unwrap(), Some(42));
        assert_eq!(fst.get(b"a").unwrap(), None);
    }

    #[test_traced]
    fn test_empty_key_with_others() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        builder.add(b"", 3).unwrap();
        builder.add(b"a", 5).unwrap();
        builder.add(b"ab", 9).unwrap();
        let fst = builder.finish().unwrap().unwrap();
        assert_eq!(fst.get(b"").unwrap(), Some(3));
        assert_eq!(fst.get(b"a").unwrap(), Some(5));
        assert_eq!(fst.get(b"ab").unwrap(), Some(9));
        assert_eq!(fst.get(b"b").unwrap(), None);
    }

    #[test_traced]
    fn test_pair_outputs() {
        let outputs = PairOutputs::new(PositiveIntOutputs, ByteSequenceOutputs);
        let entries = [
            ("apple", 7, "red"),
            ("apricot", 7, "orange"),
            ("banana", 3, "yellow"),
            ("blueberry", 12, "blue"),
        ];
        let mut builder = Builder::new(Config::default(), outputs);
        for (key, weight, color) in entries {
            builder
                .add(key.as_bytes(), Pair::new(weight, Bytes::from(color)))
                .unwrap();
        }
        let fst = builder.finish().unwrap().unwrap();
        for (key, weight, color) in entries {
            assert_eq!(
                fst.get(key.as_bytes()).unwrap(),
                Some(Pair::new(weight, Bytes::from(color)))
            );
        }
        assert_eq!(fst.get(b"ap").unwrap(), None);
    }

    #[test_traced]
    fn test_wide_symbols() {
        let mut builder = Builder::new(
            Config {
                input_type: InputType::Byte4,
                ..Config::default()
            },
            PositiveIntOutputs,
        );
        let keys: Vec<Vec<u32>> = vec![
            vec![1, 70_000],
            vec![1, 70_001, 5],
            vec![2],
            vec![1 << 30, 0],
        ];
        for (i, key) in keys.iter().enumerate() {
            builder.add(key, i as u64 + 1).unwrap();
        }
        let fst = builder.finish().unwrap().unwrap();
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(fst.get(key).unwrap(), Some(i as u64 + 1));
        }
        assert_eq!(fst.get(&[1u32, 70_001]).unwrap(), None);
    }

    #[test_traced]
    fn test_shared_across_threads() {
        let keys: Vec<String> = (0..1_000).map(|i| format!("{i:05}")).collect();
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        for (i, key) in keys.iter().enumerate() {
            builder.add(key.as_bytes(), i as u64).unwrap();
        }
        let fst = builder.finish().unwrap().unwrap();

        std::thread::scope(|scope| {
            for chunk in keys.chunks(250) {
                let fst = &fst;
                scope.spawn(move || {
                    let mut enumerator = fst.enumerator::<u8>();
                    for key in chunk {
                        let (found, output) = enumerator.seek_ceil(key.as_bytes()).unwrap().unwrap();
                        assert_eq!(found, key.as_bytes());
                        assert_eq!(fst.get(key.as_bytes()).unwrap(), Some(*output));
                    }
                });
            }
        });
    }

    #[test_traced]
    fn test_metrics() {
        let mut builder = Builder::new(Config::default(), PositiveIntOutputs);
        let mut registry = Registry::default();
        builder.register(&mut registry);
        for (key, output) in FIXTURE {
            builder.add(key.as_bytes(), *output).unwrap();
        }
        assert_eq!(builder.num_bytes(), builder.writer.store.position());
        let fst = {
            let mut buffer = String::new();
            encode(&mut buffer, &registry).unwrap();
            assert!(buffer.contains("nodes_total"));
            assert!(buffer.contains("deduplicated_total"));
            builder.finish().unwrap().unwrap()
        };

        // Counters are shared with the registry, so they reflect the finished build.
        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains(&format!("bytes {}", fst.num_bytes())));
        assert!(buffer.contains("deduplicated_total 3"));
    }
}
