//! Encoding of frozen nodes into the byte store.
//!
//! A node is first appended as a list of variable length arcs. Nodes with many arcs (or with
//! several arcs close to the root) are then expanded in place to fixed length arcs, either for
//! binary search or, when the labels are dense enough, for direct addressing. Finally the span
//! of the node is reversed so that readers walking backwards decode it in write order.

use super::{
    metrics::Metrics,
    node::UnCompiledNode,
};
use crate::{
    arc::*,
    bits,
    data::DataOutput,
    input::InputType,
    outputs::Outputs,
    store::ByteStore,
};
use tracing::trace;

/// Nodes at most this deep get fixed length arcs with [FIXED_LENGTH_ARC_SHALLOW_NUM_ARCS] arcs.
const FIXED_LENGTH_ARC_SHALLOW_DEPTH: usize = 3;

const FIXED_LENGTH_ARC_SHALLOW_NUM_ARCS: usize = 5;

/// Nodes at any depth get fixed length arcs with this many arcs.
const FIXED_LENGTH_ARC_DEEP_NUM_ARCS: usize = 10;

/// Direct addressing may exceed the binary search size by at most this factor, and only while
/// earlier nodes saved enough.
const DIRECT_ADDRESSING_MAX_OVERSIZE_WITH_CREDIT_FACTOR: f32 = 1.66;

/// Longest node header (flag byte and two vints).
const MAX_HEADER_SIZE: usize = 11;

/// Writes [UnCompiledNode]s into a [ByteStore].
pub(crate) struct NodeWriter<O: Outputs> {
    pub store: ByteStore,
    outputs: O,
    no_output: O::Value,
    input_type: InputType,
    allow_fixed_length_arcs: bool,
    direct_addressing_max_oversizing_factor: f32,

    /// Address of the last node written (or the terminal sentinel last compiled).
    pub last_frozen_node: Address,

    // Per-arc sizes of the node being written, recorded when it gets fixed length arcs.
    num_bytes_per_arc: Vec<usize>,
    num_label_bytes_per_arc: Vec<usize>,
    scratch: Vec<u8>,

    // Bytes saved by direct addressing nodes smaller than their binary search encoding, which
    // may be spent on direct addressing nodes that are larger.
    direct_addressing_expansion_credit: i64,

    pub metrics: Metrics,
}

impl<O: Outputs> NodeWriter<O> {
    pub fn new(
        outputs: O,
        input_type: InputType,
        block_bits: u32,
        allow_fixed_length_arcs: bool,
        direct_addressing_max_oversizing_factor: f32,
    ) -> Self {
        let mut store = ByteStore::new(block_bits);

        // Pad so that no node is written at address 0.
        store.write_byte(0);
        let no_output = outputs.no_output();
        Self {
            store,
            outputs,
            no_output,
            input_type,
            allow_fixed_length_arcs,
            direct_addressing_max_oversizing_factor,
            last_frozen_node: 0,
            num_bytes_per_arc: Vec::new(),
            num_label_bytes_per_arc: Vec::new(),
            scratch: Vec::new(),
            direct_addressing_expansion_credit: 0,
            metrics: Metrics::default(),
        }
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    fn write_label(&mut self, label: Label) {
        debug_assert!((0..=self.input_type.max_label()).contains(&label));
        match self.input_type {
            InputType::Byte1 => self.store.write_byte(label as u8),
            InputType::Byte2 => self.store.write_short(label as u16),
            InputType::Byte4 => self.store.write_vint(label as u32),
        }
    }

    fn should_expand_with_fixed_length_arcs(&self, node: &UnCompiledNode<O::Value>) -> bool {
        self.allow_fixed_length_arcs
            && ((node.depth <= FIXED_LENGTH_ARC_SHALLOW_DEPTH
                && node.arcs.len() >= FIXED_LENGTH_ARC_SHALLOW_NUM_ARCS)
                || node.arcs.len() >= FIXED_LENGTH_ARC_DEEP_NUM_ARCS)
    }

    /// Decide between direct addressing and binary search, spending or earning credit.
    fn should_expand_with_direct_addressing(
        &mut self,
        num_arcs: usize,
        max_bytes_per_arc: usize,
        max_bytes_per_arc_without_label: usize,
        label_range: u32,
    ) -> bool {
        let size_for_binary_search = (max_bytes_per_arc * num_arcs) as i64;
        let size_for_direct_addressing = bits::presence_bytes(label_range) as i64
            + self.num_label_bytes_per_arc[0] as i64
            + (max_bytes_per_arc_without_label * num_arcs) as i64;
        let allowed_oversize = (size_for_binary_search as f32
            * self.direct_addressing_max_oversizing_factor) as i64;
        let expansion_cost = size_for_direct_addressing - allowed_oversize;
        if expansion_cost <= 0
            || (self.direct_addressing_expansion_credit >= expansion_cost
                && size_for_direct_addressing as f32
                    <= allowed_oversize as f32 * DIRECT_ADDRESSING_MAX_OVERSIZE_WITH_CREDIT_FACTOR)
        {
            self.direct_addressing_expansion_credit -= expansion_cost;
            return true;
        }
        false
    }

    /// Write `node` and return its address.
    ///
    /// A node without arcs is not written: its address is [FINAL_END_NODE] or
    /// [NON_FINAL_END_NODE]. Every arc target must be compiled.
    pub fn add_node(&mut self, node: &UnCompiledNode<O::Value>) -> Address {
        if node.arcs.is_empty() {
            return if node.is_final {
                FINAL_END_NODE
            } else {
                NON_FINAL_END_NODE
            };
        }
        let start = self.store.position();
        let num_arcs = node.arcs.len();
        let fixed = self.should_expand_with_fixed_length_arcs(node);
        if fixed {
            self.num_bytes_per_arc.resize(num_arcs, 0);
            self.num_label_bytes_per_arc.resize(num_arcs, 0);
        }
        self.metrics.arcs.inc_by(num_arcs as u64);

        let mut last_arc_start = start;
        let mut max_bytes_per_arc = 0;
        let mut max_bytes_per_arc_without_label = 0;
        for (idx, arc) in node.arcs.iter().enumerate() {
            let target = arc.target.address();
            let mut flags = 0;
            if idx == num_arcs - 1 {
                flags |= BIT_LAST_ARC;
            }
            if self.last_frozen_node == target && !fixed {
                flags |= BIT_TARGET_NEXT;
            }
            if arc.is_final {
                flags |= BIT_FINAL_ARC;
                if arc.next_final_output != self.no_output {
                    flags |= BIT_ARC_HAS_FINAL_OUTPUT;
                }
            } else {
                debug_assert_eq!(arc.next_final_output, self.no_output);
            }
            let target_has_arcs = target > 0;
            if !target_has_arcs {
                flags |= BIT_STOP_NODE;
            }
            if arc.output != self.no_output {
                flags |= BIT_ARC_HAS_OUTPUT;
            }

            self.store.write_byte(flags);
            let label_start = self.store.position();
            self.write_label(arc.label);
            let num_label_bytes = (self.store.position() - label_start) as usize;
            if flags & BIT_ARC_HAS_OUTPUT != 0 {
                self.outputs.write(&arc.output, &mut self.store);
            }
            if flags & BIT_ARC_HAS_FINAL_OUTPUT != 0 {
                self.outputs
                    .write_final_output(&arc.next_final_output, &mut self.store);
            }
            if target_has_arcs && flags & BIT_TARGET_NEXT == 0 {
                self.store.write_vlong(target as u64);
            }

            if fixed {
                let num_arc_bytes = (self.store.position() - last_arc_start) as usize;
                self.num_bytes_per_arc[idx] = num_arc_bytes;
                self.num_label_bytes_per_arc[idx] = num_label_bytes;
                last_arc_start = self.store.position();
                max_bytes_per_arc = max_bytes_per_arc.max(num_arc_bytes);
                max_bytes_per_arc_without_label =
                    max_bytes_per_arc_without_label.max(num_arc_bytes - num_label_bytes);
            }
        }

        if fixed {
            let first = node.arcs[0].label;
            let last = node.arcs[num_arcs - 1].label;
            let label_range = (last - first + 1) as u32;
            if self.should_expand_with_direct_addressing(
                num_arcs,
                max_bytes_per_arc,
                max_bytes_per_arc_without_label,
                label_range,
            ) {
                self.write_direct_addressing(
                    node,
                    start,
                    max_bytes_per_arc_without_label,
                    label_range,
                );
                self.metrics.direct_addressing_nodes.inc();
            } else {
                self.write_binary_search(num_arcs, start, max_bytes_per_arc);
                self.metrics.binary_search_nodes.inc();
            }
        }

        let address = self.store.position() - 1;
        self.store.reverse(start, address);
        self.metrics.nodes.inc();
        self.metrics.bytes.set(self.store.position() as i64);
        trace!(address, arcs = num_arcs, depth = node.depth, "wrote node");
        address as Address
    }

    /// Spread the arcs just written into slots of `max_bytes_per_arc` bytes behind a header.
    fn write_binary_search(&mut self, num_arcs: usize, start: u64, max_bytes_per_arc: usize) {
        let mut header = Vec::with_capacity(MAX_HEADER_SIZE);
        header.write_byte(ARCS_FOR_BINARY_SEARCH);
        header.write_vint(num_arcs as u32);
        header.write_vint(max_bytes_per_arc as u32);

        // Move arcs into their slots, last first, so that no arc is overwritten before it moves.
        let mut src = self.store.position();
        let mut dest = start + (header.len() + num_arcs * max_bytes_per_arc) as u64;
        debug_assert!(dest >= src);
        if dest > src {
            self.store.skip_bytes((dest - src) as usize);
            for idx in (0..num_arcs).rev() {
                dest -= max_bytes_per_arc as u64;
                let arc_len = self.num_bytes_per_arc[idx];
                src -= arc_len as u64;
                if src != dest {
                    self.store.move_bytes(src, dest, arc_len);
                }
            }
        }
        self.store.write_bytes_at(start, &header);
    }

    /// Rewrite the arcs just written without labels (except the first), indexed by label
    /// through a presence bit table.
    fn write_direct_addressing(
        &mut self,
        node: &UnCompiledNode<O::Value>,
        start: u64,
        max_bytes_per_arc_without_label: usize,
        label_range: u32,
    ) {
        let num_arcs = node.arcs.len();
        let num_presence_bytes = bits::presence_bytes(label_range) as usize;
        let first_label_len = self.num_label_bytes_per_arc[0];
        let total_arc_bytes = first_label_len + num_arcs * max_bytes_per_arc_without_label;

        // Collect the arcs, last first, dropping their labels.
        self.scratch.clear();
        self.scratch.resize(total_arc_bytes, 0);
        let mut src = self.store.position();
        let mut offset = total_arc_bytes;
        for idx in (0..num_arcs).rev() {
            offset -= max_bytes_per_arc_without_label;
            let arc_len = self.num_bytes_per_arc[idx];
            src -= arc_len as u64;
            let label_len = self.num_label_bytes_per_arc[idx];
            self.store
                .copy_to_slice(src, &mut self.scratch[offset..offset + 1]);
            let remaining = arc_len - 1 - label_len;
            if remaining > 0 {
                self.store.copy_to_slice(
                    src + 1 + label_len as u64,
                    &mut self.scratch[offset + 1..offset + 1 + remaining],
                );
            }
            if idx == 0 {
                offset -= label_len;
                self.store
                    .copy_to_slice(src + 1, &mut self.scratch[offset..offset + label_len]);
            }
        }
        debug_assert_eq!(offset, 0);

        let mut header = Vec::with_capacity(MAX_HEADER_SIZE);
        header.write_byte(ARCS_FOR_DIRECT_ADDRESSING);
        header.write_vint(label_range);
        header.write_vint(max_bytes_per_arc_without_label as u32);

        // Grow or shrink the node to its final size.
        let node_end = start + (header.len() + num_presence_bytes + total_arc_bytes) as u64;
        let position = self.store.position();
        if node_end >= position {
            self.store.skip_bytes((node_end - position) as usize);
        } else {
            self.store.truncate(node_end);
        }

        let mut write_offset = start;
        self.store.write_bytes_at(write_offset, &header);
        write_offset += header.len() as u64;
        let presence = presence_bits(node, num_presence_bytes);
        self.store.write_bytes_at(write_offset, &presence);
        write_offset += num_presence_bytes as u64;
        self.store.write_bytes_at(write_offset, &self.scratch);
    }
}

/// The presence bit table of a direct addressing node.
fn presence_bits<V>(node: &UnCompiledNode<V>, num_presence_bytes: usize) -> Vec<u8> {
    let mut table = vec![0u8; num_presence_bytes];
    let first = node.arcs[0].label;
    for arc in &node.arcs {
        let index = (arc.label - first) as usize;
        table[index >> 3] |= 1 << (index & 7);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        automaton::Decoder,
        outputs::PositiveIntOutputs,
        reader::BytesReader,
    };

    fn writer(factor: f32) -> NodeWriter<PositiveIntOutputs> {
        NodeWriter::new(PositiveIntOutputs, InputType::Byte1, 15, true, factor)
    }

    /// A node with an arc for each label, leading to the final end node.
    fn leaf_node(labels: &[Label], depth: usize) -> UnCompiledNode<u64> {
        let mut node = UnCompiledNode::new(0, depth);
        for (i, label) in labels.iter().enumerate() {
            node.add_arc(*label, 0);
            node.set_last_output(*label, i as u64 * 3);
            node.replace_last(*label, FINAL_END_NODE, 0, true);
        }
        node
    }

    fn decode_labels(writer: &NodeWriter<PositiveIntOutputs>, address: Address) -> (u8, Vec<(Label, u64)>) {
        let decoder = Decoder::new(InputType::Byte1, &writer.outputs);
        let mut reader = writer.store.reverse_reader();
        let mut arc = Arc::new(0);
        decoder
            .read_first_real_target_arc(address, &mut arc, &mut reader)
            .unwrap();
        let node_flags = arc.node_flags();
        let mut arcs = vec![(arc.label(), *arc.output())];
        while !arc.is_last() {
            decoder.read_next_real_arc(&mut arc, &mut reader).unwrap();
            arcs.push((arc.label(), *arc.output()));
        }
        (node_flags, arcs)
    }

    #[test]
    fn test_list_node() {
        let mut writer = writer(1.0);
        let node = leaf_node(&[b'a' as Label, b'c' as Label], 4);
        let address = writer.add_node(&node);
        assert_eq!(address, writer.store.position() as Address - 1);
        let (flags, arcs) = decode_labels(&writer, address);
        assert_ne!(flags, ARCS_FOR_BINARY_SEARCH);
        assert_ne!(flags, ARCS_FOR_DIRECT_ADDRESSING);
        assert_eq!(arcs, vec![(b'a' as Label, 0), (b'c' as Label, 3)]);

        // Pad byte, then the node reversed: arc `a` (final, stop) and arc `c` (final, stop,
        // last, output 3).
        assert_eq!(writer.store.to_vec(), vec![0, 3, b'c', 27, b'a', 9]);
    }

    #[test]
    fn test_direct_addressing_node() {
        let mut writer = writer(1.0);
        let labels: Vec<Label> = (0..12).map(|i| 40 + i * 2).collect();
        let node = leaf_node(&labels, 1);
        let address = writer.add_node(&node);
        let (flags, arcs) = decode_labels(&writer, address);
        assert_eq!(flags, ARCS_FOR_DIRECT_ADDRESSING);
        let expected: Vec<_> = labels.iter().enumerate().map(|(i, l)| (*l, i as u64 * 3)).collect();
        assert_eq!(arcs, expected);
        assert_eq!(writer.metrics.direct_addressing_nodes.get(), 1);

        // The label range is stored in place of the arc count.
        let mut reader = writer.store.reverse_reader();
        reader.set_position(address as u64);
        assert_eq!(reader.read_byte().unwrap(), ARCS_FOR_DIRECT_ADDRESSING);
        assert_eq!(reader.read_vint().unwrap(), 23);
    }

    #[test]
    fn test_binary_search_node() {
        // Negative factors disable direct addressing.
        let mut writer = writer(-1.0);
        let labels: Vec<Label> = (0..12).map(|i| 40 + i * 2).collect();
        let node = leaf_node(&labels, 1);
        let address = writer.add_node(&node);
        let (flags, arcs) = decode_labels(&writer, address);
        assert_eq!(flags, ARCS_FOR_BINARY_SEARCH);
        let expected: Vec<_> = labels.iter().enumerate().map(|(i, l)| (*l, i as u64 * 3)).collect();
        assert_eq!(arcs, expected);
        assert_eq!(writer.metrics.binary_search_nodes.get(), 1);

        let mut reader = writer.store.reverse_reader();
        reader.set_position(address as u64);
        assert_eq!(reader.read_byte().unwrap(), ARCS_FOR_BINARY_SEARCH);
        assert_eq!(reader.read_vint().unwrap(), 12);
        assert_eq!(reader.read_vint().unwrap(), 3);
    }

    #[test]
    fn test_sparse_labels_use_binary_search() {
        let mut writer = writer(1.0);
        let labels: Vec<Label> = (0..10).map(|i| i * 25).collect();
        let node = leaf_node(&labels, 5);
        let address = writer.add_node(&node);
        let (flags, _) = decode_labels(&writer, address);
        assert_eq!(flags, ARCS_FOR_BINARY_SEARCH);
    }

    #[test]
    fn test_target_next() {
        let mut writer = writer(1.0);
        let child = leaf_node(&[b'x' as Label], 2);
        let child_address = writer.add_node(&child);
        writer.last_frozen_node = child_address;

        let mut parent = UnCompiledNode::new(0, 1);
        parent.add_arc(b'a' as Label, 0);
        parent.replace_last(b'a' as Label, child_address, 0, false);
        let parent_address = writer.add_node(&parent);

        // flags and label only: the target is implied.
        assert_eq!(parent_address - child_address, 2);
        let decoder = Decoder::new(InputType::Byte1, &writer.outputs);
        let mut reader = writer.store.reverse_reader();
        let mut arc = Arc::new(0);
        decoder
            .read_first_real_target_arc(parent_address, &mut arc, &mut reader)
            .unwrap();
        assert!(arc.flag(BIT_TARGET_NEXT));
        assert_eq!(arc.target(), child_address);
    }
}
