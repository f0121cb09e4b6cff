//! Deduplication of frozen nodes.
//!
//! [NodeHash] is an open addressing table of node addresses keyed by a structural hash of each
//! node's arcs. Before a frontier node is written, the table is probed for an equal node that
//! was already written; if one is found its address is reused and the node is never written.
//! Candidates are verified by decoding them from the store, so the table holds nothing but
//! addresses.
//!
//! Outputs are hashed through their encoding with CRC32, so the hash of a node depends only on
//! the bytes it is written as.

use super::{node::UnCompiledNode, writer::NodeWriter};
use crate::{
    arc::{Address, Arc, Label, ARCS_FOR_BINARY_SEARCH, ARCS_FOR_DIRECT_ADDRESSING},
    automaton::Decoder,
    data::DataOutput,
    outputs::Outputs,
    Error,
};
use crc32fast::Hasher;

const INITIAL_SIZE: usize = 16;

const PRIME: i64 = 31;

/// Bonus added to the hash for final arcs.
const FINAL_BONUS: i64 = 17;

impl DataOutput for Hasher {
    fn write_byte(&mut self, b: u8) {
        self.update(&[b]);
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.update(b);
    }
}

fn hash_value<O: Outputs>(outputs: &O, value: &O::Value) -> i64 {
    let mut hasher = Hasher::new();
    outputs.write(value, &mut hasher);
    hasher.finalize() as i64
}

/// Fold one arc into a running node hash.
fn hash_arc<O: Outputs>(
    outputs: &O,
    h: i64,
    label: Label,
    target: Address,
    output: &O::Value,
    next_final_output: &O::Value,
    is_final: bool,
) -> i64 {
    let mut h = h.wrapping_mul(PRIME).wrapping_add(label as i64);
    h = h.wrapping_mul(PRIME).wrapping_add(target);
    h = h.wrapping_mul(PRIME).wrapping_add(hash_value(outputs, output));
    h = h.wrapping_mul(PRIME).wrapping_add(hash_value(outputs, next_final_output));
    if is_final {
        h = h.wrapping_add(FINAL_BONUS);
    }
    h
}

/// Hash of a frontier node (all targets compiled).
fn hash_node<O: Outputs>(outputs: &O, node: &UnCompiledNode<O::Value>) -> u64 {
    let h = node.arcs.iter().fold(0i64, |h, arc| {
        hash_arc(
            outputs,
            h,
            arc.label,
            arc.target.address(),
            &arc.output,
            &arc.next_final_output,
            arc.is_final,
        )
    });
    (h & i64::MAX) as u64
}

/// Hash of the node written at `address`, equal to [hash_node] of the node it was written from.
fn hash_frozen<O: Outputs>(writer: &NodeWriter<O>, address: Address) -> Result<u64, Error> {
    let decoder = Decoder::new(writer.input_type(), writer.outputs());
    let mut reader = writer.store.reverse_reader();
    let mut arc = Arc::new(writer.outputs().no_output());
    decoder.read_first_real_target_arc(address, &mut arc, &mut reader)?;
    let mut h = 0i64;
    loop {
        h = hash_arc(
            writer.outputs(),
            h,
            arc.label,
            arc.target,
            &arc.output,
            &arc.next_final_output,
            arc.is_final(),
        );
        if arc.is_last() {
            break;
        }
        decoder.read_next_real_arc(&mut arc, &mut reader)?;
    }
    Ok((h & i64::MAX) as u64)
}

/// Whether the node written at `address` has exactly the arcs of `node`.
fn nodes_equal<O: Outputs>(
    writer: &NodeWriter<O>,
    node: &UnCompiledNode<O::Value>,
    address: Address,
) -> Result<bool, Error> {
    let decoder = Decoder::new(writer.input_type(), writer.outputs());
    let mut reader = writer.store.reverse_reader();
    let mut arc = Arc::new(writer.outputs().no_output());
    decoder.read_first_real_target_arc(address, &mut arc, &mut reader)?;

    // Fixed length nodes can be rejected from their header.
    let num_arcs = node.arcs.len();
    if arc.bytes_per_arc != 0 {
        match arc.node_flags {
            ARCS_FOR_BINARY_SEARCH => {
                if num_arcs != arc.num_arcs as usize {
                    return Ok(false);
                }
            }
            ARCS_FOR_DIRECT_ADDRESSING => {
                let range = node.arcs[num_arcs - 1].label - node.arcs[0].label + 1;
                if range != arc.num_arcs as Label
                    || num_arcs != decoder.count_bits(&arc, &mut reader)? as usize
                {
                    return Ok(false);
                }
            }
            _ => {}
        }
    }

    for (idx, pending) in node.arcs.iter().enumerate() {
        if pending.label != arc.label
            || pending.output != arc.output
            || pending.target.address() != arc.target
            || pending.next_final_output != arc.next_final_output
            || pending.is_final != arc.is_final()
        {
            return Ok(false);
        }
        if arc.is_last() {
            return Ok(idx == num_arcs - 1);
        }
        decoder.read_next_real_arc(&mut arc, &mut reader)?;
    }
    Ok(false)
}

/// Table of written nodes, keyed by structure.
pub(crate) struct NodeHash {
    table: Vec<Address>,
    mask: usize,
    count: usize,
}

impl NodeHash {
    pub fn new() -> Self {
        Self {
            table: vec![0; INITIAL_SIZE],
            mask: INITIAL_SIZE - 1,
            count: 0,
        }
    }

    /// Number of distinct nodes in the table.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Return the address of a written node equal to `node`, writing `node` if there is none.
    pub fn add<O: Outputs>(
        &mut self,
        writer: &mut NodeWriter<O>,
        node: &UnCompiledNode<O::Value>,
    ) -> Result<Address, Error> {
        let h = hash_node(writer.outputs(), node);
        let mut pos = h as usize & self.mask;
        let mut probes = 0;
        loop {
            let candidate = self.table[pos];
            if candidate == 0 {
                let address = writer.add_node(node);
                if cfg!(debug_assertions) {
                    assert_eq!(hash_frozen(writer, address)?, h, "frozen node hash mismatch");
                }
                self.table[pos] = address;
                self.count += 1;
                if self.count > 2 * self.table.len() / 3 {
                    self.rehash(writer)?;
                }
                return Ok(address);
            }
            if nodes_equal(writer, node, candidate)? {
                return Ok(candidate);
            }

            // Quadratic probing.
            probes += 1;
            pos = (pos + probes) & self.mask;
        }
    }

    fn rehash<O: Outputs>(&mut self, writer: &NodeWriter<O>) -> Result<(), Error> {
        let size = self.table.len() * 2;
        let old = std::mem::replace(&mut self.table, vec![0; size]);
        self.mask = size - 1;
        for address in old.into_iter().filter(|address| *address != 0) {
            let mut pos = hash_frozen(writer, address)? as usize & self.mask;
            let mut probes = 0;
            while self.table[pos] != 0 {
                probes += 1;
                pos = (pos + probes) & self.mask;
            }
            self.table[pos] = address;
        }
        Ok(())
    }
}
