//! The compiled, immutable automaton.
//!
//! An [Fst] never decodes more than the arcs a traversal asks for: every read takes a caller
//! owned [Arc] to decode into and a [FstReader] positioned by the read itself. Readers are cheap
//! to create and hold the only mutable state of a traversal, so a single [Fst] can be shared by
//! any number of threads, each with its own reader.

use crate::{
    arc::{Address, Arc, Label, FINAL_END_NODE, NON_FINAL_END_NODE, BIT_FINAL_ARC, BIT_LAST_ARC},
    enumerator::Enumerator,
    input::{InputType, Symbol},
    outputs::Outputs,
    reader::{BytesReader, FstReader, ReverseReader},
    source::{RandomAccess, SourceReader},
    store::ByteStore,
    Error,
};
use bytes::Bytes;
use std::sync;

mod decode;
mod format;
mod util;

pub(crate) use decode::Decoder;

/// Where the node bytes of an [Fst] live.
pub(crate) enum Nodes {
    /// Built in memory.
    Store(ByteStore),
    /// Loaded into a contiguous buffer.
    Flat(Bytes),
    /// A window of an external source, read on demand.
    Source {
        source: sync::Arc<dyn RandomAccess>,
        offset: u64,
        len: u64,
    },
}

/// A finite state transducer mapping keys to outputs of type `O::Value`.
pub struct Fst<O: Outputs> {
    input_type: InputType,
    outputs: O,
    start_node: Address,
    empty_output: Option<O::Value>,
    nodes: Nodes,
}

impl<O: Outputs> Fst<O> {
    pub(crate) fn new(
        input_type: InputType,
        outputs: O,
        start_node: Address,
        empty_output: Option<O::Value>,
        nodes: Nodes,
    ) -> Self {
        Self {
            input_type,
            outputs,
            start_node,
            empty_output,
            nodes,
        }
    }

    /// How labels are encoded.
    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    /// The output algebra.
    pub fn outputs(&self) -> &O {
        &self.outputs
    }

    /// Address of the root node (`0` if the root has no arcs).
    pub fn start_node(&self) -> Address {
        self.start_node
    }

    /// The output of the empty key, if it is accepted.
    pub fn empty_output(&self) -> Option<&O::Value> {
        self.empty_output.as_ref()
    }

    /// Number of bytes of encoded nodes.
    pub fn num_bytes(&self) -> u64 {
        match &self.nodes {
            Nodes::Store(store) => store.position(),
            Nodes::Flat(bytes) => bytes.len() as u64,
            Nodes::Source { len, .. } => *len,
        }
    }

    pub(crate) fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    /// A new reader over the node bytes.
    pub fn reader(&self) -> FstReader<'_> {
        match &self.nodes {
            Nodes::Store(store) => store.reverse_reader(),
            Nodes::Flat(bytes) => FstReader::Array(ReverseReader::new(bytes)),
            Nodes::Source {
                source,
                offset,
                len,
            } => FstReader::Source(SourceReader::reverse(source.clone(), *offset, *len)),
        }
    }

    fn decoder(&self) -> Decoder<'_, O> {
        Decoder::new(self.input_type, &self.outputs)
    }

    /// Initialize `arc` as the pseudo-arc leading to the root node.
    pub fn first_arc<'a>(&self, arc: &'a mut Arc<O::Value>) -> &'a mut Arc<O::Value> {
        let no_output = self.outputs.no_output();
        match &self.empty_output {
            Some(output) => {
                arc.flags = BIT_FINAL_ARC | BIT_LAST_ARC;
                arc.next_final_output = output.clone();
            }
            None => {
                arc.flags = BIT_LAST_ARC;
                arc.next_final_output = no_output.clone();
            }
        }
        arc.output = no_output;
        arc.target = match self.start_node {
            0 if self.empty_output.is_some() => FINAL_END_NODE,
            0 => NON_FINAL_END_NODE,
            start => start,
        };
        arc.node_flags = arc.flags;
        arc.bytes_per_arc = 0;
        arc
    }

    /// Read the first arc leaving the target of `follow` into `arc`.
    ///
    /// If `follow` is final, this is a pseudo-arc with label [crate::END_LABEL] carrying the final
    /// output, followed by the real arcs (if any).
    pub fn read_first_target_arc<R: BytesReader + ?Sized>(
        &self,
        follow: &Arc<O::Value>,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_first_target_arc(follow, arc, reader)
    }

    /// Read the first real arc of the node at `node` into `arc`.
    pub fn read_first_real_target_arc<R: BytesReader + ?Sized>(
        &self,
        node: Address,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_first_real_target_arc(node, arc, reader)
    }

    /// Advance `arc` to the next arc of its node.
    ///
    /// # Panics
    ///
    /// Panics if `arc` is the last arc of its node.
    pub fn read_next_arc<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_next_arc(arc, reader)
    }

    /// Advance `arc` (which must be a real arc) to the next real arc of its node.
    pub fn read_next_real_arc<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_next_real_arc(arc, reader)
    }

    /// Read the last arc leaving the target of `follow` into `arc`.
    pub fn read_last_target_arc<R: BytesReader + ?Sized>(
        &self,
        follow: &Arc<O::Value>,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_last_target_arc(follow, arc, reader)
    }

    /// The label of the arc after `arc`, without advancing.
    pub fn read_next_arc_label<R: BytesReader + ?Sized>(
        &self,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<Label, Error> {
        self.decoder().read_next_arc_label(arc, reader)
    }

    /// Read the arc at `idx` of the binary search node `arc` belongs to.
    pub fn read_arc_by_index<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        idx: u32,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_arc_by_index(arc, idx, reader)
    }

    /// Read the arc at label offset `range_index` of the direct addressing node `arc` belongs
    /// to. The label must be present.
    pub fn read_arc_by_direct_addressing<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        range_index: i32,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder()
            .read_arc_by_direct_addressing(arc, range_index, reader)
    }

    /// Read the arc with the largest label of the direct addressing node `arc` belongs to.
    pub fn read_last_arc_by_direct_addressing<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        self.decoder().read_last_arc_by_direct_addressing(arc, reader)
    }

    /// Find the arc with `label` leaving the target of `follow`, decoding it into `arc`.
    ///
    /// Returns `false` if there is none, in which case `arc` is unspecified.
    pub fn find_target_arc<R: BytesReader + ?Sized>(
        &self,
        label: Label,
        follow: &Arc<O::Value>,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<bool, Error> {
        self.decoder().find_target_arc(label, follow, arc, reader)
    }

    pub(crate) fn binary_search<R: BytesReader + ?Sized>(
        &self,
        arc: &Arc<O::Value>,
        label: Label,
        reader: &mut R,
    ) -> Result<Result<u32, u32>, Error> {
        self.decoder().binary_search(arc, label, reader)
    }

    pub(crate) fn is_bit_set<R: BytesReader + ?Sized>(
        &self,
        index: i32,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<bool, Error> {
        self.decoder().is_bit_set(index, arc, reader)
    }

    pub(crate) fn next_bit_set<R: BytesReader + ?Sized>(
        &self,
        index: i32,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<Option<i32>, Error> {
        self.decoder().next_bit_set(index, arc, reader)
    }

    pub(crate) fn previous_bit_set<R: BytesReader + ?Sized>(
        &self,
        index: i32,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<Option<i32>, Error> {
        self.decoder().previous_bit_set(index, arc, reader)
    }

    /// The output of `key`, if it is accepted.
    ///
    /// A key with a symbol that no [crate::InputType] can encode is never accepted.
    pub fn get<K: Symbol>(&self, key: &[K]) -> Result<Option<O::Value>, Error> {
        let mut reader = self.reader();
        let mut follow = Arc::new(self.outputs.no_output());
        let mut arc = follow.clone();
        self.first_arc(&mut follow);

        let mut output = self.outputs.no_output();
        for symbol in key {
            let Some(label) = symbol.to_label() else {
                return Ok(None);
            };
            if !self.find_target_arc(label, &follow, &mut arc, &mut reader)? {
                return Ok(None);
            }
            output = self.outputs.add(&output, &arc.output);
            std::mem::swap(&mut follow, &mut arc);
        }
        if !follow.is_final() {
            return Ok(None);
        }
        Ok(Some(self.outputs.add(&output, &follow.next_final_output)))
    }

    /// Whether `key` is accepted.
    pub fn contains<K: Symbol>(&self, key: &[K]) -> Result<bool, Error> {
        Ok(self.get(key)?.is_some())
    }

    /// A new [Enumerator] over the keys of this FST.
    pub fn enumerator<K: Symbol>(&self) -> Enumerator<'_, O, K> {
        Enumerator::new(self)
    }
}
