//! Decoding of arcs out of encoded node bytes.
//!
//! Shared by [crate::Fst] and by the builder, which decodes frozen nodes to check candidates for
//! suffix sharing.

use crate::{
    arc::*,
    bits,
    input::InputType,
    outputs::Outputs,
    reader::BytesReader,
    Error,
};

/// Reads arcs of an encoding with a given input type and outputs.
pub(crate) struct Decoder<'a, O: Outputs> {
    input_type: InputType,
    outputs: &'a O,
}

impl<'a, O: Outputs> Decoder<'a, O> {
    pub fn new(input_type: InputType, outputs: &'a O) -> Self {
        Self {
            input_type,
            outputs,
        }
    }

    pub fn read_label<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<Label, Error> {
        Ok(match self.input_type {
            InputType::Byte1 => reader.read_byte()? as Label,
            InputType::Byte2 => reader.read_short()? as Label,
            InputType::Byte4 => reader.read_vint()? as Label,
        })
    }

    /// Read the first arc leaving the target of `follow`, synthesizing an [END_LABEL] arc if
    /// `follow` is final.
    pub fn read_first_target_arc<R: BytesReader + ?Sized>(
        &self,
        follow: &Arc<O::Value>,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        if !follow.is_final() {
            return self.read_first_real_target_arc(follow.target, arc, reader);
        }
        arc.label = END_LABEL;
        arc.output = follow.next_final_output.clone();
        arc.next_final_output = self.outputs.no_output();
        arc.flags = BIT_FINAL_ARC;
        if follow.target <= 0 {
            arc.flags |= BIT_LAST_ARC;
        } else {
            // The real arcs follow the pseudo arc.
            arc.next_arc = follow.target;
        }
        arc.target = FINAL_END_NODE;
        arc.node_flags = arc.flags;
        arc.bytes_per_arc = 0;
        Ok(())
    }

    /// Read the first real arc of the node at `node`.
    pub fn read_first_real_target_arc<R: BytesReader + ?Sized>(
        &self,
        node: Address,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        let address = u64::try_from(node).map_err(|_| Error::CorruptNode(0))?;
        reader.set_position(address);
        let flags = reader.read_byte()?;
        arc.node_flags = flags;
        if flags == ARCS_FOR_BINARY_SEARCH || flags == ARCS_FOR_DIRECT_ADDRESSING {
            arc.num_arcs = reader.read_vint()?;
            arc.bytes_per_arc = reader.read_vint()?;
            if arc.num_arcs == 0 || arc.bytes_per_arc == 0 {
                return Err(Error::CorruptNode(address));
            }
            arc.arc_idx = -1;
            if flags == ARCS_FOR_DIRECT_ADDRESSING {
                arc.bit_table_start = reader.position();
                reader.skip_bytes(bits::presence_bytes(arc.num_arcs) as i64);
                arc.first_label = self.read_label(reader)?;
                arc.presence_index = -1;
            }
            arc.pos_arcs_start = reader.position();
        } else {
            arc.next_arc = node;
            arc.bytes_per_arc = 0;
        }
        self.read_next_real_arc(arc, reader)
    }

    /// Read the arc following `arc` in its node.
    ///
    /// # Panics
    ///
    /// Panics if `arc` is the last arc of its node.
    pub fn read_next_arc<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        if arc.label == END_LABEL {
            assert!(arc.next_arc > 0, "cannot read past the last arc");
            let node = arc.next_arc;
            self.read_first_real_target_arc(node, arc, reader)
        } else {
            self.read_next_real_arc(arc, reader)
        }
    }

    /// Read the real arc following `arc` (which must not be an [END_LABEL] arc).
    pub fn read_next_real_arc<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        match arc.node_flags {
            ARCS_FOR_BINARY_SEARCH => {
                assert!(
                    arc.arc_idx + 1 < arc.num_arcs as i32,
                    "cannot read past the last arc"
                );
                arc.arc_idx += 1;
                reader.set_position(arc_position(arc, arc.arc_idx as u32));
                arc.flags = reader.read_byte()?;
            }
            ARCS_FOR_DIRECT_ADDRESSING => {
                let next = self
                    .next_bit_set(arc.arc_idx, arc, reader)?
                    .ok_or(Error::CorruptNode(arc.pos_arcs_start))?;
                return self.read_arc_by_direct_addressing(arc, next, reader);
            }
            _ => {
                reader.set_position(arc.next_arc as u64);
                arc.flags = reader.read_byte()?;
            }
        }
        self.read_arc(arc, reader)
    }

    /// Read the arc at index `idx` of a binary search node.
    pub fn read_arc_by_index<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        idx: u32,
        reader: &mut R,
    ) -> Result<(), Error> {
        debug_assert_eq!(arc.node_flags, ARCS_FOR_BINARY_SEARCH);
        debug_assert!(idx < arc.num_arcs);
        arc.arc_idx = idx as i32;
        reader.set_position(arc_position(arc, idx));
        arc.flags = reader.read_byte()?;
        self.read_arc(arc, reader)
    }

    /// Read the arc with label `first_label + range_index` of a direct addressing node (the
    /// label must be present).
    pub fn read_arc_by_direct_addressing<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        range_index: i32,
        reader: &mut R,
    ) -> Result<(), Error> {
        reader.set_position(arc.bit_table_start);
        let presence_index = bits::count_bits_up_to(range_index as u32, reader)?;
        self.read_arc_at_presence_index(arc, range_index, presence_index, reader)
    }

    /// Read the arc with the largest label of a direct addressing node.
    pub fn read_last_arc_by_direct_addressing<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        let presence_index = self.count_bits(arc, reader)? - 1;
        let range_index = arc.num_arcs as i32 - 1;
        self.read_arc_at_presence_index(arc, range_index, presence_index, reader)
    }

    fn read_arc_at_presence_index<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        range_index: i32,
        presence_index: u32,
        reader: &mut R,
    ) -> Result<(), Error> {
        reader.set_position(arc_position(arc, presence_index));
        arc.arc_idx = range_index;
        arc.presence_index = presence_index as i32;
        arc.flags = reader.read_byte()?;
        self.read_arc(arc, reader)
    }

    /// Decode the rest of an arc whose flags were just read.
    fn read_arc<R: BytesReader + ?Sized>(
        &self,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        arc.label = if arc.node_flags == ARCS_FOR_DIRECT_ADDRESSING {
            arc.first_label + arc.arc_idx
        } else {
            self.read_label(reader)?
        };
        arc.output = if arc.flag(BIT_ARC_HAS_OUTPUT) {
            self.outputs.read(reader)?
        } else {
            self.outputs.no_output()
        };
        arc.next_final_output = if arc.flag(BIT_ARC_HAS_FINAL_OUTPUT) {
            self.outputs.read_final_output(reader)?
        } else {
            self.outputs.no_output()
        };

        if arc.flag(BIT_STOP_NODE) {
            arc.target = if arc.flag(BIT_FINAL_ARC) {
                FINAL_END_NODE
            } else {
                NON_FINAL_END_NODE
            };
            arc.next_arc = reader.position() as Address;
        } else if arc.flag(BIT_TARGET_NEXT) {
            arc.next_arc = reader.position() as Address;

            // The target is the node written just before this one, so it starts right after the
            // last arc of this node.
            if !arc.is_last() {
                if arc.bytes_per_arc == 0 {
                    self.seek_to_next_node(reader)?;
                } else {
                    let num_arcs = if arc.node_flags == ARCS_FOR_DIRECT_ADDRESSING {
                        self.count_bits(arc, reader)?
                    } else {
                        arc.num_arcs
                    };
                    reader.set_position(arc_position(arc, num_arcs));
                }
            }
            arc.target = reader.position() as Address;
        } else {
            arc.target = reader.read_vlong()? as Address;
            arc.next_arc = reader.position() as Address;
        }
        Ok(())
    }

    /// Skip over the remaining arcs of a list node.
    fn seek_to_next_node<R: BytesReader + ?Sized>(&self, reader: &mut R) -> Result<(), Error> {
        loop {
            let flags = reader.read_byte()?;
            self.read_label(reader)?;
            if flags & BIT_ARC_HAS_OUTPUT != 0 {
                self.outputs.skip_output(reader)?;
            }
            if flags & BIT_ARC_HAS_FINAL_OUTPUT != 0 {
                self.outputs.skip_final_output(reader)?;
            }
            if flags & BIT_STOP_NODE == 0 && flags & BIT_TARGET_NEXT == 0 {
                reader.read_vlong()?;
            }
            if flags & BIT_LAST_ARC != 0 {
                return Ok(());
            }
        }
    }

    /// Read the last arc leaving the target of `follow` (an [END_LABEL] arc if the target has
    /// no arcs).
    pub fn read_last_target_arc<R: BytesReader + ?Sized>(
        &self,
        follow: &Arc<O::Value>,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<(), Error> {
        if !follow.target_has_arcs() {
            debug_assert!(follow.is_final());
            arc.label = END_LABEL;
            arc.target = FINAL_END_NODE;
            arc.output = follow.next_final_output.clone();
            arc.next_final_output = self.outputs.no_output();
            arc.flags = BIT_LAST_ARC;
            arc.node_flags = arc.flags;
            arc.bytes_per_arc = 0;
            return Ok(());
        }

        let address = follow.target as u64;
        reader.set_position(address);
        let flags = reader.read_byte()?;
        arc.node_flags = flags;
        if flags == ARCS_FOR_BINARY_SEARCH || flags == ARCS_FOR_DIRECT_ADDRESSING {
            arc.num_arcs = reader.read_vint()?;
            arc.bytes_per_arc = reader.read_vint()?;
            if arc.num_arcs == 0 || arc.bytes_per_arc == 0 {
                return Err(Error::CorruptNode(address));
            }
            if flags == ARCS_FOR_DIRECT_ADDRESSING {
                arc.bit_table_start = reader.position();
                reader.skip_bytes(bits::presence_bytes(arc.num_arcs) as i64);
                arc.first_label = self.read_label(reader)?;
                arc.pos_arcs_start = reader.position();
                return self.read_last_arc_by_direct_addressing(arc, reader);
            }
            arc.pos_arcs_start = reader.position();
            arc.arc_idx = arc.num_arcs as i32 - 2;
        } else {
            // Scan to the last arc, then step back onto its flags.
            arc.flags = flags;
            arc.bytes_per_arc = 0;
            while !arc.is_last() {
                self.read_label(reader)?;
                if arc.flag(BIT_ARC_HAS_OUTPUT) {
                    self.outputs.skip_output(reader)?;
                }
                if arc.flag(BIT_ARC_HAS_FINAL_OUTPUT) {
                    self.outputs.skip_final_output(reader)?;
                }
                if !arc.flag(BIT_STOP_NODE) && !arc.flag(BIT_TARGET_NEXT) {
                    reader.read_vlong()?;
                }
                arc.flags = reader.read_byte()?;
            }
            reader.skip_bytes(-1);
            arc.next_arc = reader.position() as Address;
        }
        self.read_next_real_arc(arc, reader)
    }

    /// Peek at the label of the arc following `arc` without moving it.
    pub fn read_next_arc_label<R: BytesReader + ?Sized>(
        &self,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<Label, Error> {
        debug_assert!(!arc.is_last());
        if arc.label == END_LABEL {
            // The real arcs of the node follow the pseudo arc.
            let address = arc.next_arc as u64;
            reader.set_position(address);
            let flags = reader.read_byte()?;
            if flags == ARCS_FOR_BINARY_SEARCH || flags == ARCS_FOR_DIRECT_ADDRESSING {
                let num_arcs = reader.read_vint()?;
                reader.read_vint()?;
                if flags == ARCS_FOR_BINARY_SEARCH {
                    // Skip the flags of the first arc.
                    reader.read_byte()?;
                } else {
                    reader.skip_bytes(bits::presence_bytes(num_arcs) as i64);
                }
            }
        } else {
            match arc.node_flags {
                ARCS_FOR_BINARY_SEARCH => {
                    reader.set_position(arc_position(arc, (arc.arc_idx + 1) as u32));
                    reader.skip_bytes(1);
                }
                ARCS_FOR_DIRECT_ADDRESSING => {
                    let next = self
                        .next_bit_set(arc.arc_idx, arc, reader)?
                        .ok_or(Error::CorruptNode(arc.pos_arcs_start))?;
                    return Ok(arc.first_label + next);
                }
                _ => {
                    reader.set_position(arc.next_arc as u64);
                    reader.skip_bytes(1);
                }
            }
        }
        self.read_label(reader)
    }

    /// Binary search the labels of a binary search node, starting at the current arc.
    ///
    /// Returns `Ok(idx)` if an arc has `label`, otherwise `Err(idx)` where `idx` is the index
    /// the label would be inserted at.
    pub fn binary_search<R: BytesReader + ?Sized>(
        &self,
        arc: &Arc<O::Value>,
        label: Label,
        reader: &mut R,
    ) -> Result<Result<u32, u32>, Error> {
        debug_assert_eq!(arc.node_flags, ARCS_FOR_BINARY_SEARCH);
        let mut low = arc.arc_idx.max(0) as u32;
        let mut high = arc.num_arcs;
        while low < high {
            let mid = low + (high - low) / 2;
            reader.set_position(arc_position(arc, mid));
            reader.skip_bytes(1);
            let mid_label = self.read_label(reader)?;
            match mid_label.cmp(&label) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(low))
    }

    /// Find the arc leaving the target of `follow` with `label`.
    ///
    /// Returns `false` (leaving `arc` unspecified) if there is no such arc.
    pub fn find_target_arc<R: BytesReader + ?Sized>(
        &self,
        label: Label,
        follow: &Arc<O::Value>,
        arc: &mut Arc<O::Value>,
        reader: &mut R,
    ) -> Result<bool, Error> {
        if label == END_LABEL {
            if !follow.is_final() {
                return Ok(false);
            }
            arc.label = END_LABEL;
            arc.output = follow.next_final_output.clone();
            arc.next_final_output = self.outputs.no_output();
            arc.flags = BIT_FINAL_ARC;
            if follow.target <= 0 {
                arc.flags |= BIT_LAST_ARC;
            } else {
                arc.next_arc = follow.target;
            }
            arc.target = FINAL_END_NODE;
            arc.node_flags = arc.flags;
            arc.bytes_per_arc = 0;
            return Ok(true);
        }
        if !follow.target_has_arcs() {
            return Ok(false);
        }

        let address = follow.target as u64;
        reader.set_position(address);
        let flags = reader.read_byte()?;
        arc.node_flags = flags;
        if flags == ARCS_FOR_DIRECT_ADDRESSING {
            arc.num_arcs = reader.read_vint()?;
            arc.bytes_per_arc = reader.read_vint()?;
            if arc.num_arcs == 0 || arc.bytes_per_arc == 0 {
                return Err(Error::CorruptNode(address));
            }
            arc.bit_table_start = reader.position();
            reader.skip_bytes(bits::presence_bytes(arc.num_arcs) as i64);
            arc.first_label = self.read_label(reader)?;
            arc.pos_arcs_start = reader.position();

            let range_index = label as i64 - arc.first_label as i64;
            if range_index < 0 || range_index >= arc.num_arcs as i64 {
                return Ok(false);
            }
            let range_index = range_index as i32;
            if !self.is_bit_set(range_index, arc, reader)? {
                return Ok(false);
            }
            self.read_arc_by_direct_addressing(arc, range_index, reader)?;
            return Ok(true);
        }
        if flags == ARCS_FOR_BINARY_SEARCH {
            arc.num_arcs = reader.read_vint()?;
            arc.bytes_per_arc = reader.read_vint()?;
            if arc.num_arcs == 0 || arc.bytes_per_arc == 0 {
                return Err(Error::CorruptNode(address));
            }
            arc.arc_idx = 0;
            arc.pos_arcs_start = reader.position();
            return match self.binary_search(arc, label, reader)? {
                Ok(idx) => {
                    self.read_arc_by_index(arc, idx, reader)?;
                    Ok(true)
                }
                Err(_) => Ok(false),
            };
        }

        // Linear scan of a list node, whose arcs are sorted by label.
        self.read_first_real_target_arc(follow.target, arc, reader)?;
        loop {
            if arc.label == label {
                return Ok(true);
            }
            if arc.label > label || arc.is_last() {
                return Ok(false);
            }
            self.read_next_real_arc(arc, reader)?;
        }
    }

    pub fn is_bit_set<R: BytesReader + ?Sized>(
        &self,
        index: i32,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<bool, Error> {
        debug_assert_eq!(arc.node_flags, ARCS_FOR_DIRECT_ADDRESSING);
        reader.set_position(arc.bit_table_start);
        bits::is_bit_set(index as u32, reader)
    }

    pub fn count_bits<R: BytesReader + ?Sized>(
        &self,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<u32, Error> {
        debug_assert_eq!(arc.node_flags, ARCS_FOR_DIRECT_ADDRESSING);
        reader.set_position(arc.bit_table_start);
        bits::count_bits(bits::presence_bytes(arc.num_arcs), reader)
    }

    pub fn next_bit_set<R: BytesReader + ?Sized>(
        &self,
        index: i32,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<Option<i32>, Error> {
        debug_assert_eq!(arc.node_flags, ARCS_FOR_DIRECT_ADDRESSING);
        reader.set_position(arc.bit_table_start);
        bits::next_bit_set(index, bits::presence_bytes(arc.num_arcs), reader)
    }

    pub fn previous_bit_set<R: BytesReader + ?Sized>(
        &self,
        index: i32,
        arc: &Arc<O::Value>,
        reader: &mut R,
    ) -> Result<Option<i32>, Error> {
        debug_assert_eq!(arc.node_flags, ARCS_FOR_DIRECT_ADDRESSING);
        reader.set_position(arc.bit_table_start);
        bits::previous_bit_set(index as u32, reader)
    }
}

/// Position of the `idx`th fixed length arc of the node `arc` belongs to.
fn arc_position<T>(arc: &Arc<T>, idx: u32) -> u64 {
    arc.pos_arcs_start
        .wrapping_sub(idx as u64 * arc.bytes_per_arc as u64)
}
