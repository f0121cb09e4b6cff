//! Ordered traversal of the keys of an [Fst].
//!
//! An [Enumerator] keeps the path to its current key as a stack of decoded arcs (one per
//! depth, reused across calls) together with the output accumulated up to each depth. Seeks
//! reuse the part of the stack shared with the previous key, so seeking to increasing targets
//! only decodes the arcs that differ.

use crate::{
    arc::{Arc, Label, ARCS_FOR_BINARY_SEARCH, ARCS_FOR_DIRECT_ADDRESSING, END_LABEL},
    automaton::Fst,
    input::Symbol,
    outputs::Outputs,
    reader::FstReader,
    Error,
};

/// Split the arc stack into the arc at `upto - 1` (whose target is being searched) and the arc
/// at `upto` (being positioned).
fn arc_pair<T>(arcs: &mut [Arc<T>], upto: usize) -> (&Arc<T>, &mut Arc<T>) {
    let (head, tail) = arcs.split_at_mut(upto);
    (&head[upto - 1], &mut tail[0])
}

/// Iterates and seeks the keys of an [Fst] in order.
///
/// After a call that returns `None`, the enumerator is unpositioned and the next call to
/// [Enumerator::next] starts over from the smallest key.
pub struct Enumerator<'a, O: Outputs, K: Symbol = u8> {
    fst: &'a Fst<O>,
    reader: FstReader<'a>,

    // `arcs[0]` is the pseudo-arc into the root. When positioned, `arcs[upto]` is the end arc
    // of the current key and `arcs[1..upto]` spell it.
    arcs: Vec<Arc<O::Value>>,
    output: Vec<O::Value>,
    upto: usize,

    current: Vec<K>,
    target: Vec<Label>,

    // Whether the target continues past `target` with a symbol larger than every label.
    beyond: bool,
}

impl<'a, O: Outputs, K: Symbol> Enumerator<'a, O, K> {
    /// Create an unpositioned enumerator over `fst`.
    pub fn new(fst: &'a Fst<O>) -> Self {
        let no_output = fst.outputs().no_output();
        let mut root = Arc::new(no_output.clone());
        fst.first_arc(&mut root);
        Self {
            fst,
            reader: fst.reader(),
            arcs: vec![root, Arc::new(no_output.clone())],
            output: vec![no_output.clone(), no_output],
            upto: 0,
            current: Vec::new(),
            target: Vec::new(),
            beyond: false,
        }
    }

    /// The current key and its output, if positioned.
    pub fn current(&self) -> Option<(&[K], &O::Value)> {
        if self.upto == 0 {
            return None;
        }
        Some((&self.current[..self.upto - 1], &self.output[self.upto]))
    }

    /// Advance to the next key (the smallest key if unpositioned).
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<(&[K], &O::Value)>, Error> {
        if self.upto == 0 {
            self.upto = 1;
            let (root, arc) = arc_pair(&mut self.arcs, 1);
            self.fst.read_first_target_arc(root, arc, &mut self.reader)?;
            self.push_first()?;
        } else {
            self.advance()?;
        }
        Ok(self.current())
    }

    /// Position on `target` if it is a key.
    pub fn seek_exact(&mut self, target: &[K]) -> Result<Option<(&[K], &O::Value)>, Error> {
        self.set_target(target);
        if self.beyond {
            self.upto = 0;
            return Ok(None);
        }
        self.rewind_prefix()?;
        loop {
            let label = self.target_label();
            let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
            if !self
                .fst
                .find_target_arc(label, follow, arc, &mut self.reader)?
            {
                self.upto = 0;
                return Ok(None);
            }
            self.accumulate();
            if label == END_LABEL {
                return Ok(self.current());
            }
            self.set_current_label(label);
            self.incr();
        }
    }

    /// Position on the smallest key greater than or equal to `target`.
    pub fn seek_ceil(&mut self, target: &[K]) -> Result<Option<(&[K], &O::Value)>, Error> {
        self.set_target(target);
        self.rewind_prefix()?;
        loop {
            if self.beyond_target() {
                // Every key below this node is smaller.
                self.upto -= 1;
                if self.upto > 0 {
                    self.advance()?;
                }
                return Ok(self.current());
            }
            let label = self.target_label();
            if !self.ceil_arc(label)? {
                // Every key below this node is smaller: continue after the parent arc.
                self.upto -= 1;
                if self.upto > 0 {
                    self.advance()?;
                }
                return Ok(self.current());
            }
            if self.arcs[self.upto].label != label {
                self.push_first()?;
                return Ok(self.current());
            }
            self.accumulate();
            if label == END_LABEL {
                return Ok(self.current());
            }
            self.descend(label)?;
        }
    }

    /// Position on the largest key less than or equal to `target`.
    pub fn seek_floor(&mut self, target: &[K]) -> Result<Option<(&[K], &O::Value)>, Error> {
        self.set_target(target);
        self.rewind_prefix()?;
        loop {
            if self.beyond_target() {
                // Every key below this node is smaller: take the largest.
                let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
                self.fst.read_last_target_arc(follow, arc, &mut self.reader)?;
                self.push_last()?;
                return Ok(self.current());
            }
            let label = self.target_label();
            if !self.floor_arc(label)? {
                // Every key below this node is larger.
                self.backtrack_to_floor_arc()?;
                return Ok(self.current());
            }
            if self.arcs[self.upto].label != label {
                self.push_last()?;
                return Ok(self.current());
            }
            self.accumulate();
            if label == END_LABEL {
                return Ok(self.current());
            }
            self.descend(label)?;
        }
    }

    /// Convert `target` to labels, stopping at the first symbol that has no label.
    fn set_target(&mut self, target: &[K]) {
        self.target.clear();
        self.beyond = false;
        for symbol in target {
            match symbol.to_label() {
                Some(label) => self.target.push(label),
                None => {
                    self.beyond = true;
                    break;
                }
            }
        }
    }

    /// Whether the target symbol at depth `upto` is larger than every label.
    fn beyond_target(&self) -> bool {
        self.beyond && self.upto - 1 == self.target.len()
    }

    /// The target label at depth `upto` ([END_LABEL] past the end of the target).
    fn target_label(&self) -> Label {
        match self.target.get(self.upto - 1) {
            Some(label) => *label,
            None => {
                debug_assert_eq!(self.upto - 1, self.target.len());
                END_LABEL
            }
        }
    }

    fn set_current_label(&mut self, label: Label) {
        self.current.truncate(self.upto - 1);
        self.current.push(K::from_label(label));
    }

    fn incr(&mut self) {
        self.upto += 1;
        if self.arcs.len() <= self.upto {
            let no_output = self.fst.outputs().no_output();
            self.arcs.push(Arc::new(no_output.clone()));
            self.output.push(no_output);
        }
    }

    /// Set the output at `upto` from the arc at `upto`.
    fn accumulate(&mut self) {
        self.output[self.upto] = self
            .fst
            .outputs()
            .add(&self.output[self.upto - 1], &self.arcs[self.upto].output);
    }

    /// Follow the matched arc at `upto` (with `label`) to the first arc of its target.
    fn descend(&mut self, label: Label) -> Result<(), Error> {
        self.set_current_label(label);
        self.incr();
        let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
        self.fst.read_first_target_arc(follow, arc, &mut self.reader)
    }

    /// Keep the longest prefix of the current path that matches the target.
    ///
    /// On return, `arcs[1..upto]` match the target and `arcs[upto]` either has a label no
    /// greater than the target label at `upto` or is the first arc of its node.
    fn rewind_prefix(&mut self) -> Result<(), Error> {
        if self.upto == 0 {
            self.upto = 1;
            let (root, arc) = arc_pair(&mut self.arcs, 1);
            return self.fst.read_first_target_arc(root, arc, &mut self.reader);
        }
        let limit = self.upto;
        self.upto = 1;
        while self.upto < limit && self.upto <= self.target.len() + 1 {
            let current = self.arcs[self.upto].label;
            let target = self.target_label();
            if current < target {
                break;
            }
            if current > target {
                let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
                self.fst.read_first_target_arc(follow, arc, &mut self.reader)?;
                break;
            }
            self.upto += 1;
        }
        Ok(())
    }

    /// Move to the next key after the current path, popping exhausted depths.
    fn advance(&mut self) -> Result<(), Error> {
        while self.arcs[self.upto].is_last() {
            self.upto -= 1;
            if self.upto == 0 {
                return Ok(());
            }
        }
        self.fst
            .read_next_arc(&mut self.arcs[self.upto], &mut self.reader)?;
        self.push_first()
    }

    /// Descend from the arc at `upto` along first arcs to the smallest key below it.
    fn push_first(&mut self) -> Result<(), Error> {
        loop {
            self.accumulate();
            let label = self.arcs[self.upto].label;
            if label == END_LABEL {
                return Ok(());
            }
            self.descend(label)?;
        }
    }

    /// Descend from the arc at `upto` along last arcs to the largest key below it.
    fn push_last(&mut self) -> Result<(), Error> {
        loop {
            self.accumulate();
            let label = self.arcs[self.upto].label;
            if label == END_LABEL {
                return Ok(());
            }
            self.set_current_label(label);
            self.incr();
            let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
            self.fst.read_last_target_arc(follow, arc, &mut self.reader)?;
        }
    }

    /// Pop depths until one has an arc smaller than the one on the path, then descend to the
    /// largest key below it. Leaves the enumerator unpositioned if there is none.
    fn backtrack_to_floor_arc(&mut self) -> Result<(), Error> {
        loop {
            self.upto -= 1;
            if self.upto == 0 {
                return Ok(());
            }
            let label = self.arcs[self.upto].label;
            debug_assert_ne!(label, END_LABEL);
            if self.floor_arc(label - 1)? {
                return self.push_last();
            }
        }
    }

    /// Position `arcs[upto]` on the smallest arc with a label of at least `label`, searching
    /// forward from its current position. Returns `false` if every arc is smaller.
    fn ceil_arc(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        if arc.label >= label {
            return Ok(true);
        }
        if arc.label == END_LABEL {
            if arc.is_last() {
                return Ok(false);
            }
            self.fst.read_next_arc(arc, &mut self.reader)?;
            if arc.label >= label {
                return Ok(true);
            }
        }
        let layout = (arc.bytes_per_arc != 0).then_some(arc.node_flags);
        match layout {
            Some(ARCS_FOR_DIRECT_ADDRESSING) => self.ceil_arc_direct(label),
            Some(ARCS_FOR_BINARY_SEARCH) => self.ceil_arc_binary(label),
            _ => self.ceil_arc_list(label),
        }
    }

    fn ceil_arc_direct(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        let range_index = label - arc.first_label;
        if range_index >= arc.num_arcs as i32 {
            return Ok(false);
        }
        let index = if self.fst.is_bit_set(range_index, arc, &mut self.reader)? {
            range_index
        } else {
            match self.fst.next_bit_set(range_index, arc, &mut self.reader)? {
                Some(index) => index,
                None => return Ok(false),
            }
        };
        self.fst
            .read_arc_by_direct_addressing(arc, index, &mut self.reader)?;
        Ok(true)
    }

    fn ceil_arc_binary(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        let index = match self.fst.binary_search(arc, label, &mut self.reader)? {
            Ok(index) => index,
            Err(index) if index < arc.num_arcs => index,
            Err(_) => return Ok(false),
        };
        self.fst.read_arc_by_index(arc, index, &mut self.reader)?;
        Ok(true)
    }

    fn ceil_arc_list(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        loop {
            if arc.is_last() {
                return Ok(false);
            }
            self.fst.read_next_real_arc(arc, &mut self.reader)?;
            if arc.label >= label {
                return Ok(true);
            }
        }
    }

    /// Position `arcs[upto]` on the largest arc with a label of at most `label` (which may be
    /// [END_LABEL]). Returns `false` if every arc is larger.
    fn floor_arc(&mut self, label: Label) -> Result<bool, Error> {
        let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
        if label != END_LABEL && follow.target_has_arcs() {
            self.fst
                .read_first_real_target_arc(follow.target, arc, &mut self.reader)?;
            let layout = (arc.bytes_per_arc != 0).then_some(arc.node_flags);
            let found = match layout {
                Some(ARCS_FOR_DIRECT_ADDRESSING) => self.floor_arc_direct(label)?,
                Some(ARCS_FOR_BINARY_SEARCH) => self.floor_arc_binary(label)?,
                _ => self.floor_arc_list(label)?,
            };
            if found {
                return Ok(true);
            }
        }

        // No real arc qualifies: the key ending at this node is the only candidate.
        let (follow, arc) = arc_pair(&mut self.arcs, self.upto);
        if !follow.is_final() {
            return Ok(false);
        }
        self.fst.read_first_target_arc(follow, arc, &mut self.reader)?;
        Ok(true)
    }

    fn floor_arc_direct(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        let range_index = label - arc.first_label;
        if range_index < 0 {
            return Ok(false);
        }
        if range_index >= arc.num_arcs as i32 {
            self.fst
                .read_last_arc_by_direct_addressing(arc, &mut self.reader)?;
            return Ok(true);
        }
        let index = if self.fst.is_bit_set(range_index, arc, &mut self.reader)? {
            range_index
        } else {
            match self.fst.previous_bit_set(range_index, arc, &mut self.reader)? {
                Some(index) => index,
                None => return Ok(false),
            }
        };
        self.fst
            .read_arc_by_direct_addressing(arc, index, &mut self.reader)?;
        Ok(true)
    }

    fn floor_arc_binary(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        let index = match self.fst.binary_search(arc, label, &mut self.reader)? {
            Ok(index) => index,
            Err(0) => return Ok(false),
            Err(index) => index - 1,
        };
        self.fst.read_arc_by_index(arc, index, &mut self.reader)?;
        Ok(true)
    }

    fn floor_arc_list(&mut self, label: Label) -> Result<bool, Error> {
        let arc = &mut self.arcs[self.upto];
        if arc.label > label {
            return Ok(false);
        }
        while !arc.is_last() {
            if self.fst.read_next_arc_label(arc, &mut self.reader)? > label {
                break;
            }
            self.fst.read_next_real_arc(arc, &mut self.reader)?;
        }
        Ok(true)
    }
}
