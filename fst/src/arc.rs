//! The decoded view of a single transition.

/// A transition label (a byte, a UTF-16 unit, or a code point, depending on the input type).
pub type Label = i32;

/// The address of a compiled node, or one of the terminal sentinels.
pub type Address = i64;

/// Label of the pseudo-arc that marks the end of an accepted key.
pub const END_LABEL: Label = -1;

/// Target of an arc leading to a final node without arcs.
pub const FINAL_END_NODE: Address = -1;

/// Target of an arc leading to a non-final node without arcs.
pub const NON_FINAL_END_NODE: Address = 0;

/// This arc ends an accepted key.
pub const BIT_FINAL_ARC: u8 = 1 << 0;

/// This arc is the last arc of its node.
pub const BIT_LAST_ARC: u8 = 1 << 1;

/// The target node immediately follows this node, so no target address is written.
pub const BIT_TARGET_NEXT: u8 = 1 << 2;

/// The target node has no arcs, so no target address is written.
pub const BIT_STOP_NODE: u8 = 1 << 3;

/// An output follows the label.
pub const BIT_ARC_HAS_OUTPUT: u8 = 1 << 4;

/// A final output follows the output.
pub const BIT_ARC_HAS_FINAL_OUTPUT: u8 = 1 << 5;

/// Header byte of a node whose fixed length arcs are binary searched.
///
/// Never a valid arc flag byte because [BIT_ARC_HAS_FINAL_OUTPUT] requires [BIT_FINAL_ARC].
pub const ARCS_FOR_BINARY_SEARCH: u8 = BIT_ARC_HAS_FINAL_OUTPUT;

/// Header byte of a node whose fixed length arcs are indexed by label.
pub const ARCS_FOR_DIRECT_ADDRESSING: u8 = 1 << 6;

/// A transition read out of an [crate::Fst].
///
/// Arcs are decoded in place: callers allocate one and pass it to each read, which overwrites
/// every field relevant to the arc's node layout. An arc is only meaningful together with the
/// [crate::Fst] (and reader) it was read from.
#[derive(Clone, Debug)]
pub struct Arc<T> {
    pub(crate) label: Label,
    pub(crate) output: T,
    pub(crate) target: Address,
    pub(crate) flags: u8,
    pub(crate) next_final_output: T,

    // Position of the next arc in a list node (or, for the pseudo end arc, the node to continue
    // with).
    pub(crate) next_arc: Address,

    // Layout flag of the node this arc belongs to.
    pub(crate) node_flags: u8,

    // Fixed length arc bookkeeping. `arc_idx` is the index within the node for binary search
    // nodes and the label offset for direct addressing nodes.
    pub(crate) pos_arcs_start: u64,
    pub(crate) bytes_per_arc: u32,
    pub(crate) arc_idx: i32,
    pub(crate) num_arcs: u32,

    // Direct addressing bookkeeping.
    pub(crate) bit_table_start: u64,
    pub(crate) first_label: Label,
    pub(crate) presence_index: i32,
}

impl<T: Clone> Arc<T> {
    /// Create an arc with every output set to `no_output`.
    pub fn new(no_output: T) -> Self {
        Self {
            label: 0,
            output: no_output.clone(),
            target: 0,
            flags: 0,
            next_final_output: no_output,
            next_arc: 0,
            node_flags: 0,
            pos_arcs_start: 0,
            bytes_per_arc: 0,
            arc_idx: 0,
            num_arcs: 0,
            bit_table_start: 0,
            first_label: 0,
            presence_index: 0,
        }
    }

    /// Overwrite this arc with `other`, reusing allocations where possible.
    pub fn copy_from(&mut self, other: &Self) {
        self.clone_from(other);
    }
}

impl<T> Arc<T> {
    /// The label of this arc ([END_LABEL] for the pseudo end arc).
    pub fn label(&self) -> Label {
        self.label
    }

    /// The output of this arc.
    pub fn output(&self) -> &T {
        &self.output
    }

    /// The output added when a key ends after this arc.
    pub fn next_final_output(&self) -> &T {
        &self.next_final_output
    }

    /// The node this arc leads to.
    pub fn target(&self) -> Address {
        self.target
    }

    /// The raw flag byte of this arc.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// The layout of the node this arc belongs to.
    pub fn node_flags(&self) -> u8 {
        self.node_flags
    }

    /// Size of each arc in a fixed length node, or `0` for list nodes.
    pub fn bytes_per_arc(&self) -> u32 {
        self.bytes_per_arc
    }

    /// Number of arcs (binary search) or label range (direct addressing) of a fixed length node.
    pub fn num_arcs(&self) -> u32 {
        self.num_arcs
    }

    /// Index of this arc within a fixed length node.
    pub fn arc_idx(&self) -> i32 {
        self.arc_idx
    }

    /// The smallest label of a direct addressing node.
    pub fn first_label(&self) -> Label {
        self.first_label
    }

    /// Whether a key ends after this arc.
    pub fn is_final(&self) -> bool {
        self.flag(BIT_FINAL_ARC)
    }

    /// Whether this is the last arc of its node.
    pub fn is_last(&self) -> bool {
        self.flag(BIT_LAST_ARC)
    }

    /// Whether the target of this arc has outgoing arcs.
    pub fn target_has_arcs(&self) -> bool {
        self.target > 0
    }

    pub(crate) fn flag(&self, bit: u8) -> bool {
        self.flags & bit != 0
    }
}
