//! Nodes of the frontier: the path of the last added key that has not been written yet.

use crate::{
    arc::{Address, Label},
    outputs::Outputs,
};

/// Where an arc of a frontier node leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    /// The next node of the frontier, not yet written.
    Pending,
    /// A written node (or one of the terminal sentinels).
    Compiled(Address),
}

impl Target {
    /// The address of a written target.
    ///
    /// # Panics
    ///
    /// Panics if the target has not been written.
    pub fn address(self) -> Address {
        match self {
            Self::Compiled(address) => address,
            Self::Pending => panic!("arc target has not been compiled"),
        }
    }
}

/// An arc of a frontier node.
#[derive(Clone, Debug)]
pub(crate) struct PendingArc<V> {
    pub label: Label,
    pub target: Target,
    pub is_final: bool,
    pub output: V,
    pub next_final_output: V,
}

/// A node of the frontier.
#[derive(Debug)]
pub(crate) struct UnCompiledNode<V> {
    pub arcs: Vec<PendingArc<V>>,

    // Output of the key ending at this node, pushed onto the incoming arc when the node is
    // frozen.
    pub output: V,
    pub is_final: bool,

    // Distance from the root.
    pub depth: usize,
}

impl<V: Clone + Eq> UnCompiledNode<V> {
    pub fn new(no_output: V, depth: usize) -> Self {
        Self {
            arcs: Vec::new(),
            output: no_output,
            is_final: false,
            depth,
        }
    }

    /// Reset for reuse at the same depth, keeping the arc allocation.
    pub fn clear(&mut self, no_output: V) {
        self.arcs.clear();
        self.output = no_output;
        self.is_final = false;
    }

    fn last_arc(&mut self, label: Label) -> &mut PendingArc<V> {
        let arc = self.arcs.last_mut().expect("node has no arcs");
        assert_eq!(arc.label, label, "last arc label mismatch");
        arc
    }

    /// The output of the last arc, which must have `label`.
    pub fn last_output(&self, label: Label) -> &V {
        let arc = self.arcs.last().expect("node has no arcs");
        assert_eq!(arc.label, label, "last arc label mismatch");
        &arc.output
    }

    pub fn set_last_output(&mut self, label: Label, output: V) {
        self.last_arc(label).output = output;
    }

    /// Append a pending arc with `label`, which must exceed the label of every existing arc.
    pub fn add_arc(&mut self, label: Label, no_output: V) {
        assert!(label >= 0, "negative label: {label}");
        if let Some(last) = self.arcs.last() {
            assert!(label > last.label, "arcs added out of order");
        }
        self.arcs.push(PendingArc {
            label,
            target: Target::Pending,
            is_final: false,
            output: no_output.clone(),
            next_final_output: no_output,
        });
    }

    /// Point the last arc (which must have `label`) at its frozen target.
    pub fn replace_last(
        &mut self,
        label: Label,
        target: Address,
        next_final_output: V,
        is_final: bool,
    ) {
        let arc = self.last_arc(label);
        arc.target = Target::Compiled(target);
        arc.next_final_output = next_final_output;
        arc.is_final = is_final;
    }

    /// Prepend `prefix` to every output leaving this node.
    pub fn prepend_output<O: Outputs<Value = V>>(&mut self, outputs: &O, prefix: &V) {
        for arc in &mut self.arcs {
            arc.output = outputs.add(prefix, &arc.output);
        }
        if self.is_final {
            self.output = outputs.add(prefix, &self.output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outputs::PositiveIntOutputs;

    #[test]
    fn test_prepend_output() {
        let mut node = UnCompiledNode::new(0u64, 1);
        node.add_arc(3, 0);
        node.set_last_output(3, 5);
        node.add_arc(7, 0);
        node.is_final = true;
        node.output = 2;
        node.prepend_output(&PositiveIntOutputs, &10);
        assert_eq!(*node.last_output(7), 10);
        assert_eq!(node.arcs[0].output, 15);
        assert_eq!(node.output, 12);

        node.replace_last(7, 42, 1, true);
        assert_eq!(node.arcs[1].target, Target::Compiled(42));
        assert!(node.arcs[1].is_final);

        node.clear(0);
        assert!(node.arcs.is_empty());
        assert!(!node.is_final);
        assert_eq!(node.depth, 1);
    }

    #[test]
    #[should_panic(expected = "arcs added out of order")]
    fn test_add_arc_out_of_order() {
        let mut node = UnCompiledNode::new(0u64, 0);
        node.add_arc(5, 0);
        node.add_arc(5, 0);
    }

    #[test]
    #[should_panic(expected = "arc target has not been compiled")]
    fn test_pending_address() {
        Target::Pending.address();
    }
}
