//! Whole-automaton utilities built on arc traversal.

use super::Fst;
use crate::{
    arc::{Address, Arc, END_LABEL},
    input::Symbol,
    outputs::{Outputs, PositiveIntOutputs},
    Error,
};
use std::collections::{HashSet, VecDeque};

impl Fst<PositiveIntOutputs> {
    /// Find the key mapped to `target`.
    ///
    /// Only meaningful when outputs strictly increase with key order (for example, when each key
    /// maps to its ordinal), so that the smallest output reachable below an arc is the arc's
    /// accumulated output.
    pub fn get_by_output<K: Symbol>(&self, target: u64) -> Result<Option<Vec<K>>, Error> {
        let mut reader = self.reader();
        let mut arc = Arc::new(0);
        let mut prev = Arc::new(0);
        self.first_arc(&mut arc);

        let mut key = Vec::new();
        let mut output = 0;
        loop {
            if arc.is_final() {
                let final_output = output + arc.next_final_output;
                if final_output == target {
                    return Ok(Some(key));
                }
                if final_output > target {
                    return Ok(None);
                }
            }
            if !arc.target_has_arcs() {
                return Ok(None);
            }

            // Pick the last arc whose accumulated output does not exceed the target.
            self.read_first_real_target_arc(arc.target, &mut arc, &mut reader)?;
            if output + arc.output > target {
                return Ok(None);
            }
            loop {
                if output + arc.output == target || arc.is_last() {
                    break;
                }
                prev.copy_from(&arc);
                self.read_next_real_arc(&mut arc, &mut reader)?;
                if output + arc.output > target {
                    arc.copy_from(&prev);
                    break;
                }
            }
            key.push(K::from_label(arc.label));
            output += arc.output;
        }
    }
}

impl<O: Outputs> Fst<O> {
    /// Render the automaton in Graphviz DOT format.
    ///
    /// Nodes are named by address. All arcs into a node without arcs lead to a single `end`
    /// node. Final arcs are bold and list their final output after a `|`.
    pub fn to_dot(&self) -> Result<String, Error> {
        let mut reader = self.reader();
        let no_output = self.outputs.no_output();
        let mut arc = Arc::new(no_output.clone());
        let mut root = Arc::new(no_output.clone());
        self.first_arc(&mut root);

        let mut out = String::from("digraph FST {\n  rankdir = LR;\n  splines = true;\n");
        out.push_str("  initial [shape=point, color=white, label=\"\"];\n");
        out.push_str("  end [shape=doublecircle, label=\"\"];\n");
        let root_name = node_name(root.target);
        let root_label = match &self.empty_output {
            Some(output) if *output != no_output => {
                format!(" [label=\"{}\"]", escape(&format!("|{output:?}")))
            }
            _ => String::new(),
        };
        out.push_str(&format!("  initial -> {root_name}{root_label};\n"));

        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if root.target_has_arcs() {
            seen.insert(root.target);
            queue.push_back(root.target);
        }
        while let Some(node) = queue.pop_front() {
            let shape = if node == self.start_node && self.empty_output.is_some() {
                "doublecircle"
            } else {
                "circle"
            };
            out.push_str(&format!("  {} [shape={shape}, label=\"\"];\n", node_name(node)));

            self.read_first_real_target_arc(node, &mut arc, &mut reader)?;
            loop {
                let mut label = display_label(arc.label);
                if arc.output != no_output {
                    label.push_str(&format!("/{:?}", arc.output));
                }
                if arc.is_final() && arc.next_final_output != no_output {
                    label.push_str(&format!("|{:?}", arc.next_final_output));
                }
                let style = if arc.is_final() { ", style=bold" } else { "" };
                out.push_str(&format!(
                    "  {} -> {} [label=\"{}\"{style}];\n",
                    node_name(node),
                    node_name(arc.target),
                    escape(&label)
                ));
                if arc.target_has_arcs() && seen.insert(arc.target) {
                    queue.push_back(arc.target);
                }
                if arc.is_last() {
                    break;
                }
                self.read_next_real_arc(&mut arc, &mut reader)?;
            }
        }
        out.push_str("}\n");
        Ok(out)
    }
}

fn node_name(address: Address) -> String {
    if address <= 0 {
        "end".to_string()
    } else {
        format!("n{address}")
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn display_label(label: i32) -> String {
    match u8::try_from(label) {
        Ok(b) if b.is_ascii_graphic() => (b as char).to_string(),
        _ if label == END_LABEL => "END".to_string(),
        _ => format!("0x{label:x}"),
    }
}
