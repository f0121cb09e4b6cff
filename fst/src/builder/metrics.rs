//! Metrics for [super::Builder].

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for [super::Builder].
#[derive(Default)]
pub struct Metrics {
    /// Nodes written to the store.
    pub nodes: Counter,
    /// Arcs written to the store.
    pub arcs: Counter,
    /// Frozen nodes replaced by an equal node already in the store.
    pub deduplicated: Counter,
    /// Nodes written with fixed length arcs for binary search.
    pub binary_search_nodes: Counter,
    /// Nodes written with fixed length arcs for direct addressing.
    pub direct_addressing_nodes: Counter,
    /// Bytes in the store.
    pub bytes: Gauge,
}

impl Metrics {
    /// Register the metrics in `registry`.
    pub fn register(&self, registry: &mut Registry) {
        registry.register("nodes", "Nodes written", self.nodes.clone());
        registry.register("arcs", "Arcs written", self.arcs.clone());
        registry.register(
            "deduplicated",
            "Frozen nodes shared with an equal written node",
            self.deduplicated.clone(),
        );
        registry.register(
            "binary_search_nodes",
            "Nodes written with fixed length arcs for binary search",
            self.binary_search_nodes.clone(),
        );
        registry.register(
            "direct_addressing_nodes",
            "Nodes written with fixed length arcs for direct addressing",
            self.direct_addressing_nodes.clone(),
        );
        registry.register("bytes", "Bytes written", self.bytes.clone());
    }
}
