//! Reconciling executor results back onto the graph.
//!
//! Results are matched by domain id, not instance id: the executor only ever
//! sees domain ids. A result for a node that has since been deleted simply
//! finds nothing to update.

use flowline_core::types::{AdditionalInput, BatchOutcome, GraphNode, InstanceId, StreamRecord};

use crate::graph::FlowGraph;

impl FlowGraph {
    /// Apply a complete batch response. Every node stops loading; nodes with
    /// a matching result get it, nodes with a matching echoed input get that.
    ///
    /// Applying the same outcome twice leaves the graph as applying it once.
    pub fn apply_batch(&mut self, outcome: &BatchOutcome) -> usize {
        let mut updated = 0;
        for node in self.nodes_mut() {
            if let Some(result) = outcome.results.iter().find(|r| r.node_id == node.domain_id) {
                node.result = Some(result.node_result.clone());
                updated += 1;
            }
            overwrite_input(node, &outcome.additional_input);
            node.loading = false;
        }
        updated
    }

    /// Apply one streamed record. Returns the instances it completed.
    pub fn apply_stream_record(&mut self, record: &StreamRecord) -> Vec<InstanceId> {
        let result = match &record.results {
            Some(r) if !r.node_id.is_empty() => r,
            _ => return Vec::new(),
        };

        let mut completed = Vec::new();
        for node in self.nodes_mut() {
            if node.domain_id != result.node_id {
                continue;
            }
            node.result = Some(result.node_result.clone());
            node.loading = false;
            overwrite_input(node, &record.additional_input);
            completed.push(node.instance_id.clone());
        }
        completed
    }
}

fn overwrite_input(node: &mut GraphNode, inputs: &[AdditionalInput]) {
    if let Some(ai) = inputs.iter().find(|ai| ai.node_id == node.domain_id) {
        node.input_value = ai.node_input.clone();
    }
}
