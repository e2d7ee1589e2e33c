use serde_json::Value;

use flowline_core::types::*;

/// A node whose title equals its domain id.
pub fn node(instance: &str, domain: &str) -> GraphNode {
    GraphNode::new(instance, domain, domain)
}

/// A text-input node with a value already entered.
pub fn text_node(instance: &str, domain: &str, title: &str, input: &str) -> GraphNode {
    GraphNode::new(instance, domain, title)
        .with_input_kind(InputKind::Text)
        .with_input(input)
}

pub fn edge(source: &str, target: &str) -> GraphEdge {
    GraphEdge::between(&InstanceId::from(source), &InstanceId::from(target))
}

pub fn result(node_id: &str, value: Value) -> ExecutionResult {
    ExecutionResult {
        node_id: node_id.to_string(),
        node_result: value,
    }
}

/// A streamed record carrying one result.
pub fn record(node_id: &str, value: Value) -> StreamRecord {
    StreamRecord {
        results: Some(result(node_id, value)),
        additional_input: Vec::new(),
    }
}
