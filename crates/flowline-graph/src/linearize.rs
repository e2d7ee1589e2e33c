use std::collections::{HashMap, HashSet};

use tracing::warn;

use flowline_core::types::{ChainKeying, ExecutionListEntry, GraphEdge, GraphNode};

/// Turn a flow into a sequence-numbered execution list.
///
/// Without edges every node runs independently, in collection order. With
/// edges the list is a chain walk: start at the first node (in edge order)
/// that has no predecessor and follow successors until the chain ends or a
/// node would be visited twice. Nodes that appear in no edge are left out.
///
/// An empty result for a non-empty flow means there was no root to start
/// from; callers must treat that as a failure and not submit.
pub fn linearize(
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    keying: ChainKeying,
) -> Vec<ExecutionListEntry> {
    if edges.is_empty() {
        return nodes
            .iter()
            .enumerate()
            .map(|(i, node)| ExecutionListEntry {
                node_id: node.domain_id.clone(),
                seq: i as u32 + 1,
                node_input: node.input().map(str::to_string),
                node_name: node.title.clone(),
                node_result: String::new(),
            })
            .collect();
    }

    let key = |node: &GraphNode| -> String {
        match keying {
            ChainKeying::Instance => node.instance_id.0.clone(),
            ChainKeying::Domain => node.domain_id.clone(),
        }
    };

    let by_instance: HashMap<_, _> = nodes.iter().map(|n| (&n.instance_id, n)).collect();

    // Keys in first-seen order; the root search depends on it.
    let mut order: Vec<String> = Vec::new();
    let mut node_map: HashMap<String, &GraphNode> = HashMap::new();
    let mut next: HashMap<String, String> = HashMap::new();
    let mut prev: HashMap<String, String> = HashMap::new();

    for edge in edges {
        let (from, to) = match (by_instance.get(&edge.source), by_instance.get(&edge.target)) {
            (Some(from), Some(to)) => (*from, *to),
            _ => {
                warn!(edge_id = %edge.id, "Edge endpoint missing from flow, ignoring");
                continue;
            }
        };
        let (from_key, to_key) = (key(from), key(to));

        for (k, n) in [(&from_key, from), (&to_key, to)] {
            if node_map.insert(k.clone(), n).is_none() {
                order.push(k.clone());
            }
        }
        next.insert(from_key.clone(), to_key.clone());
        prev.insert(to_key, from_key);
    }

    let mut current = order.iter().find(|k| !prev.contains_key(*k)).cloned();
    let mut visited = HashSet::new();
    let mut entries = Vec::new();

    while let Some(k) = current {
        if !visited.insert(k.clone()) {
            break;
        }
        let node = node_map[&k];
        entries.push(ExecutionListEntry {
            node_id: node.domain_id.clone(),
            seq: entries.len() as u32 + 1,
            node_input: node.input().map(str::to_string),
            node_name: node.title.replace(' ', "_"),
            node_result: String::new(),
        });
        current = next.get(&k).cloned();
    }

    entries
}
