use std::sync::Arc;

use tracing::debug;

use flowline_core::error::{FlowError, Result};
use flowline_core::ids::IdGenerator;
use flowline_core::types::*;

use crate::linearize::linearize;
use crate::palette::NodeType;
use crate::validation::ValidationReport;

/// The node and edge collections of one flow.
///
/// Node order is insertion order and is significant: the linearizer uses it
/// when the flow has no edges.
pub struct FlowGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    ids: Arc<dyn IdGenerator>,
}

impl FlowGraph {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            ids,
        }
    }

    /// Build a graph from existing collections, as-is.
    pub fn from_parts(
        ids: Arc<dyn IdGenerator>,
        nodes: Vec<GraphNode>,
        edges: Vec<GraphEdge>,
    ) -> Self {
        Self { nodes, edges, ids }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &InstanceId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.instance_id == id)
    }

    pub(crate) fn node_mut(&mut self, id: &InstanceId) -> Result<&mut GraphNode> {
        self.nodes
            .iter_mut()
            .find(|n| &n.instance_id == id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.iter_mut()
    }

    /// Next id from the generator that no node in this flow uses, skipping
    /// anything `reserved` also claims.
    pub(crate) fn fresh_id(&self, reserved: impl Fn(&InstanceId) -> bool) -> InstanceId {
        loop {
            let id = self.ids.next_id();
            if self.node(&id).is_none() && !reserved(&id) {
                return id;
            }
            debug!(instance_id = %id, "Skipping instance id already in use");
        }
    }

    /// Place a new instance of `ty` and return its id.
    pub fn add_node(&mut self, ty: &NodeType) -> InstanceId {
        let id = self.fresh_id(|_| false);
        debug!(instance_id = %id, node_type = %ty.title, "Adding node");
        self.nodes.push(ty.instantiate(id.clone()));
        id
    }

    /// Append a fully-formed node. Its instance id must not already be in use.
    pub fn insert_node(&mut self, node: GraphNode) -> Result<()> {
        if self.node(&node.instance_id).is_some() {
            return Err(FlowError::InvalidDocument(format!(
                "duplicate instance id {}",
                node.instance_id
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Connect `source` to `target`.
    pub fn connect(&mut self, source: &InstanceId, target: &InstanceId) -> Result<&GraphEdge> {
        if source == target {
            return Err(FlowError::SelfLoop(source.to_string()));
        }
        for id in [source, target] {
            if self.node(id).is_none() {
                return Err(FlowError::EdgeEndpointMissing(id.to_string()));
            }
        }
        if self.has_edge(source, target) {
            return Err(FlowError::DuplicateEdge {
                from: source.to_string(),
                to: target.to_string(),
            });
        }

        self.edges.push(GraphEdge::between(source, target));
        Ok(&self.edges[self.edges.len() - 1])
    }

    /// Append an edge without endpoint checks (imported documents).
    pub(crate) fn push_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Option<GraphEdge> {
        let pos = self.edges.iter().position(|e| e.id == edge_id)?;
        Some(self.edges.remove(pos))
    }

    fn has_edge(&self, source: &InstanceId, target: &InstanceId) -> bool {
        self.edges
            .iter()
            .any(|e| &e.source == source && &e.target == target)
    }

    /// Remove a node and repair the edges around it.
    ///
    /// A node with exactly one incoming edge (from P) and exactly one outgoing
    /// edge (to S) is spliced out: both edges are replaced by a single P -> S,
    /// which is not duplicated if it already exists. When P and S are the same
    /// node no self-loop is created. Any other shape just drops every edge
    /// touching the node.
    pub fn delete_node(&mut self, id: &InstanceId) -> Result<GraphNode> {
        let pos = self
            .nodes
            .iter()
            .position(|n| &n.instance_id == id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))?;
        let removed = self.nodes.remove(pos);

        let incoming: Vec<&GraphEdge> = self.edges.iter().filter(|e| &e.target == id).collect();
        let outgoing: Vec<&GraphEdge> = self.edges.iter().filter(|e| &e.source == id).collect();

        let splice = match (incoming.as_slice(), outgoing.as_slice()) {
            ([inc], [out]) if inc.source != out.target => {
                Some((inc.source.clone(), out.target.clone()))
            }
            _ => None,
        };

        self.edges.retain(|e| &e.source != id && &e.target != id);

        if let Some((pred, succ)) = splice {
            if !self.has_edge(&pred, &succ) {
                debug!(from = %pred, to = %succ, "Splicing chain around deleted node");
                self.edges.push(GraphEdge::between(&pred, &succ));
            }
        }

        Ok(removed)
    }

    /// Store user input for a node. Clears any stale validation message.
    pub fn set_input(&mut self, id: &InstanceId, value: impl Into<String>) -> Result<()> {
        let node = self.node_mut(id)?;
        node.input_value = value.into();
        node.validation_error = None;
        Ok(())
    }

    /// Store one sub-field of a multi-field node.
    pub fn set_field(&mut self, id: &InstanceId, field: &str, value: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        node.set_field(field, value);
        node.validation_error = None;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }

    pub fn set_all_loading(&mut self, loading: bool) {
        for node in &mut self.nodes {
            node.loading = loading;
        }
    }

    pub fn loading_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.loading).count()
    }

    /// Annotate failing nodes with their messages, clear stale messages on
    /// the rest, and stop every loader.
    pub fn apply_validation(&mut self, report: &ValidationReport) {
        for node in &mut self.nodes {
            node.validation_error = report.error_for(&node.instance_id).map(str::to_string);
            node.loading = false;
        }
    }

    /// Current input of every node, in node order, regardless of chain membership.
    pub fn additional_inputs(&self) -> Vec<AdditionalInput> {
        self.nodes
            .iter()
            .map(|n| AdditionalInput {
                node_id: n.domain_id.clone(),
                node_input: n.input_value.clone(),
            })
            .collect()
    }

    pub fn execution_list(&self, keying: ChainKeying) -> Vec<ExecutionListEntry> {
        linearize(&self.nodes, &self.edges, keying)
    }

    /// Full request body for the executor. `None` when the flow has nodes but
    /// no orderable execution list.
    pub fn build_request(&self, keying: ChainKeying) -> Option<RunGraphRequest> {
        let graph_flow_data = self.execution_list(keying);
        if graph_flow_data.is_empty() && !self.nodes.is_empty() {
            return None;
        }
        Some(RunGraphRequest {
            graph_flow_data,
            additional_input: self.additional_inputs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::ids::SequentialIds;
    use flowline_test_utils::fixtures::{edge, node, text_node};

    fn graph(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> FlowGraph {
        FlowGraph::from_parts(Arc::new(SequentialIds::default()), nodes, edges)
    }

    fn id(s: &str) -> InstanceId {
        InstanceId::from(s)
    }

    fn edge_pairs(g: &FlowGraph) -> Vec<(String, String)> {
        g.edges()
            .iter()
            .map(|e| (e.source.0.clone(), e.target.0.clone()))
            .collect()
    }

    #[test]
    fn test_delete_splices_simple_chain() {
        let mut g = graph(
            vec![node("p", "P"), node("m", "M"), node("s", "S")],
            vec![edge("p", "m"), edge("m", "s")],
        );
        g.delete_node(&id("m")).unwrap();

        assert_eq!(g.nodes().len(), 2);
        assert_eq!(edge_pairs(&g), vec![("p".to_string(), "s".to_string())]);
        assert_eq!(g.edges()[0].id, "e-p-s");
    }

    #[test]
    fn test_delete_head_drops_edges_without_splice() {
        let mut g = graph(
            vec![node("a", "A"), node("b", "B"), node("c", "C")],
            vec![edge("a", "b"), edge("b", "c")],
        );
        g.delete_node(&id("a")).unwrap();
        assert_eq!(edge_pairs(&g), vec![("b".to_string(), "c".to_string())]);
    }

    #[test]
    fn test_delete_branching_node_drops_all_touching_edges() {
        let mut g = graph(
            vec![node("a", "A"), node("b", "B"), node("c", "C"), node("d", "D")],
            vec![edge("a", "b"), edge("b", "c"), edge("b", "d")],
        );
        g.delete_node(&id("b")).unwrap();
        assert!(g.edges().is_empty());
    }

    #[test]
    fn test_delete_with_two_incoming_drops_all() {
        let mut g = graph(
            vec![node("a", "A"), node("x", "X"), node("b", "B"), node("c", "C")],
            vec![edge("a", "b"), edge("x", "b"), edge("b", "c")],
        );
        g.delete_node(&id("b")).unwrap();
        assert!(g.edges().is_empty());
    }

    #[test]
    fn test_delete_leaves_unrelated_edges() {
        let mut g = graph(
            vec![node("a", "A"), node("b", "B"), node("c", "C"), node("d", "D")],
            vec![edge("a", "b"), edge("c", "d")],
        );
        g.delete_node(&id("a")).unwrap();
        assert_eq!(edge_pairs(&g), vec![("c".to_string(), "d".to_string())]);
    }

    #[test]
    fn test_delete_unknown_node() {
        let mut g = graph(vec![], vec![]);
        assert!(matches!(
            g.delete_node(&id("ghost")),
            Err(FlowError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_connect_rejects_bad_edges() {
        let mut g = graph(vec![node("a", "A"), node("b", "B")], vec![]);
        assert!(g.connect(&id("a"), &id("b")).is_ok());
        assert!(matches!(
            g.connect(&id("a"), &id("b")),
            Err(FlowError::DuplicateEdge { .. })
        ));
        assert!(matches!(
            g.connect(&id("a"), &id("a")),
            Err(FlowError::SelfLoop(_))
        ));
        assert!(matches!(
            g.connect(&id("a"), &id("zz")),
            Err(FlowError::EdgeEndpointMissing(_))
        ));
    }

    #[test]
    fn test_set_input_clears_validation_error() {
        let mut g = graph(vec![node("a", "A")], vec![]);
        g.node_mut(&id("a")).unwrap().validation_error = Some("City name is required".into());
        g.set_input(&id("a"), "Paris").unwrap();

        let n = g.node(&id("a")).unwrap();
        assert_eq!(n.input_value, "Paris");
        assert!(n.validation_error.is_none());
    }

    #[test]
    fn test_delete_keeps_single_existing_bypass_edge() {
        let mut g = graph(
            vec![node("p", "P"), node("m", "M"), node("s", "S")],
            vec![edge("p", "m"), edge("m", "s"), edge("p", "s")],
        );
        // m has one incoming and one outgoing edge; p -> s survives once.
        g.delete_node(&id("m")).unwrap();
        assert_eq!(edge_pairs(&g), vec![("p".to_string(), "s".to_string())]);
    }

    #[test]
    fn test_delete_in_two_node_loop_adds_no_self_loop() {
        let mut g = graph(
            vec![node("p", "P"), node("m", "M")],
            vec![edge("p", "m"), edge("m", "p")],
        );
        g.delete_node(&id("m")).unwrap();
        assert!(g.edges().is_empty());
    }

    #[test]
    fn test_add_node_skips_ids_in_use() {
        use crate::palette::{Palette, SEND_EMAIL};

        let mut g = graph(vec![node("node_0", "A"), node("node_1", "B")], vec![]);
        let palette = Palette::builtin();
        let fresh = g.add_node(palette.get(SEND_EMAIL).unwrap());
        assert_eq!(fresh.0, "node_2");
        assert_eq!(g.nodes().iter().filter(|n| n.instance_id == fresh).count(), 1);
    }

    #[test]
    fn test_apply_validation_replaces_messages() {
        use crate::palette::{GET_WEATHER, SEND_EMAIL};
        use crate::validation::validate_all;

        let mut g = graph(
            vec![
                text_node("w", GET_WEATHER, "Get_Weather", "Paris"),
                text_node("m", SEND_EMAIL, "Send_Email", "nope"),
            ],
            vec![],
        );
        g.node_mut(&id("w")).unwrap().validation_error = Some("stale".into());
        g.set_all_loading(true);

        g.apply_validation(&validate_all(g.nodes()));
        assert!(g.node(&id("w")).unwrap().validation_error.is_none());
        assert!(g.node(&id("m")).unwrap().validation_error.is_some());
        assert_eq!(g.loading_count(), 0);
    }

    #[test]
    fn test_additional_inputs_cover_every_node() {
        let mut g = graph(
            vec![node("a", "A"), node("b", "B"), node("lonely", "L")],
            vec![edge("a", "b")],
        );
        g.set_input(&id("lonely"), "x").unwrap();
        let inputs = g.additional_inputs();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[2].node_id, "L");
        assert_eq!(inputs[2].node_input, "x");
        assert_eq!(inputs[0].node_input, "");
    }

    #[test]
    fn test_build_request_none_for_rootless_graph() {
        let g = graph(
            vec![node("a", "A"), node("b", "B")],
            vec![edge("a", "b"), edge("b", "a")],
        );
        assert!(g.build_request(ChainKeying::Instance).is_none());
    }

    #[test]
    fn test_build_request_for_empty_graph_is_empty() {
        let g = graph(vec![], vec![]);
        let req = g.build_request(ChainKeying::Instance).unwrap();
        assert!(req.graph_flow_data.is_empty());
        assert!(req.additional_input.is_empty());
    }

    #[test]
    fn test_clear_and_loading() {
        let mut g = graph(vec![node("a", "A"), node("b", "B")], vec![edge("a", "b")]);
        g.set_all_loading(true);
        assert_eq!(g.loading_count(), 2);
        g.clear();
        assert!(g.is_empty());
        assert!(g.edges().is_empty());
    }
}
