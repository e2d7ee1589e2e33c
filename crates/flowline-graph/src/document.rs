use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use flowline_core::error::{FlowError, Result};
use flowline_core::types::{GraphEdge, GraphNode, InstanceId};

use crate::graph::FlowGraph;

pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Export/import file: the full node and edge collections plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDocument {
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FlowMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetadata {
    pub exported_at: String,
    pub version: String,
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub node_types: Vec<String>,
}

impl FlowDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.get("nodes").is_some_and(|n| n.is_array()) {
            return Err(FlowError::InvalidDocument("Invalid import file format".into()));
        }
        serde_json::from_value(value).map_err(|e| FlowError::InvalidDocument(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}

impl FlowGraph {
    /// Snapshot the flow as a document. `None` for an empty flow.
    pub fn export(&self) -> Option<FlowDocument> {
        if self.is_empty() {
            return None;
        }

        let mut node_types: Vec<String> = Vec::new();
        for n in self.nodes() {
            if !node_types.contains(&n.title) {
                node_types.push(n.title.clone());
            }
        }

        Some(FlowDocument {
            nodes: self.nodes().to_vec(),
            edges: self.edges().to_vec(),
            metadata: Some(FlowMetadata {
                exported_at: Utc::now().to_rfc3339(),
                version: DOCUMENT_VERSION.to_string(),
                node_count: self.nodes().len(),
                edge_count: self.edges().len(),
                description: "flowline export".to_string(),
                node_types,
            }),
        })
    }

    /// Append a document's nodes and edges to this flow.
    ///
    /// Instance ids already taken (by this flow or earlier in the document)
    /// are replaced with fresh ones. Edges follow nodes renamed because of a
    /// clash with this flow. Edges whose endpoints do not exist afterwards are
    /// dropped. Ids are settled for the whole document before anything is
    /// added, so the flow is never left half-imported.
    pub fn import(&mut self, doc: FlowDocument) -> Result<usize> {
        let existing: HashSet<InstanceId> =
            self.nodes().iter().map(|n| n.instance_id.clone()).collect();
        let declared: HashSet<InstanceId> =
            doc.nodes.iter().map(|n| n.instance_id.clone()).collect();
        let mut assigned: HashSet<InstanceId> = HashSet::new();
        let mut renamed: HashMap<InstanceId, InstanceId> = HashMap::new();

        let mut incoming = Vec::with_capacity(doc.nodes.len());
        for mut node in doc.nodes {
            let clashes_with_flow = existing.contains(&node.instance_id);
            if clashes_with_flow || assigned.contains(&node.instance_id) {
                let fresh = self.fresh_id(|id| declared.contains(id) || assigned.contains(id));
                if clashes_with_flow && !renamed.contains_key(&node.instance_id) {
                    renamed.insert(node.instance_id.clone(), fresh.clone());
                }
                debug!(from = %node.instance_id, to = %fresh, "Renaming imported node");
                node.instance_id = fresh;
            }
            node.loading = false;
            node.validation_error = None;
            assigned.insert(node.instance_id.clone());
            incoming.push(node);
        }

        let count = incoming.len();
        for node in incoming {
            self.insert_node(node)?;
        }

        let remap = |id: InstanceId| renamed.get(&id).cloned().unwrap_or(id);
        for mut e in doc.edges {
            e.source = remap(e.source);
            e.target = remap(e.target);
            if self.node(&e.source).is_none() || self.node(&e.target).is_none() {
                warn!(edge_id = %e.id, "Dropping imported edge with missing endpoint");
                continue;
            }
            e.id = GraphEdge::between(&e.source, &e.target).id;
            self.push_edge(e);
        }

        info!(nodes = count, "Imported flow document");
        Ok(count)
    }
}
