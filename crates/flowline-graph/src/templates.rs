use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use flowline_core::error::{FlowError, Result};
use flowline_core::types::GraphEdge;

use crate::graph::FlowGraph;
use crate::palette::*;

/// A predefined flow. Nodes and edges refer to node types by domain id.
#[derive(Debug, Clone, Serialize)]
pub struct FlowTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub nodes: Vec<String>,
    pub edges: Vec<TemplateEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateEdge {
    pub source: String,
    pub target: String,
}

impl FlowTemplate {
    /// A linear template: each node feeds the next.
    fn chain(
        id: &str,
        name: &str,
        description: &str,
        category: &str,
        difficulty: &str,
        nodes: &[&str],
    ) -> Self {
        let edges = nodes
            .windows(2)
            .map(|w| TemplateEdge {
                source: w[0].to_string(),
                target: w[1].to_string(),
            })
            .collect();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            difficulty: difficulty.to_string(),
            nodes: nodes.iter().map(|s| s.to_string()).collect(),
            edges,
        }
    }

    pub fn builtin() -> Vec<FlowTemplate> {
        vec![
            Self::chain(
                "news-email-template",
                "News Update Email",
                "Fetch latest news, summarize, and send via email",
                "Communication",
                "Beginner",
                &[FETCH_TOP_NEWS, SUMMARIZE_HTML, CONVERT_TO_HTML_TEMPLATE, SEND_EMAIL],
            ),
            Self::chain(
                "blog-html-template",
                "Blog HTML Editor",
                "Research a blog topic, generate template, and edit HTML",
                "Blogging",
                "Beginner",
                &[BLOG_RESEARCHER, TEMPLATE_GENERATOR, HTML_EDITOR],
            ),
            Self::chain(
                "it-update-email-template",
                "IT Update Email",
                "Fetch the latest IT and tech news, summarize, and send via email",
                "Technology",
                "Intermediate",
                &[FETCH_IT_TECH_NEWS, SUMMARIZE_HTML, CONVERT_TO_HTML_TEMPLATE, SEND_EMAIL],
            ),
        ]
    }

    pub fn find(id: &str) -> Result<FlowTemplate> {
        Self::builtin()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| FlowError::TemplateNotFound(id.to_string()))
    }
}

impl FlowGraph {
    /// Replace the current flow with a fresh copy of `template`.
    ///
    /// Every template node gets a new instance id; template edges are
    /// re-pointed at those ids. The graph is untouched if any node type is
    /// missing from the palette.
    pub fn load_template(&mut self, template: &FlowTemplate, palette: &Palette) -> Result<()> {
        let types = template
            .nodes
            .iter()
            .map(|d| palette.get(d).ok_or_else(|| FlowError::UnknownNodeType(d.clone())))
            .collect::<Result<Vec<_>>>()?;

        self.clear();
        let mut id_map = HashMap::new();
        for ty in types {
            let id = self.add_node(ty);
            id_map.insert(ty.domain_id.as_str(), id);
        }

        for e in &template.edges {
            match (id_map.get(e.source.as_str()), id_map.get(e.target.as_str())) {
                (Some(s), Some(t)) => self.push_edge(GraphEdge::between(s, t)),
                _ => {
                    return Err(FlowError::UnknownNodeType(format!(
                        "{} -> {}",
                        e.source, e.target
                    )))
                }
            }
        }

        info!(template = %template.id, nodes = self.nodes().len(), "Loaded flow template");
        Ok(())
    }
}
