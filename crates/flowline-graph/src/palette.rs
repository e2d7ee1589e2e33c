use serde::{Deserialize, Serialize};

use flowline_core::types::{FieldDef, GraphNode, InputKind, InstanceId};

pub const FETCH_HTML_CONTENT: &str = "8c5a1f02-d0cd-4c6d-96b6-51f1bc1f0b17";
pub const GET_WEATHER: &str = "fdc3b924-2f2a-43e8-923f-3f118a51eb0e";
pub const FETCH_TOP_NEWS: &str = "a1b2c3d4-e5f6-7890-abcd-ef1234567890";
pub const FETCH_IT_TECH_NEWS: &str = "b2c3d4e5-f6g7-8901-bcde-f23456789012";
pub const SUMMARIZE_HTML: &str = "0ff35b88-681c-4c64-94b5-7b74dbfbb471";
pub const CONVERT_TO_HTML_TEMPLATE: &str = "1a7c2b8e-e4ae-4c8e-b2c4-999b4b3cf80d";
pub const SEND_EMAIL: &str = "6789d23f-1352-4b11-b9a3-2f4f6f96fcd0";
pub const GET_TOPIC_CONTENT: &str = "e3b0c442-98fc-1c14-9afb-4c8996fb9242";
pub const BLOG_RESEARCHER: &str = "d4e5f6a7-1234-4bcd-8ef0-abcdef123456";
pub const TEMPLATE_GENERATOR: &str = "f7e6d5c4-1234-4abc-9def-abcdef123456";
pub const HTML_EDITOR: &str = "a8b9c0d1-2345-4def-8901-abcdef234567";

/// A backend action that can be placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeType {
    pub domain_id: String,
    pub title: String,
    /// Prompt shown next to the input box.
    #[serde(default)]
    pub label: String,
    pub description: String,
    #[serde(default)]
    pub input_kind: InputKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
    pub category: String,
}

impl NodeType {
    fn new(domain_id: &str, title: &str, description: &str, category: &str) -> Self {
        Self {
            domain_id: domain_id.to_string(),
            title: title.to_string(),
            label: String::new(),
            description: description.to_string(),
            input_kind: InputKind::None,
            fields: Vec::new(),
            category: category.to_string(),
        }
    }

    fn text_input(mut self, label: &str) -> Self {
        self.input_kind = InputKind::Text;
        self.label = label.to_string();
        self
    }

    fn kind(mut self, kind: InputKind) -> Self {
        self.input_kind = kind;
        self
    }

    fn field(mut self, name: &str, label: &str, required: bool) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            label: label.to_string(),
            required,
        });
        self
    }

    /// A fresh node of this type.
    pub fn instantiate(&self, instance_id: InstanceId) -> GraphNode {
        GraphNode {
            description: self.description.clone(),
            input_kind: self.input_kind,
            fields: self.fields.clone(),
            ..GraphNode::new(instance_id, self.domain_id.clone(), self.title.clone())
        }
    }
}

/// The catalog of node types available to a flow.
#[derive(Debug, Clone)]
pub struct Palette {
    types: Vec<NodeType>,
}

impl Palette {
    pub fn new(types: Vec<NodeType>) -> Self {
        Self { types }
    }

    /// The built-in backend actions.
    pub fn builtin() -> Self {
        const WEB: &str = "Web & Data Collection";
        const AI: &str = "AI & Processing";
        const OUTPUT: &str = "Communication & Output";
        const EXTERNAL: &str = "External Services";

        Self::new(vec![
            NodeType::new(
                FETCH_HTML_CONTENT,
                "Fetch_HTML_Content",
                "Fetches HTML content from a URL",
                WEB,
            )
            .text_input("Enter Web page URL"),
            NodeType::new(GET_WEATHER, "Get_Weather", "Fetches current weather info", EXTERNAL)
                .text_input("Enter City Name"),
            NodeType::new(
                FETCH_TOP_NEWS,
                "Fetch_Top_News",
                "Fetches latest news headlines from RSS feeds",
                WEB,
            ),
            NodeType::new(
                FETCH_IT_TECH_NEWS,
                "Fetch_IT_Tech_News",
                "Fetches latest tech news from major tech sources",
                WEB,
            ),
            NodeType::new(SUMMARIZE_HTML, "Summarize_HTML", "Get summary from AI models", AI),
            NodeType::new(
                CONVERT_TO_HTML_TEMPLATE,
                "Convert_to_HTML_Template",
                "Transforms summary into email-ready HTML",
                OUTPUT,
            ),
            NodeType::new(SEND_EMAIL, "Send_Email", "Sends the final HTML via email", OUTPUT)
                .text_input("Enter email address"),
            NodeType::new(
                GET_TOPIC_CONTENT,
                "Get_Topic_Content",
                "Get a topic name from the user and search for it on Google",
                WEB,
            )
            .text_input("Enter Topic Name"),
            NodeType::new(
                BLOG_RESEARCHER,
                "Blog_Researcher",
                "Performs web research and summarizes findings for your blog topic",
                AI,
            )
            .text_input("Enter blog topic or question")
            .field("input", "Blog Topic/Question", true)
            .field("refURL", "Reference Blog URL (optional)", false),
            NodeType::new(
                TEMPLATE_GENERATOR,
                "Template_Generator",
                "Fetches an HTML template from a URL and fills it with content using AI",
                AI,
            )
            .kind(InputKind::File)
            .field("templateURL", "Template URL", true),
            NodeType::new(HTML_EDITOR, "HTML_Editor", "Edit HTML content in a popup editor", OUTPUT)
                .kind(InputKind::Html),
        ])
    }

    pub fn types(&self) -> &[NodeType] {
        &self.types
    }

    pub fn get(&self, domain_id: &str) -> Option<&NodeType> {
        self.types.iter().find(|t| t.domain_id == domain_id)
    }

    pub fn by_title(&self, title: &str) -> Option<&NodeType> {
        self.types.iter().find(|t| t.title == title)
    }

    /// Category names with their member types, in first-seen order.
    pub fn categories(&self) -> Vec<(&str, Vec<&NodeType>)> {
        let mut out: Vec<(&str, Vec<&NodeType>)> = Vec::new();
        for ty in &self.types {
            match out.iter().position(|(c, _)| *c == ty.category) {
                Some(i) => out[i].1.push(ty),
                None => out.push((ty.category.as_str(), vec![ty])),
            }
        }
        out
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let palette = Palette::builtin();
        let ids: HashSet<_> = palette.types().iter().map(|t| &t.domain_id).collect();
        assert_eq!(ids.len(), palette.types().len());
    }

    #[test]
    fn test_lookup() {
        let palette = Palette::builtin();
        assert_eq!(palette.get(SEND_EMAIL).unwrap().title, "Send_Email");
        assert_eq!(palette.by_title("Get_Weather").unwrap().domain_id, GET_WEATHER);
        assert!(palette.get("nope").is_none());
    }

    #[test]
    fn test_instantiate_copies_type_metadata() {
        let palette = Palette::builtin();
        let node = palette
            .get(BLOG_RESEARCHER)
            .unwrap()
            .instantiate(InstanceId::from("node_7"));
        assert_eq!(node.instance_id.0, "node_7");
        assert_eq!(node.domain_id, BLOG_RESEARCHER);
        assert_eq!(node.input_kind, InputKind::Text);
        assert_eq!(node.fields.len(), 2);
        assert!(node.result.is_none());
        assert!(!node.loading);
    }

    #[test]
    fn test_categories_grouped() {
        let palette = Palette::builtin();
        let cats = palette.categories();
        let names: Vec<_> = cats.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            names,
            vec![
                "Web & Data Collection",
                "External Services",
                "AI & Processing",
                "Communication & Output"
            ]
        );
        let web = &cats[0].1;
        assert_eq!(web.len(), 4);
    }
}
