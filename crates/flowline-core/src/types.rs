use serde::{Deserialize, Deserializer, Serialize};

/// Process-local identifier of one placed node. Never reused within a session.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of input a node type accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    #[default]
    None,
    Text,
    File,
    Html,
}

impl InputKind {
    /// Whether the pre-flight validator checks nodes of this kind.
    pub fn is_validated(self) -> bool {
        matches!(self, InputKind::Text)
    }
}

/// One named sub-field of a multi-field node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
}

/// A node placed on the canvas.
///
/// `loading` and `validation_error` are runtime-only and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub instance_id: InstanceId,
    /// Identifier of the node's type, shared by every instance of that type.
    pub domain_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_kind: InputKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub input_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip)]
    pub loading: bool,
    #[serde(skip)]
    pub validation_error: Option<String>,
}

impl GraphNode {
    pub fn new(
        instance_id: impl Into<InstanceId>,
        domain_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            domain_id: domain_id.into(),
            title: title.into(),
            description: String::new(),
            input_kind: InputKind::None,
            fields: Vec::new(),
            input_value: String::new(),
            result: None,
            loading: false,
            validation_error: None,
        }
    }

    pub fn with_input_kind(mut self, kind: InputKind) -> Self {
        self.input_kind = kind;
        self
    }

    pub fn with_input(mut self, value: impl Into<String>) -> Self {
        self.input_value = value.into();
        self
    }

    /// The stored input, or `None` when nothing has been entered.
    pub fn input(&self) -> Option<&str> {
        if self.input_value.is_empty() {
            None
        } else {
            Some(&self.input_value)
        }
    }

    /// Set one named sub-field of a multi-field node.
    ///
    /// Sub-fields live in `input_value` as a serialized JSON object; a
    /// plain-text value already stored there is discarded.
    pub fn set_field(&mut self, name: &str, value: &str) {
        let mut map = self.field_values().unwrap_or_default();
        map.insert(
            name.to_string(),
            serde_json::Value::String(value.to_string()),
        );
        self.input_value = serde_json::Value::Object(map).to_string();
    }

    /// Parse `input_value` as a sub-field map. `None` for plain-text input.
    pub fn field_values(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        match serde_json::from_str(&self.input_value) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// A directed connection between two node instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: InstanceId,
    pub target: InstanceId,
}

impl GraphEdge {
    /// Edge with the conventional `e-{source}-{target}` id.
    pub fn between(source: &InstanceId, target: &InstanceId) -> Self {
        Self {
            id: format!("e-{}-{}", source, target),
            source: source.clone(),
            target: target.clone(),
        }
    }
}

/// How the linearizer keys its chain-walk lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKeying {
    /// Key by instance id. Two instances of one type stay distinct.
    #[default]
    Instance,
    /// Key by domain id. Instances of one type collide, last write wins.
    Domain,
}

/// Which executor endpoint a run is submitted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Batch,
    Stream,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Batch => write!(f, "batch"),
            RunMode::Stream => write!(f, "stream"),
        }
    }
}

// Wire types

/// One step of the execution list sent to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionListEntry {
    pub node_id: String,
    pub seq: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_input: Option<String>,
    pub node_name: String,
    #[serde(default)]
    pub node_result: String,
}

/// Current input of one node, keyed by domain id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInput {
    pub node_id: String,
    #[serde(default, deserialize_with = "input_text")]
    pub node_input: String,
}

/// Request body for both executor endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunGraphRequest {
    #[serde(rename = "graph_flowData")]
    pub graph_flow_data: Vec<ExecutionListEntry>,
    pub additional_input: Vec<AdditionalInput>,
}

/// One node's output as reported by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub node_id: String,
    #[serde(default)]
    pub node_result: serde_json::Value,
}

/// Everything a batch run returned, after unwrapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<ExecutionResult>,
    pub additional_input: Vec<AdditionalInput>,
}

/// One newline-delimited record from the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub results: Option<ExecutionResult>,
    /// `null` reads as empty; entries that are not `{node_id, node_input}`
    /// are dropped without losing the record's result.
    #[serde(default, deserialize_with = "lenient_inputs")]
    pub additional_input: Vec<AdditionalInput>,
}

/// `null` becomes `""`, a string is taken as-is, anything else (a multi-field
/// object, a number) is kept as its JSON text.
fn input_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_inputs<'de, D>(deserializer: D) -> std::result::Result<Vec<AdditionalInput>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_omits_missing_input() {
        let entry = ExecutionListEntry {
            node_id: "abc".into(),
            seq: 1,
            node_input: None,
            node_name: "Summarize_HTML".into(),
            node_result: String::new(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("node_input").is_none());
        assert_eq!(json["node_result"], "");
        assert_eq!(json["seq"], 1);
    }

    #[test]
    fn test_request_uses_wire_field_names() {
        let req = RunGraphRequest {
            graph_flow_data: vec![],
            additional_input: vec![AdditionalInput {
                node_id: "x".into(),
                node_input: String::new(),
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("graph_flowData").is_some());
        assert_eq!(json["additional_input"][0]["node_input"], "");
    }

    #[test]
    fn test_additional_input_accepts_null() {
        let ai: AdditionalInput =
            serde_json::from_str(r#"{"node_id":"x","node_input":null}"#).unwrap();
        assert_eq!(ai.node_input, "");
    }

    #[test]
    fn test_stream_record_null_additional_input() {
        let rec: StreamRecord = serde_json::from_str(
            r#"{"results":{"node_id":"a","node_result":"x"},"additional_input":null}"#,
        )
        .unwrap();
        assert_eq!(rec.results.unwrap().node_id, "a");
        assert!(rec.additional_input.is_empty());
    }

    #[test]
    fn test_stream_record_skips_bad_input_entries() {
        let rec: StreamRecord = serde_json::from_str(
            r#"{"results":{"node_id":"a","node_result":1},"additional_input":[42,{"node_id":"a","node_input":"ok"}]}"#,
        )
        .unwrap();
        assert_eq!(rec.additional_input.len(), 1);
        assert_eq!(rec.additional_input[0].node_input, "ok");
    }

    #[test]
    fn test_object_node_input_kept_as_json_text() {
        let ai: AdditionalInput =
            serde_json::from_str(r#"{"node_id":"blog","node_input":{"input":"x"}}"#).unwrap();
        assert_eq!(ai.node_input, r#"{"input":"x"}"#);
    }

    #[test]
    fn test_stream_record_without_results() {
        let rec: StreamRecord = serde_json::from_str(r#"{"status":"running"}"#).unwrap();
        assert!(rec.results.is_none());
        assert!(rec.additional_input.is_empty());
    }

    #[test]
    fn test_runtime_fields_not_serialized() {
        let mut node = GraphNode::new("node_1", "d1", "Send_Email");
        node.loading = true;
        node.validation_error = Some("bad".into());
        let json = serde_json::to_value(&node).unwrap();
        assert!(json.get("loading").is_none());
        assert!(json.get("validation_error").is_none());

        let back: GraphNode = serde_json::from_value(json).unwrap();
        assert!(!back.loading);
        assert!(back.validation_error.is_none());
    }

    #[test]
    fn test_set_field_builds_json_object() {
        let mut node = GraphNode::new("node_1", "d1", "Blog_Researcher");
        node.set_field("input", "rust async");
        node.set_field("refURL", "https://example.com");
        let fields = node.field_values().unwrap();
        assert_eq!(fields["input"], "rust async");
        assert_eq!(fields["refURL"], "https://example.com");
    }

    #[test]
    fn test_plain_input_has_no_fields() {
        let node = GraphNode::new("node_1", "d1", "Get_Weather").with_input("Paris");
        assert!(node.field_values().is_none());
        assert_eq!(node.input(), Some("Paris"));
    }
}
