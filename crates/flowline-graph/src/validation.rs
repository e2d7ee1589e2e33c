use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use flowline_core::types::{GraphNode, InstanceId};

use crate::palette::{
    CONVERT_TO_HTML_TEMPLATE, FETCH_HTML_CONTENT, FETCH_TOP_NEWS, GET_WEATHER, SEND_EMAIL,
    SUMMARIZE_HTML,
};

/// Input format rule applied to a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Url,
    Email,
    CityName,
    OptionalText,
    NoInput,
    Text,
}

impl Rule {
    pub fn for_type(domain_id: &str) -> Self {
        match domain_id {
            FETCH_HTML_CONTENT => Rule::Url,
            SEND_EMAIL => Rule::Email,
            GET_WEATHER => Rule::CityName,
            FETCH_TOP_NEWS => Rule::OptionalText,
            SUMMARIZE_HTML | CONVERT_TO_HTML_TEMPLATE => Rule::NoInput,
            _ => Rule::Text,
        }
    }

    /// Check `value`, returning the user-facing message on failure.
    pub fn check(self, value: &str) -> Result<(), String> {
        match self {
            Rule::Url => check_url(value),
            Rule::Email => check_email(value),
            Rule::CityName => check_city(value),
            Rule::OptionalText | Rule::NoInput => Ok(()),
            Rule::Text => check_text(value),
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Rule::Url => "Enter URL (e.g., www.google.com or https://example.com)",
            Rule::Email => "Enter a valid email address (e.g., user@example.com)",
            Rule::CityName => "Enter a valid city name (letters, spaces, hyphens only)",
            Rule::OptionalText => {
                "Enter category (optional): technology, business, science, world, politics, or leave empty for general news"
            }
            Rule::NoInput => "No input required",
            Rule::Text => "Enter required text",
        }
    }
}

/// Validate one value against the rule for its node type.
pub fn validate_input(domain_id: &str, value: &str) -> Result<(), String> {
    Rule::for_type(domain_id).check(value)
}

pub fn validation_hint(domain_id: &str) -> &'static str {
    Rule::for_type(domain_id).hint()
}

fn check_url(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("URL is required".into());
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).map_err(|_| "Please enter a valid URL".to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err("URL must use HTTP or HTTPS protocol".into());
    }

    let host = url.host_str().unwrap_or_default();
    if host.is_empty() {
        return Err("Please enter a valid domain name".into());
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err("Please enter a complete domain name (e.g., example.com)".into());
    }
    if labels[labels.len() - 1].chars().count() < 2 {
        return Err("Please enter a complete domain name with top-level domain".into());
    }

    Ok(())
}

fn check_email(value: &str) -> Result<(), String> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    if value.trim().is_empty() {
        return Err("Email address is required".into());
    }
    let re = EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
    if !re.is_match(value) {
        return Err("Please enter a valid email address".into());
    }
    Ok(())
}

fn check_city(value: &str) -> Result<(), String> {
    static CITY: OnceLock<Regex> = OnceLock::new();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("City name is required".into());
    }
    if trimmed.chars().count() < 2 {
        return Err("City name must be at least 2 characters".into());
    }
    let re = CITY.get_or_init(|| Regex::new(r"^[a-zA-Z\s\-']+$").unwrap());
    if !re.is_match(trimmed) {
        return Err("City name contains invalid characters".into());
    }
    Ok(())
}

fn check_text(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("This field is required".into());
    }
    Ok(())
}

/// A failing node and why it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeValidationError {
    pub instance_id: InstanceId,
    pub title: String,
    pub message: String,
}

/// Outcome of checking every node in a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<NodeValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, id: &InstanceId) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| &e.instance_id == id)
            .map(|e| e.message.as_str())
    }

    pub fn node_errors(&self) -> HashMap<InstanceId, String> {
        self.errors
            .iter()
            .map(|e| (e.instance_id.clone(), e.message.clone()))
            .collect()
    }

    pub fn summary(&self) -> ValidationSummary {
        if self.is_valid() {
            return ValidationSummary {
                ok: true,
                message: "All nodes are valid!".into(),
                details: Vec::new(),
            };
        }
        let n = self.errors.len();
        ValidationSummary {
            ok: false,
            message: format!(
                "{} node{} have validation errors",
                n,
                if n > 1 { "s" } else { "" }
            ),
            details: self
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.title, e.message))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub ok: bool,
    pub message: String,
    pub details: Vec<String>,
}

/// Check every node whose type takes typed input (file and html inputs are
/// not checked).
pub fn validate_all(nodes: &[GraphNode]) -> ValidationReport {
    let errors = nodes
        .iter()
        .filter(|n| n.input_kind.is_validated())
        .filter_map(|n| {
            validate_input(&n.domain_id, &n.input_value)
                .err()
                .map(|message| NodeValidationError {
                    instance_id: n.instance_id.clone(),
                    title: n.title.clone(),
                    message,
                })
        })
        .collect();
    ValidationReport { errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::types::InputKind;

    #[test]
    fn test_url_rule() {
        assert!(check_url("www.google.com").is_ok());
        assert!(check_url("https://example.com/path?q=1").is_ok());
        assert!(check_url("  http://news.ycombinator.com  ").is_ok());
        assert_eq!(check_url("").unwrap_err(), "URL is required");
        assert_eq!(
            check_url("localhost").unwrap_err(),
            "Please enter a complete domain name (e.g., example.com)"
        );
        assert_eq!(
            check_url("example.c").unwrap_err(),
            "Please enter a complete domain name with top-level domain"
        );
        assert_eq!(check_url("exa mple.com").unwrap_err(), "Please enter a valid URL");
    }

    #[test]
    fn test_email_rule() {
        assert!(check_email("user@example.com").is_ok());
        assert_eq!(check_email("  ").unwrap_err(), "Email address is required");
        assert_eq!(
            check_email("user@example").unwrap_err(),
            "Please enter a valid email address"
        );
        assert!(check_email("a b@example.com").is_err());
    }

    #[test]
    fn test_city_rule() {
        assert!(check_city("Paris").is_ok());
        assert!(check_city("Saint-Étienne").is_err());
        assert!(check_city("L'Aquila").is_ok());
        assert!(check_city(" New York ").is_ok());
        assert_eq!(check_city("X").unwrap_err(), "City name must be at least 2 characters");
        assert_eq!(check_city("Paris 75").unwrap_err(), "City name contains invalid characters");
    }

    #[test]
    fn test_rule_routing() {
        assert_eq!(Rule::for_type(FETCH_HTML_CONTENT), Rule::Url);
        assert_eq!(Rule::for_type(SUMMARIZE_HTML), Rule::NoInput);
        assert_eq!(Rule::for_type("unknown-type"), Rule::Text);
        assert!(validate_input(FETCH_TOP_NEWS, "").is_ok());
        assert!(validate_input("unknown-type", "").is_err());
        assert_eq!(validation_hint(SUMMARIZE_HTML), "No input required");
    }

    #[test]
    fn test_validate_all_skips_untyped_and_file_inputs() {
        let nodes = vec![
            GraphNode::new("n1", SEND_EMAIL, "Send_Email")
                .with_input_kind(InputKind::Text)
                .with_input("not-an-email"),
            GraphNode::new("n2", "some-type", "Template_Generator")
                .with_input_kind(InputKind::File),
            GraphNode::new("n3", "some-type", "HTML_Editor").with_input_kind(InputKind::Html),
            GraphNode::new("n4", SUMMARIZE_HTML, "Summarize_HTML"),
            GraphNode::new("n5", GET_WEATHER, "Get_Weather")
                .with_input_kind(InputKind::Text)
                .with_input("Oslo"),
        ];
        let report = validate_all(&nodes);
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.error_for(&InstanceId::from("n1")),
            Some("Please enter a valid email address")
        );
        assert!(report.error_for(&InstanceId::from("n5")).is_none());
    }

    #[test]
    fn test_summary_messages() {
        assert_eq!(ValidationReport::default().summary().message, "All nodes are valid!");

        let report = ValidationReport {
            errors: vec![
                NodeValidationError {
                    instance_id: "a".into(),
                    title: "Get_Weather".into(),
                    message: "City name is required".into(),
                },
                NodeValidationError {
                    instance_id: "b".into(),
                    title: "Send_Email".into(),
                    message: "Email address is required".into(),
                },
            ],
        };
        let summary = report.summary();
        assert!(!summary.ok);
        assert_eq!(summary.message, "2 nodes have validation errors");
        assert_eq!(summary.details[0], "Get_Weather: City name is required");
        assert_eq!(report.node_errors().len(), 2);
    }
}
