//! Decoding the batch endpoint's response.
//!
//! The executor wraps its results inconsistently, and sometimes returns them
//! as one string of JSON objects glued together (`{...}{...}`). Both quirks
//! are handled here. Do not tighten this without changing the executor first.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use flowline_core::error::{FlowError, Result};
use flowline_core::types::{AdditionalInput, BatchOutcome, ExecutionResult};

/// Locate the results payload in a batch response body.
///
/// Checks `body.result.results` (with `body.result.additional_input`), then
/// `body.result`, then the body itself. A string payload goes through
/// [`repair_concatenated`]; a single object is wrapped into a list. Entries
/// that are not `{node_id, node_result}` objects are skipped.
pub fn unwrap_batch_response(body: Value) -> Result<BatchOutcome> {
    let result = body.get("result").filter(|r| truthy(r)).cloned();
    let (payload, additional) = match result {
        Some(result) => {
            let nested = result.get("results").filter(|r| truthy(r)).cloned();
            match nested {
                Some(results) => (
                    results,
                    result.get("additional_input").cloned().unwrap_or(Value::Null),
                ),
                None => (result, Value::Null),
            }
        }
        None => (body, Value::Null),
    };

    let items = match payload {
        Value::String(text) => repair_concatenated(&text)?,
        Value::Array(items) => items,
        other => vec![other],
    };

    let results = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ExecutionResult>(item) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!(error = %e, "Skipping batch entry without node result");
                None
            }
        })
        .collect();

    Ok(BatchOutcome {
        results,
        additional_input: additional_inputs(additional),
    })
}

/// Split a string of directly concatenated JSON objects on `}{` boundaries
/// (whitespace between the braces allowed), put back the brace each split
/// removed, and parse every piece.
pub fn repair_concatenated(text: &str) -> Result<Vec<Value>> {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    let re = BOUNDARY.get_or_init(|| Regex::new(r"\}\s*\{").unwrap());

    let chunks: Vec<&str> = re.split(text).collect();
    let last = chunks.len() - 1;

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let fixed = if chunks.len() == 1 {
                chunk.to_string()
            } else if i == 0 {
                format!("{}}}", chunk)
            } else if i == last {
                format!("{{{}", chunk)
            } else {
                format!("{{{}}}", chunk)
            };
            serde_json::from_str(&fixed).map_err(|e| {
                FlowError::MalformedPayload(format!("segment {} of batch result: {}", i + 1, e))
            })
        })
        .collect()
}

fn additional_inputs(value: Value) -> Vec<AdditionalInput> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(ai) => Some(ai),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed additional_input entry");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Loose presence test: null, false, 0 and "" count as absent.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
