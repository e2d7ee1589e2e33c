//! Flow graph model: everything that happens to a flow before it reaches
//! the executor.
//!
//! A flow is a collection of `GraphNode`s joined by directed `GraphEdge`s.
//! `FlowGraph` owns both collections and implements the editing operations
//! (including chain splicing on delete) and result reconciliation.
//! `linearize` turns a flow into the sequence-numbered execution list the
//! executor expects, and `validation` runs the per-type input checks that
//! gate submission.

pub mod document;
pub mod graph;
pub mod linearize;
pub mod merge;
pub mod palette;
pub mod templates;
pub mod validation;

pub use document::{FlowDocument, FlowMetadata};
pub use graph::FlowGraph;
pub use linearize::linearize;
pub use palette::{NodeType, Palette};
pub use templates::FlowTemplate;
pub use validation::{validate_all, ValidationReport, ValidationSummary};
