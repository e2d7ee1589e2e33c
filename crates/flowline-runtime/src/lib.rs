//! Flow sessions.
//!
//! A session owns one `FlowGraph` and is the only thing allowed to mutate
//! it. Editors and run tasks talk to it through a command queue, so a result
//! arriving mid-edit is applied between edits, never during one.

pub mod lane;
pub mod run;
pub mod session;

pub use lane::{FlowHandle, GraphSnapshot, RunTicket, Submission};
pub use session::FlowSession;
