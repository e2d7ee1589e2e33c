pub mod batch;
pub mod http;
pub mod streaming;

pub use batch::{repair_concatenated, unwrap_batch_response};
pub use http::HttpExecutor;
pub use streaming::{NdjsonParser, NdjsonStream};
