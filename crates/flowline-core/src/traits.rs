use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{BatchOutcome, RunGraphRequest, StreamRecord};

/// Remote workflow executor.
pub trait Executor: Send + Sync + 'static {
    /// Submit the whole execution list and wait for every result.
    fn run_batch(&self, request: RunGraphRequest) -> BoxFuture<'_, Result<BatchOutcome>>;

    /// Submit the execution list and receive results as they are produced.
    ///
    /// Malformed records are dropped inside the stream; an `Err` item means
    /// the transport failed and no further items will follow.
    fn run_stream(
        &self,
        request: RunGraphRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamRecord>>>>;

    /// Check that the executor is reachable.
    fn health(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}
