use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use flowline_core::error::Result;
use flowline_core::traits::Executor;
use flowline_core::types::{BatchOutcome, RunGraphRequest, RunMode, StreamRecord};

/// Progress reported by a run task back to its session.
#[derive(Debug)]
pub enum RunMessage {
    Batch {
        run_id: u64,
        outcome: Result<BatchOutcome>,
    },
    Record {
        run_id: u64,
        record: StreamRecord,
    },
    StreamEnded {
        run_id: u64,
        outcome: Result<()>,
    },
}

impl RunMessage {
    pub fn run_id(&self) -> u64 {
        match self {
            RunMessage::Batch { run_id, .. }
            | RunMessage::Record { run_id, .. }
            | RunMessage::StreamEnded { run_id, .. } => *run_id,
        }
    }
}

/// Submit one request and forward everything the executor returns.
///
/// Nothing is reported after cancellation; the session has already closed
/// the run by then.
pub async fn drive(
    executor: Arc<dyn Executor>,
    request: RunGraphRequest,
    mode: RunMode,
    run_id: u64,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<RunMessage>,
) {
    match mode {
        RunMode::Batch => {
            let outcome = tokio::select! {
                outcome = executor.run_batch(request) => outcome,
                _ = cancel.cancelled() => return,
            };
            let _ = tx.send(RunMessage::Batch { run_id, outcome });
        }
        RunMode::Stream => {
            let opened = tokio::select! {
                opened = executor.run_stream(request) => opened,
                _ = cancel.cancelled() => return,
            };
            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(RunMessage::StreamEnded {
                        run_id,
                        outcome: Err(e),
                    });
                    return;
                }
            };

            let mut received = 0usize;
            loop {
                let item = tokio::select! {
                    item = stream.next() => item,
                    _ = cancel.cancelled() => return,
                };
                match item {
                    Some(Ok(record)) => {
                        received += 1;
                        if tx.send(RunMessage::Record { run_id, record }).is_err() {
                            warn!(run_id, "Session gone, dropping stream");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(RunMessage::StreamEnded {
                            run_id,
                            outcome: Err(e),
                        });
                        return;
                    }
                    None => break,
                }
            }

            debug!(run_id, records = received, "Stream closed");
            let _ = tx.send(RunMessage::StreamEnded {
                run_id,
                outcome: Ok(()),
            });
        }
    }
}
