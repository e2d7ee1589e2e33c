use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use flowline_core::error::{FlowError, Result};
use flowline_core::traits::Executor;
use flowline_core::types::{BatchOutcome, RunGraphRequest, StreamRecord};

/// A scripted batch response.
pub enum MockBatch {
    Ready(Result<BatchOutcome>),
    /// Never resolves; for exercising in-flight state and cancellation.
    Pending,
}

enum MockStream {
    Records(Vec<Result<StreamRecord>>),
    Live(mpsc::UnboundedReceiver<Result<StreamRecord>>),
    Fail(FlowError),
}

/// An `Executor` that replays scripted responses and records every request.
#[derive(Default)]
pub struct MockExecutor {
    batches: Mutex<VecDeque<MockBatch>>,
    streams: Mutex<VecDeque<MockStream>>,
    requests: Mutex<Vec<RunGraphRequest>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(self, outcome: BatchOutcome) -> Self {
        self.push_batch(MockBatch::Ready(Ok(outcome)));
        self
    }

    pub fn with_batch_error(self, err: FlowError) -> Self {
        self.push_batch(MockBatch::Ready(Err(err)));
        self
    }

    pub fn with_pending_batch(self) -> Self {
        self.push_batch(MockBatch::Pending);
        self
    }

    pub fn with_stream(self, records: Vec<Result<StreamRecord>>) -> Self {
        self.streams
            .lock()
            .unwrap()
            .push_back(MockStream::Records(records));
        self
    }

    pub fn with_stream_error(self, err: FlowError) -> Self {
        self.streams.lock().unwrap().push_back(MockStream::Fail(err));
        self
    }

    /// Queue a stream whose records are fed by the returned sender. The
    /// stream ends when the sender is dropped.
    pub fn live_stream(&self) -> mpsc::UnboundedSender<Result<StreamRecord>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(MockStream::Live(rx));
        tx
    }

    fn push_batch(&self, batch: MockBatch) {
        self.batches.lock().unwrap().push_back(batch);
    }

    /// Every request submitted so far, in order.
    pub fn requests(&self) -> Vec<RunGraphRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Executor for MockExecutor {
    fn run_batch(&self, request: RunGraphRequest) -> BoxFuture<'_, Result<BatchOutcome>> {
        self.requests.lock().unwrap().push(request);
        let next = self.batches.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(MockBatch::Ready(res)) => res,
                Some(MockBatch::Pending) => futures::future::pending().await,
                None => Err(FlowError::Transport("no scripted batch response".into())),
            }
        })
    }

    fn run_stream(
        &self,
        request: RunGraphRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamRecord>>>> {
        self.requests.lock().unwrap().push(request);
        let next = self.streams.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(MockStream::Records(records)) => Ok(stream::iter(records).boxed()),
                Some(MockStream::Live(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed()),
                Some(MockStream::Fail(err)) => Err(err),
                None => Err(FlowError::Transport("no scripted stream response".into())),
            }
        })
    }
}
