use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, info};

use flowline_core::config::ExecutorConfig;
use flowline_core::error::{FlowError, Result};
use flowline_core::traits::Executor;
use flowline_core::types::{BatchOutcome, RunGraphRequest, StreamRecord};

use crate::batch::unwrap_batch_response;
use crate::streaming::NdjsonStream;

/// Executor reached over HTTP: `POST /run-graph`, `POST /run-graph-stream`,
/// `GET /health` (paths configurable).
pub struct HttpExecutor {
    http: Client,
    config: ExecutorConfig,
}

impl HttpExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| FlowError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    fn post(&self, url: &str, body: &RunGraphRequest) -> RequestBuilder {
        let mut req = self.http.post(url).json(body);
        for (k, v) in &self.config.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = req
            .send()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(FlowError::HttpStatus { status, body });
        }
        Ok(response)
    }
}

impl Executor for HttpExecutor {
    fn run_batch(&self, request: RunGraphRequest) -> BoxFuture<'_, Result<BatchOutcome>> {
        Box::pin(async move {
            let url = self.config.batch_url();
            info!(url = %url, entries = request.graph_flow_data.len(), "Submitting flow (batch)");

            let mut req = self.post(&url, &request);
            if self.config.timeout_secs > 0 {
                req = req.timeout(Duration::from_secs(self.config.timeout_secs));
            }
            let response = self.send(req).await?;

            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| FlowError::MalformedPayload(e.to_string()))?;
            let outcome = unwrap_batch_response(body)?;
            debug!(results = outcome.results.len(), "Batch response decoded");
            Ok(outcome)
        })
    }

    fn run_stream(
        &self,
        request: RunGraphRequest,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamRecord>>>> {
        Box::pin(async move {
            let url = self.config.stream_url();
            info!(url = %url, entries = request.graph_flow_data.len(), "Submitting flow (stream)");

            // No whole-request timeout here: the body stays open for the
            // duration of the run.
            let response = self.send(self.post(&url, &request)).await?;
            let records = NdjsonStream::new(response.bytes_stream());
            Ok(records.boxed())
        })
    }

    fn health(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut req = self.http.get(self.config.health_url());
            if self.config.timeout_secs > 0 {
                req = req.timeout(Duration::from_secs(self.config.timeout_secs.min(10)));
            }
            self.send(req).await?;
            Ok(())
        })
    }
}
