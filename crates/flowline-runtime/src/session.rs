use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flowline_core::config::{AppConfig, RunConfig, SessionConfig};
use flowline_core::error::{FlowError, Result};
use flowline_core::event::{FlowEvent, NoticeLevel, RunStatus};
use flowline_core::ids::{IdGenerator, SequentialIds};
use flowline_core::traits::Executor;
use flowline_core::types::{InstanceId, RunMode};
use flowline_core::EventBus;
use flowline_graph::{validate_all, FlowDocument, FlowGraph, FlowTemplate, Palette};

use crate::lane::{Command, FlowHandle, GraphSnapshot, RunTicket, Submission};
use crate::run::{drive, RunMessage};

struct ActiveRun {
    id: u64,
    mode: RunMode,
    cancel: CancellationToken,
    done: oneshot::Sender<RunStatus>,
}

/// The single writer of one flow graph.
///
/// Built with [`FlowSession::new`], then moved onto its own task by
/// [`FlowSession::spawn`]. The task ends when every [`FlowHandle`] is dropped.
pub struct FlowSession {
    graph: FlowGraph,
    palette: Palette,
    executor: Arc<dyn Executor>,
    bus: Arc<EventBus>,
    run_config: RunConfig,
    session_config: SessionConfig,
    active: Option<ActiveRun>,
    runs: u64,
}

impl FlowSession {
    pub fn new(executor: Arc<dyn Executor>, config: &AppConfig) -> Self {
        Self {
            graph: FlowGraph::new(Arc::new(SequentialIds::default())),
            palette: Palette::builtin(),
            executor,
            bus: Arc::new(EventBus::new(config.session.event_capacity.max(1))),
            run_config: config.run.clone(),
            session_config: config.session.clone(),
            active: None,
            runs: 0,
        }
    }

    /// Use a different instance id source. Discards any existing graph.
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.graph = FlowGraph::new(ids);
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn spawn(self) -> FlowHandle {
        let (tx, rx) = mpsc::channel(self.session_config.queue_depth.max(1));
        let handle = FlowHandle::new(tx, self.bus.clone());
        tokio::spawn(self.serve(rx));
        handle
    }

    async fn serve(mut self, mut commands: mpsc::Receiver<Command>) {
        let (run_tx, mut run_rx) = mpsc::unbounded_channel();
        debug!("Flow session started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, &run_tx),
                    None => break,
                },
                Some(message) = run_rx.recv() => self.on_run_message(message),
            }
        }

        if let Some(run) = self.active.take() {
            run.cancel.cancel();
        }
        debug!("Flow session closed");
    }

    fn handle(&mut self, command: Command, run_tx: &mpsc::UnboundedSender<RunMessage>) {
        match command {
            Command::AddNode { domain_id, respond } => {
                let result = match self.palette.get(&domain_id) {
                    Some(ty) => Ok(self.graph.add_node(ty)),
                    None => Err(FlowError::UnknownNodeType(domain_id)),
                };
                self.changed_if(result.is_ok());
                let _ = respond.send(result);
            }
            Command::Connect {
                source,
                target,
                respond,
            } => {
                let result = self.graph.connect(&source, &target).cloned();
                self.changed_if(result.is_ok());
                let _ = respond.send(result);
            }
            Command::Disconnect { edge_id, respond } => {
                let removed = self.graph.disconnect(&edge_id);
                self.changed_if(removed.is_some());
                let _ = respond.send(Ok(removed));
            }
            Command::DeleteNode { id, respond } => {
                let result = self.graph.delete_node(&id);
                self.changed_if(result.is_ok());
                let _ = respond.send(result);
            }
            Command::SetInput { id, value, respond } => {
                let _ = respond.send(self.graph.set_input(&id, value));
            }
            Command::SetField {
                id,
                field,
                value,
                respond,
            } => {
                let _ = respond.send(self.graph.set_field(&id, &field, &value));
            }
            Command::Clear { respond } => {
                self.graph.clear();
                self.changed_if(true);
                let _ = respond.send(Ok(()));
            }
            Command::LoadTemplate {
                template_id,
                respond,
            } => {
                let result = FlowTemplate::find(&template_id)
                    .and_then(|t| self.graph.load_template(&t, &self.palette));
                if result.is_ok() {
                    self.changed_if(true);
                    self.notify(NoticeLevel::Success, "Flow loaded successfully!");
                }
                let _ = respond.send(result);
            }
            Command::Import { json, respond } => {
                let _ = respond.send(self.import(&json));
            }
            Command::Export { respond } => {
                let doc = self.graph.export();
                if doc.is_none() {
                    self.notify(NoticeLevel::Warning, "No nodes to export");
                }
                let _ = respond.send(Ok(doc));
            }
            Command::Snapshot { respond } => {
                let _ = respond.send(Ok(GraphSnapshot {
                    nodes: self.graph.nodes().to_vec(),
                    edges: self.graph.edges().to_vec(),
                }));
            }
            Command::Validate { respond } => {
                let report = validate_all(self.graph.nodes());
                self.graph.apply_validation(&report);
                let _ = respond.send(Ok(report.summary()));
            }
            Command::ExecutionList { respond } => {
                let list = self.graph.execution_list(self.run_config.chain_keying);
                let _ = respond.send(Ok(list));
            }
            Command::Run { mode, respond } => {
                let _ = respond.send(self.start_run(mode, run_tx));
            }
            Command::Cancel { respond } => {
                let _ = respond.send(Ok(self.cancel_run()));
            }
        }
    }

    fn import(&mut self, json: &str) -> Result<usize> {
        let result = FlowDocument::from_json(json).and_then(|doc| self.graph.import(doc));
        match &result {
            Ok(_) => {
                self.changed_if(true);
                self.notify(NoticeLevel::Success, "Flow imported successfully!");
            }
            Err(e) => {
                warn!(error = %e, "Import rejected");
                self.notify(NoticeLevel::Error, "Invalid import file format");
            }
        }
        result
    }

    fn start_run(
        &mut self,
        mode: RunMode,
        run_tx: &mpsc::UnboundedSender<RunMessage>,
    ) -> Result<Submission> {
        if let Some(run) = &self.active {
            warn!(run_id = run.id, "Run requested while another is in flight");
            return Err(FlowError::AlreadyRunning);
        }

        if self.graph.is_empty() {
            self.notify(NoticeLevel::Warning, "No nodes to validate");
            return Ok(Submission::NothingToRun);
        }

        let report = validate_all(self.graph.nodes());
        self.graph.apply_validation(&report);
        if !report.is_valid() {
            let summary = report.summary();
            info!(errors = report.errors.len(), "Flow failed validation");
            self.notify(NoticeLevel::Error, summary.message.clone());
            return Ok(Submission::Invalid(summary));
        }

        self.graph.set_all_loading(true);
        let request = match self.graph.build_request(self.run_config.chain_keying) {
            Some(request) => request,
            None => {
                self.graph.set_all_loading(false);
                self.notify(NoticeLevel::Warning, "No valid execution list generated");
                return Ok(Submission::NothingToRun);
            }
        };

        self.runs += 1;
        let run_id = self.runs;
        let entries = request.graph_flow_data.len();
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(drive(
            self.executor.clone(),
            request,
            mode,
            run_id,
            cancel.clone(),
            run_tx.clone(),
        ));
        self.active = Some(ActiveRun {
            id: run_id,
            mode,
            cancel,
            done: done_tx,
        });

        info!(run_id, mode = %mode, entries, "Flow run started");
        self.bus.publish(FlowEvent::RunStarted {
            run_id,
            mode,
            entries,
        });
        Ok(Submission::Started(RunTicket::new(run_id, done_rx)))
    }

    fn cancel_run(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.graph.set_all_loading(false);
        self.notify(NoticeLevel::Warning, "Flow execution cancelled");
        self.finish(RunStatus::Cancelled);
        true
    }

    fn on_run_message(&mut self, message: RunMessage) {
        let current = self.active.as_ref().map(|r| r.id);
        if current != Some(message.run_id()) {
            debug!(run_id = message.run_id(), "Ignoring message from a finished run");
            return;
        }

        match message {
            RunMessage::Batch {
                outcome: Ok(outcome),
                ..
            } => {
                let completed: Vec<InstanceId> = self
                    .graph
                    .nodes()
                    .iter()
                    .filter(|n| outcome.results.iter().any(|r| r.node_id == n.domain_id))
                    .map(|n| n.instance_id.clone())
                    .collect();
                let updated = self.graph.apply_batch(&outcome);
                debug!(results = outcome.results.len(), updated, "Applied batch results");
                self.completed(completed);
                self.notify(NoticeLevel::Success, "Flow executed successfully!");
                self.finish(RunStatus::Completed);
            }
            RunMessage::Batch { outcome: Err(e), .. } => {
                error!(error = %e, "Batch run failed");
                self.graph.set_all_loading(false);
                self.notify(NoticeLevel::Error, "Failed to execute flow");
                self.finish(RunStatus::Failed);
            }
            RunMessage::Record { record, .. } => {
                let completed = self.graph.apply_stream_record(&record);
                if completed.is_empty() {
                    debug!("Streamed record matched no node");
                }
                self.completed(completed);
            }
            RunMessage::StreamEnded { outcome: Ok(()), .. } => {
                if self.run_config.clear_loading_on_stream_end {
                    let left = self.graph.loading_count();
                    if left > 0 {
                        debug!(nodes = left, "Clearing loaders with no streamed result");
                    }
                    self.graph.set_all_loading(false);
                }
                self.notify(NoticeLevel::Success, "Flow executed successfully!");
                self.finish(RunStatus::Completed);
            }
            RunMessage::StreamEnded { outcome: Err(e), .. } => {
                error!(error = %e, "Stream run failed");
                self.graph.set_all_loading(false);
                self.notify(NoticeLevel::Error, "Stream execution failed");
                self.finish(RunStatus::Failed);
            }
        }
    }

    fn completed(&self, instances: Vec<InstanceId>) {
        let Some(run_id) = self.active.as_ref().map(|r| r.id) else {
            return;
        };
        for instance_id in instances {
            let domain_id = self
                .graph
                .node(&instance_id)
                .map(|n| n.domain_id.clone())
                .unwrap_or_default();
            self.bus.publish(FlowEvent::NodeCompleted {
                run_id,
                instance_id,
                domain_id,
            });
        }
    }

    fn finish(&mut self, status: RunStatus) {
        let Some(run) = self.active.take() else {
            return;
        };
        run.cancel.cancel();
        info!(run_id = run.id, mode = %run.mode, status = ?status, "Flow run finished");
        let _ = run.done.send(status);
        self.bus.publish(FlowEvent::RunFinished {
            run_id: run.id,
            status,
        });
    }

    fn changed_if(&self, changed: bool) {
        if changed {
            self.bus.publish(FlowEvent::GraphChanged {
                nodes: self.graph.nodes().len(),
                edges: self.graph.edges().len(),
            });
        }
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.bus.publish(FlowEvent::notice(level, message));
    }
}
