use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use flowline_core::error::{FlowError, Result};
use flowline_core::event::{FlowEvent, RunStatus};
use flowline_core::types::{ExecutionListEntry, GraphEdge, GraphNode, InstanceId, RunMode};
use flowline_core::EventBus;
use flowline_graph::{FlowDocument, ValidationSummary};

type Reply<T> = oneshot::Sender<Result<T>>;

/// A request queued for the session actor.
pub(crate) enum Command {
    AddNode {
        domain_id: String,
        respond: Reply<InstanceId>,
    },
    Connect {
        source: InstanceId,
        target: InstanceId,
        respond: Reply<GraphEdge>,
    },
    Disconnect {
        edge_id: String,
        respond: Reply<Option<GraphEdge>>,
    },
    DeleteNode {
        id: InstanceId,
        respond: Reply<GraphNode>,
    },
    SetInput {
        id: InstanceId,
        value: String,
        respond: Reply<()>,
    },
    SetField {
        id: InstanceId,
        field: String,
        value: String,
        respond: Reply<()>,
    },
    Clear {
        respond: Reply<()>,
    },
    LoadTemplate {
        template_id: String,
        respond: Reply<()>,
    },
    Import {
        json: String,
        respond: Reply<usize>,
    },
    Export {
        respond: Reply<Option<FlowDocument>>,
    },
    Snapshot {
        respond: Reply<GraphSnapshot>,
    },
    Validate {
        respond: Reply<ValidationSummary>,
    },
    ExecutionList {
        respond: Reply<Vec<ExecutionListEntry>>,
    },
    Run {
        mode: RunMode,
        respond: Reply<Submission>,
    },
    Cancel {
        respond: Reply<bool>,
    },
}

/// Point-in-time copy of a session's graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &InstanceId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.instance_id == id)
    }
}

/// What happened to a run request.
#[derive(Debug)]
pub enum Submission {
    /// The request went out; the ticket resolves when the run ends.
    Started(RunTicket),
    /// Pre-flight validation failed; nothing was sent.
    Invalid(ValidationSummary),
    /// The flow is empty or has no orderable chain; nothing was sent.
    NothingToRun,
}

/// Handle on one in-flight run.
#[derive(Debug)]
pub struct RunTicket {
    pub run_id: u64,
    done: oneshot::Receiver<RunStatus>,
}

impl RunTicket {
    pub(crate) fn new(run_id: u64, done: oneshot::Receiver<RunStatus>) -> Self {
        Self { run_id, done }
    }

    /// Wait for the run to complete, fail, or be cancelled.
    pub async fn finished(self) -> Result<RunStatus> {
        self.done.await.map_err(|_| FlowError::SessionClosed)
    }
}

/// Cloneable front end of a session. Every call is queued and handled in
/// order by the session actor.
#[derive(Clone)]
pub struct FlowHandle {
    tx: mpsc::Sender<Command>,
    bus: Arc<EventBus>,
}

impl FlowHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>, bus: Arc<EventBus>) -> Self {
        Self { tx, bus }
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (respond, rx) = oneshot::channel();
        self.tx
            .send(make(respond))
            .await
            .map_err(|_| FlowError::SessionClosed)?;
        rx.await.map_err(|_| FlowError::SessionClosed)?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.bus.subscribe()
    }

    /// Place a new node of the given palette type.
    pub async fn add_node(&self, domain_id: &str) -> Result<InstanceId> {
        let domain_id = domain_id.to_string();
        self.request(|respond| Command::AddNode { domain_id, respond })
            .await
    }

    pub async fn connect(&self, source: &InstanceId, target: &InstanceId) -> Result<GraphEdge> {
        let (source, target) = (source.clone(), target.clone());
        self.request(|respond| Command::Connect {
            source,
            target,
            respond,
        })
        .await
    }

    pub async fn disconnect(&self, edge_id: &str) -> Result<Option<GraphEdge>> {
        let edge_id = edge_id.to_string();
        self.request(|respond| Command::Disconnect { edge_id, respond })
            .await
    }

    pub async fn delete_node(&self, id: &InstanceId) -> Result<GraphNode> {
        let id = id.clone();
        self.request(|respond| Command::DeleteNode { id, respond })
            .await
    }

    pub async fn set_input(&self, id: &InstanceId, value: impl Into<String>) -> Result<()> {
        let (id, value) = (id.clone(), value.into());
        self.request(|respond| Command::SetInput { id, value, respond })
            .await
    }

    pub async fn set_field(&self, id: &InstanceId, field: &str, value: &str) -> Result<()> {
        let (id, field, value) = (id.clone(), field.to_string(), value.to_string());
        self.request(|respond| Command::SetField {
            id,
            field,
            value,
            respond,
        })
        .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(|respond| Command::Clear { respond }).await
    }

    pub async fn load_template(&self, template_id: &str) -> Result<()> {
        let template_id = template_id.to_string();
        self.request(|respond| Command::LoadTemplate {
            template_id,
            respond,
        })
        .await
    }

    /// Append the flow described by an export document.
    pub async fn import_json(&self, json: impl Into<String>) -> Result<usize> {
        let json = json.into();
        self.request(|respond| Command::Import { json, respond })
            .await
    }

    pub async fn export(&self) -> Result<Option<FlowDocument>> {
        self.request(|respond| Command::Export { respond }).await
    }

    pub async fn snapshot(&self) -> Result<GraphSnapshot> {
        self.request(|respond| Command::Snapshot { respond }).await
    }

    /// Run pre-flight validation and annotate the graph, without submitting.
    pub async fn validate(&self) -> Result<ValidationSummary> {
        self.request(|respond| Command::Validate { respond }).await
    }

    pub async fn execution_list(&self) -> Result<Vec<ExecutionListEntry>> {
        self.request(|respond| Command::ExecutionList { respond })
            .await
    }

    /// Validate, linearize and submit the flow.
    ///
    /// Fails with `AlreadyRunning` while a previous run is outstanding.
    pub async fn run(&self, mode: RunMode) -> Result<Submission> {
        self.request(|respond| Command::Run { mode, respond }).await
    }

    /// Cancel the in-flight run. Returns `false` if nothing was running.
    pub async fn cancel(&self) -> Result<bool> {
        self.request(|respond| Command::Cancel { respond }).await
    }
}
