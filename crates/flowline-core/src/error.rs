use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Executor errors
    #[error("Executor request failed: {0}")]
    Transport(String),

    #[error("Executor returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Executor streaming error: {0}")]
    Stream(String),

    #[error("Malformed executor payload: {0}")]
    MalformedPayload(String),

    // Graph errors
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge endpoint not in graph: {0}")]
    EdgeEndpointMissing(String),

    #[error("Edge already exists: {from} -> {to}")]
    DuplicateEdge { from: String, to: String },

    #[error("Cannot connect node to itself: {0}")]
    SelfLoop(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid flow document: {0}")]
    InvalidDocument(String),

    // Session errors
    #[error("Flow session closed")]
    SessionClosed,

    #[error("A flow run is already in progress")]
    AlreadyRunning,

    #[error("Flow run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether this error came from talking to the executor (as opposed to
    /// local graph or session state).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FlowError::Transport(_)
                | FlowError::HttpStatus { .. }
                | FlowError::Stream(_)
                | FlowError::MalformedPayload(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
