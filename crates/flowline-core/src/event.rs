use serde::Serialize;

use crate::types::{InstanceId, RunMode};

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Events published by a flow session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    GraphChanged {
        nodes: usize,
        edges: usize,
    },
    RunStarted {
        run_id: u64,
        mode: RunMode,
        entries: usize,
    },
    NodeCompleted {
        run_id: u64,
        instance_id: InstanceId,
        domain_id: String,
    },
    RunFinished {
        run_id: u64,
        status: RunStatus,
    },
    /// A single transient notification for whoever is watching the session.
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

impl FlowEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        FlowEvent::Notice {
            level,
            message: message.into(),
        }
    }
}

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<FlowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: FlowEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<FlowEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_notices() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(FlowEvent::notice(NoticeLevel::Warning, "No nodes to validate"));

        match rx.recv().await.unwrap() {
            FlowEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Warning);
                assert_eq!(message, "No nodes to validate");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(FlowEvent::GraphChanged { nodes: 0, edges: 0 });
    }
}
