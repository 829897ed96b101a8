//! Domain event system: decoupled observation of agent runs.
//!
//! The kernel publishes events as runs progress. Anything that wants to
//! watch (a CLI progress line, an audit sink) subscribes without coupling
//! to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An orchestration run began
    RunStarted {
        conversation_id: String,
        trace_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The agent state machine moved
    StateTransitioned {
        conversation_id: String,
        from: String,
        event: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a think-phase turn
    ResponseGenerated {
        conversation_id: String,
        step: u32,
        tokens_used: Option<u32>,
        timestamp: DateTime<Utc>,
    },

    /// A tool call finished, successfully or not
    ToolExecuted {
        conversation_id: String,
        step: u32,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The set of tools visible to a run changed after a refresh
    ToolsetChanged {
        conversation_id: String,
        added: Vec<String>,
        removed: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// An orchestration run ended
    RunFinished {
        conversation_id: String,
        success: bool,
        termination_reason: String,
        steps: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
