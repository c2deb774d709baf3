use serde::Serialize;
use tokio::sync::broadcast;

use crate::registry::{LogEntry, Task};

/// A single state-change notification pushed to every connected observer.
///
/// Serialized shape is what dashboard clients consume, e.g.
/// `{"type":"task-update","task":{...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FeedEvent {
    /// Full task list, sent once per connection right after the handshake.
    Init { tasks: Vec<Task> },
    /// A task was created, patched, completed, or failed.
    TaskUpdate { task: Task },
    /// A single log line was appended to a task.
    #[serde(rename_all = "camelCase")]
    TaskLog { task_id: String, log: LogEntry },
    /// Finished tasks were removed from the registry.
    TasksCleared { ids: Vec<String> },
}

/// Broadcasts serialized feed events to all connected observers.
///
/// Each subscriber has its own bounded queue; a slow observer lags and
/// drops old events instead of stalling producers or other observers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Serialize once and send to all connected observers.
    pub fn broadcast(&self, event: &FeedEvent) {
        // Ignore errors; no observers connected is fine
        let _ = self
            .tx
            .send(serde_json::to_string(event).unwrap_or_default());
    }

    /// Subscribe to all feed events.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
