pub mod error;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::feed::event::{EventBroadcaster, FeedEvent};
pub use error::RegistryError;

/// Per-task log retention: once a task holds this many entries, the oldest
/// entry is evicted for each new one.
pub const MAX_TASK_LOGS: usize = 100;

// ─── Task model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Complete,
    Failed,
}

impl TaskStatus {
    /// `complete` and `failed` are terminal; `clear_finished` removes them.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }
}

/// A single log line reported against a task. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub message: String,
    pub level: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// A unit of producer-reported work.
///
/// Timestamps serialize as milliseconds since the epoch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub progress: i64,
    pub total: i64,
    pub logs: VecDeque<LogEntry>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_time: Option<DateTime<Utc>>,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Producer-supplied update fields.
///
/// Closed schema: only the fields named here are ever applied. Unknown keys
/// in a request body are ignored, so a producer cannot reach `status`,
/// `logs`, or the timestamps through an update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub name: Option<String>,
    pub progress: Option<i64>,
    pub total: Option<i64>,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// In-memory task registry. Process-lifetime state; a restart starts empty.
///
/// Every mutating method takes the write lock, applies the change, and
/// enqueues the matching feed event before releasing it, so observers see
/// events in exactly the order mutations were applied.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
    broadcaster: Arc<EventBroadcaster>,
}

impl TaskRegistry {
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    /// Number of tasks currently in the registry.
    pub fn len(&self) -> usize {
        self.tasks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of all tasks, decoupled from internal storage.
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.read().unwrap().values().cloned().collect()
    }

    /// Create a task with defaults, or patch an existing one.
    ///
    /// Creation sets `status=running`, zero counters, empty logs, and
    /// `start_time=now`; the patch is applied on top. On an existing task
    /// the patch is applied and `updated_time` is set. Never fails.
    pub fn upsert(&self, id: &str, patch: TaskPatch) -> Task {
        let mut tasks = self.tasks.write().unwrap();
        let task = match tasks.get_mut(id) {
            Some(task) => {
                if let Some(name) = patch.name {
                    task.name = name;
                }
                if let Some(progress) = patch.progress {
                    task.progress = progress;
                }
                if let Some(total) = patch.total {
                    task.total = total;
                }
                task.updated_time = Some(Utc::now());
                task.clone()
            }
            None => {
                let task = Task {
                    id: id.to_string(),
                    name: patch.name.unwrap_or_else(|| id.to_string()),
                    status: TaskStatus::Running,
                    progress: patch.progress.unwrap_or(0),
                    total: patch.total.unwrap_or(0),
                    logs: VecDeque::new(),
                    start_time: Utc::now(),
                    updated_time: None,
                    end_time: None,
                    summary: None,
                    error: None,
                };
                info!(id = %id, name = %task.name, "task created");
                tasks.insert(id.to_string(), task.clone());
                task
            }
        };
        self.broadcaster
            .broadcast(&FeedEvent::TaskUpdate { task: task.clone() });
        task
    }

    /// Append a log entry, evicting the oldest past [`MAX_TASK_LOGS`].
    pub fn append_log(
        &self,
        id: &str,
        message: &str,
        level: &str,
    ) -> Result<LogEntry, RegistryError> {
        let mut tasks = self.tasks.write().unwrap();
        let task = tasks.get_mut(id).ok_or_else(|| RegistryError::NotFound {
            id: id.to_string(),
        })?;

        let entry = LogEntry {
            message: message.to_string(),
            level: level.to_string(),
            timestamp: Utc::now(),
        };
        if task.logs.len() == MAX_TASK_LOGS {
            task.logs.pop_front();
        }
        task.logs.push_back(entry.clone());
        task.updated_time = Some(entry.timestamp);

        self.broadcaster.broadcast(&FeedEvent::TaskLog {
            task_id: id.to_string(),
            log: entry.clone(),
        });
        Ok(entry)
    }

    /// Mark a task complete. Re-completion overwrites the previous summary
    /// and end time; a previous failure payload is cleared.
    pub fn complete(&self, id: &str, summary: Option<String>) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.write().unwrap();
        let task = tasks.get_mut(id).ok_or_else(|| RegistryError::NotFound {
            id: id.to_string(),
        })?;

        let now = Utc::now();
        task.status = TaskStatus::Complete;
        task.end_time = Some(now);
        task.updated_time = Some(now);
        task.summary = summary;
        task.error = None;
        info!(id = %id, "task complete");

        let task = task.clone();
        self.broadcaster
            .broadcast(&FeedEvent::TaskUpdate { task: task.clone() });
        Ok(task)
    }

    /// Mark a task failed. Overwrites any previous terminal payload.
    pub fn fail(&self, id: &str, error: Option<String>) -> Result<Task, RegistryError> {
        let mut tasks = self.tasks.write().unwrap();
        let task = tasks.get_mut(id).ok_or_else(|| RegistryError::NotFound {
            id: id.to_string(),
        })?;

        let now = Utc::now();
        task.status = TaskStatus::Failed;
        task.end_time = Some(now);
        task.updated_time = Some(now);
        task.error = error;
        task.summary = None;
        info!(id = %id, "task failed");

        let task = task.clone();
        self.broadcaster
            .broadcast(&FeedEvent::TaskUpdate { task: task.clone() });
        Ok(task)
    }

    /// Remove every task in a terminal state; returns the removed ids.
    pub fn clear_finished(&self) -> Vec<String> {
        let mut tasks = self.tasks.write().unwrap();
        let ids: Vec<String> = tasks
            .iter()
            .filter(|(_, task)| task.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            tasks.remove(id);
        }
        info!(cleared = ids.len(), "finished tasks cleared");
        self.broadcaster
            .broadcast(&FeedEvent::TasksCleared { ids: ids.clone() });
        ids
    }
}
