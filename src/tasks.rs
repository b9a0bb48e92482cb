//! Bookkeeping for background scrape runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::pipeline::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub pages: u32,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared, cloneable registry of runs keyed by task id
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, TaskRecord>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, pages: u32) -> Uuid {
        let id = Uuid::new_v4();
        let record = TaskRecord {
            id,
            pages,
            state: TaskState::Queued,
            created_at: Utc::now(),
            finished_at: None,
            summary: None,
            error: None,
        };
        self.tasks.write().await.insert(id, record);
        id
    }

    pub async fn mark_running(&self, id: Uuid) {
        if let Some(task) = self.tasks.write().await.get_mut(&id) {
            task.state = TaskState::Running;
        }
    }

    pub async fn mark_done(&self, id: Uuid, summary: RunSummary) {
        if let Some(task) = self.tasks.write().await.get_mut(&id) {
            task.state = TaskState::Done;
            task.finished_at = Some(Utc::now());
            task.summary = Some(summary);
        }
    }

    pub async fn mark_failed(&self, id: Uuid, error: String) {
        if let Some(task) = self.tasks.write().await.get_mut(&id) {
            task.state = TaskState::Failed;
            task.finished_at = Some(Utc::now());
            task.error = Some(error);
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<TaskRecord> {
        self.tasks.read().await.get(&id).cloned()
    }
}
