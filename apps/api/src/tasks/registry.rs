use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ScrapeEnvelope, ScrapeTask, TaskError, TaskOutcome, TaskStatus, TaskUpdate};
use crate::config::DispatchMode;

/// Process-local task table. Nothing here survives a restart.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<Uuid, ScrapeTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, envelope: &ScrapeEnvelope, dispatch: DispatchMode) -> ScrapeTask {
        let task = ScrapeTask {
            task_id: envelope.task_id,
            status: TaskStatus::Pending,
            dispatch,
            params: envelope.params.clone(),
            owner: envelope.owner,
            created_at: envelope.enqueued_at,
            started_at: None,
            finished_at: None,
            jobs_found: None,
            result: None,
            error: None,
        };
        self.tasks.write().await.insert(task.task_id, task.clone());
        task
    }

    pub async fn get(&self, task_id: Uuid) -> Option<ScrapeTask> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    pub async fn mark_running(&self, task_id: Uuid) {
        self.apply(TaskUpdate::running(task_id)).await;
    }

    pub async fn complete(&self, task_id: Uuid, outcome: TaskOutcome) {
        self.finish(task_id, Ok(outcome)).await;
    }

    pub async fn fail(&self, task_id: Uuid, error: TaskError) {
        self.finish(task_id, Err(error)).await;
    }

    pub async fn finish(&self, task_id: Uuid, result: Result<TaskOutcome, TaskError>) {
        let started_at = self.get(task_id).await.and_then(|t| t.started_at);
        self.apply(TaskUpdate::finished(task_id, started_at, &result))
            .await;
    }

    /// Merges a status snapshot. Unknown tasks are ignored and a terminal
    /// task never moves back to an earlier state.
    pub async fn apply(&self, update: TaskUpdate) -> Option<ScrapeTask> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&update.task_id)?;
        if task.status.is_terminal() && !update.status.is_terminal() {
            debug!(task_id = %update.task_id, "Ignoring stale {:?} snapshot", update.status);
            return Some(task.clone());
        }

        task.status = update.status;
        task.started_at = update.started_at.or(task.started_at);
        task.finished_at = update.finished_at.or(task.finished_at);
        task.jobs_found = update.jobs_found.or(task.jobs_found);
        task.result = update.result.or(task.result);
        task.error = update.error.or(task.error.take());
        if task.status.is_terminal() && task.finished_at.is_none() {
            task.finished_at = Some(Utc::now());
        }
        Some(task.clone())
    }

    #[cfg(test)]
    pub(crate) async fn count(&self) -> usize {
        self.tasks.read().await.len()
    }
}
