//! Background scrape tasks: an in-memory status registry, two ways of
//! dispatching work (inline on the API runtime or through the Redis broker),
//! the runner that executes one task and the worker that drains the broker.

pub mod broker;
pub mod handlers;
pub mod registry;
pub mod runner;
pub mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::DispatchMode;
use crate::jobs::PersistSummary;
use crate::scraping::SearchParams;

pub use broker::{BrokerError, RedisBroker};
pub use registry::TaskRegistry;
pub use runner::{ScrapeRunner, TaskError, TaskOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Everything the API knows about one scrape task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTask {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub dispatch: DispatchMode,
    pub params: SearchParams,
    pub owner: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs_found: Option<usize>,
    pub result: Option<PersistSummary>,
    pub error: Option<String>,
}

/// Unit of work on the broker list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeEnvelope {
    pub task_id: Uuid,
    pub params: SearchParams,
    pub owner: Option<Uuid>,
    pub enqueued_at: DateTime<Utc>,
}

impl ScrapeEnvelope {
    pub fn new(params: SearchParams, owner: Option<Uuid>) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            params,
            owner,
            enqueued_at: Utc::now(),
        }
    }
}

/// Status snapshot a worker publishes for the API to merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs_found: Option<usize>,
    pub result: Option<PersistSummary>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn running(task_id: Uuid) -> Self {
        Self {
            task_id,
            status: TaskStatus::Running,
            started_at: Some(Utc::now()),
            finished_at: None,
            jobs_found: None,
            result: None,
            error: None,
        }
    }

    pub fn finished(
        task_id: Uuid,
        started_at: Option<DateTime<Utc>>,
        result: &Result<TaskOutcome, TaskError>,
    ) -> Self {
        let mut update = Self {
            task_id,
            status: TaskStatus::Completed,
            started_at,
            finished_at: Some(Utc::now()),
            jobs_found: None,
            result: None,
            error: None,
        };
        match result {
            Ok(outcome) => {
                update.jobs_found = Some(outcome.jobs_found);
                update.result = Some(outcome.summary);
            }
            Err(e) => {
                update.status = TaskStatus::Failed;
                update.error = Some(e.to_string());
            }
        }
        update
    }
}

/// Hands a registered task to whatever executes it.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    fn mode(&self) -> DispatchMode;

    async fn dispatch(&self, envelope: ScrapeEnvelope) -> Result<(), BrokerError>;
}

/// Runs tasks on the API's own runtime and records progress in the registry.
pub struct InlineDispatcher {
    runner: Arc<ScrapeRunner>,
    registry: TaskRegistry,
}

impl InlineDispatcher {
    pub fn new(runner: Arc<ScrapeRunner>, registry: TaskRegistry) -> Self {
        Self { runner, registry }
    }
}

#[async_trait]
impl TaskDispatcher for InlineDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Inline
    }

    async fn dispatch(&self, envelope: ScrapeEnvelope) -> Result<(), BrokerError> {
        let runner = Arc::clone(&self.runner);
        let registry = self.registry.clone();
        let task_id = envelope.task_id;

        tokio::spawn(async move {
            registry.mark_running(task_id).await;
            let result = runner.run(&envelope).await;
            match &result {
                Ok(outcome) => info!(%task_id, found = outcome.jobs_found, "Scrape task completed"),
                Err(e) => error!(%task_id, "Scrape task failed: {e}"),
            }
            registry.finish(task_id, result).await;
        });
        Ok(())
    }
}

/// Pushes tasks onto the broker list for `jobhound-worker`.
pub struct BrokerDispatcher {
    broker: RedisBroker,
}

impl BrokerDispatcher {
    pub fn new(broker: RedisBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl TaskDispatcher for BrokerDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Broker
    }

    async fn dispatch(&self, envelope: ScrapeEnvelope) -> Result<(), BrokerError> {
        self.broker.enqueue(&envelope).await
    }
}
