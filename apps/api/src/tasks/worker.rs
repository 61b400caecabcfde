use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use super::{BrokerError, RedisBroker, ScrapeEnvelope, ScrapeRunner, TaskUpdate};
use crate::config::PeriodicScrapeConfig;
use crate::scraping::{SearchParams, SiteSelection};

const MAX_BACKOFF_SECS: u64 = 60;

/// Delay before reconnect attempt `attempt` (1-based): 2, 4, 8 ... capped at a minute.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

/// Drains the broker list, running up to `concurrency` tasks at once.
pub struct ScrapeWorker {
    broker: RedisBroker,
    runner: Arc<ScrapeRunner>,
    concurrency: usize,
    max_retries: u32,
}

impl ScrapeWorker {
    pub fn new(
        broker: RedisBroker,
        runner: Arc<ScrapeRunner>,
        concurrency: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            broker,
            runner,
            concurrency: concurrency.max(1),
            max_retries,
        }
    }

    /// Runs until `shutdown` flips or the broker stays unreachable for
    /// `max_retries` consecutive attempts. In-flight tasks are awaited before
    /// returning.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), BrokerError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut failures: u32 = 0;
        info!(
            queue = self.broker.queue_key(),
            concurrency = self.concurrency,
            "Scrape worker started"
        );

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let permit = tokio::select! {
                _ = shutdown.changed() => break Ok(()),
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break Ok(()),
                },
            };

            // BLPOP removes the envelope server-side before we see it, so the
            // pop is never cancelled; shutdown is observed on the next turn.
            let next = self.broker.dequeue().await;

            match next {
                Ok(Some(envelope)) => {
                    failures = 0;
                    let broker = self.broker.clone();
                    let runner = Arc::clone(&self.runner);
                    tokio::spawn(async move {
                        execute(&broker, &runner, envelope).await;
                        drop(permit);
                    });
                }
                Ok(None) => failures = 0,
                Err(e) => {
                    failures += 1;
                    if failures >= self.max_retries {
                        error!("Broker unreachable after {failures} attempts, giving up: {e}");
                        break Err(e);
                    }
                    let delay = backoff_delay(failures);
                    warn!(
                        "Broker error (attempt {failures}/{}), retrying in {delay:?}: {e}",
                        self.max_retries
                    );
                    tokio::select! {
                        _ = shutdown.changed() => break Ok(()),
                        _ = sleep(delay) => {}
                    }
                }
            }
        };

        info!("Waiting for in-flight scrape tasks");
        // all permits back means every spawned task has finished
        let _ = semaphore.acquire_many(self.concurrency as u32).await;
        info!("Scrape worker stopped");
        result
    }
}

/// Runs one task and publishes its running and final snapshots.
async fn execute(broker: &RedisBroker, runner: &ScrapeRunner, envelope: ScrapeEnvelope) {
    let task_id = envelope.task_id;
    let running = TaskUpdate::running(task_id);
    if let Err(e) = broker.publish_status(&running).await {
        warn!(%task_id, "Could not publish running status: {e}");
    }

    let result = runner.run(&envelope).await;
    if let Err(e) = &result {
        error!(%task_id, "Scrape task failed: {e}");
    }

    let finished = TaskUpdate::finished(task_id, running.started_at, &result);
    if let Err(e) = broker.publish_status(&finished).await {
        warn!(%task_id, "Could not publish final status: {e}");
    }
}

/// The fixed set of searches the periodic scrape runs.
pub fn periodic_searches(config: &PeriodicScrapeConfig) -> Vec<SearchParams> {
    config
        .search_terms
        .iter()
        .map(|term| {
            let mut params = SearchParams::new(term.clone());
            params.location = config.location.clone();
            params.site_name = Some(SiteSelection::Many(config.sites.clone()));
            params.hours_old = Some(config.hours_old);
            params.num_jobs = config.num_jobs;
            params.fetch_description = config.fetch_description;
            params
        })
        .collect()
}

/// Enqueues the periodic searches every `config.interval`, first run one
/// interval after start. Results are stored without an owner.
pub async fn run_periodic(
    broker: RedisBroker,
    config: PeriodicScrapeConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        every = ?config.interval,
        terms = config.search_terms.len(),
        "Periodic scrape scheduled"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        for params in periodic_searches(&config) {
            let envelope = ScrapeEnvelope::new(params, None);
            match broker.enqueue(&envelope).await {
                Ok(()) => info!(
                    task_id = %envelope.task_id,
                    "Queued periodic scrape for '{}'",
                    envelope.params.search_term
                ),
                Err(e) => warn!("Could not queue periodic scrape: {e}"),
            }
        }
    }
}
