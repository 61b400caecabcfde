use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use jobhound::config::WorkerConfig;
use jobhound::db::{create_pool, run_migrations};
use jobhound::scraping::{build_http_client, DescriptionFetcher, JobSearchService, ScraperRegistry};
use jobhound::tasks::runner::PgJobStore;
use jobhound::tasks::worker::{run_periodic, ScrapeWorker};
use jobhound::tasks::{RedisBroker, ScrapeRunner};

#[tokio::main]
async fn main() -> Result<()> {
    let config = WorkerConfig::from_env()?;
    jobhound::init_tracing(&config.rust_log);

    info!("Starting Jobhound worker v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    let http = build_http_client(config.scrape.http_timeout)?;
    let registry = Arc::new(ScraperRegistry::with_defaults(
        http.clone(),
        config.scrape.page_delay,
    ));
    let search = JobSearchService::new(registry, DescriptionFetcher::new(http));
    let runner = Arc::new(ScrapeRunner::new(
        search,
        Arc::new(PgJobStore::new(db)),
        config.scrape.task_time_limit,
    ));

    let broker = RedisBroker::new(
        redis::Client::open(config.redis_url.clone())?,
        config.scrape.queue_key.clone(),
        config.scrape.status_ttl_secs,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let periodic = if config.scrape.periodic.enabled {
        Some(tokio::spawn(run_periodic(
            broker.clone(),
            config.scrape.periodic.clone(),
            shutdown_rx.clone(),
        )))
    } else {
        info!("Periodic scrape disabled");
        None
    };

    let worker = ScrapeWorker::new(
        broker,
        runner,
        config.scrape.worker_concurrency,
        config.scrape.broker_max_retries,
    );
    let result = worker.run(shutdown_rx).await;

    if let Some(handle) = periodic {
        handle.abort();
    }
    if let Err(e) = &result {
        error!("Worker exiting: {e}");
    }
    result?;
    Ok(())
}
