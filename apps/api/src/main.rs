use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use jobhound::auth::{RemoteJwksProvider, TokenVerifier};
use jobhound::config::{Config, DispatchMode};
use jobhound::db::{create_pool, run_migrations};
use jobhound::parsing::JobPostingParser;
use jobhound::routes::build_router;
use jobhound::scraping::{build_http_client, DescriptionFetcher, JobSearchService, ScraperRegistry};
use jobhound::state::AppState;
use jobhound::tasks::runner::PgJobStore;
use jobhound::tasks::{
    BrokerDispatcher, InlineDispatcher, RedisBroker, ScrapeRunner, TaskDispatcher, TaskRegistry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    jobhound::init_tracing(&config.rust_log);

    info!("Starting Jobhound API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Shared HTTP client for boards, posting pages and JWKS
    let http = build_http_client(config.scrape.http_timeout)?;

    let jwks = Arc::new(RemoteJwksProvider::new(http.clone(), config.auth.jwks_url()));
    let verifier = Arc::new(TokenVerifier::from_config(jwks, &config.auth));
    info!("Token verifier configured for {}", config.auth.issuer());

    let registry = Arc::new(ScraperRegistry::with_defaults(
        http.clone(),
        config.scrape.page_delay,
    ));
    info!("Job boards: {}", registry.supported_sites().join(", "));
    let search = JobSearchService::new(registry, DescriptionFetcher::new(http.clone()));

    let tasks = TaskRegistry::new();
    let (dispatcher, broker): (Arc<dyn TaskDispatcher>, Option<RedisBroker>) =
        match config.dispatch {
            DispatchMode::Inline => {
                let runner = Arc::new(ScrapeRunner::new(
                    search.clone(),
                    Arc::new(PgJobStore::new(db.clone())),
                    config.scrape.task_time_limit,
                ));
                let dispatcher: Arc<dyn TaskDispatcher> =
                    Arc::new(InlineDispatcher::new(runner, tasks.clone()));
                (dispatcher, None)
            }
            DispatchMode::Broker => {
                let client = redis::Client::open(config.redis_url.clone())?;
                let broker = RedisBroker::new(
                    client,
                    config.scrape.queue_key.clone(),
                    config.scrape.status_ttl_secs,
                );
                broker.ping().await?;
                info!("Redis broker reachable, queue '{}'", broker.queue_key());
                let dispatcher: Arc<dyn TaskDispatcher> =
                    Arc::new(BrokerDispatcher::new(broker.clone()));
                (dispatcher, Some(broker))
            }
        };
    info!("Scrape dispatch mode: {:?}", config.dispatch);

    let state = AppState {
        db,
        config: config.clone(),
        verifier,
        search,
        parser: JobPostingParser::new(http),
        tasks,
        dispatcher,
        broker,
    };

    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
