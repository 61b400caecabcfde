use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::ScrapeEnvelope;
use crate::jobs::{save_scraped_jobs, PersistSummary};
use crate::scraping::{JobSearchService, ScrapeError, ScrapedJob};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task exceeded its time limit of {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("could not dispatch task: {0}")]
    Dispatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub jobs_found: usize,
    pub summary: PersistSummary,
}

/// Destination for scraped postings.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(
        &self,
        owner: Option<Uuid>,
        search_term: &str,
        jobs: &[ScrapedJob],
    ) -> PersistSummary;
}

pub struct PgJobStore {
    db: PgPool,
}

impl PgJobStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn save(
        &self,
        owner: Option<Uuid>,
        search_term: &str,
        jobs: &[ScrapedJob],
    ) -> PersistSummary {
        save_scraped_jobs(&self.db, owner, search_term, jobs).await
    }
}

/// Executes one scrape task: search, then persist, under a hard time limit.
pub struct ScrapeRunner {
    search: JobSearchService,
    store: Arc<dyn JobStore>,
    time_limit: Duration,
}

impl ScrapeRunner {
    pub fn new(search: JobSearchService, store: Arc<dyn JobStore>, time_limit: Duration) -> Self {
        Self {
            search,
            store,
            time_limit,
        }
    }

    pub async fn run(&self, envelope: &ScrapeEnvelope) -> Result<TaskOutcome, TaskError> {
        let params = &envelope.params;
        let work = async {
            let jobs = self.search.search(params).await?;
            let summary = self
                .store
                .save(envelope.owner, &params.search_term, &jobs)
                .await;
            Ok::<_, TaskError>(TaskOutcome {
                jobs_found: jobs.len(),
                summary,
            })
        };

        let outcome = tokio::time::timeout(self.time_limit, work)
            .await
            .map_err(|_| TaskError::TimedOut(self.time_limit))??;
        info!(
            task_id = %envelope.task_id,
            found = outcome.jobs_found,
            new = outcome.summary.inserted,
            updated = outcome.summary.updated,
            "Scrape task finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scraping::dispatch::tests::FixedScraper;
    use crate::scraping::{DescriptionFetcher, JobScraper, ScraperRegistry, SearchParams};
    use tokio::sync::Mutex;

    /// Records what it was asked to save.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub saved: Mutex<Vec<(Option<Uuid>, String, usize)>>,
    }

    #[async_trait]
    impl JobStore for MemoryStore {
        async fn save(
            &self,
            owner: Option<Uuid>,
            search_term: &str,
            jobs: &[ScrapedJob],
        ) -> PersistSummary {
            self.saved
                .lock()
                .await
                .push((owner, search_term.to_string(), jobs.len()));
            PersistSummary {
                inserted: jobs.len(),
                updated: 0,
                failed: 0,
            }
        }
    }

    struct SlowScraper;

    #[async_trait]
    impl JobScraper for SlowScraper {
        fn name(&self) -> &str {
            "slow"
        }

        fn supported_sites(&self) -> Vec<String> {
            vec!["linkedin".to_string()]
        }

        async fn search(
            &self,
            _site: &str,
            _params: &SearchParams,
        ) -> Result<Vec<ScrapedJob>, ScrapeError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    pub(crate) fn search_with(scraper: Arc<dyn JobScraper>) -> JobSearchService {
        let mut registry = ScraperRegistry::new();
        registry.register(scraper);
        JobSearchService::new(
            Arc::new(registry),
            DescriptionFetcher::new(reqwest::Client::new()),
        )
    }

    pub(crate) fn fixed_search() -> JobSearchService {
        search_with(Arc::new(FixedScraper {
            sites: vec!["linkedin"],
            jobs: vec![
                ScrapedJob {
                    title: "Rust Engineer".into(),
                    company: "Ferrous".into(),
                    url: "https://x.test/1".into(),
                    date_posted: "today".into(),
                    ..Default::default()
                },
                ScrapedJob {
                    title: "Go Engineer".into(),
                    company: "Gopher".into(),
                    url: "https://x.test/2".into(),
                    date_posted: "2 days ago".into(),
                    ..Default::default()
                },
            ],
            fail: false,
        }))
    }

    #[tokio::test]
    async fn test_run_searches_and_persists() {
        let store = Arc::new(MemoryStore::default());
        let runner = ScrapeRunner::new(fixed_search(), store.clone(), Duration::from_secs(300));
        let owner = Some(Uuid::new_v4());
        let envelope = ScrapeEnvelope::new(SearchParams::new("engineer"), owner);

        let outcome = runner.run(&envelope).await.unwrap();
        assert_eq!(outcome.jobs_found, 2);
        assert_eq!(outcome.summary.inserted, 2);
        assert_eq!(
            store.saved.lock().await.as_slice(),
            &[(owner, "engineer".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_run_surfaces_scrape_errors() {
        let runner = ScrapeRunner::new(
            fixed_search(),
            Arc::new(MemoryStore::default()),
            Duration::from_secs(300),
        );
        let mut params = SearchParams::new("engineer");
        params.site_name = Some(crate::scraping::SiteSelection::One("monster".into()));

        let err = runner.run(&ScrapeEnvelope::new(params, None)).await.unwrap_err();
        assert!(matches!(err, TaskError::Scrape(ScrapeError::SiteNotSupported(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let store = Arc::new(MemoryStore::default());
        let runner = ScrapeRunner::new(
            search_with(Arc::new(SlowScraper)),
            store.clone(),
            Duration::from_secs(300),
        );

        let err = runner
            .run(&ScrapeEnvelope::new(SearchParams::new("engineer"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::TimedOut(limit) if limit == Duration::from_secs(300)));
        assert!(store.saved.lock().await.is_empty());
    }
}
