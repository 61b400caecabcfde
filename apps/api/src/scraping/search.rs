use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use super::description::DESCRIPTION_UNAVAILABLE;
use super::skills::extract_skills;
use super::{
    DescriptionFetcher, ResultProcessor, ScrapeError, ScrapedJob, ScraperRegistry, SearchParams,
};

const DESCRIPTION_CONCURRENCY: usize = 4;

/// Runs a search across boards and returns ranked, de-duplicated postings.
#[derive(Clone)]
pub struct JobSearchService {
    registry: Arc<ScraperRegistry>,
    descriptions: DescriptionFetcher,
}

impl JobSearchService {
    pub fn new(registry: Arc<ScraperRegistry>, descriptions: DescriptionFetcher) -> Self {
        Self {
            registry,
            descriptions,
        }
    }

    pub fn supported_sites(&self) -> Vec<String> {
        self.registry.supported_sites()
    }

    /// Scrapes every requested site concurrently. A failing site is logged and
    /// skipped; only a request naming no supported site at all is an error.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<ScrapedJob>, ScrapeError> {
        let sites = params
            .sites()
            .unwrap_or_else(|| self.registry.supported_sites());
        let targets = self.registry.scrapers_for_sites(&sites);
        if targets.is_empty() {
            return Err(ScrapeError::SiteNotSupported(sites.join(", ")));
        }

        info!(
            term = %params.search_term,
            location = %params.location,
            sites = ?targets.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>(),
            "Starting job search"
        );

        let per_site = join_all(targets.iter().map(|(site, scraper)| async move {
            match scraper.search(site, params).await {
                Ok(jobs) => {
                    info!("{site}: {} postings", jobs.len());
                    jobs
                }
                Err(e) => {
                    warn!("Scraping {site} failed, skipping: {e}");
                    Vec::new()
                }
            }
        }))
        .await;

        let processor = ResultProcessor::new();
        let mut jobs = processor.filter_duplicates(per_site.into_iter().flatten().collect());

        if params.fetch_description {
            self.fill_descriptions(&mut jobs).await;
        }
        for job in jobs.iter_mut() {
            let text = format!("{} {}", job.title, job.description.as_deref().unwrap_or_default());
            job.skills = extract_skills(&text);
        }

        let jobs = processor.post_process(jobs, params);
        info!("Job search for '{}' returned {} postings", params.search_term, jobs.len());
        Ok(jobs)
    }

    async fn fill_descriptions(&self, jobs: &mut [ScrapedJob]) {
        let urls: Vec<String> = jobs
            .iter()
            .filter(|j| j.description.is_none() && !j.url.is_empty())
            .map(|j| j.url.clone())
            .collect();
        if urls.is_empty() {
            return;
        }

        let mut fetched = self
            .descriptions
            .fetch_many(urls, DESCRIPTION_CONCURRENCY)
            .await;
        for job in jobs.iter_mut().filter(|j| j.description.is_none()) {
            if let Some(Ok(text)) = fetched.remove(&job.url) {
                if text != DESCRIPTION_UNAVAILABLE {
                    job.description = Some(text);
                }
            }
        }
    }
}
