use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{BoardScraper, JobScraper, ScrapeError};

/// Routes site names to the scraper that handles them.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: Vec<Arc<dyn JobScraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in board scraper.
    pub fn with_defaults(client: reqwest::Client, page_delay: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BoardScraper::new(client, page_delay)));
        registry
    }

    /// Later registrations do not shadow earlier ones for the same site.
    pub fn register(&mut self, scraper: Arc<dyn JobScraper>) {
        self.scrapers.push(scraper);
    }

    pub fn get_scraper(&self, site: &str) -> Result<Arc<dyn JobScraper>, ScrapeError> {
        self.scrapers
            .iter()
            .find(|s| s.supports_site(site))
            .cloned()
            .ok_or_else(|| ScrapeError::SiteNotSupported(site.to_string()))
    }

    /// Pairs each supported site with its scraper; unsupported sites are logged and skipped.
    pub fn scrapers_for_sites(&self, sites: &[String]) -> Vec<(String, Arc<dyn JobScraper>)> {
        sites
            .iter()
            .filter_map(|site| match self.get_scraper(site) {
                Ok(scraper) => Some((site.clone(), scraper)),
                Err(_) => {
                    warn!("No scraper supports site '{site}', skipping");
                    None
                }
            })
            .collect()
    }

    /// Every site any registered scraper handles, sorted and de-duplicated.
    pub fn supported_sites(&self) -> Vec<String> {
        let mut sites: Vec<String> = self
            .scrapers
            .iter()
            .flat_map(|s| s.supported_sites())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        sites.sort();
        sites.dedup();
        sites
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scraping::{ScrapedJob, SearchParams};
    use async_trait::async_trait;

    /// Canned scraper for pipeline tests.
    pub(crate) struct FixedScraper {
        pub sites: Vec<&'static str>,
        pub jobs: Vec<ScrapedJob>,
        pub fail: bool,
    }

    #[async_trait]
    impl JobScraper for FixedScraper {
        fn name(&self) -> &str {
            "fixed"
        }

        fn supported_sites(&self) -> Vec<String> {
            self.sites.iter().map(|s| s.to_string()).collect()
        }

        async fn search(
            &self,
            site: &str,
            _params: &SearchParams,
        ) -> Result<Vec<ScrapedJob>, ScrapeError> {
            if self.fail {
                return Err(ScrapeError::Status {
                    site: site.to_string(),
                    status: 503,
                });
            }
            Ok(self
                .jobs
                .iter()
                .cloned()
                .map(|mut job| {
                    job.source = site.to_string();
                    job
                })
                .collect())
        }
    }

    fn registry() -> ScraperRegistry {
        let mut registry = ScraperRegistry::new();
        registry.register(Arc::new(FixedScraper {
            sites: vec!["indeed", "linkedin"],
            jobs: vec![],
            fail: false,
        }));
        registry.register(Arc::new(FixedScraper {
            sites: vec!["glassdoor", "indeed"],
            jobs: vec![],
            fail: true,
        }));
        registry
    }

    #[test]
    fn test_supported_sites_sorted_and_unique() {
        assert_eq!(
            registry().supported_sites(),
            vec!["glassdoor", "indeed", "linkedin"]
        );
    }

    #[test]
    fn test_get_scraper_unknown_site() {
        let err = registry().get_scraper("monster").err().unwrap();
        assert!(matches!(err, ScrapeError::SiteNotSupported(site) if site == "monster"));
    }

    #[test]
    fn test_scrapers_for_sites_skips_unsupported() {
        let sites = vec![
            "linkedin".to_string(),
            "monster".to_string(),
            "glassdoor".to_string(),
        ];
        let pairs = registry().scrapers_for_sites(&sites);
        let names: Vec<&str> = pairs.iter().map(|(site, _)| site.as_str()).collect();
        assert_eq!(names, vec!["linkedin", "glassdoor"]);
    }

    #[test]
    fn test_defaults_cover_boards() {
        let registry = ScraperRegistry::with_defaults(reqwest::Client::new(), Duration::ZERO);
        assert_eq!(
            registry.supported_sites(),
            vec!["glassdoor", "indeed", "linkedin", "zip_recruiter"]
        );
    }
}
