//! Job-board scraping pipeline: per-site scrapers behind [`JobScraper`], a
//! [`ScraperRegistry`] that routes site names to them, result post-processing
//! and the [`JobSearchService`] that ties it together.

pub mod boards;
pub mod description;
pub mod dispatch;
pub mod html;
pub mod processor;
pub mod recency;
pub mod search;
pub mod skills;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use boards::{BoardScraper, SiteProfile};
pub use description::DescriptionFetcher;
pub use dispatch::ScraperRegistry;
pub use processor::ResultProcessor;
pub use search::JobSearchService;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("site '{0}' is not supported")]
    SiteNotSupported(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("rate limit exceeded for {site}")]
    RateLimited { site: String },

    #[error("request to {site} failed: {source}")]
    Http {
        site: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{site} responded with HTTP {status}")]
    Status { site: String, status: u16 },

    #[error("failed to parse page: {0}")]
    Parse(String),

    #[error("blocking parse task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Sort direction for search results by posting age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Desc,
    Asc,
}

/// `site_name` accepts a single site or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SiteSelection {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub search_term: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_num_jobs")]
    pub num_jobs: usize,
    #[serde(default)]
    pub site_name: Option<SiteSelection>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_country")]
    pub country_code: String,
    #[serde(default)]
    pub fetch_description: bool,
    #[serde(default)]
    pub hours_old: Option<u32>,
}

fn default_location() -> String {
    "Australia".to_string()
}

fn default_num_jobs() -> usize {
    30
}

fn default_country() -> String {
    "australia".to_string()
}

pub const MAX_NUM_JOBS: usize = 500;

impl SearchParams {
    pub fn new(search_term: impl Into<String>) -> Self {
        Self {
            search_term: search_term.into(),
            location: default_location(),
            num_jobs: default_num_jobs(),
            site_name: None,
            sort_order: SortOrder::default(),
            country_code: default_country(),
            fetch_description: false,
            hours_old: None,
        }
    }

    /// Requested sites, lower-cased and de-duplicated. `None` means every supported site.
    pub fn sites(&self) -> Option<Vec<String>> {
        let raw = match &self.site_name {
            None => return None,
            Some(SiteSelection::One(site)) => vec![site.clone()],
            Some(SiteSelection::Many(sites)) => sites.clone(),
        };
        let mut sites: Vec<String> = Vec::new();
        for site in raw {
            let site = site.trim().to_ascii_lowercase();
            if !site.is_empty() && !sites.contains(&site) {
                sites.push(site);
            }
        }
        if sites.is_empty() {
            None
        } else {
            Some(sites)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.search_term.trim().is_empty() {
            return Err("search_term must not be empty".into());
        }
        if self.num_jobs == 0 || self.num_jobs > MAX_NUM_JOBS {
            return Err(format!("num_jobs must be between 1 and {MAX_NUM_JOBS}"));
        }
        Ok(())
    }
}

/// A posting normalized from any board into one shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub date_posted: String,
    pub url: String,
    pub source: String,
    pub search_term: String,
    pub description: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<String>,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// A source of postings for one or more job boards.
#[async_trait]
pub trait JobScraper: Send + Sync {
    fn name(&self) -> &str;

    fn supported_sites(&self) -> Vec<String>;

    fn supports_site(&self, site: &str) -> bool {
        self.supported_sites()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(site))
    }

    async fn search(&self, site: &str, params: &SearchParams)
        -> Result<Vec<ScrapedJob>, ScrapeError>;
}

/// GETs a page and returns its body, mapping 429 and other non-2xx statuses
/// to typed errors keyed by `site`, or by the URL's host when no site is given.
pub(crate) async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    site: Option<&str>,
) -> Result<String, ScrapeError> {
    let host = match site {
        Some(site) => site.to_string(),
        None => url::Url::parse(url)
            .map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?
            .host_str()
            .unwrap_or_default()
            .to_string(),
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ScrapeError::Http {
            site: host.clone(),
            source,
        })?;

    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ScrapeError::RateLimited { site: host });
    }
    if !status.is_success() {
        return Err(ScrapeError::Status {
            site: host,
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|source| ScrapeError::Http { site: host, source })
}

/// Shared HTTP client for board and posting fetches.
pub fn build_http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}
