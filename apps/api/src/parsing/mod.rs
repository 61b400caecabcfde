//! Structured extraction from a single job-posting page (the `parse-url` endpoint).

pub mod heuristics;

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::scraping::html::{clean_text, first_text, selector, text_excluding, truncate_chars};
use crate::scraping::processor::{UNKNOWN_COMPANY, UNKNOWN_TITLE};
use crate::scraping::{fetch_html, ScrapeError};
use heuristics::{
    company_from_host, company_from_text, company_from_title, detect_experience_level,
    detect_job_type, extract_requirements, requirements_start,
};

const TITLE_SELECTORS: &[&str] = &[
    "h1.job-title",
    "h1.posting-headline",
    "h1.app-title",
    ".job-title",
    ".posting-headline",
    "h1",
];

const COMPANY_SELECTORS: &[&str] = &[".company-name", ".employer", "[data-company]", ".organization"];

const LOCATION_SELECTORS: &[&str] = &[".location", ".job-location", "[data-location]", ".posting-location"];

const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "#content",
    ".content",
    ".job-posting",
    ".job-details",
    "body",
];

const STRIPPED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "iframe", "noscript"];

const MAX_DESCRIPTION_CHARS: usize = 500;
const MAX_REQUIREMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPosting {
    pub title: String,
    pub company: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub location: Option<String>,
    pub job_type: String,
    pub experience_level: String,
    pub url: String,
}

/// Fetches a posting page and extracts its fields.
#[derive(Clone)]
pub struct JobPostingParser {
    client: reqwest::Client,
}

impl JobPostingParser {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn parse(&self, raw_url: &str) -> Result<ParsedPosting, ScrapeError> {
        let url = validate_url(raw_url)?;
        let html = fetch_html(&self.client, url.as_str(), None).await?;
        let posting = tokio::task::spawn_blocking(move || extract_posting(&html, &url)).await?;
        info!("Parsed posting '{}' at {}", posting.title, posting.company);
        Ok(posting)
    }
}

/// Accepts absolute http(s) URLs with a host.
pub fn validate_url(raw: &str) -> Result<Url, ScrapeError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ScrapeError::InvalidUrl(format!("'{raw}' is not a valid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScrapeError::InvalidUrl(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ScrapeError::InvalidUrl(format!("'{raw}' has no host")));
    }
    Ok(url)
}

pub fn extract_posting(html: &str, url: &Url) -> ParsedPosting {
    let doc = Html::parse_document(html);

    let title = first_text(&doc, TITLE_SELECTORS, 0)
        .or_else(|| first_text(&doc, &["title"], 0))
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let location = first_text(&doc, LOCATION_SELECTORS, 0);

    let content = CONTENT_SELECTORS
        .iter()
        .filter_map(|css| selector(css).ok())
        .find_map(|sel| doc.select(&sel).next())
        .map(|el| text_excluding(el, STRIPPED_TAGS, "\n"))
        .unwrap_or_default();

    let (intro, requirements_section) = match requirements_start(&content) {
        Some(idx) if idx > 0 => (&content[..idx], &content[idx..]),
        Some(_) => (content.as_str(), content.as_str()),
        None => (content.as_str(), ""),
    };
    let description = truncate_chars(&clean_text(intro), MAX_DESCRIPTION_CHARS);
    let requirements = extract_requirements(requirements_section, MAX_REQUIREMENTS);

    let company = first_text(&doc, COMPANY_SELECTORS, 0)
        .or_else(|| company_from_text(&content))
        .or_else(|| company_from_title(&title))
        .or_else(|| url.host_str().and_then(company_from_host))
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

    let job_type = detect_job_type(&format!("{title}\n{content}")).to_string();
    let experience_level = detect_experience_level(&title, &content).to_string();

    ParsedPosting {
        title,
        company,
        description,
        requirements,
        location,
        job_type,
        experience_level,
        url: url.to_string(),
    }
}
