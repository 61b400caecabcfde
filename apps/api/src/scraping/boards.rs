//! HTML scraper for the public job boards.
//!
//! Each board is described by a [`SiteProfile`]: how to build its search URL
//! and which CSS selectors pick a posting card apart. Pages are fetched
//! asynchronously; parsing runs on the blocking pool because `scraper`
//! documents are CPU-bound and not `Send`.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::html::{element_text, selector};
use super::processor::{UNKNOWN_COMPANY, UNKNOWN_DATE};
use super::{fetch_html, JobScraper, ScrapeError, ScrapedJob, SearchParams};
use crate::parsing::heuristics::job_type_hint;

/// How a board expresses "posted within the last N hours".
#[derive(Debug, Clone, Copy)]
enum AgeFilter {
    /// LinkedIn `f_TPR=r<seconds>`.
    LinkedInSeconds,
    /// Whole days under the given query parameter.
    Days(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct CardSelectors {
    card: &'static str,
    title: &'static str,
    company: &'static str,
    location: &'static str,
    posted: &'static str,
    posted_attr: Option<&'static str>,
    link: &'static str,
    salary: Option<&'static str>,
}

/// Search URL layout and card markup for one job board.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: &'static str,
    base_url: Option<String>,
    search_path: &'static str,
    page_size: usize,
    keep_query: bool,
    age_filter: AgeFilter,
    selectors: CardSelectors,
}

impl SiteProfile {
    pub fn linkedin() -> Self {
        Self {
            name: "linkedin",
            base_url: None,
            search_path: "/jobs-guest/jobs/api/seeMoreJobPostings/search\
                          ?keywords={query}&location={location}&start={start}",
            page_size: 10,
            keep_query: false,
            age_filter: AgeFilter::LinkedInSeconds,
            selectors: CardSelectors {
                card: "div.base-search-card",
                title: "h3.base-search-card__title",
                company: "h4.base-search-card__subtitle",
                location: "span.job-search-card__location",
                posted: "time",
                posted_attr: Some("datetime"),
                link: "a.base-card__full-link",
                salary: Some("span.job-search-card__salary-info"),
            },
        }
    }

    pub fn indeed() -> Self {
        Self {
            name: "indeed",
            base_url: None,
            search_path: "/jobs?q={query}&l={location}&start={start}",
            page_size: 10,
            keep_query: true,
            age_filter: AgeFilter::Days("fromage"),
            selectors: CardSelectors {
                card: "div.job_seen_beacon",
                title: "h2.jobTitle span[title], h2.jobTitle span, h2.jobTitle",
                company: "[data-testid='company-name'], span.companyName",
                location: "[data-testid='text-location'], div.companyLocation",
                posted: "span.date, [data-testid='myJobsStateDate']",
                posted_attr: None,
                link: "h2.jobTitle a, a.jcs-JobTitle",
                salary: Some("div.salary-snippet-container, div.metadata.salary-snippet-container"),
            },
        }
    }

    pub fn glassdoor() -> Self {
        Self {
            name: "glassdoor",
            base_url: None,
            search_path: "/Job/jobs.htm?sc.keyword={query}&locKeyword={location}&p={page}",
            page_size: 30,
            keep_query: false,
            age_filter: AgeFilter::Days("fromAge"),
            selectors: CardSelectors {
                card: "li[data-test='jobListing']",
                title: "a[data-test='job-title']",
                company: "[class*='EmployerProfile_compactEmployerName'], .employer-name",
                location: "[data-test='emp-location']",
                posted: "[data-test='job-age']",
                posted_attr: None,
                link: "a[data-test='job-title']",
                salary: Some("[data-test='detailSalary']"),
            },
        }
    }

    pub fn zip_recruiter() -> Self {
        Self {
            name: "zip_recruiter",
            base_url: None,
            search_path: "/jobs-search?search={query}&location={location}&page={page}",
            page_size: 20,
            keep_query: false,
            age_filter: AgeFilter::Days("days"),
            selectors: CardSelectors {
                card: "article.job_result",
                title: "h2.title, h2",
                company: "a.company_name, [data-testid='job-card-company']",
                location: ".company_location, [data-testid='job-card-location']",
                posted: ".posted_time",
                posted_attr: None,
                link: "a.job_link, h2 a",
                salary: Some(".perk_item--salary"),
            },
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::linkedin(),
            Self::indeed(),
            Self::glassdoor(),
            Self::zip_recruiter(),
        ]
    }

    /// Points the profile at another host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn base_url(&self, params: &SearchParams) -> String {
        if let Some(base) = &self.base_url {
            return base.clone();
        }
        match self.name {
            "linkedin" => "https://www.linkedin.com".to_string(),
            "indeed" => indeed_host(&params.country_code).to_string(),
            "glassdoor" => "https://www.glassdoor.com".to_string(),
            _ => "https://www.ziprecruiter.com".to_string(),
        }
    }

    pub fn search_url(&self, base: &str, params: &SearchParams, page: usize) -> String {
        let path = self
            .search_path
            .replace("{query}", &encode(&params.search_term))
            .replace("{location}", &encode(&params.location))
            .replace("{start}", &(page * self.page_size).to_string())
            .replace("{page}", &(page + 1).to_string());

        let age = match (params.hours_old, self.age_filter) {
            (Some(hours), AgeFilter::LinkedInSeconds) => {
                format!("&f_TPR=r{}", u64::from(hours) * 3600)
            }
            (Some(hours), AgeFilter::Days(param)) => {
                format!("&{param}={}", hours.div_ceil(24).max(1))
            }
            _ => String::new(),
        };

        format!("{base}{path}{age}")
    }

    /// Parses one result page into normalized postings.
    pub fn extract(
        &self,
        html: &str,
        base_url: &str,
        search_term: &str,
    ) -> Result<Vec<ScrapedJob>, ScrapeError> {
        let s = &self.selectors;
        let card_sel = selector(s.card)?;
        let title_sel = selector(s.title)?;
        let company_sel = selector(s.company)?;
        let location_sel = selector(s.location)?;
        let posted_sel = selector(s.posted)?;
        let link_sel = selector(s.link)?;
        let salary_sel = s.salary.map(selector).transpose()?;

        let base = Url::parse(base_url)
            .map_err(|e| ScrapeError::InvalidUrl(format!("{base_url}: {e}")))?;
        let doc = Html::parse_document(html);
        let mut jobs = Vec::new();

        for card in doc.select(&card_sel) {
            let first = |sel: &Selector| card.select(sel).next().map(element_text).unwrap_or_default();

            let title = first(&title_sel);
            let link = card
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default();
            if title.is_empty() && link.is_empty() {
                continue;
            }

            let posted = card
                .select(&posted_sel)
                .next()
                .map(|el| posted_text(el, s.posted_attr))
                .unwrap_or_default();
            let (salary_min, salary_max) = salary_sel
                .as_ref()
                .and_then(|sel| card.select(sel).next())
                .map(|el| parse_salary(&element_text(el)))
                .unwrap_or((None, None));

            let company = first(&company_sel);
            jobs.push(ScrapedJob {
                title,
                company: if company.is_empty() {
                    UNKNOWN_COMPANY.to_string()
                } else {
                    company
                },
                location: first(&location_sel),
                date_posted: if posted.is_empty() {
                    UNKNOWN_DATE.to_string()
                } else {
                    normalize_posted(&posted)
                },
                url: self.absolute_link(&base, link),
                source: self.name.to_string(),
                search_term: search_term.to_string(),
                description: None,
                salary_min,
                salary_max,
                job_type: job_type_hint(&element_text(card)).map(str::to_string),
                relevance_score: 0.0,
                skills: Vec::new(),
            });
        }

        Ok(jobs)
    }

    fn absolute_link(&self, base: &Url, href: &str) -> String {
        if href.trim().is_empty() {
            return String::new();
        }
        match base.join(href.trim()) {
            Ok(mut url) => {
                if !self.keep_query {
                    url.set_query(None);
                }
                url.set_fragment(None);
                url.to_string()
            }
            Err(_) => href.trim().to_string(),
        }
    }
}

fn posted_text(el: ElementRef<'_>, attr: Option<&str>) -> String {
    attr.and_then(|a| el.value().attr(a))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| element_text(el))
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.trim().as_bytes()).collect()
}

fn indeed_host(country: &str) -> &'static str {
    match country.trim().to_ascii_lowercase().as_str() {
        "australia" | "au" => "https://au.indeed.com",
        "uk" | "gb" | "united kingdom" => "https://uk.indeed.com",
        "canada" | "ca" => "https://ca.indeed.com",
        "india" | "in" => "https://in.indeed.com",
        "new zealand" | "nz" => "https://nz.indeed.com",
        "singapore" | "sg" => "https://sg.indeed.com",
        _ => "https://www.indeed.com",
    }
}

fn compact_age_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*(h|d|w|mo)\+?$").expect("static regex"))
}

fn salary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*([kK])?").expect("static regex"))
}

/// Expands compact ages ("3d", "24h", "30d+") into phrases the recency parser reads.
fn normalize_posted(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(caps) = compact_age_re().captures(trimmed) else {
        return trimmed.to_string();
    };
    let n = &caps[1];
    let unit = match &caps[2] {
        "h" => "hours",
        "d" => "days",
        "w" => "weeks",
        _ => "months",
    };
    format!("{n} {unit} ago")
}

/// First two amounts in a salary blurb, `k` suffixes expanded.
pub fn parse_salary(text: &str) -> (Option<f64>, Option<f64>) {
    let mut amounts = salary_re().captures_iter(text).filter_map(|caps| {
        let value: f64 = caps[1].replace(',', "").parse().ok()?;
        Some(if caps.get(2).is_some() {
            value * 1000.0
        } else {
            value
        })
    });
    (amounts.next(), amounts.next())
}

/// Multi-board scraper driven by [`SiteProfile`]s.
pub struct BoardScraper {
    client: reqwest::Client,
    sites: Vec<SiteProfile>,
    page_delay: Duration,
    max_pages: usize,
}

impl BoardScraper {
    pub fn new(client: reqwest::Client, page_delay: Duration) -> Self {
        Self::with_sites(client, SiteProfile::defaults(), page_delay)
    }

    pub fn with_sites(client: reqwest::Client, sites: Vec<SiteProfile>, page_delay: Duration) -> Self {
        Self {
            client,
            sites,
            page_delay,
            max_pages: 10,
        }
    }

    fn profile(&self, site: &str) -> Option<&SiteProfile> {
        self.sites.iter().find(|p| p.name.eq_ignore_ascii_case(site))
    }
}

#[async_trait]
impl JobScraper for BoardScraper {
    fn name(&self) -> &str {
        "boards"
    }

    fn supported_sites(&self) -> Vec<String> {
        self.sites.iter().map(|p| p.name.to_string()).collect()
    }

    async fn search(
        &self,
        site: &str,
        params: &SearchParams,
    ) -> Result<Vec<ScrapedJob>, ScrapeError> {
        let profile = self
            .profile(site)
            .cloned()
            .ok_or_else(|| ScrapeError::SiteNotSupported(site.to_string()))?;
        let base = profile.base_url(params);
        let wanted = params.num_jobs.max(1);
        let pages = wanted.div_ceil(profile.page_size).clamp(1, self.max_pages);
        let mut jobs: Vec<ScrapedJob> = Vec::new();

        for page in 0..pages {
            if page > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let url = profile.search_url(&base, params, page);
            debug!(site = profile.name, %url, "Fetching result page");
            let body = match fetch_html(&self.client, &url, Some(profile.name)).await {
                Ok(body) => body,
                Err(e) if page > 0 => {
                    warn!(site = profile.name, page, "Stopping pagination: {e}");
                    break;
                }
                Err(e) => return Err(e),
            };

            let parse_profile = profile.clone();
            let parse_base = base.clone();
            let term = params.search_term.clone();
            let page_jobs = tokio::task::spawn_blocking(move || {
                parse_profile.extract(&body, &parse_base, &term)
            })
            .await??;

            if page_jobs.is_empty() {
                break;
            }
            jobs.extend(page_jobs);
            if jobs.len() >= wanted {
                break;
            }
        }

        jobs.truncate(wanted);
        info!(site = profile.name, count = jobs.len(), "Scraped postings");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LINKEDIN_PAGE: &str = r#"
        <li>
          <div class="base-card base-search-card job-search-card">
            <a class="base-card__full-link" href="https://au.linkedin.com/jobs/view/rust-engineer-123?refId=abc&trackingId=x"></a>
            <h3 class="base-search-card__title">  Rust Engineer </h3>
            <h4 class="base-search-card__subtitle"><a>Ferrous Systems</a></h4>
            <span class="job-search-card__location">Sydney, NSW</span>
            <span class="job-search-card__salary-info">$150K - $180K</span>
            <time class="job-search-card__listdate" datetime="2024-05-08">2 days ago</time>
          </div>
        </li>
        <li>
          <div class="base-card base-search-card job-search-card">
            <a class="base-card__full-link" href="/jobs/view/backend-456"></a>
            <h3 class="base-search-card__title">Backend Developer (Contract)</h3>
            <span class="job-search-card__location">Remote</span>
          </div>
        </li>
    "#;

    fn params(term: &str) -> SearchParams {
        SearchParams::new(term)
    }

    #[test]
    fn test_linkedin_cards_normalized() {
        let jobs = SiteProfile::linkedin()
            .extract(LINKEDIN_PAGE, "https://www.linkedin.com", "rust")
            .unwrap();
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.title, "Rust Engineer");
        assert_eq!(first.company, "Ferrous Systems");
        assert_eq!(first.location, "Sydney, NSW");
        assert_eq!(first.date_posted, "2024-05-08");
        assert_eq!(first.url, "https://au.linkedin.com/jobs/view/rust-engineer-123");
        assert_eq!(first.source, "linkedin");
        assert_eq!(first.search_term, "rust");
        assert_eq!(first.salary_min, Some(150_000.0));
        assert_eq!(first.salary_max, Some(180_000.0));

        let second = &jobs[1];
        assert_eq!(second.company, UNKNOWN_COMPANY);
        assert_eq!(second.date_posted, UNKNOWN_DATE);
        assert_eq!(second.url, "https://www.linkedin.com/jobs/view/backend-456");
        assert_eq!(second.job_type.as_deref(), Some("contract"));
    }

    #[test]
    fn test_search_url_with_age_filter() {
        let mut p = params("rust developer");
        p.location = "Melbourne VIC".into();
        p.hours_old = Some(24);

        let linkedin = SiteProfile::linkedin();
        assert_eq!(
            linkedin.search_url("https://www.linkedin.com", &p, 2),
            "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search\
             ?keywords=rust+developer&location=Melbourne+VIC&start=20&f_TPR=r86400"
        );

        let indeed = SiteProfile::indeed();
        let base = indeed.base_url(&p);
        assert_eq!(base, "https://au.indeed.com");
        assert_eq!(
            indeed.search_url(&base, &p, 0),
            "https://au.indeed.com/jobs?q=rust+developer&l=Melbourne+VIC&start=0&fromage=1"
        );
    }

    #[test]
    fn test_normalize_posted() {
        assert_eq!(normalize_posted("3d"), "3 days ago");
        assert_eq!(normalize_posted("30d+"), "30 days ago");
        assert_eq!(normalize_posted("24h"), "24 hours ago");
        assert_eq!(normalize_posted("Posted 2 days ago"), "Posted 2 days ago");
    }

    #[test]
    fn test_parse_salary() {
        assert_eq!(
            parse_salary("$120,000 - $140,000 a year"),
            (Some(120_000.0), Some(140_000.0))
        );
        assert_eq!(parse_salary("$45.50 an hour"), (Some(45.5), None));
        assert_eq!(parse_salary("Competitive"), (None, None));
    }

    #[tokio::test]
    async fn test_search_paginates_until_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs-guest/jobs/api/seeMoreJobPostings/search"))
            .and(query_param("keywords", "rust"))
            .and(query_param("start", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LINKEDIN_PAGE))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs-guest/jobs/api/seeMoreJobPostings/search"))
            .and(query_param("start", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .expect(1)
            .mount(&server)
            .await;

        let scraper = BoardScraper::with_sites(
            reqwest::Client::new(),
            vec![SiteProfile::linkedin().with_base_url(server.uri())],
            Duration::ZERO,
        );
        let mut p = params("rust");
        p.num_jobs = 25;
        let jobs = scraper.search("LinkedIn", &p).await.unwrap();
        assert_eq!(jobs.len(), 2);
    }

    #[tokio::test]
    async fn test_search_reports_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let scraper = BoardScraper::with_sites(
            reqwest::Client::new(),
            vec![SiteProfile::indeed().with_base_url(server.uri())],
            Duration::ZERO,
        );
        let err = scraper.search("indeed", &params("rust")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::RateLimited { ref site } if site == "indeed"));
    }

    #[tokio::test]
    async fn test_unknown_site_is_rejected() {
        let scraper = BoardScraper::new(reqwest::Client::new(), Duration::ZERO);
        let err = scraper.search("monster", &params("rust")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::SiteNotSupported(_)));
        assert!(scraper.supports_site("GLASSDOOR"));
    }
}
