use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use tracing::debug;

use super::recency::PostedAge;
use super::{ScrapedJob, SearchParams, SortOrder};

// ────────────────────────────────────────────────────────────────────────────
// Relevance weights
// ────────────────────────────────────────────────────────────────────────────

const TITLE_WEIGHT: f64 = 0.4;
const DESCRIPTION_WEIGHT: f64 = 0.3;
const COMPANY_WEIGHT: f64 = 0.1;
const RECENCY_WEIGHT: f64 = 0.2;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const UNKNOWN_DATE: &str = "Recently";

/// Deduplicates, scores and orders scraped postings.
///
/// `today` anchors absolute posting dates so results are reproducible.
#[derive(Debug, Clone, Copy)]
pub struct ResultProcessor {
    today: NaiveDate,
}

impl Default for ResultProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultProcessor {
    pub fn new() -> Self {
        Self::at(Utc::now().date_naive())
    }

    pub fn at(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn posted_age(&self, job: &ScrapedJob) -> PostedAge {
        PostedAge::parse(&job.date_posted, self.today)
    }

    /// Keeps the first occurrence of each posting. Two postings are the same
    /// when they share a non-empty URL or the same `title|company` identity.
    pub fn filter_duplicates(&self, jobs: Vec<ScrapedJob>) -> Vec<ScrapedJob> {
        let before = jobs.len();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut seen_identities: HashSet<String> = HashSet::new();
        let mut unique = Vec::with_capacity(jobs.len());

        for job in jobs {
            let url = job.url.trim();
            let identity = identity_key(&job);
            if (!url.is_empty() && seen_urls.contains(url)) || seen_identities.contains(&identity)
            {
                continue;
            }
            if !url.is_empty() {
                seen_urls.insert(url.to_string());
            }
            seen_identities.insert(identity);
            unique.push(job);
        }

        debug!("Deduplicated {before} postings down to {}", unique.len());
        unique
    }

    /// Weighted keyword overlap plus recency, clamped to `[0, 1]`.
    pub fn calculate_relevance(&self, job: &ScrapedJob, search_term: &str) -> f64 {
        let keywords: Vec<String> = search_term
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut score = 0.0;
        if !keywords.is_empty() {
            let total = keywords.len() as f64;
            let fraction = |haystack: &str| {
                let haystack = haystack.to_lowercase();
                keywords.iter().filter(|k| haystack.contains(k.as_str())).count() as f64 / total
            };
            score += fraction(&job.title) * TITLE_WEIGHT;
            score += fraction(job.description.as_deref().unwrap_or_default()) * DESCRIPTION_WEIGHT;
            score += fraction(&job.company) * COMPANY_WEIGHT;
        }
        score += self.posted_age(job).score() * RECENCY_WEIGHT;

        score.clamp(0.0, 1.0)
    }

    /// Fills placeholder values and attaches a relevance score to every job.
    pub fn enrich(&self, jobs: &mut [ScrapedJob], search_term: &str) {
        for job in jobs.iter_mut() {
            fill_if_blank(&mut job.title, UNKNOWN_TITLE);
            fill_if_blank(&mut job.company, UNKNOWN_COMPANY);
            fill_if_blank(&mut job.location, UNKNOWN_LOCATION);
            fill_if_blank(&mut job.date_posted, UNKNOWN_DATE);
            job.relevance_score = self.calculate_relevance(job, search_term);
        }
    }

    /// Stable sort on posting age. `Desc` puts the newest postings first.
    pub fn sort_by_date(&self, jobs: &mut [ScrapedJob], order: SortOrder) {
        match order {
            SortOrder::Desc => jobs.sort_by_key(|job| self.posted_age(job).sort_key()),
            SortOrder::Asc => {
                jobs.sort_by_key(|job| std::cmp::Reverse(self.posted_age(job).sort_key()))
            }
        }
    }

    /// Dedup, enrich, sort, then cut to `num_jobs`.
    pub fn post_process(&self, jobs: Vec<ScrapedJob>, params: &SearchParams) -> Vec<ScrapedJob> {
        let mut jobs = self.filter_duplicates(jobs);
        self.enrich(&mut jobs, &params.search_term);
        self.sort_by_date(&mut jobs, params.sort_order);
        jobs.truncate(params.num_jobs);
        jobs
    }
}

fn identity_key(job: &ScrapedJob) -> String {
    format!(
        "{}|{}",
        job.title.trim().to_lowercase(),
        job.company.trim().to_lowercase()
    )
}

fn fill_if_blank(field: &mut String, fallback: &str) {
    if field.trim().is_empty() {
        *field = fallback.to_string();
    }
}
