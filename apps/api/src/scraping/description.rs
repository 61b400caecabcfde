use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use scraper::Html;
use tracing::{debug, warn};

use super::html::{first_text, selector, text_excluding, truncate_chars};
use super::{fetch_html, ScrapeError};

pub const DESCRIPTION_UNAVAILABLE: &str = "Description not available";

const DESCRIPTION_SELECTORS: &[&str] = &[
    ".job-description",
    ".description-content",
    "#job-details",
    ".job-details",
    "[data-test='job-description']",
    "[data-test='description']",
    ".jobsearch-jobDescriptionText",
    ".description__text",
    ".jobDescriptionContent",
    "#jobDescriptionText",
];

const FALLBACK_CONTAINERS: &[&str] = &["main", "article", "body"];
const NOISE_TAGS: &[&str] = &["nav", "header", "footer", "script", "style", "aside", "noscript"];
const MAX_FALLBACK_CHARS: usize = 5000;

/// Fetches full posting descriptions from posting pages.
#[derive(Clone)]
pub struct DescriptionFetcher {
    client: reqwest::Client,
}

impl DescriptionFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let html = fetch_html(&self.client, url, None).await?;
        Ok(tokio::task::spawn_blocking(move || extract_description(&html)).await?)
    }

    /// Fetches several pages at most `concurrency` at a time.
    /// Each URL maps to its description or an error message.
    pub async fn fetch_many(
        &self,
        urls: Vec<String>,
        concurrency: usize,
    ) -> HashMap<String, Result<String, String>> {
        stream::iter(urls)
            .map(|url| async move {
                let result = self.fetch(&url).await.map_err(|e| {
                    warn!("Description fetch failed for {url}: {e}");
                    e.to_string()
                });
                (url, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }
}

/// Board-specific containers first, then the page's main text minus chrome.
pub fn extract_description(html: &str) -> String {
    let doc = Html::parse_document(html);

    if let Some(text) = first_text(&doc, DESCRIPTION_SELECTORS, 50) {
        return text;
    }

    for container in FALLBACK_CONTAINERS {
        let Ok(sel) = selector(container) else {
            continue;
        };
        if let Some(el) = doc.select(&sel).next() {
            let text = text_excluding(el, NOISE_TAGS, " ");
            if text.chars().count() > 100 {
                debug!("Using generic <{container}> text as description");
                return truncate_chars(&text, MAX_FALLBACK_CHARS);
            }
        }
    }

    DESCRIPTION_UNAVAILABLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LONG: &str = "We are looking for an engineer to design, build and operate \
        distributed services written in Rust and deployed on Kubernetes.";

    #[test]
    fn test_board_selector_wins() {
        let html = format!(
            "<html><body><main>Some unrelated main text</main>\
             <div class='description__text'>{LONG}</div></body></html>"
        );
        assert_eq!(extract_description(&html), LONG);
    }

    #[test]
    fn test_short_selector_match_falls_through_to_main() {
        let html = format!(
            "<html><body><nav>Home Jobs</nav><div class='job-description'>Too short</div>\
             <main><script>track()</script><p>{LONG}</p><p>{LONG}</p></main></body></html>"
        );
        let text = extract_description(&html);
        assert!(text.starts_with("We are looking"), "{text}");
        assert!(!text.contains("track()"));
    }

    #[test]
    fn test_unavailable_when_nothing_useful() {
        assert_eq!(
            extract_description("<html><body><p>tiny</p></body></html>"),
            DESCRIPTION_UNAVAILABLE
        );
    }

    #[test]
    fn test_fallback_truncates() {
        let body = "word ".repeat(3000);
        let html = format!("<html><body><article>{body}</article></body></html>");
        assert_eq!(extract_description(&html).chars().count(), MAX_FALLBACK_CHARS);
    }

    #[tokio::test]
    async fn test_fetch_many_maps_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<div class='job-description'>{LONG}</div>"
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = DescriptionFetcher::new(reqwest::Client::new());
        let ok = format!("{}/ok", server.uri());
        let gone = format!("{}/gone", server.uri());
        let results = fetcher.fetch_many(vec![ok.clone(), gone.clone()], 2).await;

        assert_eq!(results[&ok].as_deref(), Ok(LONG));
        assert!(results[&gone].as_ref().unwrap_err().contains("404"));
    }
}
