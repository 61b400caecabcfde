use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// How the API hands scrape tasks to an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Run on the API's own tokio runtime.
    Inline,
    /// Push onto the Redis list consumed by `jobhound-worker`.
    Broker,
}

impl FromStr for DispatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "broker" | "redis" => Ok(DispatchMode::Broker),
            other => bail!("unknown scrape dispatch mode '{other}' (expected 'inline' or 'broker')"),
        }
    }
}

/// Identity-provider settings used by the token verifier.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub domain: String,
    pub audience: String,
}

impl AuthConfig {
    pub fn jwks_url(&self) -> String {
        format!("https://{}/.well-known/jwks.json", self.domain)
    }

    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }
}

/// Recurring scrape run by the worker.
#[derive(Debug, Clone)]
pub struct PeriodicScrapeConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub search_terms: Vec<String>,
    pub location: String,
    pub sites: Vec<String>,
    pub hours_old: u32,
    pub num_jobs: usize,
    pub fetch_description: bool,
}

/// Settings shared by the API and the worker for running scrapes.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub queue_key: String,
    pub task_time_limit: Duration,
    pub worker_concurrency: usize,
    pub broker_max_retries: u32,
    pub status_ttl_secs: u64,
    pub page_delay: Duration,
    pub http_timeout: Duration,
    pub periodic: PeriodicScrapeConfig,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub auth: AuthConfig,
    pub allowed_origins: Vec<String>,
    pub enforce_permissions: bool,
    pub dispatch: DispatchMode,
    pub scrape: ScrapeConfig,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            auth: AuthConfig {
                domain: require_env("AUTH0_DOMAIN")?,
                audience: require_env("AUTH0_API_AUDIENCE")?,
            },
            allowed_origins: parse_origins(
                &std::env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            )?,
            enforce_permissions: env_or("ENFORCE_PERMISSIONS", true)?,
            dispatch: env_or("SCRAPE_DISPATCH", DispatchMode::Inline)?,
            scrape: ScrapeConfig::from_env()?,
            port: env_or("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Configuration for the `jobhound-worker` binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_url: String,
    pub scrape: ScrapeConfig,
    pub rust_log: String,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(WorkerConfig {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            scrape: ScrapeConfig::from_env()?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl ScrapeConfig {
    fn from_env() -> Result<Self> {
        let defaults = ScrapeConfig::default();
        Ok(ScrapeConfig {
            queue_key: std::env::var("SCRAPE_QUEUE_KEY").unwrap_or(defaults.queue_key),
            task_time_limit: Duration::from_secs(env_or(
                "TASK_TIME_LIMIT_SECS",
                defaults.task_time_limit.as_secs(),
            )?),
            worker_concurrency: env_or("WORKER_CONCURRENCY", defaults.worker_concurrency)?.max(1),
            broker_max_retries: env_or("BROKER_MAX_RETRIES", defaults.broker_max_retries)?,
            status_ttl_secs: env_or("TASK_STATUS_TTL_SECS", defaults.status_ttl_secs)?,
            page_delay: Duration::from_millis(env_or(
                "SCRAPE_PAGE_DELAY_MS",
                defaults.page_delay.as_millis() as u64,
            )?),
            http_timeout: Duration::from_secs(env_or(
                "SCRAPE_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            periodic: PeriodicScrapeConfig::from_env()?,
        })
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            queue_key: "jobhound:scrape:tasks".to_string(),
            task_time_limit: Duration::from_secs(300),
            worker_concurrency: 4,
            broker_max_retries: 10,
            status_ttl_secs: 86_400,
            page_delay: Duration::from_millis(1_000),
            http_timeout: Duration::from_secs(30),
            periodic: PeriodicScrapeConfig::default(),
        }
    }
}

impl PeriodicScrapeConfig {
    fn from_env() -> Result<Self> {
        let defaults = PeriodicScrapeConfig::default();
        Ok(PeriodicScrapeConfig {
            enabled: env_or("PERIODIC_SCRAPE_ENABLED", defaults.enabled)?,
            interval: Duration::from_secs(env_or(
                "PERIODIC_SCRAPE_INTERVAL_SECS",
                defaults.interval.as_secs(),
            )?),
            search_terms: std::env::var("PERIODIC_SCRAPE_TERMS")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.search_terms),
            location: std::env::var("PERIODIC_SCRAPE_LOCATION").unwrap_or(defaults.location),
            sites: std::env::var("PERIODIC_SCRAPE_SITES")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.sites),
            hours_old: env_or("PERIODIC_SCRAPE_HOURS_OLD", defaults.hours_old)?,
            num_jobs: env_or("PERIODIC_SCRAPE_NUM_JOBS", defaults.num_jobs)?,
            fetch_description: env_or(
                "PERIODIC_SCRAPE_FETCH_DESCRIPTION",
                defaults.fetch_description,
            )?,
        })
    }
}

impl Default for PeriodicScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(3 * 60 * 60),
            search_terms: vec![
                "Software Engineer".to_string(),
                "Full Stack Developer".to_string(),
                "Backend Developer".to_string(),
                "Frontend Developer".to_string(),
            ],
            location: "Australia".to_string(),
            sites: vec!["linkedin".to_string(), "indeed".to_string()],
            hours_old: 24,
            num_jobs: 100,
            fetch_description: true,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for '{key}': {e}")),
        _ => Ok(default),
    }
}

/// Accepts either a JSON array (`["https://a", "https://b"]`) or a comma list.
pub fn parse_origins(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        let origins: Vec<String> =
            serde_json::from_str(raw).context("ALLOWED_ORIGINS is not a valid JSON array")?;
        return Ok(origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect());
    }
    Ok(parse_list(raw))
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_json_array() {
        let origins = parse_origins(r#"["http://a.test", " http://b.test "]"#).unwrap();
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_parse_origins_comma_list() {
        let origins = parse_origins("http://a.test, http://b.test,,").unwrap();
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_parse_origins_rejects_broken_json() {
        assert!(parse_origins("[\"http://a.test\"").is_err());
    }

    #[test]
    fn test_dispatch_mode_parsing() {
        assert_eq!("inline".parse::<DispatchMode>().unwrap(), DispatchMode::Inline);
        assert_eq!(" Broker ".parse::<DispatchMode>().unwrap(), DispatchMode::Broker);
        assert!("celery".parse::<DispatchMode>().is_err());
    }

    #[test]
    fn test_auth_urls() {
        let auth = AuthConfig {
            domain: "tenant.example.com".to_string(),
            audience: "api".to_string(),
        };
        assert_eq!(auth.jwks_url(), "https://tenant.example.com/.well-known/jwks.json");
        assert_eq!(auth.issuer(), "https://tenant.example.com/");
    }

    #[test]
    fn test_periodic_defaults() {
        let periodic = PeriodicScrapeConfig::default();
        assert_eq!(periodic.interval, Duration::from_secs(10_800));
        assert_eq!(periodic.search_terms.len(), 4);
        assert_eq!(periodic.sites, vec!["linkedin", "indeed"]);
    }
}
