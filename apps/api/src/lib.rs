pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod pagination;
pub mod parsing;
pub mod profiles;
pub mod resumes;
pub mod routes;
pub mod scraping;
pub mod state;
pub mod tasks;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "jobhound={level},jobhound_api={level},jobhound_worker={level},tower_http={level}"
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
