use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ScrapeEnvelope, ScrapeTask, TaskError, TaskStatus};
use crate::auth::AuthUser;
use crate::config::DispatchMode;
use crate::errors::AppError;
use crate::scraping::SearchParams;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScrapeAccepted {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub dispatch: DispatchMode,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SupportedSites {
    pub sites: Vec<String>,
}

/// Rejects a request whose explicit site list names nothing we can scrape.
fn check_sites(params: &SearchParams, supported: &[String]) -> Result<(), AppError> {
    let Some(requested) = params.sites() else {
        return Ok(());
    };
    if requested.iter().any(|s| supported.contains(s)) {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "None of the requested sites are supported ({}). Supported: {}",
        requested.join(", "),
        supported.join(", ")
    )))
}

/// POST /api/v1/scrape
pub async fn handle_start_scrape(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<SearchParams>,
) -> Result<(StatusCode, Json<ScrapeAccepted>), AppError> {
    auth.require("create:jobs")?;
    params.validate().map_err(AppError::Validation)?;
    check_sites(&params, &state.search.supported_sites())?;

    let envelope = ScrapeEnvelope::new(params, Some(auth.id()));
    let task_id = envelope.task_id;
    let mode = state.dispatcher.mode();
    let task = state.tasks.create(&envelope, mode).await;

    if let Err(e) = state.dispatcher.dispatch(envelope).await {
        state
            .tasks
            .fail(task_id, TaskError::Dispatch(e.to_string()))
            .await;
        return Err(e.into());
    }

    info!(%task_id, ?mode, "Scrape task accepted for '{}'", task.params.search_term);
    Ok((
        StatusCode::ACCEPTED,
        Json(ScrapeAccepted {
            task_id,
            status: task.status,
            dispatch: mode,
            message: format!("Scraping '{}' in the background", task.params.search_term),
        }),
    ))
}

/// GET /api/v1/scrape/sites
pub async fn handle_supported_sites(State(state): State<AppState>) -> Json<SupportedSites> {
    Json(SupportedSites {
        sites: state.search.supported_sites(),
    })
}

/// GET /api/v1/scrape/:task_id
pub async fn handle_task_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<ScrapeTask>, AppError> {
    let not_found = || AppError::NotFound(format!("Task {task_id} not found"));
    let task = state.tasks.get(task_id).await.ok_or_else(not_found)?;
    if task.owner != Some(auth.id()) {
        return Err(not_found());
    }

    if task.dispatch != DispatchMode::Broker || task.status.is_terminal() {
        return Ok(Json(task));
    }
    let Some(broker) = &state.broker else {
        return Ok(Json(task));
    };

    match broker.fetch_status(task_id).await {
        Ok(Some(update)) => Ok(Json(state.tasks.apply(update).await.unwrap_or(task))),
        Ok(None) => Ok(Json(task)),
        Err(e) => {
            warn!(%task_id, "Could not read worker status, returning local view: {e}");
            Ok(Json(task))
        }
    }
}
