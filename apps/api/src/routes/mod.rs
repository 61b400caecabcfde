pub mod health;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::jobs::handlers as jobs;
use crate::profiles::handlers as profiles;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::tasks::handlers as tasks;

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(health::health_handler))
        // Profile
        .route(
            "/api/v1/profile",
            get(profiles::handle_get_profile)
                .post(profiles::handle_create_profile)
                .put(profiles::handle_update_profile),
        )
        // Jobs
        .route(
            "/api/v1/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route("/api/v1/jobs/scraped", get(jobs::handle_list_scraped))
        .route("/api/v1/jobs/skills", get(jobs::handle_skill_stats))
        .route("/api/v1/jobs/parse-url", post(jobs::handle_parse_url))
        .route("/api/v1/jobs/search", post(jobs::handle_search_jobs))
        .route(
            "/api/v1/jobs/:id",
            get(jobs::handle_get_job)
                .put(jobs::handle_update_job)
                .delete(jobs::handle_delete_job),
        )
        // Resumes
        .route(
            "/api/v1/resumes",
            get(resumes::handle_list_resumes).post(resumes::handle_create_resume),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get_resume)
                .put(resumes::handle_update_resume)
                .delete(resumes::handle_delete_resume),
        )
        // Scrape tasks
        .route("/api/v1/scrape", post(tasks::handle_start_scrape))
        .route("/api/v1/scrape/sites", get(tasks::handle_supported_sites))
        .route("/api/v1/scrape/:task_id", get(tasks::handle_task_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// `*` allows any origin without credentials; otherwise only the listed
/// origins, with credentials.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use tower::ServiceExt;

    async fn send(request: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
        let response = build_router(test_state()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, headers, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = send(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "jobhound-api");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (status, headers, body) = send(get_request("/api/v1/jobs")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(headers.get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let request = Request::builder()
            .uri("/api/v1/scrape/00000000-0000-0000-0000-000000000000")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_supported_sites_is_public() {
        let (status, _, body) = send(get_request("/api/v1/scrape/sites")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sites"], serde_json::json!(["linkedin"]));
    }

    #[tokio::test]
    async fn test_cors_preflight_for_allowed_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/v1/jobs")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }
}
