//! Web dashboard.
//!
//! Server-rendered pages over the same executor the CLI uses:
//! - `GET /` filter form
//! - `GET /run` results page
//! - `GET /report.pdf?run=<id>` PDF download of a run shown by `/run`
//! - `GET /api/run` JSON results mapping
//! - `GET /health`
//!
//! `/run` and `/api/run` each run their own sequential plan. Results shown
//! by `/run` are kept in a bounded LRU under a fresh run id, so the PDF
//! export renders exactly what the page showed without querying again.

pub mod views;

use crate::config::Config;
use crate::error::ExecutorError;
use crate::models::{FilterParams, TaskResults};
use crate::planner::{self, parse_task_list, Executor};
use crate::report::generate_pdf_report;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shared state for the dashboard handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<Executor>,
    pub config: Arc<Config>,
    /// Results of recent `/run` pages, keyed by run id.
    pub runs: Arc<Mutex<LruCache<String, TaskResults>>>,
}

impl AppState {
    pub fn new(executor: Executor, config: Config) -> Self {
        let capacity =
            NonZeroUsize::new(config.server.saved_runs).unwrap_or(NonZeroUsize::MIN);
        Self {
            executor: Arc::new(executor),
            config: Arc::new(config),
            runs: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }
}

/// Failures a handler turns into an error page.
#[derive(Debug)]
pub enum DashboardError {
    BadRequest(String),
    NotFound(String),
    Execution(ExecutorError),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            DashboardError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            DashboardError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            DashboardError::Execution(e) => {
                warn!("Dashboard run aborted: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, Html(views::error_page(reason, &message))).into_response()
    }
}

/// A validated dashboard request.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub filters: FilterParams,
    pub tasks: Vec<String>,
}

/// "Any" (or blank) selects every value of a categorical filter.
fn category(value: &str) -> String {
    let value = value.trim();
    if value.eq_ignore_ascii_case("any") {
        String::new()
    } else {
        value.to_string()
    }
}

fn parse_age(key: &str, value: &str) -> Result<u32, DashboardError> {
    value
        .trim()
        .parse()
        .map_err(|_| DashboardError::BadRequest(format!("invalid {} '{}'", key, value)))
}

/// Read filters and tasks from query pairs. `tasks` may repeat or hold a
/// comma-separated list; unknown keys are ignored.
pub fn parse_run_query(pairs: &[(String, String)]) -> Result<RunRequest, DashboardError> {
    let mut filters = FilterParams::default();
    let mut tasks = Vec::new();

    for (key, value) in pairs {
        match key.as_str() {
            "age_min" | "min_age" => filters.age_min = parse_age("age_min", value)?,
            "age_max" | "max_age" => filters.age_max = parse_age("age_max", value)?,
            "gender" => filters.gender = category(value),
            "region" | "state" => filters.region = category(value),
            "visit_type" => filters.visit_type = category(value),
            "tasks" | "task" => tasks.extend(parse_task_list(value)),
            _ => {}
        }
    }

    filters.validate().map_err(DashboardError::BadRequest)?;
    Ok(RunRequest { filters, tasks })
}

async fn execute(
    state: &AppState,
    pairs: &[(String, String)],
) -> Result<(RunRequest, TaskResults), DashboardError> {
    let request = parse_run_query(pairs)?;
    let plan =
        planner::plan_for(&state.config, &request.tasks).map_err(DashboardError::BadRequest)?;

    info!(
        "Dashboard run: {} step(s) for {}",
        plan.len(),
        request.filters
    );

    let results = state
        .executor
        .run_plan(&request.filters, &plan)
        .await
        .map_err(DashboardError::Execution)?;

    Ok((request, results))
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    Html(views::index_page(
        &state.executor.registry().describe(),
        &state.config.general.default_tasks,
    ))
}

async fn run_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Html<String>, DashboardError> {
    let (request, results) = execute(&state, &pairs).await?;
    let run_id = Uuid::new_v4().to_string();
    let page = views::results_page(
        &request.filters,
        &results,
        &state.executor.registry().describe(),
        &run_id,
    );

    debug!("Saved dashboard run {}", run_id);
    state.runs.lock().await.put(run_id, results);
    Ok(Html(page))
}

/// Render a saved run. Nothing is executed here.
async fn pdf_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, DashboardError> {
    let run_id = pairs
        .iter()
        .find(|(key, _)| key == "run")
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            DashboardError::BadRequest("missing run id; open /run first".to_string())
        })?;

    let bytes = {
        let mut runs = state.runs.lock().await;
        let results = runs.get(run_id).ok_or_else(|| {
            DashboardError::NotFound(format!("run '{}' not found or expired", run_id))
        })?;
        generate_pdf_report(results)
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"datasage_report.pdf\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn api_run_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<TaskResults>, DashboardError> {
    let (_, results) = execute(&state, &pairs).await?;
    Ok(Json(results))
}

async fn health_handler() -> impl IntoResponse {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/run", get(run_handler))
        .route("/report.pdf", get(pdf_handler))
        .route("/api/run", get(api_run_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!("Dashboard listening on http://{}", bind);

    axum::serve(listener, router(state))
        .await
        .context("Dashboard server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{llm_settings, table, FakeCompletion, FakeWarehouse};
    use crate::agent::{Services, TaskRegistry};
    use crate::clients::Row;
    use crate::config::FailurePolicy;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn state_from(
        warehouse: Arc<FakeWarehouse>,
        completion: Arc<FakeCompletion>,
        policy: FailurePolicy,
        config: Config,
    ) -> AppState {
        let services = Services {
            warehouse,
            completion,
            table: table(),
            llm: llm_settings(),
        };
        AppState::new(Executor::new(TaskRegistry::standard(&services), policy), config)
    }

    fn state_with(warehouse: FakeWarehouse, policy: FailurePolicy) -> AppState {
        state_from(
            Arc::new(warehouse),
            Arc::new(FakeCompletion::replying("Costs look typical.")),
            policy,
            Config::default(),
        )
    }

    /// The `/report.pdf?run=...` link of a results page.
    fn download_link(html: &str) -> String {
        let start = html.find("/report.pdf?run=").unwrap();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_string()
    }

    fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    fn kpi_row() -> Row {
        Row::new()
            .with("avg_cost", json!(2500.0))
            .with("median_cost", json!(2400.0))
            .with("min_cost", json!(120.0))
            .with("max_cost", json!(4980.0))
    }

    async fn fetch(state: AppState, uri: &str) -> (StatusCode, Vec<(String, String)>, Vec<u8>) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_parse_run_query() {
        let request = parse_run_query(&pairs(&[
            ("min_age", "30"),
            ("age_max", "40"),
            ("gender", "Any"),
            ("state", "West"),
            ("tasks", "estimate_cost,detect_anomalies"),
            ("tasks", "llm_summary"),
            ("unused", "x"),
        ]))
        .unwrap();

        assert_eq!(request.filters.age_min, 30);
        assert_eq!(request.filters.age_max, 40);
        assert_eq!(request.filters.gender, "");
        assert_eq!(request.filters.region, "West");
        assert_eq!(
            request.tasks,
            vec!["estimate_cost", "detect_anomalies", "llm_summary"]
        );
    }

    #[test]
    fn test_parse_run_query_rejects_bad_ages() {
        assert!(matches!(
            parse_run_query(&pairs(&[("age_min", "old")])),
            Err(DashboardError::BadRequest(_))
        ));
        assert!(matches!(
            parse_run_query(&pairs(&[("age_min", "50"), ("age_max", "40")])),
            Err(DashboardError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_health() {
        let state = state_with(FakeWarehouse::default(), FailurePolicy::Record);
        let (status, _, body) = fetch(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_index_lists_registered_tasks() {
        let state = state_with(FakeWarehouse::default(), FailurePolicy::Record);
        let (status, _, body) = fetch(state, "/").await;
        let html = String::from_utf8(body).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("value=\"explain_kpis\""));
        assert!(html.contains("Run Agents"));
    }

    #[tokio::test]
    async fn test_run_page_renders_results() {
        let state = state_with(
            FakeWarehouse::returning(vec![kpi_row()]),
            FailurePolicy::Record,
        );
        let (status, _, body) = fetch(
            state,
            "/run?age_min=30&age_max=40&tasks=estimate_cost&tasks=interpret_benefits&tasks=nope",
        )
        .await;
        let html = String::from_utf8(body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("$2,500.00"));
        assert!(html.contains("<svg"));
        assert!(html.contains("Coverage: Likely covered under preventive services"));
        assert!(html.contains("Error: Unknown task: nope"));
        assert!(html.contains("href=\"/report.pdf?run="));
        assert!(!html.contains("/report.pdf?age_min"));
    }

    #[tokio::test]
    async fn test_run_page_rejects_invalid_range() {
        let state = state_with(FakeWarehouse::default(), FailurePolicy::Record);
        let (status, _, _) = fetch(state, "/run?age_min=60&age_max=20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pdf_download() {
        let state = state_with(
            FakeWarehouse::returning(vec![kpi_row()]),
            FailurePolicy::Record,
        );
        let (_, _, page) = fetch(state.clone(), "/run?tasks=estimate_cost").await;
        let link = download_link(&String::from_utf8(page).unwrap());
        let (status, headers, body) = fetch(state, &link).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(header_value(&headers, "content-type"), Some("application/pdf"));
        assert_eq!(
            header_value(&headers, "content-disposition"),
            Some("attachment; filename=\"datasage_report.pdf\"")
        );
        assert!(body.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_pdf_download_reuses_page_results() {
        let warehouse = Arc::new(FakeWarehouse::returning(vec![kpi_row()]));
        let completion = Arc::new(FakeCompletion::replying("Costs look typical."));
        let state = state_from(
            warehouse.clone(),
            completion.clone(),
            FailurePolicy::Record,
            Config::default(),
        );

        let (status, _, page) = fetch(state.clone(), "/run?tasks=estimate_cost,llm_summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(warehouse.calls(), 1);
        assert_eq!(completion.calls(), 1);

        let link = download_link(&String::from_utf8(page).unwrap());
        let (status, _, pdf) = fetch(state.clone(), &link).await;
        assert_eq!(status, StatusCode::OK);
        assert!(contains_bytes(&pdf, b"Costs look typical."));

        // A second download is served from the same saved run.
        let (status, _, _) = fetch(state, &link).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(warehouse.calls(), 1);
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_pdf_download_requires_known_run() {
        let warehouse = Arc::new(FakeWarehouse::returning(vec![kpi_row()]));
        let state = state_from(
            warehouse.clone(),
            Arc::new(FakeCompletion::default()),
            FailurePolicy::Record,
            Config::default(),
        );

        let (status, _, _) = fetch(state.clone(), "/report.pdf?tasks=estimate_cost").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, body) = fetch(state, "/report.pdf?run=no-such-run").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(String::from_utf8(body).unwrap().contains("no-such-run"));
        assert_eq!(warehouse.calls(), 0);
    }

    #[tokio::test]
    async fn test_saved_runs_are_bounded() {
        let mut config = Config::default();
        config.server.saved_runs = 1;
        let state = state_from(
            Arc::new(FakeWarehouse::returning(vec![kpi_row()])),
            Arc::new(FakeCompletion::default()),
            FailurePolicy::Record,
            config,
        );

        let (_, _, first) = fetch(state.clone(), "/run?tasks=estimate_cost").await;
        let (_, _, second) = fetch(state.clone(), "/run?tasks=interpret_benefits").await;
        let first = download_link(&String::from_utf8(first).unwrap());
        let second = download_link(&String::from_utf8(second).unwrap());

        let (status, _, _) = fetch(state.clone(), &first).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = fetch(state, &second).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_run_uses_default_tasks() {
        let state = state_with(FakeWarehouse::default(), FailurePolicy::Record);
        let (status, _, body) = fetch(state, "/api/run").await;
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["estimate_cost", "generate_insights"]);
        assert_eq!(value["estimate_cost"]["avg_cost"], 0.0);
        assert_eq!(
            value["generate_insights"]["message"],
            "No matching insights found."
        );
    }

    #[tokio::test]
    async fn test_abort_policy_returns_server_error() {
        let state = state_with(FakeWarehouse::failing(), FailurePolicy::Abort);
        let (status, _, body) = fetch(state, "/api/run?tasks=estimate_cost").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(String::from_utf8(body).unwrap().contains("estimate_cost"));
    }
}
