//! REST endpoints for the run API.
//!
//! `run-test` executes a full sequence with continue-on-failure so the
//! resulting report covers every configured step; `run-single-step` is the
//! ad-hoc path and stops at the first failure by definition.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StepflowError;
use crate::executor::StepExecutor;
use crate::model::{RunStepOutcome, Step};
use crate::runner::{
    build_report, classify, ContinuationPolicy, EventEmitter, Orchestrator, RunOutcome,
};
use crate::store::StateCoordinator;
use crate::utils::ids;

/// Shared state for API handlers
pub struct AppState {
    pub coordinator: Arc<StateCoordinator>,
    pub executor: Arc<dyn StepExecutor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestRequest {
    #[serde(default)]
    pub test_name: Option<String>,

    #[serde(default)]
    pub steps: Option<Vec<Step>>,
}

#[derive(Debug, Deserialize)]
pub struct RunSingleStepRequest {
    #[serde(default)]
    pub step: Option<Step>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTestResponse {
    pub success: bool,
    pub results: Vec<RunStepOutcome>,
    pub total_steps: usize,
    pub successful_steps: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Build API router
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/run-test", post(run_test))
        .route("/api/run-single-step", post(run_single_step))
        .route("/api/flows", get(list_flows))
        .route("/api/reports", get(list_reports))
        .route("/api/running", get(list_running))
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

fn outcome_response(outcome: RunOutcome) -> Response {
    if let Some(error) = outcome.error {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, error);
    }

    let verdict = classify(&outcome);
    Json(RunTestResponse {
        success: verdict.status == crate::model::RunStatus::Success,
        total_steps: outcome.total_steps,
        successful_steps: outcome.successful_steps,
        results: outcome.outcomes,
        error: None,
    })
    .into_response()
}

/// POST /api/run-test - Execute a full step sequence and record a report
async fn run_test(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunTestRequest>,
) -> Response {
    let steps = match request.steps {
        Some(steps) if !steps.is_empty() => steps,
        _ => return error_response(StatusCode::BAD_REQUEST, "steps must be a non-empty list"),
    };
    let test_name = request
        .test_name
        .unwrap_or_else(|| "Ad-hoc Test".to_string());

    let run_id = ids::new_id();
    state.coordinator.register_run(&run_id, &test_name, Utc::now());

    let orchestrator = Orchestrator::new(
        state.executor.clone(),
        EventEmitter::default(),
        ContinuationPolicy::ContinueOnFailure,
    );
    let result = orchestrator.run(&test_name, &steps).await;
    state.coordinator.unregister_run(&run_id);

    match result {
        Ok(outcome) => {
            let verdict = classify(&outcome);
            let report = build_report(&test_name, "api", &outcome, &verdict);
            state.coordinator.append_report(report);
            outcome_response(outcome)
        }
        Err(StepflowError::Validation(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// POST /api/run-single-step - Execute exactly one step, no report
async fn run_single_step(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunSingleStepRequest>,
) -> Response {
    let step = match request.step {
        Some(step) => step,
        None => return error_response(StatusCode::BAD_REQUEST, "step is required"),
    };

    let orchestrator = Orchestrator::new(
        state.executor.clone(),
        EventEmitter::default(),
        ContinuationPolicy::StopOnFailure,
    );

    match orchestrator.run(&step.display_name(), &[step]).await {
        Ok(outcome) => outcome_response(outcome),
        Err(StepflowError::Validation(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// GET /api/flows - Saved flows
async fn list_flows(State(state): State<Arc<AppState>>) -> Response {
    Json(state.coordinator.flows()).into_response()
}

/// GET /api/reports - Run history, newest first
async fn list_reports(State(state): State<Arc<AppState>>) -> Response {
    Json(state.coordinator.reports()).into_response()
}

/// GET /api/running - Live run markers
async fn list_running(State(state): State<Arc<AppState>>) -> Response {
    Json(state.coordinator.running(Utc::now())).into_response()
}
