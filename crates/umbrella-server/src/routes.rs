//! HTTP control API.
//!
//! Reader control lives under `/api/nfc`, manual lending operations and
//! history queries under `/api/umbrella`. Handlers are thin: they validate
//! input, call the controller or the service, and serialize the result.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::ws;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use umbrella_core::StudentId;
use umbrella_core::constants::{DEFAULT_HISTORY_LIMIT, DEFAULT_RECENT_LIMIT, MAX_QUERY_LIMIT};
use umbrella_reader::ControllerStatus;
use umbrella_storage::{DisplayMessages, HistoryRecord, StudentStatus, TransitionOutcome};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/nfc/status", get(nfc_status))
        .route("/api/nfc/start", post(nfc_start))
        .route("/api/nfc/stop", post(nfc_stop))
        .route("/api/nfc/restart", post(nfc_restart))
        .route("/api/nfc/set-action", post(nfc_set_action))
        .route("/api/nfc/simulate", post(nfc_simulate))
        .route("/api/umbrella/status/:student_id", get(umbrella_status))
        .route("/api/umbrella/borrow", post(umbrella_borrow))
        .route("/api/umbrella/return", post(umbrella_return))
        .route("/api/umbrella/history/:student_id", get(umbrella_history))
        .route("/api/umbrella/recent", get(umbrella_recent))
        .route("/health", get(health))
        .route("/ws", get(ws::upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ActionRequest {
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StudentRequest {
    student_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    /// Tag identifier as hex, e.g. `01120312d4a1b2c3`.
    identifier: String,
    #[serde(default)]
    dump: Vec<String>,
}

/// `?limit=` with a per-route default. Unparsable values fall back to the
/// default; large ones are capped.
#[derive(Debug, Default, Deserialize)]
struct LimitQuery {
    limit: Option<String>,
}

impl LimitQuery {
    fn resolve(&self, default: u32) -> u32 {
        self.limit
            .as_deref()
            .and_then(|limit| limit.trim().parse().ok())
            .unwrap_or(default)
            .min(MAX_QUERY_LIMIT)
    }
}

fn student_id_from_path(raw: &str) -> ApiResult<StudentId> {
    StudentId::new(raw).map_err(|_| ApiError::bad_request(DisplayMessages::INVALID_STUDENT_ID))
}

fn student_id_from_body(request: StudentRequest) -> ApiResult<StudentId> {
    match request.student_id.as_deref().map(str::trim) {
        None | Some("") => Err(ApiError::bad_request(DisplayMessages::STUDENT_ID_REQUIRED)),
        Some(raw) => student_id_from_path(raw),
    }
}

async fn nfc_status(State(state): State<AppState>) -> Json<ControllerStatus> {
    Json(state.controller.status())
}

async fn nfc_start(State(state): State<AppState>) -> Json<Value> {
    let outcome = state.controller.start().await;
    Json(json!({ "status": outcome }))
}

async fn nfc_stop(State(state): State<AppState>) -> Json<Value> {
    let outcome = state.controller.stop().await;
    Json(json!({ "status": outcome }))
}

async fn nfc_restart(State(state): State<AppState>) -> Json<Value> {
    let outcome = state.controller.restart().await;
    Json(json!({ "status": outcome, "message": DisplayMessages::READER_RESTARTED }))
}

async fn nfc_set_action(
    State(state): State<AppState>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let action = state
        .controller
        .set_action(request.action.as_deref().unwrap_or_default())
        .map_err(|_| ApiError::bad_request(DisplayMessages::INVALID_ACTION))?;

    Ok(Json(json!({ "status": "success", "action": action })))
}

async fn nfc_simulate(
    State(state): State<AppState>,
    payload: Result<Json<SimulateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    let Some(simulator) = state.simulator.as_ref() else {
        return Err(ApiError::NotFound(
            "no simulated reader is attached".to_string(),
        ));
    };

    let identifier = hex::decode(request.identifier.trim())
        .map_err(|e| ApiError::bad_request(format!("identifier must be hexadecimal: {}", e)))?;
    simulator.present_tag(identifier, request.dump).await?;
    info!(tag = %request.identifier.trim(), "simulated tag presented");

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "presented" }))))
}

async fn umbrella_status(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> ApiResult<Json<StudentStatus>> {
    let student_id = student_id_from_path(&student_id)?;
    Ok(Json(state.service().check_status(&student_id).await?))
}

async fn umbrella_borrow(
    State(state): State<AppState>,
    payload: Result<Json<StudentRequest>, JsonRejection>,
) -> ApiResult<Json<TransitionOutcome>> {
    let Json(request) = payload?;
    let student_id = student_id_from_body(request)?;
    Ok(Json(state.service().borrow(&student_id).await?))
}

async fn umbrella_return(
    State(state): State<AppState>,
    payload: Result<Json<StudentRequest>, JsonRejection>,
) -> ApiResult<Json<TransitionOutcome>> {
    let Json(request) = payload?;
    let student_id = student_id_from_body(request)?;
    Ok(Json(state.service().return_umbrella(&student_id).await?))
}

async fn umbrella_history(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<HistoryRecord>>> {
    let student_id = student_id_from_path(&student_id)?;
    let limit = query.resolve(DEFAULT_HISTORY_LIMIT);
    Ok(Json(
        state.service().student_history(&student_id, limit).await?,
    ))
}

async fn umbrella_recent(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<HistoryRecord>>> {
    let limit = query.resolve(DEFAULT_RECENT_LIMIT);
    Ok(Json(state.service().recent_activity(limit).await?))
}

/// Liveness only; store reachability is logged at startup.
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 10)]
    #[case(Some("5"), 5)]
    #[case(Some(" 7 "), 7)]
    #[case(Some("abc"), 10)]
    #[case(Some("-1"), 10)]
    #[case(Some("0"), 0)]
    #[case(Some("100000"), MAX_QUERY_LIMIT)]
    fn test_limit_resolution(#[case] raw: Option<&str>, #[case] expected: u32) {
        let query = LimitQuery {
            limit: raw.map(str::to_string),
        };
        assert_eq!(query.resolve(10), expected);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn test_missing_student_id(#[case] raw: Option<&str>) {
        let request = StudentRequest {
            student_id: raw.map(str::to_string),
        };
        let err = student_id_from_body(request).unwrap_err();
        assert_eq!(err.to_string(), DisplayMessages::STUDENT_ID_REQUIRED);
    }

    #[test]
    fn test_malformed_student_id() {
        let request = StudentRequest {
            student_id: Some("21 12".to_string()),
        };
        let err = student_id_from_body(request).unwrap_err();
        assert_eq!(err.to_string(), DisplayMessages::INVALID_STUDENT_ID);
    }
}
