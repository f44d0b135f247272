//! HTTP API for health checks, Prometheus metrics and dashboard queries

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use fleet_lib::{
    health::{ComponentStatus, HealthRegistry},
    Orchestrator, ServiceMetrics,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let health_registry = orchestrator.health().clone();
        Self {
            orchestrator,
            health_registry,
        }
    }
}

/// Health check response - returns 200 if healthy, 503 if degraded/unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            e.to_string().into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.system_status().await)
}

async fn report(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.generate_performance_report().await)
}

async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.monitor().dashboard_data().await)
}

#[derive(Debug, Deserialize)]
struct PredictionQuery {
    horizon: Option<usize>,
}

async fn predictions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictionQuery>,
) -> impl IntoResponse {
    let horizon = query
        .horizon
        .unwrap_or(state.orchestrator.config().predictor.default_horizon_minutes);
    if horizon == 0 || horizon > 24 * 60 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "horizon must be between 1 and 1440 minutes" })),
        )
            .into_response();
    }
    Json(state.orchestrator.predictor().predict_all_services(horizon).await).into_response()
}

async fn failures(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.monitor().failure_predictions().await)
}

async fn service_health(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.monitor().calculate_health_score(&service).await {
        Some(score) => (StatusCode::OK, Json(serde_json::json!(score))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no forecast for {}", service) })),
        ),
    }
}

async fn scaling(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.scaler().analyze_scaling_performance().await)
}

#[derive(Debug, Deserialize)]
struct AlertQuery {
    #[serde(default)]
    active: bool,
}

async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> impl IntoResponse {
    let monitor = state.orchestrator.monitor();
    if query.active {
        Json(monitor.active_alerts().await)
    } else {
        Json(monitor.alerts().await)
    }
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.orchestrator.monitor().acknowledge_alert(&id).await {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "id": id, "acknowledged": true })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("alert {} not found", id) })),
        )
    }
}

async fn ingest_metrics(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    Json(metrics): Json<ServiceMetrics>,
) -> impl IntoResponse {
    state.orchestrator.ingest(&service, metrics).await;
    StatusCode::ACCEPTED
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/status", get(status))
        .route("/api/v1/report", get(report))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/predictions", get(predictions))
        .route("/api/v1/failures", get(failures))
        .route("/api/v1/scaling", get(scaling))
        .route("/api/v1/alerts", get(alerts))
        .route("/api/v1/alerts/:id/ack", post(acknowledge_alert))
        .route("/api/v1/services/:service/metrics", post(ingest_metrics))
        .route("/api/v1/services/:service/health", get(service_health))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
