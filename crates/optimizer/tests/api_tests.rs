//! Integration tests for the optimizer API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use fleet_lib::{
    system_clock, Component, ComponentStatus, OptimizerConfig, OptimizerMetrics, Orchestrator,
    ServiceMetrics,
};
use fleet_optimizer::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let mut config = OptimizerConfig::default();
    config.orchestrator.services = vec!["api".to_string()];

    let orchestrator = Arc::new(Orchestrator::new(config, system_clock()).unwrap());
    let state = Arc::new(AppState::new(orchestrator));
    let router = create_router(state.clone());

    (router, state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn sample(cpu: f64, minutes_ago: i64) -> ServiceMetrics {
    ServiceMetrics {
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
        cpu,
        memory: 50.0,
        requests_per_minute: 200.0,
        latency_ms: 150.0,
        error_rate: 0.0,
        replicas: 2,
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["predictor"].is_object());
    assert!(health["components"]["monitor"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state.orchestrator.cache().get("missing").await;
    state.orchestrator.integrated_analysis().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["cache"]["message"], "Hit rate 0%");
    assert_eq!(health["components"]["scaler"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .report(
            Component::Scaler,
            (ComponentStatus::Unhealthy, Some("Controller unreachable".to_string())),
        )
        .await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_until_initialized() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let readiness = json_body(response).await;
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reason"], "Optimizer not yet initialized");
}

#[tokio::test]
async fn test_readyz_returns_ok_after_initialize() {
    let (app, state) = setup_test_app().await;
    state.orchestrator.initialize().await.unwrap();

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["ready"], true);

    state.orchestrator.shutdown("test").await;
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    let metrics = OptimizerMetrics::new();
    metrics.observe_tick_latency("monitor", 0.002);
    metrics.inc_alerts("warning");

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("fleet_optimizer_tick_latency_seconds_bucket"));
    assert!(metrics_text.contains("fleet_optimizer_alerts_total"));
}

#[tokio::test]
async fn test_ingest_then_status() {
    let (app, _state) = setup_test_app().await;

    let body = Body::from(serde_json::to_vec(&sample(40.0, 0)).unwrap());
    let response = app
        .clone()
        .oneshot(post("/api/v1/services/api/metrics", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app.oneshot(get("/api/v1/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status = json_body(response).await;
    assert_eq!(status["initialized"], false);
    assert_eq!(status["services"][0], "api");
    assert_eq!(status["automation_level"], 0.75);
}

#[tokio::test]
async fn test_ingest_rejects_malformed_body() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(post("/api/v1/services/api/metrics", Body::from("{\"cpu\": 1}")))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_predictions_endpoint() {
    let (app, state) = setup_test_app().await;
    for i in 0..20 {
        state.orchestrator.ingest("api", sample(40.0, 20 - i)).await;
    }

    let response = app
        .clone()
        .oneshot(get("/api/v1/predictions?horizon=30"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let predictions = json_body(response).await;
    assert_eq!(predictions.as_array().unwrap().len(), 1);
    assert_eq!(predictions[0]["predictions"]["cpu"].as_array().unwrap().len(), 30);

    let response = app
        .oneshot(get("/api/v1/predictions?horizon=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alert_acknowledgement() {
    let (app, state) = setup_test_app().await;
    for i in 0..20 {
        state.orchestrator.ingest("api", sample(97.0, 20 - i)).await;
    }
    state.orchestrator.monitor().analyze().await;

    let response = app
        .clone()
        .oneshot(get("/api/v1/alerts?active=true"))
        .await
        .unwrap();
    let alerts = json_body(response).await;
    let alerts = alerts.as_array().unwrap();
    assert!(!alerts.is_empty());
    let id = alerts[0]["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post(&format!("/api/v1/alerts/{}/ack", id), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["acknowledged"], true);

    let response = app
        .clone()
        .oneshot(post("/api/v1/alerts/unknown/ack", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/api/v1/dashboard")).await.unwrap();
    let dashboard = json_body(response).await;
    assert_eq!(dashboard["overview"]["total_services"], 1);
    assert_eq!(
        dashboard["alerts"].as_array().unwrap().len(),
        alerts.len() - 1
    );
}

#[tokio::test]
async fn test_report_and_scaling_endpoints() {
    let (app, _state) = setup_test_app().await;

    let response = app.clone().oneshot(get("/api/v1/report")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = json_body(response).await;
    assert_eq!(report["automation_level"], 0.75);
    assert!(report["recommendations"].is_array());

    let response = app.oneshot(get("/api/v1/scaling")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let scaling = json_body(response).await;
    assert_eq!(scaling["total_events"], 0);
    assert_eq!(scaling["success_rate"], 1.0);
}

#[tokio::test]
async fn test_failures_endpoint() {
    let (app, state) = setup_test_app().await;
    for i in 0..20 {
        state.orchestrator.ingest("api", sample(97.0, 20 - i)).await;
    }

    let response = app.clone().oneshot(get("/api/v1/failures")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await.as_array().unwrap().is_empty());

    state.orchestrator.monitor().analyze().await;
    let response = app.oneshot(get("/api/v1/failures")).await.unwrap();
    let failures = json_body(response).await;
    let failures = failures.as_array().unwrap();
    assert!(!failures.is_empty());
    assert!(failures.iter().all(|f| f["service"] == "api"));
}

#[tokio::test]
async fn test_service_health_endpoint() {
    let (app, state) = setup_test_app().await;
    for i in 0..20 {
        state.orchestrator.ingest("api", sample(40.0, 20 - i)).await;
    }

    let response = app
        .clone()
        .oneshot(get("/api/v1/services/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let score = json_body(response).await;
    assert_eq!(score["service"], "api");
    assert!(score["overall"].as_f64().unwrap() > 90.0);
    assert_eq!(score["trend"], "stable");

    let response = app
        .oneshot(get("/api/v1/services/unknown/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
