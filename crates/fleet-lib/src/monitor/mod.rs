//! Predictive monitoring
//!
//! Consumes fleet forecasts to predict categorized failures, score
//! per-service health, raise alerts, derive fleet insights and, when
//! enabled, run automatable remediations.

mod alerts;
mod detectors;
mod insights;
mod scoring;
mod types;

pub use alerts::{
    anomaly_alert, failure_alert, threshold_alert, trend_alert, AlertBook, AlertNotifier,
    TracingNotifier, CRITICAL_HEALTH_THRESHOLD,
};
pub use detectors::{
    cpu_exhaustion, detect_failures, historical_pattern, latency_degradation, memory_leak,
    FailureSignature, CPU_EXHAUSTION_THRESHOLD, SIMILARITY_THRESHOLD,
};
pub use insights::{generate as generate_insights, insight, AT_RISK_HEALTH};
pub use scoring::{score_prediction, FixedSecurityScore, SecurityScorer};
pub use types::{
    ActionType, AlertDetails, AlertLevel, AlertType, AnalysisSummary, DashboardData,
    FailurePrediction, FailureSeverity, FailureType, HealthComponents, HealthScore, HealthTrend,
    InsightType, PredictiveAlert, Rating, RecommendedAction, RemediationRecord, SystemInsight,
    SystemOverview,
};

use crate::clock::SharedClock;
use crate::error::{FleetError, Result};
use crate::models::{MetricKind, ResourcePrediction};
use crate::observability::{OptimizerMetrics, StructuredLogger};
use crate::predictor::ResourcePredictor;
use crate::scaler::{AutoScaler, InfrastructureController, LoggingController, ScalingResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Failure signatures retained per service
pub const MAX_SIGNATURES_PER_SERVICE: usize = 20;

/// Remediation records retained
pub const MAX_REMEDIATION_RECORDS: usize = 1000;

/// Insights returned by the dashboard
pub const DASHBOARD_INSIGHTS: usize = 10;

/// Configuration for the predictive monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub analysis_interval_secs: u64,
    pub horizon_minutes: usize,
    /// Forecasts below this confidence are skipped
    pub min_confidence: f64,
    pub failure_alert_threshold: f64,
    pub anomaly_alert_threshold: f64,
    pub auto_remediation: bool,
    /// Critical failures above this probability are remediated
    pub remediation_probability_threshold: f64,
    pub health_history_capacity: usize,
    pub max_alerts: usize,
    pub max_insights: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            analysis_interval_secs: 60,
            horizon_minutes: 60,
            min_confidence: 0.5,
            failure_alert_threshold: 0.8,
            anomaly_alert_threshold: 0.7,
            auto_remediation: false,
            remediation_probability_threshold: 0.9,
            health_history_capacity: 100,
            max_alerts: 1000,
            max_insights: 500,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.analysis_interval_secs == 0 || self.horizon_minutes == 0 {
            return Err(FleetError::invalid_config(
                "monitor analysis interval and horizon must be positive",
            ));
        }
        for (name, value) in [
            ("min_confidence", self.min_confidence),
            ("failure_alert_threshold", self.failure_alert_threshold),
            ("anomaly_alert_threshold", self.anomaly_alert_threshold),
            ("remediation_probability_threshold", self.remediation_probability_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FleetError::invalid_config(format!(
                    "monitor.{} must be between 0 and 1",
                    name
                )));
            }
        }
        if self.health_history_capacity == 0 || self.max_alerts == 0 || self.max_insights == 0 {
            return Err(FleetError::invalid_config(
                "monitor history, alert and insight capacities must be positive",
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MonitorState {
    health_history: HashMap<String, VecDeque<HealthScore>>,
    failures: BTreeMap<String, Vec<FailurePrediction>>,
    signatures: HashMap<String, VecDeque<FailureSignature>>,
    alerts: AlertBook,
    insights: VecDeque<SystemInsight>,
    remediations: VecDeque<RemediationRecord>,
    last_analysis_at: Option<DateTime<Utc>>,
}

impl MonitorState {
    fn new(config: &MonitorConfig) -> Self {
        Self {
            health_history: HashMap::new(),
            failures: BTreeMap::new(),
            signatures: HashMap::new(),
            alerts: AlertBook::new(config.max_alerts),
            insights: VecDeque::new(),
            remediations: VecDeque::new(),
            last_analysis_at: None,
        }
    }

    fn latest_score(&self, service: &str) -> Option<&HealthScore> {
        self.health_history.get(service).and_then(|h| h.back())
    }
}

/// Failure prediction, health scoring and alerting over fleet forecasts
pub struct PredictiveMonitor {
    config: RwLock<MonitorConfig>,
    clock: SharedClock,
    predictor: Arc<ResourcePredictor>,
    scaler: Option<Arc<AutoScaler>>,
    controller: Arc<dyn InfrastructureController>,
    notifier: Arc<dyn AlertNotifier>,
    security: Arc<dyn SecurityScorer>,
    state: RwLock<MonitorState>,
    metrics: OptimizerMetrics,
    logger: StructuredLogger,
}

impl PredictiveMonitor {
    pub fn new(
        config: MonitorConfig,
        predictor: Arc<ResourcePredictor>,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;
        let state = MonitorState::new(&config);
        Ok(Self {
            config: RwLock::new(config),
            clock,
            predictor,
            scaler: None,
            controller: Arc::new(LoggingController),
            notifier: Arc::new(TracingNotifier),
            security: Arc::new(FixedSecurityScore::default()),
            state: RwLock::new(state),
            metrics: OptimizerMetrics::new(),
            logger: StructuredLogger::new("predictive-monitor"),
        })
    }

    /// Route scale remediations through the auto-scaler's constraints and cooldown
    pub fn with_scaler(mut self, scaler: Arc<AutoScaler>) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn with_controller(mut self, controller: Arc<dyn InfrastructureController>) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_security_scorer(mut self, security: Arc<dyn SecurityScorer>) -> Self {
        self.security = security;
        self
    }

    pub async fn config(&self) -> MonitorConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, config: MonitorConfig) -> Result<()> {
        config.validate()?;
        self.state.write().await.alerts.set_capacity(config.max_alerts);
        *self.config.write().await = config;
        Ok(())
    }

    /// Remember the CPU shape that preceded a failure of `service`
    pub async fn record_failure_signature(&self, service: &str, signature: FailureSignature) {
        let mut state = self.state.write().await;
        push_signature(&mut state, service, signature);
    }

    pub async fn failure_signatures(&self, service: &str) -> Vec<FailureSignature> {
        self.state
            .read()
            .await
            .signatures
            .get(service)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// One analysis pass over every forecastable service
    pub async fn analyze(&self) -> AnalysisSummary {
        let config = self.config.read().await.clone();
        let now = self.clock.now();
        let predictions = self.predictor.predict_all_services(config.horizon_minutes).await;

        let mut summary = AnalysisSummary::default();
        let mut scores = Vec::new();
        let mut analyzed: Vec<ResourcePrediction> = Vec::new();

        for prediction in predictions {
            if prediction.confidence < config.min_confidence {
                debug!(
                    service = %prediction.service,
                    confidence = prediction.confidence,
                    "Skipping low-confidence forecast"
                );
                summary.services_skipped += 1;
                continue;
            }
            summary.services_analyzed += 1;

            let service = prediction.service.clone();
            self.logger.log_prediction(
                &service,
                prediction.horizon_minutes,
                prediction.confidence,
                prediction.predictions.max(MetricKind::Cpu),
                prediction.anomalies.len(),
            );

            let (failures, score, previous) = {
                let mut state = self.state.write().await;
                let signatures: Vec<FailureSignature> = state
                    .signatures
                    .get(&service)
                    .map(|s| s.iter().cloned().collect())
                    .unwrap_or_default();
                let failures = detect_failures(&prediction, &signatures);

                // A forecast that already matches a signature adds nothing new
                let recurrence = failures.iter().any(|f| f.historical_similarity > 0.0);
                if !recurrence {
                    for failure in failures
                        .iter()
                        .filter(|f| f.severity == FailureSeverity::Critical)
                    {
                        push_signature(
                            &mut state,
                            &service,
                            FailureSignature {
                                failure_type: failure.failure_type,
                                cpu_pattern: prediction.predictions.cpu.clone(),
                                description: failure.root_causes.join("; "),
                            },
                        );
                    }
                }

                let previous = state.latest_score(&service).map(|s| s.overall);
                let score = score_prediction(&prediction, previous, self.security.as_ref(), now);

                let history = state.health_history.entry(service.clone()).or_default();
                history.push_back(score.clone());
                while history.len() > config.health_history_capacity {
                    history.pop_front();
                }
                state.failures.insert(service.clone(), failures.clone());
                (failures, score, previous)
            };

            for failure in &failures {
                self.logger.log_failure_prediction(
                    &service,
                    &failure.failure_type.to_string(),
                    &failure.severity.to_string(),
                    failure.probability,
                    failure.estimated_time_to_failure_ms,
                );
            }

            let mut candidates = Vec::new();
            for failure in failures
                .iter()
                .filter(|f| f.probability > config.failure_alert_threshold)
            {
                candidates.push(failure_alert(failure, now));
            }
            for anomaly in prediction
                .anomalies
                .iter()
                .filter(|a| a.probability > config.anomaly_alert_threshold)
            {
                candidates.push(anomaly_alert(&service, anomaly, now));
            }
            if let (HealthTrend::Degrading, Some(prev)) = (score.trend, previous) {
                candidates.push(trend_alert(&score, prev, now));
            }
            if score.overall <= CRITICAL_HEALTH_THRESHOLD {
                candidates.push(threshold_alert(&score, now));
            }
            summary.alerts_raised += self.raise_alerts(candidates).await;

            if config.auto_remediation {
                for failure in failures.iter().filter(|f| {
                    f.severity == FailureSeverity::Critical
                        && f.probability > config.remediation_probability_threshold
                }) {
                    summary.remediations += self.remediate(failure).await.len();
                }
            }

            summary.failures.extend(failures);
            scores.push(score);
            analyzed.push(prediction);
        }

        let new_insights = generate_insights(&scores, &analyzed, now);
        summary.insights_generated = new_insights.len();
        {
            let mut state = self.state.write().await;
            state.last_analysis_at = Some(now);
            for insight in new_insights {
                state.insights.push_back(insight);
            }
            while state.insights.len() > config.max_insights {
                state.insights.pop_front();
            }
        }

        debug!(
            analyzed = summary.services_analyzed,
            skipped = summary.services_skipped,
            failures = summary.failures.len(),
            alerts = summary.alerts_raised,
            "Monitor analysis complete"
        );
        summary
    }

    /// Store alerts and hand the new ones to the notifier without waiting
    async fn raise_alerts(&self, candidates: Vec<PredictiveAlert>) -> usize {
        let mut raised = Vec::new();
        {
            let mut state = self.state.write().await;
            for alert in candidates {
                if state.alerts.record(alert.clone()) {
                    raised.push(alert);
                }
            }
        }

        for alert in &raised {
            let level = alert.level.to_string();
            self.logger.log_alert(&alert.service, &alert.id, &level, &alert.title);
            self.metrics.inc_alerts(&level);

            let notifier = Arc::clone(&self.notifier);
            let alert = alert.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&alert).await {
                    warn!(alert_id = %alert.id, error = %e, "Alert delivery failed");
                }
            });
        }
        raised.len()
    }

    /// Run each automatable recommendation once and record the outcome
    async fn remediate(&self, failure: &FailurePrediction) -> Vec<RemediationRecord> {
        let service = failure.service.as_str();
        let mut records = Vec::new();

        for recommendation in failure.recommendations.iter().filter(|r| r.automatable) {
            let outcome: std::result::Result<(), String> = match recommendation.action_type {
                ActionType::Restart => self
                    .controller
                    .restart(service)
                    .await
                    .map_err(|e| e.to_string()),
                ActionType::Config => self
                    .controller
                    .apply_config(service, &recommendation.description)
                    .await
                    .map_err(|e| e.to_string()),
                ActionType::Scale => self.remediate_scale(service, recommendation).await,
                ActionType::Alert | ActionType::Investigate => continue,
            };

            let error = outcome.err();
            let action = recommendation.action_type.to_string();
            self.logger
                .log_remediation(service, &action, error.is_none(), error.as_deref());
            self.metrics.inc_remediations(&action, error.is_none());

            records.push(RemediationRecord {
                id: uuid::Uuid::new_v4().to_string(),
                service: service.to_string(),
                action_type: recommendation.action_type,
                success: error.is_none(),
                error,
                timestamp: self.clock.now(),
            });
        }

        let mut state = self.state.write().await;
        for record in &records {
            if state.remediations.len() >= MAX_REMEDIATION_RECORDS {
                state.remediations.pop_front();
            }
            state.remediations.push_back(record.clone());
        }
        records
    }

    async fn remediate_scale(
        &self,
        service: &str,
        recommendation: &RecommendedAction,
    ) -> std::result::Result<(), String> {
        let Some(scaler) = &self.scaler else {
            return Err("no auto-scaler attached".to_string());
        };
        match scaler.request_scale(service, 1, &recommendation.description).await {
            Ok(Some(event)) if event.result == ScalingResult::Success => Ok(()),
            Ok(Some(event)) => Err(event.error.unwrap_or_else(|| "scale failed".to_string())),
            Ok(None) => Err("deferred by cooldown or replica bounds".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Score a service from a fresh forecast without recording it
    pub async fn calculate_health_score(&self, service: &str) -> Option<HealthScore> {
        let horizon = self.config.read().await.horizon_minutes;
        let prediction = self.predictor.predict_usage(service, horizon).await?;
        let previous = self
            .state
            .read()
            .await
            .latest_score(service)
            .map(|s| s.overall);
        Some(score_prediction(
            &prediction,
            previous,
            self.security.as_ref(),
            self.clock.now(),
        ))
    }

    pub async fn dashboard_data(&self) -> DashboardData {
        let state = self.state.read().await;

        let health_scores: BTreeMap<String, HealthScore> = state
            .health_history
            .iter()
            .filter_map(|(service, history)| history.back().map(|s| (service.clone(), s.clone())))
            .collect();

        let mut overview = SystemOverview {
            total_services: health_scores.len(),
            active_alerts: state.alerts.active_count(),
            predicted_failures: state.failures.values().map(Vec::len).sum(),
            ..Default::default()
        };
        for score in health_scores.values() {
            if score.overall > AT_RISK_HEALTH {
                overview.healthy += 1;
            } else if score.overall > CRITICAL_HEALTH_THRESHOLD {
                overview.at_risk += 1;
            } else {
                overview.critical += 1;
            }
        }

        DashboardData {
            health_scores,
            alerts: state.alerts.active(),
            insights: state.insights.iter().rev().take(DASHBOARD_INSIGHTS).cloned().collect(),
            overview,
            generated_at: self.clock.now(),
        }
    }

    pub async fn acknowledge_alert(&self, id: &str) -> bool {
        let acknowledged = self.state.write().await.alerts.acknowledge(id);
        if acknowledged {
            info!(alert_id = %id, "Alert acknowledged");
        }
        acknowledged
    }

    /// All stored alerts, oldest first
    pub async fn alerts(&self) -> Vec<PredictiveAlert> {
        self.state.read().await.alerts.all()
    }

    pub async fn active_alerts(&self) -> Vec<PredictiveAlert> {
        self.state.read().await.alerts.active()
    }

    pub async fn health_history(&self, service: &str) -> Vec<HealthScore> {
        self.state
            .read()
            .await
            .health_history
            .get(service)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// When the last analysis pass finished; `None` before the first
    pub async fn last_analysis_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_analysis_at
    }

    pub async fn remediation_log(&self) -> Vec<RemediationRecord> {
        self.state.read().await.remediations.iter().cloned().collect()
    }

    /// Most recent insights, newest first
    pub async fn insights(&self, limit: usize) -> Vec<SystemInsight> {
        self.state
            .read()
            .await
            .insights
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Failures from the latest analysis, grouped by service order
    pub async fn failure_predictions(&self) -> Vec<FailurePrediction> {
        self.state
            .read()
            .await
            .failures
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Periodic analysis loop
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let interval_secs = self.config.read().await.analysis_interval_secs;
        info!(interval_secs = interval_secs, "Starting predictive monitor");

        let mut ticker = interval(Duration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let summary = self.analyze().await;
                    if !summary.failures.is_empty() {
                        info!(
                            failures = summary.failures.len(),
                            alerts = summary.alerts_raised,
                            "Predicted failures this cycle"
                        );
                    }
                    self.metrics.observe_tick_latency("monitor", started.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    info!("Shutting down predictive monitor");
                    break;
                }
            }
        }
    }
}

fn push_signature(state: &mut MonitorState, service: &str, signature: FailureSignature) {
    let signatures = state.signatures.entry(service.to_string()).or_default();
    if signatures.len() >= MAX_SIGNATURES_PER_SERVICE {
        signatures.pop_front();
    }
    signatures.push_back(signature);
}
