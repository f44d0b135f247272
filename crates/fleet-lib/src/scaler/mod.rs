//! Auto-scaling
//!
//! Evaluates reactive, predictive, scheduled, cost-aware and hybrid
//! policies per service against its constraints, orders the resulting
//! actions by value, and executes them through an
//! [`InfrastructureController`]. Every submitted action leaves a
//! [`ScalingEvent`] in the audit trail.

mod controller;
mod cost;
mod policy;
mod types;

pub use controller::{InfrastructureController, LoggingController};
pub use cost::{CostModel, FlatRateCostModel};
pub use policy::{predictive, reactive, scheduled, BusinessHours, Proposal};
pub use types::{
    PerformanceTargets, ScaleAction, ScaleDirection, ScalingConstraints, ScalingEvent,
    ScalingPerformanceReport, ScalingPolicy, ScalingResult, ServiceScalingSummary, Urgency,
};

use crate::clock::SharedClock;
use crate::error::{FleetError, Result};
use crate::models::ServiceMetrics;
use crate::observability::{OptimizerMetrics, StructuredLogger};
use crate::predictor::ResourcePredictor;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Metric samples retained per service
pub const METRICS_HISTORY_CAPACITY: usize = 100;

/// Scaling events retained in the audit trail
pub const MAX_SCALING_EVENTS: usize = 1000;

/// Configuration for the auto-scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    pub policy: ScalingPolicy,
    pub evaluation_interval_secs: u64,
    /// Minimum benefit/cost ratio for the cost-aware filter
    pub cost_benefit_threshold: f64,
    /// Predictive actions need more confidence than this under the hybrid policy
    pub predictive_confidence_threshold: f64,
    pub prediction_horizon_minutes: usize,
    /// Minutes ahead of a forecast breach that predictive actions fire
    pub predictive_lead_minutes: i64,
    pub business_hours: BusinessHours,
    /// Constraints installed for services without explicit ones
    pub default_constraints: ScalingConstraints,
    pub cost_model: FlatRateCostModel,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            policy: ScalingPolicy::Hybrid,
            evaluation_interval_secs: 60,
            cost_benefit_threshold: 2.0,
            predictive_confidence_threshold: 0.8,
            prediction_horizon_minutes: 60,
            predictive_lead_minutes: 5,
            business_hours: BusinessHours::default(),
            default_constraints: ScalingConstraints::default(),
            cost_model: FlatRateCostModel::default(),
        }
    }
}

impl ScalerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.policy == ScalingPolicy::Manual {
            return Err(FleetError::invalid_config(
                "scaler.policy cannot be manual",
            ));
        }
        if self.evaluation_interval_secs == 0 || self.prediction_horizon_minutes == 0 {
            return Err(FleetError::invalid_config(
                "scaler evaluation interval and prediction horizon must be positive",
            ));
        }
        if self.business_hours.start_hour >= self.business_hours.end_hour
            || self.business_hours.end_hour > 24
        {
            return Err(FleetError::invalid_config(
                "scaler.business_hours must satisfy start_hour < end_hour <= 24",
            ));
        }
        self.default_constraints.validate("default")
    }
}

#[derive(Debug, Default)]
struct ScalerState {
    history: HashMap<String, VecDeque<ServiceMetrics>>,
    constraints: HashMap<String, ScalingConstraints>,
    last_scaling: HashMap<String, DateTime<Utc>>,
    pending: HashMap<String, ScaleAction>,
    events: VecDeque<ScalingEvent>,
}

impl ScalerState {
    fn in_cooldown(&self, service: &str, now: DateTime<Utc>) -> bool {
        let (Some(last), Some(c)) = (self.last_scaling.get(service), self.constraints.get(service))
        else {
            return false;
        };
        now - *last < ChronoDuration::milliseconds(c.cooldown_period_ms as i64)
    }

    fn latest(&self, service: &str) -> Option<&ServiceMetrics> {
        self.history.get(service).and_then(|h| h.back())
    }
}

/// Policy-driven replica scaler
pub struct AutoScaler {
    config: RwLock<ScalerConfig>,
    clock: SharedClock,
    predictor: Option<Arc<ResourcePredictor>>,
    controller: Arc<dyn InfrastructureController>,
    /// Replaces the configured flat rate when set
    cost_override: Option<Arc<dyn CostModel>>,
    state: RwLock<ScalerState>,
    metrics: OptimizerMetrics,
    logger: StructuredLogger,
}

impl AutoScaler {
    /// Create a scaler that logs instead of acting, priced by the configured flat rate
    pub fn new(config: ScalerConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
            clock,
            predictor: None,
            controller: Arc::new(LoggingController),
            cost_override: None,
            state: RwLock::new(ScalerState::default()),
            metrics: OptimizerMetrics::new(),
            logger: StructuredLogger::new("auto-scaler"),
        })
    }

    /// Source forecasts for the predictive and hybrid policies
    pub fn with_predictor(mut self, predictor: Arc<ResourcePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_controller(mut self, controller: Arc<dyn InfrastructureController>) -> Self {
        self.controller = controller;
        self
    }

    /// Price actions with `cost_model` instead of `ScalerConfig::cost_model`
    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_override = Some(cost_model);
        self
    }

    fn cost_model<'a>(&'a self, config: &'a ScalerConfig) -> &'a dyn CostModel {
        match &self.cost_override {
            Some(model) => model.as_ref(),
            None => &config.cost_model,
        }
    }

    pub async fn config(&self) -> ScalerConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration; the previous one stays on validation failure
    pub async fn update_config(&self, config: ScalerConfig) -> Result<()> {
        config.validate()?;
        info!(policy = %config.policy, "Scaler configuration updated");
        *self.config.write().await = config;
        Ok(())
    }

    pub async fn set_constraints(&self, service: &str, constraints: ScalingConstraints) -> Result<()> {
        constraints.validate(service)?;
        let mut state = self.state.write().await;
        state.constraints.insert(service.to_string(), constraints);
        debug!(service = %service, "Scaling constraints set");
        Ok(())
    }

    pub async fn constraints(&self, service: &str) -> Option<ScalingConstraints> {
        self.state.read().await.constraints.get(service).cloned()
    }

    /// Record a metrics sample; services without constraints get the defaults
    pub async fn add_metrics(&self, service: &str, metrics: ServiceMetrics) {
        let defaults = self.config.read().await.default_constraints.clone();
        let mut state = self.state.write().await;
        state
            .constraints
            .entry(service.to_string())
            .or_insert(defaults);

        let history = state.history.entry(service.to_string()).or_default();
        if history.len() >= METRICS_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(metrics);
    }

    pub async fn latest_metrics(&self, service: &str) -> Option<ServiceMetrics> {
        self.state.read().await.latest(service).cloned()
    }

    /// Services with constraints, sorted
    pub async fn services(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut services: Vec<String> = state.constraints.keys().cloned().collect();
        services.sort();
        services
    }

    pub async fn in_cooldown(&self, service: &str) -> bool {
        self.state.read().await.in_cooldown(service, self.clock.now())
    }

    /// Decide whether a service should scale now
    ///
    /// Returns `None` without constraints or metrics, during cooldown, or
    /// when the policy keeps the current replica count.
    pub async fn evaluate_service(&self, service: &str) -> Option<ScaleAction> {
        let now = self.clock.now();
        let config = self.config.read().await.clone();

        let (metrics, constraints) = {
            let state = self.state.read().await;
            if state.in_cooldown(service, now) {
                debug!(service = %service, "Skipping evaluation during cooldown");
                return None;
            }
            let constraints = state.constraints.get(service)?.clone();
            let Some(metrics) = state.latest(service).cloned() else {
                debug!(service = %service, "No metrics for service");
                return None;
            };
            (metrics, constraints)
        };

        let proposal = match config.policy {
            ScalingPolicy::Reactive | ScalingPolicy::Manual => reactive(&metrics, &constraints),
            ScalingPolicy::Predictive => {
                self.predictive_proposal(service, &metrics, &constraints, &config, now)
                    .await
            }
            ScalingPolicy::Scheduled => {
                scheduled(&metrics, &constraints, now, &config.business_hours)
            }
            ScalingPolicy::CostAware => reactive(&metrics, &constraints)
                .filter(|p| self.passes_cost_filter(p, metrics.replicas, &config)),
            ScalingPolicy::Hybrid => {
                self.hybrid_proposal(service, &metrics, &constraints, &config, now)
                    .await
            }
        }?;

        Some(self.price(service, metrics.replicas, proposal, &config))
    }

    async fn predictive_proposal(
        &self,
        service: &str,
        metrics: &ServiceMetrics,
        constraints: &ScalingConstraints,
        config: &ScalerConfig,
        now: DateTime<Utc>,
    ) -> Option<Proposal> {
        let predictor = self.predictor.as_ref()?;
        let prediction = predictor
            .predict_usage(service, config.prediction_horizon_minutes)
            .await?;
        predictive(
            &prediction,
            metrics.replicas,
            constraints,
            now,
            config.predictive_lead_minutes,
        )
    }

    /// Critical reactive, then confident predictive, then scheduled, then cost-filtered reactive
    async fn hybrid_proposal(
        &self,
        service: &str,
        metrics: &ServiceMetrics,
        constraints: &ScalingConstraints,
        config: &ScalerConfig,
        now: DateTime<Utc>,
    ) -> Option<Proposal> {
        let reactive_proposal = reactive(metrics, constraints);
        if let Some(p) = &reactive_proposal {
            if p.urgency == Urgency::Critical {
                return reactive_proposal;
            }
        }

        if let Some(p) = self
            .predictive_proposal(service, metrics, constraints, config, now)
            .await
        {
            if p.confidence > config.predictive_confidence_threshold {
                return Some(p);
            }
        }

        if let Some(p) = scheduled(metrics, constraints, now, &config.business_hours) {
            return Some(p);
        }

        reactive_proposal.filter(|p| self.passes_cost_filter(p, metrics.replicas, config))
    }

    fn passes_cost_filter(&self, proposal: &Proposal, current: u32, config: &ScalerConfig) -> bool {
        if proposal.urgency == Urgency::Critical {
            return true;
        }
        let model = self.cost_model(config);
        let cost = model.estimate_cost(current, proposal.target_replicas);
        let benefit = model.estimate_benefit(current, proposal.target_replicas);
        let ratio = if cost <= 0.0 { f64::INFINITY } else { benefit / cost };
        ratio >= config.cost_benefit_threshold
    }

    fn price(
        &self,
        service: &str,
        current: u32,
        proposal: Proposal,
        config: &ScalerConfig,
    ) -> ScaleAction {
        let model = self.cost_model(config);
        ScaleAction {
            service: service.to_string(),
            action: proposal.direction,
            current_replicas: current,
            target_replicas: proposal.target_replicas,
            reason: proposal.reason,
            confidence: proposal.confidence,
            estimated_cost: model.estimate_cost(current, proposal.target_replicas),
            estimated_benefit: model.estimate_benefit(current, proposal.target_replicas),
            urgency: proposal.urgency,
            scheduled_time: proposal.scheduled_time,
            policy: proposal.policy,
        }
    }

    /// Evaluate every service and execute the actions that are due
    ///
    /// Actions scheduled for later are held and re-checked on later calls.
    /// Due actions run highest `(benefit/cost) × urgency` first.
    pub async fn evaluate_all(&self) -> Vec<ScalingEvent> {
        let now = self.clock.now();
        let mut due: BTreeMap<String, ScaleAction> = BTreeMap::new();

        for service in self.services().await {
            if let Some(mut action) = self.evaluate_service(&service).await {
                let held = self.state.write().await.pending.remove(&service);
                // A re-evaluated forecast must not push a held deadline back
                if let (Some(held_time), Some(new_time)) =
                    (held.and_then(|h| h.scheduled_time), action.scheduled_time)
                {
                    action.scheduled_time = Some(new_time.min(held_time));
                }
                if action.is_due(now) {
                    due.insert(service.clone(), action);
                } else {
                    debug!(
                        service = %service,
                        scheduled_time = ?action.scheduled_time,
                        "Holding scheduled scale action"
                    );
                    self.state.write().await.pending.insert(service, action);
                }
            }
        }

        {
            let mut state = self.state.write().await;
            let ready: Vec<String> = state
                .pending
                .iter()
                .filter(|(service, action)| {
                    action.is_due(now) && !due.contains_key(*service) && !state.in_cooldown(service, now)
                })
                .map(|(service, _)| service.clone())
                .collect();
            for service in ready {
                if let Some(action) = state.pending.remove(&service) {
                    due.insert(service, action);
                }
            }
        }

        let mut ordered: Vec<ScaleAction> = due.into_values().collect();
        ordered.sort_by(|a, b| b.priority_score().total_cmp(&a.priority_score()));

        let mut events = Vec::with_capacity(ordered.len());
        for action in ordered {
            if self.in_cooldown(&action.service).await {
                continue;
            }
            events.push(self.execute_action(action).await);
        }
        events
    }

    /// Submit an action to the controller and record the outcome
    ///
    /// A failed execution is recorded, never propagated.
    pub async fn execute_action(&self, action: ScaleAction) -> ScalingEvent {
        let started = Instant::now();
        let config = self.config.read().await.clone();
        let direction = action.action.to_string();
        self.logger.log_scale_action(
            &action.service,
            &direction,
            action.current_replicas,
            action.target_replicas,
            &action.urgency.to_string(),
            &action.reason,
        );
        self.metrics.inc_scale_actions(&direction);

        let outcome = self
            .controller
            .scale(&action.service, action.target_replicas)
            .await
            .map_err(|e| FleetError::Execution {
                service: action.service.clone(),
                reason: e.to_string(),
            });
        let duration_ms = started.elapsed().as_millis() as u64;
        let now = self.clock.now();

        let (result, error, cost_impact) = match &outcome {
            Ok(()) => (
                ScalingResult::Success,
                None,
                self.cost_model(&config)
                    .cost_impact(action.current_replicas, action.target_replicas),
            ),
            Err(e) => {
                self.metrics.inc_scaling_failures();
                (ScalingResult::Failed, Some(e.to_string()), 0.0)
            }
        };
        self.logger
            .log_scale_result(&action.service, outcome.is_ok(), duration_ms, error.as_deref());

        let event = ScalingEvent {
            id: uuid::Uuid::new_v4().to_string(),
            service: action.service.clone(),
            timestamp: now,
            action,
            result,
            duration_ms,
            cost_impact,
            error,
        };

        let mut state = self.state.write().await;
        state.last_scaling.insert(event.service.clone(), now);
        if result == ScalingResult::Success {
            if let Some(latest) = state
                .history
                .get_mut(&event.service)
                .and_then(|h| h.back_mut())
            {
                latest.replicas = event.action.target_replicas;
            }
        }
        if state.events.len() >= MAX_SCALING_EVENTS {
            state.events.pop_front();
        }
        state.events.push_back(event.clone());

        event
    }

    /// Constrained, cooldown-respecting scale by `delta` replicas
    ///
    /// Returns `Ok(None)` when the service is cooling down or already at
    /// the bound in that direction.
    pub async fn request_scale(
        &self,
        service: &str,
        delta: i32,
        reason: &str,
    ) -> Result<Option<ScalingEvent>> {
        let now = self.clock.now();
        let config = self.config.read().await.clone();
        let (current, target) = {
            let state = self.state.read().await;
            let constraints = state
                .constraints
                .get(service)
                .ok_or_else(|| FleetError::UnknownService(service.to_string()))?;
            if state.in_cooldown(service, now) {
                info!(service = %service, "Scale request deferred by cooldown");
                return Ok(None);
            }
            let current = state
                .latest(service)
                .map(|m| m.replicas)
                .unwrap_or(constraints.min_replicas);
            let step = if delta >= 0 {
                (delta as u32).min(constraints.max_scale_up_step) as i64
            } else {
                -((delta.unsigned_abs()).min(constraints.max_scale_down_step) as i64)
            };
            let target = (current as i64 + step).max(0) as u32;
            (current, constraints.clamp(target))
        };

        if target == current {
            return Ok(None);
        }

        let direction = if target > current {
            ScaleDirection::ScaleUp
        } else {
            ScaleDirection::ScaleDown
        };
        let action = self.price(
            service,
            current,
            Proposal {
                direction,
                target_replicas: target,
                reason: reason.to_string(),
                confidence: 1.0,
                urgency: Urgency::High,
                scheduled_time: None,
                policy: ScalingPolicy::Manual,
            },
            &config,
        );
        Ok(Some(self.execute_action(action).await))
    }

    /// Most recent events, oldest first
    pub async fn events(&self, limit: usize) -> Vec<ScalingEvent> {
        let state = self.state.read().await;
        let skip = state.events.len().saturating_sub(limit);
        state.events.iter().skip(skip).cloned().collect()
    }

    pub async fn pending_actions(&self) -> Vec<ScaleAction> {
        let state = self.state.read().await;
        let mut pending: Vec<ScaleAction> = state.pending.values().cloned().collect();
        pending.sort_by(|a, b| a.service.cmp(&b.service));
        pending
    }

    /// Summarize the audit trail
    pub async fn analyze_scaling_performance(&self) -> ScalingPerformanceReport {
        let state = self.state.read().await;
        let total = state.events.len();
        let successful = state
            .events
            .iter()
            .filter(|e| e.result == ScalingResult::Success)
            .count();
        let failed = state
            .events
            .iter()
            .filter(|e| e.result == ScalingResult::Failed)
            .count();

        let mut per_service: BTreeMap<String, ServiceScalingSummary> = BTreeMap::new();
        for event in &state.events {
            let summary = per_service.entry(event.service.clone()).or_default();
            summary.events += 1;
            match event.action.action {
                ScaleDirection::ScaleUp => summary.scale_ups += 1,
                ScaleDirection::ScaleDown => summary.scale_downs += 1,
                ScaleDirection::Maintain => {}
            }
            if event.result == ScalingResult::Failed {
                summary.failures += 1;
            }
        }

        let success_rate = if total == 0 {
            1.0
        } else {
            successful as f64 / total as f64
        };
        let average_duration_ms = if total == 0 {
            0.0
        } else {
            state.events.iter().map(|e| e.duration_ms as f64).sum::<f64>() / total as f64
        };

        let mut recommendations = Vec::new();
        if success_rate < 0.9 {
            recommendations.push(format!(
                "Scaling success rate is {:.0}%; check controller connectivity",
                success_rate * 100.0
            ));
        }
        for (service, summary) in &per_service {
            if summary.scale_ups > 0 && summary.scale_downs > 0 && summary.events >= 6 {
                recommendations.push(format!(
                    "{} oscillates between scale-up and scale-down; widen its cooldown",
                    service
                ));
            } else if summary.scale_ups >= 5 {
                recommendations.push(format!(
                    "{} scales up often; raise its minimum replicas",
                    service
                ));
            }
        }

        ScalingPerformanceReport {
            total_events: total,
            successful,
            failed,
            success_rate,
            average_duration_ms,
            total_cost_impact: state.events.iter().map(|e| e.cost_impact).sum(),
            pending_actions: state.pending.len(),
            per_service,
            recommendations,
        }
    }

    /// Periodic evaluation loop
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let interval_secs = self.config.read().await.evaluation_interval_secs;
        info!(interval_secs = interval_secs, "Starting auto-scaler");

        let mut ticker = interval(Duration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let events = self.evaluate_all().await;
                    if events.iter().any(|e| e.result == ScalingResult::Failed) {
                        warn!(events = events.len(), "Some scale actions failed");
                    }
                    self.metrics.observe_tick_latency("scaler", started.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    info!("Shutting down auto-scaler");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::predictor::PredictorConfig;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<(String, u32)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl InfrastructureController for RecordingController {
        async fn scale(&self, service: &str, replicas: u32) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push((service.to_string(), replicas));
            if self.fail_for.as_deref() == Some(service) {
                anyhow::bail!("controller unavailable");
            }
            Ok(())
        }

        async fn restart(&self, _service: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn apply_config(&self, _service: &str, _change: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn metrics_at(now: DateTime<Utc>, cpu: f64, replicas: u32) -> ServiceMetrics {
        ServiceMetrics {
            timestamp: now,
            cpu,
            memory: 40.0,
            requests_per_minute: 100.0,
            latency_ms: 100.0,
            error_rate: 0.0,
            replicas,
        }
    }

    /// A Saturday, so the scheduled policy stays quiet for busy services
    fn weekend() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap())
    }

    /// 20% CPU with a 110% burst at minutes 20..24 of each 24-minute period
    async fn bursty_predictor(clock: &ManualClock) -> Arc<ResourcePredictor> {
        let predictor = Arc::new(
            ResourcePredictor::new(PredictorConfig::default(), Arc::new(clock.clone())).unwrap(),
        );
        let start = clock.now() - ChronoDuration::minutes(44);
        for i in 0..44 {
            let cpu = if (20..24).contains(&(i % 24)) { 110.0 } else { 20.0 };
            let sample = metrics_at(start + ChronoDuration::minutes(i), cpu, 2);
            predictor
                .add_historical_data("api", sample.to_resource_metric())
                .await;
        }
        predictor
    }

    fn reactive_scaler(
        clock: &ManualClock,
        controller: Arc<RecordingController>,
    ) -> AutoScaler {
        let config = ScalerConfig {
            policy: ScalingPolicy::Reactive,
            ..Default::default()
        };
        AutoScaler::new(config, Arc::new(clock.clone()))
            .unwrap()
            .with_controller(controller)
    }

    #[tokio::test]
    async fn test_reactive_scale_up() {
        let clock = weekend();
        let scaler = reactive_scaler(&clock, Arc::new(RecordingController::default()));
        scaler.add_metrics("api", metrics_at(clock.now(), 95.0, 2)).await;

        let action = scaler.evaluate_service("api").await.unwrap();
        assert_eq!(action.action, ScaleDirection::ScaleUp);
        assert!(action.target_replicas > action.current_replicas);
        assert!(matches!(action.urgency, Urgency::High | Urgency::Critical));
        assert_eq!(action.estimated_cost, 100.0);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_second_action() {
        let clock = weekend();
        let controller = Arc::new(RecordingController::default());
        let scaler = reactive_scaler(&clock, controller.clone());
        scaler.add_metrics("api", metrics_at(clock.now(), 95.0, 2)).await;

        let events = scaler.evaluate_all().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].result, ScalingResult::Success);

        clock.advance(ChronoDuration::seconds(60));
        scaler.add_metrics("api", metrics_at(clock.now(), 95.0, 4)).await;
        assert!(scaler.evaluate_service("api").await.is_none());
        assert!(scaler.evaluate_all().await.is_empty());

        clock.advance(ChronoDuration::minutes(5));
        assert!(scaler.evaluate_service("api").await.is_some());
        assert_eq!(controller.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_execution_is_recorded_and_isolated() {
        let clock = weekend();
        let controller = Arc::new(RecordingController {
            fail_for: Some("billing".to_string()),
            ..Default::default()
        });
        let scaler = reactive_scaler(&clock, controller.clone());
        scaler.add_metrics("billing", metrics_at(clock.now(), 95.0, 2)).await;
        scaler.add_metrics("search", metrics_at(clock.now(), 95.0, 2)).await;

        let events = scaler.evaluate_all().await;
        assert_eq!(events.len(), 2);
        let billing = events.iter().find(|e| e.service == "billing").unwrap();
        assert_eq!(billing.result, ScalingResult::Failed);
        assert_eq!(
            billing.error.as_deref(),
            Some("Execution failed for billing: controller unavailable")
        );
        let search = events.iter().find(|e| e.service == "search").unwrap();
        assert_eq!(search.result, ScalingResult::Success);

        let report = scaler.analyze_scaling_performance().await;
        assert_eq!(report.total_events, 2);
        assert_eq!(report.failed, 1);
        assert!((report.success_rate - 0.5).abs() < 1e-9);
        assert!(!report.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_actions_ordered_by_priority() {
        let clock = weekend();
        let controller = Arc::new(RecordingController::default());
        let scaler = reactive_scaler(&clock, controller.clone());
        scaler.add_metrics("medium", metrics_at(clock.now(), 75.0, 2)).await;
        scaler.add_metrics("critical", metrics_at(clock.now(), 150.0, 2)).await;

        scaler.evaluate_all().await;
        let calls = controller.calls.lock().unwrap();
        assert_eq!(calls[0].0, "critical");
        assert_eq!(calls[1].0, "medium");
    }

    #[tokio::test]
    async fn test_successful_scale_updates_replicas() {
        let clock = weekend();
        let scaler = reactive_scaler(&clock, Arc::new(RecordingController::default()));
        scaler.add_metrics("api", metrics_at(clock.now(), 95.0, 2)).await;
        scaler.evaluate_all().await;

        assert_eq!(scaler.latest_metrics("api").await.unwrap().replicas, 4);
        assert_eq!(scaler.events(10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_request_scale_is_bounded() {
        let clock = weekend();
        let controller = Arc::new(RecordingController::default());
        let scaler = reactive_scaler(&clock, controller.clone());
        scaler
            .set_constraints(
                "api",
                ScalingConstraints {
                    max_replicas: 3,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        scaler.add_metrics("api", metrics_at(clock.now(), 50.0, 2)).await;

        let event = scaler.request_scale("api", 5, "remediation").await.unwrap().unwrap();
        assert_eq!(event.action.target_replicas, 3);
        assert_eq!(event.action.policy, ScalingPolicy::Manual);

        // Cooling down now
        assert!(scaler.request_scale("api", 1, "again").await.unwrap().is_none());
        assert!(matches!(
            scaler.request_scale("unknown", 1, "x").await,
            Err(FleetError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_constraints_rejected() {
        let clock = weekend();
        let scaler = reactive_scaler(&clock, Arc::new(RecordingController::default()));
        let bad = ScalingConstraints {
            min_replicas: 4,
            max_replicas: 2,
            ..Default::default()
        };
        assert!(scaler.set_constraints("api", bad).await.is_err());
        assert!(scaler.constraints("api").await.is_none());
    }

    #[tokio::test]
    async fn test_predictive_action_held_until_due() {
        let clock = weekend();
        let predictor = Arc::new(
            ResourcePredictor::new(PredictorConfig::default(), Arc::new(clock.clone())).unwrap(),
        );
        let start = clock.now() - ChronoDuration::minutes(30);
        for i in 0..30 {
            let sample = metrics_at(start + ChronoDuration::minutes(i), 85.0, 2);
            predictor
                .add_historical_data("api", sample.to_resource_metric())
                .await;
        }

        let config = ScalerConfig {
            policy: ScalingPolicy::Predictive,
            predictive_lead_minutes: 0,
            ..Default::default()
        };
        let controller = Arc::new(RecordingController::default());
        let scaler = AutoScaler::new(config, Arc::new(clock.clone()))
            .unwrap()
            .with_predictor(predictor)
            .with_controller(controller.clone());
        scaler.add_metrics("api", metrics_at(clock.now(), 50.0, 2)).await;

        let action = scaler.evaluate_service("api").await.unwrap();
        assert_eq!(action.policy, ScalingPolicy::Predictive);
        assert_eq!(action.scheduled_time, Some(clock.now()));

        let events = scaler.evaluate_all().await;
        assert_eq!(events.len(), 1);
        assert!(scaler.pending_actions().await.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_critical_reactive_wins() {
        let clock = weekend();
        let scaler = AutoScaler::new(ScalerConfig::default(), Arc::new(clock.clone())).unwrap();
        scaler.add_metrics("api", metrics_at(clock.now(), 150.0, 2)).await;

        let action = scaler.evaluate_service("api").await.unwrap();
        assert_eq!(action.policy, ScalingPolicy::Reactive);
        assert_eq!(action.urgency, Urgency::Critical);
    }

    #[tokio::test]
    async fn test_update_config_validates() {
        let clock = weekend();
        let scaler = AutoScaler::new(ScalerConfig::default(), Arc::new(clock.clone())).unwrap();
        let bad = ScalerConfig {
            policy: ScalingPolicy::Manual,
            ..Default::default()
        };
        assert!(scaler.update_config(bad).await.is_err());
        assert_eq!(scaler.config().await.policy, ScalingPolicy::Hybrid);
    }

    #[tokio::test]
    async fn test_predictive_scale_up_fires_before_breach() {
        let clock = weekend();
        let predictor = bursty_predictor(&clock).await;
        let config = ScalerConfig {
            policy: ScalingPolicy::Predictive,
            ..Default::default()
        };
        let controller = Arc::new(RecordingController::default());
        let scaler = AutoScaler::new(config, Arc::new(clock.clone()))
            .unwrap()
            .with_predictor(predictor)
            .with_controller(controller.clone());
        scaler.add_metrics("api", metrics_at(clock.now(), 20.0, 2)).await;

        // The burst is 20 minutes out with a 5 minute lead
        let start = clock.now();
        let action = scaler.evaluate_service("api").await.unwrap();
        assert_eq!(action.scheduled_time, Some(start + ChronoDuration::minutes(15)));

        let mut events = Vec::new();
        for _ in 0..30 {
            events.extend(scaler.evaluate_all().await);
            clock.advance(ChronoDuration::minutes(1));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].result, ScalingResult::Success);
        assert_eq!(events[0].action.policy, ScalingPolicy::Predictive);
        assert_eq!(events[0].timestamp, start + ChronoDuration::minutes(15));
        assert_eq!(controller.calls.lock().unwrap().as_slice(), [("api".to_string(), 4)]);
    }

    #[tokio::test]
    async fn test_cost_aware_filter_follows_updated_cost_model() {
        let clock = weekend();
        let config = ScalerConfig {
            policy: ScalingPolicy::CostAware,
            ..Default::default()
        };
        let scaler = AutoScaler::new(config.clone(), Arc::new(clock.clone())).unwrap();
        scaler.add_metrics("api", metrics_at(clock.now(), 95.0, 2)).await;

        // Flat default pricing sits exactly on the 2.0 threshold
        let action = scaler.evaluate_service("api").await.unwrap();
        assert_eq!(action.urgency, Urgency::High);
        assert_eq!(action.estimated_benefit, 200.0);

        let pricier = ScalerConfig {
            cost_model: FlatRateCostModel {
                value_per_replica: 60.0,
                ..Default::default()
            },
            ..config
        };
        scaler.update_config(pricier).await.unwrap();
        assert!(scaler.evaluate_service("api").await.is_none());

        // Critical pressure bypasses the filter but is priced by the new model
        scaler.add_metrics("api", metrics_at(clock.now(), 150.0, 2)).await;
        let action = scaler.evaluate_service("api").await.unwrap();
        assert_eq!(action.urgency, Urgency::Critical);
        assert_eq!(action.target_replicas, 5);
        assert_eq!(action.estimated_benefit, 180.0);
    }

    #[tokio::test]
    async fn test_injected_cost_model_overrides_config() {
        let clock = weekend();
        let config = ScalerConfig {
            policy: ScalingPolicy::CostAware,
            ..Default::default()
        };
        let scaler = AutoScaler::new(config, Arc::new(clock.clone()))
            .unwrap()
            .with_cost_model(Arc::new(FlatRateCostModel {
                monthly_cost_per_replica: 200.0,
                ..Default::default()
            }));
        scaler.add_metrics("api", metrics_at(clock.now(), 95.0, 2)).await;
        assert!(scaler.evaluate_service("api").await.is_none());

        let event = scaler.request_scale("api", 1, "manual").await.unwrap().unwrap();
        assert_eq!(event.action.estimated_cost, 200.0);
        assert_eq!(event.cost_impact, 200.0);
    }

    #[tokio::test]
    async fn test_hybrid_prefers_confident_forecast_over_schedule() {
        // 2024-01-03 is a Wednesday, inside business hours
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap());

        let with_forecast = AutoScaler::new(ScalerConfig::default(), Arc::new(clock.clone()))
            .unwrap()
            .with_predictor(bursty_predictor(&clock).await);
        with_forecast.add_metrics("api", metrics_at(clock.now(), 20.0, 1)).await;
        let action = with_forecast.evaluate_service("api").await.unwrap();
        assert_eq!(action.policy, ScalingPolicy::Predictive);
        assert!(action.confidence > 0.8);

        let schedule_only = AutoScaler::new(ScalerConfig::default(), Arc::new(clock.clone())).unwrap();
        schedule_only.add_metrics("api", metrics_at(clock.now(), 20.0, 1)).await;
        let action = schedule_only.evaluate_service("api").await.unwrap();
        assert_eq!(action.policy, ScalingPolicy::Scheduled);
        assert_eq!(action.target_replicas, 2);
    }
}
