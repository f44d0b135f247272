//! Resource usage forecasting
//!
//! Keeps a bounded per-service history of resource samples, retrains a
//! lightweight additive model every few samples, and produces short-horizon
//! forecasts with a confidence score and surfaced anomalies.

mod anomalies;
mod model;

pub use anomalies::{
    detect as detect_forecast_anomalies, CPU_SPIKE_HIGH_THRESHOLD, CPU_SPIKE_THRESHOLD,
    LATENCY_THRESHOLD_MS,
};
pub use model::{MetricModel, ServiceModel};

use crate::analysis::{self, DEFAULT_ALPHA, DEFAULT_PERIOD};
use crate::clock::SharedClock;
use crate::error::{FleetError, Result};
use crate::models::{PredictedSeries, ResourceMetric, ResourcePrediction};
use crate::observability::OptimizerMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Maximum samples retained per service
pub const HISTORY_CAPACITY: usize = 1000;

/// Samples required before a forecast is produced
pub const MIN_PREDICTION_SAMPLES: usize = 10;

/// Configuration for the resource predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Per-service history ring capacity
    pub history_capacity: usize,
    /// Retrain after this many appended samples
    pub retrain_interval: usize,
    /// Minimum samples for a scheduled retrain
    pub min_training_samples: usize,
    /// Minimum samples for a forecast
    pub min_prediction_samples: usize,
    /// Horizon used when callers do not supply one
    pub default_horizon_minutes: usize,
    /// Seasonal period in samples
    pub seasonal_period: usize,
    /// Exponential smoothing factor
    pub smoothing_alpha: f64,
    /// Raw CPU samples considered by the confidence score
    pub confidence_window: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            history_capacity: HISTORY_CAPACITY,
            retrain_interval: 50,
            min_training_samples: 50,
            min_prediction_samples: MIN_PREDICTION_SAMPLES,
            default_horizon_minutes: 60,
            seasonal_period: DEFAULT_PERIOD,
            smoothing_alpha: DEFAULT_ALPHA,
            confidence_window: 10,
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity < self.min_training_samples {
            return Err(FleetError::invalid_config(
                "predictor.history_capacity must be at least min_training_samples",
            ));
        }
        if self.retrain_interval == 0 || self.seasonal_period == 0 {
            return Err(FleetError::invalid_config(
                "predictor.retrain_interval and seasonal_period must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_alpha) || self.smoothing_alpha == 0.0 {
            return Err(FleetError::invalid_config(
                "predictor.smoothing_alpha must be in (0, 1]",
            ));
        }
        if self.min_prediction_samples == 0 || self.confidence_window == 0 {
            return Err(FleetError::invalid_config(
                "predictor.min_prediction_samples and confidence_window must be positive",
            ));
        }
        Ok(())
    }
}

/// Fleet-wide aggregate forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLoadPrediction {
    /// CPU, memory and requests summed across services; latency averaged
    pub predictions: PredictedSeries,
    pub confidence: f64,
    pub services: usize,
    pub horizon_minutes: usize,
    pub generated_at: DateTime<Utc>,
}

/// Statistics about the predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorStats {
    pub services_tracked: usize,
    pub trained_models: usize,
    pub total_samples: usize,
}

/// History and model for a single service
#[derive(Debug)]
struct ServiceState {
    history: VecDeque<ResourceMetric>,
    appended: u64,
    model: Option<ServiceModel>,
}

impl ServiceState {
    fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity.min(HISTORY_CAPACITY)),
            appended: 0,
            model: None,
        }
    }

    fn push(&mut self, metric: ResourceMetric, capacity: usize) {
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(metric);
        self.appended += 1;
    }
}

/// Per-service forecasting engine
pub struct ResourcePredictor {
    config: PredictorConfig,
    clock: SharedClock,
    services: RwLock<HashMap<String, ServiceState>>,
    metrics: OptimizerMetrics,
}

impl ResourcePredictor {
    /// Create a new predictor; the configuration is validated once here
    pub fn new(config: PredictorConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            clock,
            services: RwLock::new(HashMap::new()),
            metrics: OptimizerMetrics::new(),
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Append a sample; every `retrain_interval` appends retrain the model
    pub async fn add_historical_data(&self, service: &str, metric: ResourceMetric) {
        let mut services = self.services.write().await;
        let state = services
            .entry(service.to_string())
            .or_insert_with(|| ServiceState::new(self.config.history_capacity));

        if let Some(last) = state.history.back() {
            if metric.timestamp < last.timestamp {
                warn!(
                    service = %service,
                    timestamp = %metric.timestamp,
                    last = %last.timestamp,
                    "Dropping out-of-order sample"
                );
                return;
            }
        }

        state.push(metric, self.config.history_capacity);

        if state.appended % self.config.retrain_interval as u64 == 0 {
            if state.history.len() < self.config.min_training_samples {
                warn!(
                    service = %service,
                    samples = state.history.len(),
                    required = self.config.min_training_samples,
                    "Skipping retrain: insufficient history"
                );
            } else {
                self.retrain(service, state);
            }
        }
    }

    /// Train (or retrain) the model for a service now
    ///
    /// Returns false when the service is unknown or has no samples.
    pub async fn train(&self, service: &str) -> bool {
        let mut services = self.services.write().await;
        match services.get_mut(service) {
            Some(state) => self.retrain(service, state),
            None => false,
        }
    }

    fn retrain(&self, service: &str, state: &mut ServiceState) -> bool {
        let history: Vec<ResourceMetric> = state.history.iter().cloned().collect();
        match ServiceModel::train(
            &history,
            self.config.smoothing_alpha,
            self.config.seasonal_period,
            self.clock.now(),
        ) {
            Some(model) => {
                debug!(service = %service, samples = history.len(), "Model retrained");
                state.model = Some(model);
                true
            }
            None => false,
        }
    }

    /// Forecast a service over `horizon_minutes`
    ///
    /// Returns `None` when fewer than `min_prediction_samples` samples exist.
    /// A service with enough samples but no model yet is trained on demand.
    pub async fn predict_usage(
        &self,
        service: &str,
        horizon_minutes: usize,
    ) -> Option<ResourcePrediction> {
        let mut services = self.services.write().await;
        let Some(state) = services.get_mut(service) else {
            debug!(service = %service, "No history for service");
            return None;
        };

        if state.history.len() < self.config.min_prediction_samples {
            warn!(
                service = %service,
                samples = state.history.len(),
                required = self.config.min_prediction_samples,
                "Insufficient data for prediction"
            );
            return None;
        }

        if state.model.is_none() && !self.retrain(service, state) {
            return None;
        }
        let model = state.model.as_ref()?;

        let now = self.clock.now();
        let predictions = model.forecast(horizon_minutes);
        let anomalies = anomalies::detect(&predictions, now);
        let history: Vec<ResourceMetric> = state.history.iter().cloned().collect();
        let confidence = calculate_confidence(&history, self.config.confidence_window);

        self.metrics.inc_predictions_generated();
        if !anomalies.is_empty() {
            self.metrics.inc_anomalies_detected(anomalies.len() as u64);
        }

        Some(ResourcePrediction {
            service: service.to_string(),
            predictions,
            confidence,
            horizon_minutes,
            anomalies,
            generated_at: now,
        })
    }

    /// Forecast every tracked service that has enough data
    pub async fn predict_all_services(&self, horizon_minutes: usize) -> Vec<ResourcePrediction> {
        let mut predictions = Vec::new();
        for service in self.services().await {
            if let Some(prediction) = self.predict_usage(&service, horizon_minutes).await {
                predictions.push(prediction);
            }
        }
        predictions
    }

    /// Aggregate fleet forecast; `None` when no service can be forecast
    pub async fn predict_system_load(&self, horizon_minutes: usize) -> Option<SystemLoadPrediction> {
        let predictions = self.predict_all_services(horizon_minutes).await;
        aggregate_predictions(&predictions, horizon_minutes, self.clock.now())
    }

    /// Names of all tracked services, sorted
    pub async fn services(&self) -> Vec<String> {
        let services = self.services.read().await;
        let mut names: Vec<String> = services.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn history_len(&self, service: &str) -> usize {
        let services = self.services.read().await;
        services.get(service).map(|s| s.history.len()).unwrap_or(0)
    }

    /// The most recent `n` samples, oldest first
    pub async fn recent_history(&self, service: &str, n: usize) -> Vec<ResourceMetric> {
        let services = self.services.read().await;
        services
            .get(service)
            .map(|s| {
                let skip = s.history.len().saturating_sub(n);
                s.history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub async fn has_model(&self, service: &str) -> bool {
        let services = self.services.read().await;
        services.get(service).is_some_and(|s| s.model.is_some())
    }

    /// Stop tracking a service
    pub async fn remove_service(&self, service: &str) {
        let mut services = self.services.write().await;
        if services.remove(service).is_some() {
            info!(service = %service, "Removed service from predictor");
        }
    }

    pub async fn stats(&self) -> PredictorStats {
        let services = self.services.read().await;
        PredictorStats {
            services_tracked: services.len(),
            trained_models: services.values().filter(|s| s.model.is_some()).count(),
            total_samples: services.values().map(|s| s.history.len()).sum(),
        }
    }
}

/// Confidence from the variance of the most recent raw CPU samples
///
/// Stable load gives high confidence: `clamp(1 - variance/100, 0.4, 0.95)`.
pub fn calculate_confidence(history: &[ResourceMetric], window: usize) -> f64 {
    let skip = history.len().saturating_sub(window);
    let cpu: Vec<f64> = history.iter().skip(skip).map(|m| m.cpu).collect();
    (1.0 - analysis::variance(&cpu) / 100.0).clamp(0.4, 0.95)
}

/// Sum CPU, memory and requests; average latency; mean confidence
pub fn aggregate_predictions(
    predictions: &[ResourcePrediction],
    horizon_minutes: usize,
    now: DateTime<Utc>,
) -> Option<SystemLoadPrediction> {
    if predictions.is_empty() {
        return None;
    }

    let mut total = PredictedSeries {
        cpu: vec![0.0; horizon_minutes],
        memory: vec![0.0; horizon_minutes],
        requests: vec![0.0; horizon_minutes],
        latency: vec![0.0; horizon_minutes],
    };

    for prediction in predictions {
        let p = &prediction.predictions;
        for i in 0..horizon_minutes {
            total.cpu[i] += p.cpu.get(i).copied().unwrap_or(0.0);
            total.memory[i] += p.memory.get(i).copied().unwrap_or(0.0);
            total.requests[i] += p.requests.get(i).copied().unwrap_or(0.0);
            total.latency[i] += p.latency.get(i).copied().unwrap_or(0.0);
        }
    }

    let count = predictions.len() as f64;
    for value in total.latency.iter_mut() {
        *value /= count;
    }

    let confidence = predictions.iter().map(|p| p.confidence).sum::<f64>() / count;

    Some(SystemLoadPrediction {
        predictions: total,
        confidence,
        services: predictions.len(),
        horizon_minutes,
        generated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{system_clock, Clock, ManualClock};
    use crate::models::{AnomalySeverity, AnomalyType, MetricKind};
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    fn sample(ts: DateTime<Utc>, cpu: f64) -> ResourceMetric {
        ResourceMetric {
            timestamp: ts,
            cpu,
            memory: 50.0,
            requests_per_minute: 100.0,
            latency_ms: 150.0,
            errors_per_minute: 0.0,
        }
    }

    fn predictor() -> ResourcePredictor {
        ResourcePredictor::new(PredictorConfig::default(), system_clock()).unwrap()
    }

    #[tokio::test]
    async fn test_insufficient_samples_returns_none() {
        let predictor = predictor();
        let start = Utc::now() - ChronoDuration::hours(1);
        for i in 0..5 {
            predictor
                .add_historical_data("api", sample(start + ChronoDuration::minutes(i), 40.0))
                .await;
        }
        assert!(predictor.predict_usage("api", 60).await.is_none());
        assert!(predictor.predict_usage("unknown", 60).await.is_none());
    }

    #[tokio::test]
    async fn test_constant_high_cpu_flags_spike() {
        let predictor = predictor();
        let start = Utc::now() - ChronoDuration::hours(1);
        for i in 0..10 {
            predictor
                .add_historical_data("api", sample(start + ChronoDuration::minutes(i), 95.0))
                .await;
        }

        let prediction = predictor.predict_usage("api", 60).await.unwrap();
        let spike = prediction
            .anomalies
            .iter()
            .find(|a| a.anomaly_type == AnomalyType::Spike && a.metric == MetricKind::Cpu)
            .expect("cpu spike");
        assert_eq!(spike.severity, AnomalySeverity::High);
        assert!((spike.probability - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sinusoidal_end_to_end() {
        let clock = ManualClock::new(Utc::now());
        let predictor =
            ResourcePredictor::new(PredictorConfig::default(), Arc::new(clock.clone())).unwrap();
        let start = clock.now() - ChronoDuration::hours(3);

        for i in 0..144 {
            let base = 50.0 + 20.0 * (i as f64 / 24.0).sin();
            predictor
                .add_historical_data("search", sample(start + ChronoDuration::minutes(i), base))
                .await;
        }
        assert!(predictor.has_model("search").await);

        let prediction = predictor.predict_usage("search", 60).await.unwrap();
        assert!(prediction.confidence > 0.0);
        assert_eq!(prediction.predictions.cpu.len(), 60);
        assert_eq!(prediction.horizon_minutes, 60);
        assert!(prediction.predictions.cpu.iter().all(|v| *v >= 0.0));
    }

    #[tokio::test]
    async fn test_history_is_bounded_fifo() {
        let config = PredictorConfig {
            history_capacity: 100,
            ..Default::default()
        };
        let predictor = ResourcePredictor::new(config, system_clock()).unwrap();
        let start = Utc::now() - ChronoDuration::days(1);
        for i in 0..250 {
            predictor
                .add_historical_data("api", sample(start + ChronoDuration::minutes(i), i as f64))
                .await;
        }
        assert_eq!(predictor.history_len("api").await, 100);
        let recent = predictor.recent_history("api", 3).await;
        assert_eq!(recent.iter().map(|m| m.cpu).collect::<Vec<_>>(), vec![247.0, 248.0, 249.0]);
    }

    #[tokio::test]
    async fn test_out_of_order_sample_dropped() {
        let predictor = predictor();
        let now = Utc::now();
        predictor.add_historical_data("api", sample(now, 10.0)).await;
        predictor
            .add_historical_data("api", sample(now - ChronoDuration::minutes(1), 20.0))
            .await;
        assert_eq!(predictor.history_len("api").await, 1);
    }

    #[tokio::test]
    async fn test_system_load_aggregation() {
        let predictor = predictor();
        let start = Utc::now() - ChronoDuration::hours(1);
        for service in ["a", "b"] {
            for i in 0..20 {
                predictor
                    .add_historical_data(service, sample(start + ChronoDuration::minutes(i), 30.0))
                    .await;
            }
        }

        let load = predictor.predict_system_load(30).await.unwrap();
        assert_eq!(load.services, 2);
        assert_eq!(load.predictions.cpu.len(), 30);
        assert!((load.predictions.cpu[0] - 60.0).abs() < 1e-6);
        assert!((load.predictions.latency[0] - 150.0).abs() < 1e-6);
        assert!((load.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_bounds() {
        let now = Utc::now();
        let stable: Vec<ResourceMetric> = (0..10).map(|_| sample(now, 50.0)).collect();
        assert!((calculate_confidence(&stable, 10) - 0.95).abs() < 1e-9);

        let noisy: Vec<ResourceMetric> = (0..10)
            .map(|i| sample(now, if i % 2 == 0 { 10.0 } else { 90.0 }))
            .collect();
        assert!((calculate_confidence(&noisy, 10) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_config_validation() {
        let bad = PredictorConfig {
            smoothing_alpha: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        assert!(PredictorConfig::default().validate().is_ok());
    }
}
