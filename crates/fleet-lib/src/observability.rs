//! Observability infrastructure for the fleet optimizer
//!
//! Provides:
//! - Prometheus metrics (tick latency, predictions, anomalies, scale actions, alerts, cache hit rate)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for periodic task latency (in seconds)
const TICK_LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<OptimizerMetricsInner> = OnceLock::new();

struct OptimizerMetricsInner {
    tick_latency_seconds: HistogramVec,
    predictions_generated: IntCounter,
    anomalies_detected: IntCounter,
    scale_actions: IntCounterVec,
    scaling_failures: IntCounter,
    alerts_raised: IntCounterVec,
    remediations: IntCounterVec,
    cache_hit_rate: Gauge,
    services_tracked: IntGauge,
}

impl OptimizerMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram_vec!(
                "fleet_optimizer_tick_latency_seconds",
                "Time spent in one tick of a periodic task",
                &["task"],
                TICK_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            predictions_generated: register_int_counter!(
                "fleet_optimizer_predictions_generated_total",
                "Total number of resource forecasts generated"
            )
            .expect("Failed to register predictions_generated"),

            anomalies_detected: register_int_counter!(
                "fleet_optimizer_anomalies_detected_total",
                "Total number of anomalies surfaced from forecasts"
            )
            .expect("Failed to register anomalies_detected"),

            scale_actions: register_int_counter_vec!(
                "fleet_optimizer_scale_actions_total",
                "Scale actions submitted for execution",
                &["direction"]
            )
            .expect("Failed to register scale_actions"),

            scaling_failures: register_int_counter!(
                "fleet_optimizer_scaling_failures_total",
                "Scale actions whose execution failed"
            )
            .expect("Failed to register scaling_failures"),

            alerts_raised: register_int_counter_vec!(
                "fleet_optimizer_alerts_total",
                "Predictive alerts raised",
                &["level"]
            )
            .expect("Failed to register alerts_raised"),

            remediations: register_int_counter_vec!(
                "fleet_optimizer_remediations_total",
                "Automated remediation attempts",
                &["action", "result"]
            )
            .expect("Failed to register remediations"),

            cache_hit_rate: register_gauge!(
                "fleet_optimizer_cache_hit_rate",
                "Most recently sampled adaptive cache hit rate"
            )
            .expect("Failed to register cache_hit_rate"),

            services_tracked: register_int_gauge!(
                "fleet_optimizer_services_tracked",
                "Number of services with forecasting history"
            )
            .expect("Failed to register services_tracked"),
        }
    }
}

/// Optimizer metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct OptimizerMetrics {
    _private: (),
}

impl Default for OptimizerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OptimizerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OptimizerMetricsInner {
        GLOBAL_METRICS.get_or_init(OptimizerMetricsInner::new)
    }

    /// Record how long one tick of a periodic task took
    pub fn observe_tick_latency(&self, task: &str, duration_secs: f64) {
        self.inner()
            .tick_latency_seconds
            .with_label_values(&[task])
            .observe(duration_secs);
    }

    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated.inc();
    }

    pub fn inc_anomalies_detected(&self, count: u64) {
        self.inner().anomalies_detected.inc_by(count);
    }

    pub fn inc_scale_actions(&self, direction: &str) {
        self.inner()
            .scale_actions
            .with_label_values(&[direction])
            .inc();
    }

    pub fn inc_scaling_failures(&self) {
        self.inner().scaling_failures.inc();
    }

    pub fn inc_alerts(&self, level: &str) {
        self.inner().alerts_raised.with_label_values(&[level]).inc();
    }

    pub fn inc_remediations(&self, action: &str, success: bool) {
        let result = if success { "success" } else { "failed" };
        self.inner()
            .remediations
            .with_label_values(&[action, result])
            .inc();
    }

    pub fn set_cache_hit_rate(&self, rate: f64) {
        self.inner().cache_hit_rate.set(rate);
    }

    pub fn set_services_tracked(&self, count: i64) {
        self.inner().services_tracked.set(count);
    }
}

/// Structured logger for optimizer events
///
/// Provides consistent JSON-formatted logging for predictions, scale
/// actions, alerts and other significant events.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a forecast generation event
    pub fn log_prediction(
        &self,
        service: &str,
        horizon_minutes: usize,
        confidence: f64,
        max_cpu: f64,
        anomalies: usize,
    ) {
        info!(
            event = "prediction_generated",
            instance = %self.instance,
            service = %service,
            horizon_minutes = horizon_minutes,
            confidence = confidence,
            max_cpu = max_cpu,
            anomalies = anomalies,
            "Generated resource forecast"
        );
    }

    /// Log a predicted failure
    pub fn log_failure_prediction(
        &self,
        service: &str,
        failure_type: &str,
        severity: &str,
        probability: f64,
        time_to_failure_ms: u64,
    ) {
        match severity {
            "critical" | "high" => {
                warn!(
                    event = "failure_predicted",
                    instance = %self.instance,
                    service = %service,
                    failure_type = %failure_type,
                    severity = %severity,
                    probability = probability,
                    time_to_failure_ms = time_to_failure_ms,
                    "Failure predicted"
                );
            }
            _ => {
                info!(
                    event = "failure_predicted",
                    instance = %self.instance,
                    service = %service,
                    failure_type = %failure_type,
                    severity = %severity,
                    probability = probability,
                    time_to_failure_ms = time_to_failure_ms,
                    "Failure predicted"
                );
            }
        }
    }

    /// Log a scale action submitted for execution
    pub fn log_scale_action(
        &self,
        service: &str,
        direction: &str,
        current_replicas: u32,
        target_replicas: u32,
        urgency: &str,
        reason: &str,
    ) {
        info!(
            event = "scale_action",
            instance = %self.instance,
            service = %service,
            direction = %direction,
            current_replicas = current_replicas,
            target_replicas = target_replicas,
            urgency = %urgency,
            reason = %reason,
            "Executing scale action"
        );
    }

    /// Log the outcome of a scale action
    pub fn log_scale_result(&self, service: &str, success: bool, duration_ms: u64, error: Option<&str>) {
        if success {
            info!(
                event = "scale_completed",
                instance = %self.instance,
                service = %service,
                duration_ms = duration_ms,
                "Scale action completed"
            );
        } else {
            warn!(
                event = "scale_failed",
                instance = %self.instance,
                service = %service,
                duration_ms = duration_ms,
                error = ?error,
                "Scale action failed"
            );
        }
    }

    /// Log a raised alert
    pub fn log_alert(&self, service: &str, alert_id: &str, level: &str, title: &str) {
        match level {
            "critical" | "error" => {
                warn!(
                    event = "alert_raised",
                    instance = %self.instance,
                    service = %service,
                    alert_id = %alert_id,
                    level = %level,
                    title = %title,
                    "Predictive alert raised"
                );
            }
            _ => {
                info!(
                    event = "alert_raised",
                    instance = %self.instance,
                    service = %service,
                    alert_id = %alert_id,
                    level = %level,
                    title = %title,
                    "Predictive alert raised"
                );
            }
        }
    }

    /// Log an automated remediation attempt
    pub fn log_remediation(&self, service: &str, action: &str, success: bool, error: Option<&str>) {
        if success {
            info!(
                event = "remediation_executed",
                instance = %self.instance,
                service = %service,
                action = %action,
                "Automated remediation executed"
            );
        } else {
            warn!(
                event = "remediation_failed",
                instance = %self.instance,
                service = %service,
                action = %action,
                error = ?error,
                "Automated remediation failed"
            );
        }
    }

    /// Log optimizer startup
    pub fn log_startup(&self, version: &str, services: usize) {
        info!(
            event = "optimizer_started",
            instance = %self.instance,
            version = %version,
            services = services,
            "Fleet optimizer started"
        );
    }

    /// Log optimizer shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "optimizer_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Fleet optimizer shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_metrics_creation() {
        let metrics = OptimizerMetrics::new();
        let other = metrics.clone();

        metrics.observe_tick_latency("monitor", 0.002);
        metrics.inc_predictions_generated();
        metrics.inc_anomalies_detected(2);
        metrics.inc_scale_actions("scale-up");
        other.inc_alerts("warning");
        other.inc_remediations("restart", true);
        other.set_cache_hit_rate(0.75);
        other.set_services_tracked(3);
    }

    #[test]
    fn test_metrics_are_gathered() {
        let metrics = OptimizerMetrics::new();
        metrics.inc_scaling_failures();

        let names: Vec<String> = prometheus::gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"fleet_optimizer_scaling_failures_total".to_string()));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("optimizer-0");
        assert_eq!(logger.instance, "optimizer-0");
    }
}
