//! Core data models shared across the optimization components

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource sample for a service, recorded once per collection tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetric {
    pub timestamp: DateTime<Utc>,
    /// CPU utilization in percent (0-100)
    pub cpu: f64,
    /// Memory utilization in percent (0-100)
    pub memory: f64,
    pub requests_per_minute: f64,
    pub latency_ms: f64,
    pub errors_per_minute: f64,
}

/// Current operating point of a service as seen by the scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub timestamp: DateTime<Utc>,
    pub cpu: f64,
    pub memory: f64,
    pub requests_per_minute: f64,
    pub latency_ms: f64,
    /// Errors per request (0.0-1.0)
    pub error_rate: f64,
    pub replicas: u32,
}

impl ServiceMetrics {
    /// Project the scaler view onto a predictor sample
    pub fn to_resource_metric(&self) -> ResourceMetric {
        ResourceMetric {
            timestamp: self.timestamp,
            cpu: self.cpu,
            memory: self.memory,
            requests_per_minute: self.requests_per_minute,
            latency_ms: self.latency_ms,
            errors_per_minute: self.error_rate * self.requests_per_minute,
        }
    }
}

/// Tracked metric families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Cpu,
    Memory,
    Requests,
    Latency,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Requests,
        MetricKind::Latency,
    ];

    /// Read this metric from a raw sample
    pub fn extract(&self, metric: &ResourceMetric) -> f64 {
        match self {
            MetricKind::Cpu => metric.cpu,
            MetricKind::Memory => metric.memory,
            MetricKind::Requests => metric.requests_per_minute,
            MetricKind::Latency => metric.latency_ms,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
            MetricKind::Requests => write!(f, "requests"),
            MetricKind::Latency => write!(f, "latency"),
        }
    }
}

/// Forecast series, one value per minute of the horizon
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictedSeries {
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
    pub requests: Vec<f64>,
    pub latency: Vec<f64>,
}

impl PredictedSeries {
    pub fn series(&self, kind: MetricKind) -> &[f64] {
        match kind {
            MetricKind::Cpu => &self.cpu,
            MetricKind::Memory => &self.memory,
            MetricKind::Requests => &self.requests,
            MetricKind::Latency => &self.latency,
        }
    }

    pub fn series_mut(&mut self, kind: MetricKind) -> &mut Vec<f64> {
        match kind {
            MetricKind::Cpu => &mut self.cpu,
            MetricKind::Memory => &mut self.memory,
            MetricKind::Requests => &mut self.requests,
            MetricKind::Latency => &mut self.latency,
        }
    }

    /// Maximum predicted value for a metric (0 when empty)
    pub fn max(&self, kind: MetricKind) -> f64 {
        self.series(kind).iter().copied().fold(0.0, f64::max)
    }
}

/// Short-horizon forecast for one service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePrediction {
    pub service: String,
    pub predictions: PredictedSeries,
    /// Confidence score 0.0-1.0
    pub confidence: f64,
    pub horizon_minutes: usize,
    pub anomalies: Vec<AnomalyDetection>,
    pub generated_at: DateTime<Utc>,
}

/// Classification of a forecast anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    Spike,
    Drop,
    Trend,
    Pattern,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyType::Spike => write!(f, "spike"),
            AnomalyType::Drop => write!(f, "drop"),
            AnomalyType::Trend => write!(f, "trend"),
            AnomalyType::Pattern => write!(f, "pattern"),
        }
    }
}

/// Severity levels for forecast anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

/// An anomaly surfaced from a forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub anomaly_type: AnomalyType,
    pub metric: MetricKind,
    pub severity: AnomalySeverity,
    pub probability: f64,
    pub expected_time: DateTime<Utc>,
    pub recommendation: String,
}

/// Coarse system load used to tune cache behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl LoadLevel {
    /// Classify a fleet-average CPU percentage
    pub fn from_cpu_percent(cpu: f64) -> Self {
        if cpu >= 75.0 {
            LoadLevel::High
        } else if cpu <= 30.0 {
            LoadLevel::Low
        } else {
            LoadLevel::Medium
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_level_classification() {
        assert_eq!(LoadLevel::from_cpu_percent(90.0), LoadLevel::High);
        assert_eq!(LoadLevel::from_cpu_percent(50.0), LoadLevel::Medium);
        assert_eq!(LoadLevel::from_cpu_percent(10.0), LoadLevel::Low);
    }

    #[test]
    fn test_predicted_series_max() {
        let series = PredictedSeries {
            cpu: vec![10.0, 42.0, 7.0],
            ..Default::default()
        };
        assert_eq!(series.max(MetricKind::Cpu), 42.0);
        assert_eq!(series.max(MetricKind::Memory), 0.0);
    }

    #[test]
    fn test_service_metrics_projection() {
        let metrics = ServiceMetrics {
            timestamp: Utc::now(),
            cpu: 40.0,
            memory: 55.0,
            requests_per_minute: 200.0,
            latency_ms: 120.0,
            error_rate: 0.05,
            replicas: 3,
        };
        let sample = metrics.to_resource_metric();
        assert_eq!(sample.cpu, 40.0);
        assert!((sample.errors_per_minute - 10.0).abs() < 1e-9);
    }
}
