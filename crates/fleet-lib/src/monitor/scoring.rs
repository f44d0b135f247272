//! Health scoring

use super::types::{HealthComponents, HealthScore, HealthTrend};
use crate::analysis::mean;
use crate::models::{MetricKind, ResourcePrediction};
use chrono::{DateTime, Utc};

/// Utilization above this is penalized in performance and scalability
pub const UTILIZATION_LIMIT: f64 = 80.0;

/// Mean latency above this is penalized in performance
pub const LATENCY_BUDGET_MS: f64 = 500.0;

pub const DEFAULT_SECURITY_SCORE: f64 = 85.0;

/// Source of the security component
///
/// No posture data is wired in yet, so the default is a fixed score.
pub trait SecurityScorer: Send + Sync {
    fn score(&self, service: &str) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedSecurityScore(pub f64);

impl Default for FixedSecurityScore {
    fn default() -> Self {
        Self(DEFAULT_SECURITY_SCORE)
    }
}

impl SecurityScorer for FixedSecurityScore {
    fn score(&self, _service: &str) -> f64 {
        self.0
    }
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// Score one forecast against the previous overall score
pub fn score_prediction(
    prediction: &ResourcePrediction,
    previous: Option<f64>,
    security: &dyn SecurityScorer,
    now: DateTime<Utc>,
) -> HealthScore {
    let cpu_max = prediction.predictions.max(MetricKind::Cpu);
    let memory_max = prediction.predictions.max(MetricKind::Memory);
    let latency_mean = mean(&prediction.predictions.latency);

    let cpu_over = (cpu_max - UTILIZATION_LIMIT).max(0.0);
    let memory_over = (memory_max - UTILIZATION_LIMIT).max(0.0);
    let latency_over = (latency_mean - LATENCY_BUDGET_MS).max(0.0);

    let mut scalability = 100.0;
    let mut risk_factors = Vec::new();
    if cpu_max > UTILIZATION_LIMIT {
        scalability -= 20.0;
        risk_factors.push(format!("High predicted CPU ({:.1}%)", cpu_max));
    }
    if memory_max > UTILIZATION_LIMIT {
        scalability -= 20.0;
        risk_factors.push(format!("High predicted memory ({:.1}%)", memory_max));
    }
    if latency_mean > LATENCY_BUDGET_MS {
        risk_factors.push(format!("Predicted latency {:.0}ms", latency_mean));
    }
    if !prediction.anomalies.is_empty() {
        risk_factors.push(format!("{} predicted anomalies", prediction.anomalies.len()));
    }
    if prediction.confidence < 0.6 {
        risk_factors.push("Low forecast confidence".to_string());
    }

    let components = HealthComponents {
        performance: clamp_score(100.0 - 2.0 * cpu_over - 2.0 * memory_over - latency_over / 20.0),
        reliability: clamp_score(prediction.confidence * 100.0),
        availability: clamp_score(100.0 - 10.0 * prediction.anomalies.len() as f64),
        scalability: clamp_score(scalability),
        security: clamp_score(security.score(&prediction.service)),
    };
    let overall = components.overall();

    HealthScore {
        service: prediction.service.clone(),
        overall,
        trend: HealthTrend::between(previous, overall),
        components,
        risk_factors,
        timestamp: now,
    }
}
