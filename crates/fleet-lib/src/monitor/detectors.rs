//! Failure detectors
//!
//! Each detector inspects one forecast and returns at most one failure
//! prediction with concrete recommendations.

use super::types::{ActionType, FailurePrediction, FailureSeverity, FailureType, RecommendedAction};
use crate::analysis::{calculate_correlation, calculate_trend, mean};
use crate::models::{MetricKind, ResourcePrediction};
use serde::{Deserialize, Serialize};

/// Predicted CPU above this signals exhaustion
pub const CPU_EXHAUSTION_THRESHOLD: f64 = 85.0;

/// Predicted memory slope (percent per minute) that suggests a leak
pub const MEMORY_LEAK_SLOPE: f64 = 0.3;

/// Final predicted memory above this, with a rising slope, suggests a leak
pub const MEMORY_LEAK_LEVEL: f64 = 70.0;

pub const LATENCY_LIMIT_MS: f64 = 1000.0;

/// Fraction of samples over the latency limit that counts as degraded
pub const LATENCY_DEGRADED_FRACTION: f64 = 0.3;

/// Correlation with a recorded signature that counts as a recurrence
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

const MINUTE_MS: u64 = 60_000;

/// CPU shape recorded just before a past failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSignature {
    pub failure_type: FailureType,
    pub cpu_pattern: Vec<f64>,
    pub description: String,
}

fn action(
    action_type: ActionType,
    description: &str,
    priority: u8,
    effectiveness: f64,
    duration_ms: u64,
    automatable: bool,
    cost_impact: f64,
) -> RecommendedAction {
    RecommendedAction {
        action_type,
        description: description.to_string(),
        priority,
        estimated_effectiveness: effectiveness,
        estimated_duration_ms: duration_ms,
        automatable,
        cost_impact,
    }
}

fn first_index_above(series: &[f64], threshold: f64) -> usize {
    series.iter().position(|v| *v > threshold).unwrap_or(0)
}

/// Run every detector and union the results
pub fn detect_failures(
    prediction: &ResourcePrediction,
    signatures: &[FailureSignature],
) -> Vec<FailurePrediction> {
    [
        cpu_exhaustion(prediction),
        memory_leak(prediction),
        latency_degradation(prediction),
        historical_pattern(prediction, signatures),
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn cpu_exhaustion(prediction: &ResourcePrediction) -> Option<FailurePrediction> {
    let cpu = &prediction.predictions.cpu;
    let max = prediction.predictions.max(MetricKind::Cpu);
    if max <= CPU_EXHAUSTION_THRESHOLD {
        return None;
    }

    let severity = if max > 95.0 {
        FailureSeverity::Critical
    } else if max > 90.0 {
        FailureSeverity::High
    } else {
        FailureSeverity::Medium
    };

    Some(FailurePrediction {
        service: prediction.service.clone(),
        failure_type: FailureType::Resource,
        probability: (max / 100.0).min(0.99),
        confidence: prediction.confidence,
        estimated_time_to_failure_ms: first_index_above(cpu, CPU_EXHAUSTION_THRESHOLD) as u64
            * MINUTE_MS,
        severity,
        root_causes: vec![format!("Predicted CPU peak of {:.1}%", max)],
        recommendations: vec![
            action(ActionType::Scale, "Add replicas ahead of the CPU peak", 1, 0.85, 120_000, true, 50.0),
            action(ActionType::Investigate, "Profile CPU hot paths", 2, 0.6, 1_800_000, false, 0.0),
        ],
        historical_similarity: 0.0,
    })
}

pub fn memory_leak(prediction: &ResourcePrediction) -> Option<FailurePrediction> {
    let memory = &prediction.predictions.memory;
    let last = *memory.last()?;
    let slope = calculate_trend(memory);
    if slope <= MEMORY_LEAK_SLOPE || last <= MEMORY_LEAK_LEVEL {
        return None;
    }

    let severity = if last > 90.0 {
        FailureSeverity::Critical
    } else if last > 80.0 {
        FailureSeverity::High
    } else {
        FailureSeverity::Medium
    };
    let minutes_to_exhaustion = (memory.len().saturating_sub(1)) as f64 + (100.0 - last).max(0.0) / slope;

    Some(FailurePrediction {
        service: prediction.service.clone(),
        failure_type: FailureType::Crash,
        probability: (0.5 + slope).min(0.95),
        confidence: prediction.confidence,
        estimated_time_to_failure_ms: (minutes_to_exhaustion * MINUTE_MS as f64) as u64,
        severity,
        root_causes: vec![
            format!("Memory rising {:.2}%/min", slope),
            format!("Predicted memory reaches {:.1}%", last),
        ],
        recommendations: vec![
            action(ActionType::Restart, "Restart to reclaim leaked memory", 1, 0.9, 60_000, true, 0.0),
            action(ActionType::Investigate, "Capture a heap profile", 2, 0.7, 3_600_000, false, 0.0),
        ],
        historical_similarity: 0.0,
    })
}

pub fn latency_degradation(prediction: &ResourcePrediction) -> Option<FailurePrediction> {
    let latency = &prediction.predictions.latency;
    if latency.is_empty() {
        return None;
    }
    let avg = mean(latency);
    let degraded = latency.iter().filter(|v| **v > LATENCY_LIMIT_MS).count();
    let fraction = degraded as f64 / latency.len() as f64;
    if avg <= LATENCY_LIMIT_MS && fraction <= LATENCY_DEGRADED_FRACTION {
        return None;
    }

    let severity = if avg > 2.0 * LATENCY_LIMIT_MS {
        FailureSeverity::Critical
    } else if avg > LATENCY_LIMIT_MS {
        FailureSeverity::High
    } else {
        FailureSeverity::Medium
    };

    Some(FailurePrediction {
        service: prediction.service.clone(),
        failure_type: FailureType::Performance,
        probability: (0.6 + fraction * 0.4).min(0.95),
        confidence: prediction.confidence,
        estimated_time_to_failure_ms: first_index_above(latency, LATENCY_LIMIT_MS) as u64
            * MINUTE_MS,
        severity,
        root_causes: vec![format!(
            "Mean predicted latency {:.0}ms; {:.0}% of samples over {}ms",
            avg,
            fraction * 100.0,
            LATENCY_LIMIT_MS
        )],
        recommendations: vec![
            action(ActionType::Scale, "Add replicas to absorb request load", 1, 0.7, 120_000, true, 50.0),
            action(ActionType::Config, "Raise connection pool size and upstream timeouts", 2, 0.5, 30_000, true, 0.0),
            action(ActionType::Investigate, "Trace slow dependencies", 3, 0.6, 1_800_000, false, 0.0),
        ],
        historical_similarity: 0.0,
    })
}

/// Best-matching recorded signature above the similarity threshold
///
/// Signatures whose length differs from the forecast score zero.
pub fn historical_pattern(
    prediction: &ResourcePrediction,
    signatures: &[FailureSignature],
) -> Option<FailurePrediction> {
    let cpu = &prediction.predictions.cpu;
    let (signature, similarity) = signatures
        .iter()
        .map(|s| (s, calculate_correlation(cpu, &s.cpu_pattern)))
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    if similarity <= SIMILARITY_THRESHOLD {
        return None;
    }

    Some(FailurePrediction {
        service: prediction.service.clone(),
        failure_type: signature.failure_type,
        probability: similarity * 0.9,
        confidence: prediction.confidence,
        estimated_time_to_failure_ms: cpu.len() as u64 * MINUTE_MS,
        severity: if similarity > 0.9 {
            FailureSeverity::High
        } else {
            FailureSeverity::Medium
        },
        root_causes: vec![format!(
            "CPU forecast matches a past {} failure ({:.2} correlation): {}",
            signature.failure_type, similarity, signature.description
        )],
        recommendations: vec![
            action(ActionType::Alert, "Notify the owning team of a likely recurrence", 1, 0.5, 0, false, 0.0),
            action(ActionType::Investigate, "Review the previous incident's fix", 2, 0.7, 3_600_000, false, 0.0),
        ],
        historical_similarity: similarity,
    })
}
