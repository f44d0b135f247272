//! Fleet-level insights derived from one analysis tick

use super::types::{HealthScore, HealthTrend, InsightType, Rating, SystemInsight};
use crate::models::{MetricKind, ResourcePrediction};
use chrono::{DateTime, Utc};

/// Health at or below this marks a service at risk
pub const AT_RISK_HEALTH: f64 = 70.0;

/// Predicted CPU and memory both below this mark a scale-down candidate
pub const UNDERUTILIZED_PERCENT: f64 = 30.0;

/// Monthly value assumed per freed replica
const REPLICA_SAVINGS: f64 = 50.0;

#[allow(clippy::too_many_arguments)]
pub fn insight(
    insight_type: InsightType,
    title: String,
    description: String,
    impact: Rating,
    confidence: f64,
    estimated_value: f64,
    implementation_effort: Rating,
    now: DateTime<Utc>,
) -> SystemInsight {
    SystemInsight {
        id: uuid::Uuid::new_v4().to_string(),
        insight_type,
        title,
        description,
        impact,
        confidence: confidence.clamp(0.0, 1.0),
        actionable: true,
        estimated_value,
        implementation_effort,
        timestamp: now,
    }
}

/// At-risk services, degrading trends and scale-down candidates
pub fn generate(
    scores: &[HealthScore],
    predictions: &[ResourcePrediction],
    now: DateTime<Utc>,
) -> Vec<SystemInsight> {
    let mut insights = Vec::new();

    let at_risk: Vec<&HealthScore> = scores.iter().filter(|s| s.overall <= AT_RISK_HEALTH).collect();
    if !at_risk.is_empty() {
        let names: Vec<&str> = at_risk.iter().map(|s| s.service.as_str()).collect();
        let worst = at_risk.iter().map(|s| s.overall).fold(f64::MAX, f64::min);
        let confidence =
            at_risk.iter().map(|s| s.components.reliability).sum::<f64>() / (100.0 * at_risk.len() as f64);
        insights.push(insight(
            InsightType::Risk,
            format!("{} services at risk", at_risk.len()),
            format!("Health at or below {}: {} (worst {:.1})", AT_RISK_HEALTH, names.join(", "), worst),
            if worst <= 40.0 { Rating::High } else { Rating::Medium },
            confidence,
            0.0,
            Rating::Medium,
            now,
        ));
    }

    let degrading: Vec<&str> = scores
        .iter()
        .filter(|s| s.trend == HealthTrend::Degrading)
        .map(|s| s.service.as_str())
        .collect();
    if !degrading.is_empty() {
        insights.push(insight(
            InsightType::Trend,
            format!("{} services degrading", degrading.len()),
            format!("Health dropped more than 5 points since the last analysis: {}", degrading.join(", ")),
            Rating::Medium,
            0.7,
            0.0,
            Rating::Medium,
            now,
        ));
    }

    let idle: Vec<&str> = predictions
        .iter()
        .filter(|p| {
            !p.predictions.cpu.is_empty()
                && p.predictions.max(MetricKind::Cpu) < UNDERUTILIZED_PERCENT
                && p.predictions.max(MetricKind::Memory) < UNDERUTILIZED_PERCENT
        })
        .map(|p| p.service.as_str())
        .collect();
    if !idle.is_empty() {
        insights.push(insight(
            InsightType::Opportunity,
            "Scale-down candidates".to_string(),
            format!(
                "Predicted CPU and memory stay under {}%: {}",
                UNDERUTILIZED_PERCENT,
                idle.join(", ")
            ),
            Rating::Low,
            0.8,
            REPLICA_SAVINGS * idle.len() as f64,
            Rating::Low,
            now,
        ));
    }

    insights
}
