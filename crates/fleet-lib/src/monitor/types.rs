//! Monitor data types

use crate::models::{AnomalySeverity, AnomalyType, MetricKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category of a predicted failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureType {
    Crash,
    Performance,
    Resource,
    Network,
    Dependency,
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureType::Crash => "crash",
            FailureType::Performance => "performance",
            FailureType::Resource => "resource",
            FailureType::Network => "network",
            FailureType::Dependency => "dependency",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for FailureSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureSeverity::Low => "low",
            FailureSeverity::Medium => "medium",
            FailureSeverity::High => "high",
            FailureSeverity::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Kind of corrective step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Restart,
    Scale,
    Config,
    Alert,
    Investigate,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionType::Restart => "restart",
            ActionType::Scale => "scale",
            ActionType::Config => "config",
            ActionType::Alert => "alert",
            ActionType::Investigate => "investigate",
        };
        write!(f, "{}", name)
    }
}

/// A remediation step attached to a failure prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action_type: ActionType,
    pub description: String,
    /// 1 is most important
    pub priority: u8,
    pub estimated_effectiveness: f64,
    pub estimated_duration_ms: u64,
    pub automatable: bool,
    /// Monthly cost change if applied
    pub cost_impact: f64,
}

/// A categorized failure expected within the forecast horizon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePrediction {
    pub service: String,
    pub failure_type: FailureType,
    pub probability: f64,
    pub confidence: f64,
    pub estimated_time_to_failure_ms: u64,
    pub severity: FailureSeverity,
    pub root_causes: Vec<String>,
    pub recommendations: Vec<RecommendedAction>,
    /// Correlation with a recorded failure signature (0 when not pattern based)
    pub historical_similarity: f64,
}

/// Five 0-100 component scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthComponents {
    pub performance: f64,
    pub reliability: f64,
    pub availability: f64,
    pub scalability: f64,
    pub security: f64,
}

impl HealthComponents {
    /// Unweighted mean of the components
    pub fn overall(&self) -> f64 {
        (self.performance + self.reliability + self.availability + self.scalability + self.security)
            / 5.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTrend {
    Improving,
    Stable,
    Degrading,
}

impl HealthTrend {
    /// Compare against the immediately preceding overall score
    pub fn between(previous: Option<f64>, current: f64) -> Self {
        match previous {
            Some(prev) if current - prev > 5.0 => HealthTrend::Improving,
            Some(prev) if current - prev < -5.0 => HealthTrend::Degrading,
            _ => HealthTrend::Stable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    pub service: String,
    pub overall: f64,
    pub components: HealthComponents,
    pub trend: HealthTrend,
    pub risk_factors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Prediction,
    Anomaly,
    Trend,
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn from_failure(severity: FailureSeverity) -> Self {
        match severity {
            FailureSeverity::Low => AlertLevel::Info,
            FailureSeverity::Medium => AlertLevel::Warning,
            FailureSeverity::High => AlertLevel::Error,
            FailureSeverity::Critical => AlertLevel::Critical,
        }
    }

    pub fn from_anomaly(severity: AnomalySeverity) -> Self {
        match severity {
            AnomalySeverity::Low => AlertLevel::Info,
            AnomalySeverity::Medium => AlertLevel::Warning,
            AnomalySeverity::High => AlertLevel::Error,
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
            AlertLevel::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Kind-specific alert payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertDetails {
    Failure {
        failure_type: FailureType,
        probability: f64,
        estimated_time_to_failure_ms: u64,
        recommended_actions: Vec<ActionType>,
    },
    Anomaly {
        anomaly_type: AnomalyType,
        metric: MetricKind,
        probability: f64,
        expected_time: DateTime<Utc>,
    },
    HealthTrend {
        previous: f64,
        current: f64,
    },
    Threshold {
        metric: String,
        value: f64,
        threshold: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictiveAlert {
    pub id: String,
    pub service: String,
    pub alert_type: AlertType,
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub details: AlertDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Optimization,
    Risk,
    Opportunity,
    Trend,
}

/// Low/medium/high rating used for impact and effort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInsight {
    pub id: String,
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub impact: Rating,
    pub confidence: f64,
    pub actionable: bool,
    pub estimated_value: f64,
    pub implementation_effort: Rating,
    pub timestamp: DateTime<Utc>,
}

/// Audit entry for one automated remediation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationRecord {
    pub id: String,
    pub service: String,
    pub action_type: ActionType,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fleet health buckets from the latest score per service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemOverview {
    pub total_services: usize,
    /// overall > 70
    pub healthy: usize,
    /// 40 < overall <= 70
    pub at_risk: usize,
    /// overall <= 40
    pub critical: usize,
    pub active_alerts: usize,
    pub predicted_failures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub health_scores: BTreeMap<String, HealthScore>,
    pub alerts: Vec<PredictiveAlert>,
    pub insights: Vec<SystemInsight>,
    pub overview: SystemOverview,
    pub generated_at: DateTime<Utc>,
}

/// Result of one analysis tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub services_analyzed: usize,
    pub services_skipped: usize,
    pub failures: Vec<FailurePrediction>,
    pub alerts_raised: usize,
    pub insights_generated: usize,
    pub remediations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_between_scores() {
        assert_eq!(HealthTrend::between(None, 50.0), HealthTrend::Stable);
        assert_eq!(HealthTrend::between(Some(80.0), 70.0), HealthTrend::Degrading);
        assert_eq!(HealthTrend::between(Some(70.0), 80.0), HealthTrend::Improving);
        assert_eq!(HealthTrend::between(Some(70.0), 74.0), HealthTrend::Stable);
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(AlertLevel::from_failure(FailureSeverity::Low), AlertLevel::Info);
        assert_eq!(
            AlertLevel::from_failure(FailureSeverity::Critical),
            AlertLevel::Critical
        );
        assert_eq!(AlertLevel::from_anomaly(AnomalySeverity::High), AlertLevel::Error);
    }

    #[test]
    fn test_alert_details_are_tagged() {
        let details = AlertDetails::Threshold {
            metric: "health".to_string(),
            value: 35.0,
            threshold: 40.0,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["kind"], "threshold");
        assert_eq!(json["threshold"], 40.0);
    }
}
