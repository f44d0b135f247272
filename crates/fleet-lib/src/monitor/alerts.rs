//! Alert construction, storage and delivery
//!
//! Handles:
//! - Building alerts from failure predictions, forecast anomalies, health trends and thresholds
//! - Suppressing repeats while an identical alert is still unacknowledged
//! - Handing new alerts to an [`AlertNotifier`] without waiting on delivery

use super::types::{
    AlertDetails, AlertLevel, AlertType, FailurePrediction, HealthScore, PredictiveAlert,
};
use crate::models::AnomalyDetection;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Overall health at or below this raises a threshold alert
pub const CRITICAL_HEALTH_THRESHOLD: f64 = 40.0;

/// Outbound delivery for alerts (chat, email, pager)
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &PredictiveAlert) -> anyhow::Result<()>;
}

/// Notifier that writes alerts to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl AlertNotifier for TracingNotifier {
    async fn notify(&self, alert: &PredictiveAlert) -> anyhow::Result<()> {
        warn!(
            alert_id = %alert.id,
            service = %alert.service,
            level = %alert.level,
            title = %alert.title,
            "{}",
            alert.message
        );
        Ok(())
    }
}

fn new_alert(
    service: &str,
    alert_type: AlertType,
    level: AlertLevel,
    title: String,
    message: String,
    details: AlertDetails,
    now: DateTime<Utc>,
) -> PredictiveAlert {
    PredictiveAlert {
        id: uuid::Uuid::new_v4().to_string(),
        service: service.to_string(),
        alert_type,
        level,
        title,
        message,
        timestamp: now,
        acknowledged: false,
        details,
    }
}

pub fn failure_alert(failure: &FailurePrediction, now: DateTime<Utc>) -> PredictiveAlert {
    new_alert(
        &failure.service,
        AlertType::Prediction,
        AlertLevel::from_failure(failure.severity),
        format!("Predicted {} failure", failure.failure_type),
        format!(
            "{:.0}% probability of {} failure in {} min: {}",
            failure.probability * 100.0,
            failure.failure_type,
            failure.estimated_time_to_failure_ms / 60_000,
            failure.root_causes.join("; ")
        ),
        AlertDetails::Failure {
            failure_type: failure.failure_type,
            probability: failure.probability,
            estimated_time_to_failure_ms: failure.estimated_time_to_failure_ms,
            recommended_actions: failure.recommendations.iter().map(|r| r.action_type).collect(),
        },
        now,
    )
}

pub fn anomaly_alert(service: &str, anomaly: &AnomalyDetection, now: DateTime<Utc>) -> PredictiveAlert {
    new_alert(
        service,
        AlertType::Anomaly,
        AlertLevel::from_anomaly(anomaly.severity),
        format!("Predicted {} {}", anomaly.metric, anomaly.anomaly_type),
        format!(
            "{:.0}% probability of a {} {} at {}. {}",
            anomaly.probability * 100.0,
            anomaly.metric,
            anomaly.anomaly_type,
            anomaly.expected_time.to_rfc3339(),
            anomaly.recommendation
        ),
        AlertDetails::Anomaly {
            anomaly_type: anomaly.anomaly_type,
            metric: anomaly.metric,
            probability: anomaly.probability,
            expected_time: anomaly.expected_time,
        },
        now,
    )
}

pub fn trend_alert(score: &HealthScore, previous: f64, now: DateTime<Utc>) -> PredictiveAlert {
    new_alert(
        &score.service,
        AlertType::Trend,
        AlertLevel::Warning,
        "Health degrading".to_string(),
        format!("Health fell from {:.1} to {:.1}", previous, score.overall),
        AlertDetails::HealthTrend {
            previous,
            current: score.overall,
        },
        now,
    )
}

pub fn threshold_alert(score: &HealthScore, now: DateTime<Utc>) -> PredictiveAlert {
    new_alert(
        &score.service,
        AlertType::Threshold,
        AlertLevel::Critical,
        "Health critical".to_string(),
        format!(
            "Health score {:.1} is at or below {}. Risks: {}",
            score.overall,
            CRITICAL_HEALTH_THRESHOLD,
            score.risk_factors.join("; ")
        ),
        AlertDetails::Threshold {
            metric: "health".to_string(),
            value: score.overall,
            threshold: CRITICAL_HEALTH_THRESHOLD,
        },
        now,
    )
}

/// Bounded alert store, oldest first
#[derive(Debug)]
pub struct AlertBook {
    alerts: VecDeque<PredictiveAlert>,
    capacity: usize,
}

impl AlertBook {
    pub fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Whether an unacknowledged alert with the same service and title exists
    pub fn should_suppress(&self, alert: &PredictiveAlert) -> bool {
        self.alerts
            .iter()
            .any(|a| !a.acknowledged && a.service == alert.service && a.title == alert.title)
    }

    /// Store an alert unless suppressed; returns whether it was stored
    pub fn record(&mut self, alert: PredictiveAlert) -> bool {
        if self.should_suppress(&alert) {
            debug!(service = %alert.service, title = %alert.title, "Suppressing repeat alert");
            return false;
        }
        self.alerts.push_back(alert);
        while self.alerts.len() > self.capacity {
            self.alerts.pop_front();
        }
        true
    }

    pub fn acknowledge(&mut self, id: &str) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> Vec<PredictiveAlert> {
        self.alerts.iter().cloned().collect()
    }

    pub fn active(&self) -> Vec<PredictiveAlert> {
        self.alerts.iter().filter(|a| !a.acknowledged).cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.acknowledged).count()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.alerts.len() > self.capacity {
            self.alerts.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnomalySeverity, AnomalyType, MetricKind};
    use crate::monitor::types::{FailureSeverity, FailureType};

    fn failure(severity: FailureSeverity) -> FailurePrediction {
        FailurePrediction {
            service: "api".to_string(),
            failure_type: FailureType::Resource,
            probability: 0.95,
            confidence: 0.9,
            estimated_time_to_failure_ms: 600_000,
            severity,
            root_causes: vec!["cpu".to_string()],
            recommendations: Vec::new(),
            historical_similarity: 0.0,
        }
    }

    #[test]
    fn test_failure_alert_level() {
        let alert = failure_alert(&failure(FailureSeverity::Critical), Utc::now());
        assert_eq!(alert.level, AlertLevel::Critical);
        assert_eq!(alert.alert_type, AlertType::Prediction);
        assert!(!alert.acknowledged);
        assert!(alert.message.contains("10 min"));
    }

    #[test]
    fn test_anomaly_alert_details() {
        let anomaly = AnomalyDetection {
            anomaly_type: AnomalyType::Spike,
            metric: MetricKind::Cpu,
            severity: AnomalySeverity::High,
            probability: 0.85,
            expected_time: Utc::now(),
            recommendation: "Scale up".to_string(),
        };
        let alert = anomaly_alert("api", &anomaly, Utc::now());
        assert_eq!(alert.level, AlertLevel::Error);
        assert!(matches!(
            alert.details,
            AlertDetails::Anomaly { metric: MetricKind::Cpu, .. }
        ));
    }

    #[test]
    fn test_book_suppresses_until_acknowledged() {
        let mut book = AlertBook::new(10);
        let first = failure_alert(&failure(FailureSeverity::High), Utc::now());
        let id = first.id.clone();
        assert!(book.record(first));
        assert!(!book.record(failure_alert(&failure(FailureSeverity::High), Utc::now())));
        assert_eq!(book.active_count(), 1);

        assert!(book.acknowledge(&id));
        assert!(!book.acknowledge("missing"));
        assert_eq!(book.active_count(), 0);
        assert!(book.record(failure_alert(&failure(FailureSeverity::High), Utc::now())));
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_book_is_bounded() {
        let mut book = AlertBook::new(3);
        for i in 0..5 {
            let mut f = failure(FailureSeverity::High);
            f.service = format!("svc-{}", i);
            book.record(failure_alert(&f, Utc::now()));
        }
        assert_eq!(book.len(), 3);
        assert_eq!(book.all()[0].service, "svc-2");
    }
}
