//! Component health and readiness
//!
//! Every integrated analysis tick assesses the predictor, cache, scaler
//! and monitor from what they actually did since the last tick and files
//! the verdicts here. The daemon's `/healthz` and `/readyz` endpoints read
//! the registry; an unhealthy component takes the optimizer out of
//! readiness until a later assessment clears it.

use crate::clock::SharedClock;
use crate::monitor::RemediationRecord;
use crate::scaler::{ScalingEvent, ScalingResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const LOW_CACHE_HIT_RATE: f64 = 0.7;
pub const LOW_SCALING_SUCCESS_RATE: f64 = 0.9;
pub const LOW_PREDICTION_CONFIDENCE: f64 = 0.6;

/// Consecutive failed scale actions that make the scaler unhealthy
pub const SCALER_FAILURE_STREAK: usize = 3;

/// Consecutive failed remediations that degrade the monitor
pub const REMEDIATION_FAILURE_STREAK: usize = 3;

/// Analysis intervals without a pass before the monitor counts as stalled
pub const MONITOR_STALL_INTERVALS: i64 = 3;

/// Optimization components tracked by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Predictor,
    Cache,
    Scaler,
    Monitor,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Predictor,
        Component::Cache,
        Component::Scaler,
        Component::Monitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Predictor => "predictor",
            Component::Cache => "cache",
            Component::Scaler => "scaler",
            Component::Monitor => "monitor",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still doing its job, with reduced quality
    Degraded,
    Unhealthy,
}

/// Latest verdict for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check: DateTime<Utc>,
}

/// A status with the reason behind it
pub type Verdict = (ComponentStatus, Option<String>);

fn healthy() -> Verdict {
    (ComponentStatus::Healthy, None)
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst component status
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Mean forecast confidence across the fleet
pub fn assess_predictor(mean_confidence: Option<f64>) -> Verdict {
    match mean_confidence {
        Some(c) if c < LOW_PREDICTION_CONFIDENCE => (
            ComponentStatus::Degraded,
            Some(format!("Mean forecast confidence {:.2}", c)),
        ),
        _ => healthy(),
    }
}

/// Hit rate since startup; `None` before the first lookup
pub fn assess_cache(hit_rate: Option<f64>) -> Verdict {
    match hit_rate {
        Some(rate) if rate < LOW_CACHE_HIT_RATE => (
            ComponentStatus::Degraded,
            Some(format!("Hit rate {:.0}%", rate * 100.0)),
        ),
        _ => healthy(),
    }
}

/// Recent scale outcomes, oldest first
///
/// A run of failures means the infrastructure controller is not acting on
/// anything; a lower overall success rate only degrades.
pub fn assess_scaler(recent: &[ScalingEvent], success_rate: f64) -> Verdict {
    let streak = recent
        .iter()
        .rev()
        .take_while(|e| e.result == ScalingResult::Failed)
        .count();
    if streak >= SCALER_FAILURE_STREAK {
        let error = recent
            .last()
            .and_then(|e| e.error.clone())
            .unwrap_or_default();
        return (
            ComponentStatus::Unhealthy,
            Some(format!("Last {} scale actions failed: {}", streak, error)),
        );
    }
    if !recent.is_empty() && success_rate < LOW_SCALING_SUCCESS_RATE {
        return (
            ComponentStatus::Degraded,
            Some(format!("Scale success rate {:.0}%", success_rate * 100.0)),
        );
    }
    healthy()
}

/// Analysis freshness and the latest remediation outcomes, oldest first
pub fn assess_monitor(
    last_analysis_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval_secs: u64,
    remediations: &[RemediationRecord],
) -> Verdict {
    if let Some(last) = last_analysis_at {
        let stall = ChronoDuration::seconds(interval_secs as i64 * MONITOR_STALL_INTERVALS);
        if now - last > stall {
            return (
                ComponentStatus::Degraded,
                Some(format!("No analysis since {}", last.to_rfc3339())),
            );
        }
    }

    let failed = remediations
        .iter()
        .rev()
        .take_while(|r| !r.success)
        .count();
    if failed >= REMEDIATION_FAILURE_STREAK {
        return (
            ComponentStatus::Degraded,
            Some(format!("Last {} remediations failed", failed)),
        );
    }
    healthy()
}

#[derive(Debug)]
struct RegistryState {
    components: BTreeMap<Component, ComponentHealth>,
    ready: bool,
}

/// Shared component health, readable by the API while the orchestrator writes
#[derive(Clone)]
pub struct HealthRegistry {
    clock: SharedClock,
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    /// Every component starts healthy; readiness waits for `set_ready`
    pub fn new(clock: SharedClock) -> Self {
        let now = clock.now();
        let components = Component::ALL
            .into_iter()
            .map(|c| {
                let health = ComponentHealth {
                    status: ComponentStatus::Healthy,
                    message: None,
                    last_check: now,
                };
                (c, health)
            })
            .collect();
        Self {
            clock,
            state: Arc::new(RwLock::new(RegistryState {
                components,
                ready: false,
            })),
        }
    }

    /// File a verdict; status changes are logged
    pub async fn report(&self, component: Component, (status, message): Verdict) {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let previous = state.components.get(&component).map(|h| h.status);

        match previous {
            Some(prev) if status > prev => warn!(
                component = %component,
                from = ?prev,
                to = ?status,
                message = message.as_deref().unwrap_or(""),
                "Component health worsened"
            ),
            Some(prev) if status < prev => info!(
                component = %component,
                from = ?prev,
                to = ?status,
                "Component health improved"
            ),
            _ => {}
        }

        state.components.insert(
            component,
            ComponentHealth {
                status,
                message,
                last_check: now,
            },
        );
    }

    pub async fn component(&self, component: Component) -> Option<ComponentHealth> {
        self.state.read().await.components.get(&component).cloned()
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn is_ready(&self) -> bool {
        self.state.read().await.ready
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.state.read().await.components.clone();
        let status = components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthResponse { status, components }
    }

    /// Ready once initialized and while no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        if !state.ready {
            return ReadinessResponse {
                ready: false,
                reason: Some("Optimizer not yet initialized".to_string()),
            };
        }

        let unhealthy: Vec<String> = state
            .components
            .iter()
            .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
            .map(|(c, h)| match &h.message {
                Some(message) => format!("{}: {}", c, message),
                None => c.to_string(),
            })
            .collect();
        if unhealthy.is_empty() {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        } else {
            ReadinessResponse {
                ready: false,
                reason: Some(format!("Unhealthy: {}", unhealthy.join("; "))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::monitor::ActionType;
    use crate::scaler::{ScaleAction, ScaleDirection, ScalingPolicy, Urgency};
    use chrono::TimeZone;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap())
    }

    fn registry(clock: &ManualClock) -> HealthRegistry {
        HealthRegistry::new(Arc::new(clock.clone()))
    }

    fn event(result: ScalingResult) -> ScalingEvent {
        ScalingEvent {
            id: "e".to_string(),
            service: "api".to_string(),
            timestamp: Utc::now(),
            action: ScaleAction {
                service: "api".to_string(),
                action: ScaleDirection::ScaleUp,
                current_replicas: 2,
                target_replicas: 3,
                reason: "cpu".to_string(),
                confidence: 0.9,
                estimated_cost: 50.0,
                estimated_benefit: 100.0,
                urgency: Urgency::High,
                scheduled_time: None,
                policy: ScalingPolicy::Reactive,
            },
            result,
            duration_ms: 1,
            cost_impact: 0.0,
            error: (result == ScalingResult::Failed).then(|| "controller down".to_string()),
        }
    }

    fn remediation(success: bool) -> RemediationRecord {
        RemediationRecord {
            id: "r".to_string(),
            service: "api".to_string(),
            action_type: ActionType::Restart,
            success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_initial_state() {
        let registry = registry(&clock());
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), 4);

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Optimizer not yet initialized"));
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let clock = clock();
        let registry = registry(&clock);
        registry.set_ready(true).await;

        clock.advance(ChronoDuration::seconds(30));
        registry.report(Component::Cache, assess_cache(Some(0.4))).await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        let cache = &health.components[&Component::Cache];
        assert_eq!(cache.message.as_deref(), Some("Hit rate 40%"));
        assert_eq!(cache.last_check, clock.now());
        assert!(registry.readiness().await.ready);

        let failures = vec![event(ScalingResult::Failed); 3];
        registry
            .report(Component::Scaler, assess_scaler(&failures, 0.0))
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Unhealthy: scaler: Last 3 scale actions failed: controller down")
        );

        // A later clean assessment restores readiness
        registry
            .report(Component::Scaler, assess_scaler(&[event(ScalingResult::Success)], 1.0))
            .await;
        assert!(registry.readiness().await.ready);
    }

    #[test]
    fn test_scaler_streak_must_be_recent() {
        let mut events = vec![event(ScalingResult::Failed); 3];
        events.push(event(ScalingResult::Success));
        let (status, message) = assess_scaler(&events, 0.25);
        assert_eq!(status, ComponentStatus::Degraded);
        assert_eq!(message.as_deref(), Some("Scale success rate 25%"));

        assert_eq!(assess_scaler(&[], 1.0).0, ComponentStatus::Healthy);
    }

    #[test]
    fn test_predictor_and_cache_thresholds() {
        assert_eq!(assess_predictor(None).0, ComponentStatus::Healthy);
        assert_eq!(assess_predictor(Some(0.95)).0, ComponentStatus::Healthy);
        assert_eq!(assess_predictor(Some(0.4)).0, ComponentStatus::Degraded);

        assert_eq!(assess_cache(None).0, ComponentStatus::Healthy);
        assert_eq!(assess_cache(Some(0.7)).0, ComponentStatus::Healthy);
        assert_eq!(assess_cache(Some(0.69)).0, ComponentStatus::Degraded);
    }

    #[test]
    fn test_monitor_stall_and_remediation_failures() {
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap();

        assert_eq!(assess_monitor(None, now, 60, &[]).0, ComponentStatus::Healthy);
        let fresh = now - ChronoDuration::seconds(120);
        assert_eq!(assess_monitor(Some(fresh), now, 60, &[]).0, ComponentStatus::Healthy);
        let stale = now - ChronoDuration::seconds(181);
        assert_eq!(assess_monitor(Some(stale), now, 60, &[]).0, ComponentStatus::Degraded);

        let mut log = vec![remediation(true), remediation(false), remediation(false)];
        assert_eq!(assess_monitor(Some(now), now, 60, &log).0, ComponentStatus::Healthy);
        log.push(remediation(false));
        let (status, message) = assess_monitor(Some(now), now, 60, &log);
        assert_eq!(status, ComponentStatus::Degraded);
        assert_eq!(message.as_deref(), Some("Last 3 remediations failed"));
    }

    #[test]
    fn test_component_keys_serialize_lowercase() {
        let registry_json = serde_json::to_value(HealthResponse {
            status: ComponentStatus::Degraded,
            components: BTreeMap::from([(
                Component::Scaler,
                ComponentHealth {
                    status: ComponentStatus::Degraded,
                    message: None,
                    last_check: Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap(),
                },
            )]),
        })
        .unwrap();
        assert_eq!(registry_json["status"], "degraded");
        assert_eq!(registry_json["components"]["scaler"]["status"], "degraded");
    }
}
