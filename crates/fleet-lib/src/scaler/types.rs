//! Scaling data types

use crate::error::{FleetError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Performance targets a service is scaled to keep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceTargets {
    /// Max CPU utilization in percent
    pub max_cpu: f64,
    /// Max memory utilization in percent
    pub max_memory: f64,
    pub max_latency_ms: f64,
    /// Requests per minute the service must sustain
    pub min_throughput: f64,
}

impl Default for PerformanceTargets {
    fn default() -> Self {
        Self {
            max_cpu: 70.0,
            max_memory: 80.0,
            max_latency_ms: 500.0,
            min_throughput: 10.0,
        }
    }
}

/// Replica bounds, step limits and cooldown for one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConstraints {
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub max_scale_up_step: u32,
    pub max_scale_down_step: u32,
    pub cooldown_period_ms: u64,
    pub performance_targets: PerformanceTargets,
}

impl Default for ScalingConstraints {
    fn default() -> Self {
        Self {
            min_replicas: 1,
            max_replicas: 10,
            max_scale_up_step: 3,
            max_scale_down_step: 1,
            cooldown_period_ms: 300_000,
            performance_targets: PerformanceTargets::default(),
        }
    }
}

impl ScalingConstraints {
    pub fn validate(&self, service: &str) -> Result<()> {
        let invalid = |reason: &str| FleetError::InvalidConstraints {
            service: service.to_string(),
            reason: reason.to_string(),
        };

        if self.min_replicas == 0 {
            return Err(invalid("min_replicas must be at least 1"));
        }
        if self.min_replicas > self.max_replicas {
            return Err(invalid("min_replicas exceeds max_replicas"));
        }
        if self.max_scale_up_step == 0 || self.max_scale_down_step == 0 {
            return Err(invalid("scale steps must be at least 1"));
        }
        let t = &self.performance_targets;
        if t.max_cpu <= 0.0 || t.max_memory <= 0.0 || t.max_latency_ms <= 0.0 {
            return Err(invalid("performance targets must be positive"));
        }
        Ok(())
    }

    /// Clamp a replica count into `[min_replicas, max_replicas]`
    pub fn clamp(&self, replicas: u32) -> u32 {
        replicas.clamp(self.min_replicas, self.max_replicas)
    }
}

/// Direction of a scaling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleDirection {
    ScaleUp,
    ScaleDown,
    Maintain,
}

impl std::fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleDirection::ScaleUp => write!(f, "scale-up"),
            ScaleDirection::ScaleDown => write!(f, "scale-down"),
            ScaleDirection::Maintain => write!(f, "maintain"),
        }
    }
}

/// How soon an action should execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Classify how far a metric overshoots its target
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 1.5 {
            Urgency::Critical
        } else if ratio > 1.2 {
            Urgency::High
        } else if ratio > 1.0 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Urgency::Low => 1.0,
            Urgency::Medium => 2.0,
            Urgency::High => 3.0,
            Urgency::Critical => 4.0,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Medium => write!(f, "medium"),
            Urgency::High => write!(f, "high"),
            Urgency::Critical => write!(f, "critical"),
        }
    }
}

/// Scaling policy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalingPolicy {
    Reactive,
    Predictive,
    Scheduled,
    CostAware,
    #[default]
    Hybrid,
    /// Operator or remediation request; never used for evaluation
    Manual,
}

impl std::fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScalingPolicy::Reactive => "reactive",
            ScalingPolicy::Predictive => "predictive",
            ScalingPolicy::Scheduled => "scheduled",
            ScalingPolicy::CostAware => "cost-aware",
            ScalingPolicy::Hybrid => "hybrid",
            ScalingPolicy::Manual => "manual",
        };
        write!(f, "{}", name)
    }
}

/// A scaling decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleAction {
    pub service: String,
    pub action: ScaleDirection,
    pub current_replicas: u32,
    pub target_replicas: u32,
    pub reason: String,
    pub confidence: f64,
    pub estimated_cost: f64,
    pub estimated_benefit: f64,
    pub urgency: Urgency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    pub policy: ScalingPolicy,
}

impl ScaleAction {
    pub fn benefit_cost_ratio(&self) -> f64 {
        if self.estimated_cost <= 0.0 {
            return self.estimated_benefit.max(0.0);
        }
        self.estimated_benefit / self.estimated_cost
    }

    /// Ordering key for the execution pass: `(benefit/cost) × urgency weight`
    pub fn priority_score(&self) -> f64 {
        self.benefit_cost_ratio() * self.urgency.weight()
    }

    /// True when the action may execute at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time.map_or(true, |t| t <= now)
    }
}

/// Outcome of an executed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingResult {
    Success,
    Failed,
}

/// Audit record for an action submitted for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingEvent {
    pub id: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub action: ScaleAction,
    pub result: ScalingResult,
    pub duration_ms: u64,
    /// Monthly cost change; negative for savings
    pub cost_impact: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-service event counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceScalingSummary {
    pub events: usize,
    pub scale_ups: usize,
    pub scale_downs: usize,
    pub failures: usize,
}

/// Aggregate view of the scaling audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingPerformanceReport {
    pub total_events: usize,
    pub successful: usize,
    pub failed: usize,
    /// 1.0 when nothing has executed yet
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub total_cost_impact: f64,
    pub pending_actions: usize,
    pub per_service: BTreeMap<String, ServiceScalingSummary>,
    pub recommendations: Vec<String>,
}
