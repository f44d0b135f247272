//! Scaling policies
//!
//! Each policy looks at one service and proposes at most one replica
//! change. Proposals are priced and combined by the scaler.

use super::types::{ScaleDirection, ScalingConstraints, ScalingPolicy, Urgency};
use crate::models::{ResourcePrediction, ServiceMetrics};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Headroom factor: replicas are sized so the target sits at 80% utilization
const TARGET_HEADROOM: f64 = 0.8;

/// Safety margin applied to utilization when sizing a scale-down
const SCALE_DOWN_SAFETY: f64 = 1.3;

/// An unpriced replica change suggested by a policy
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub direction: ScaleDirection,
    pub target_replicas: u32,
    pub reason: String,
    pub confidence: f64,
    pub urgency: Urgency,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub policy: ScalingPolicy,
}

/// Weekday business hours, local to `utc_offset_minutes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessHours {
    pub start_hour: u32,
    pub end_hour: u32,
    pub utc_offset_minutes: i32,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 18,
            utc_offset_minutes: 0,
        }
    }
}

impl BusinessHours {
    /// Mon-Fri within `[start_hour, end_hour)` local time
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now + ChronoDuration::minutes(self.utc_offset_minutes as i64);
        let weekday = !matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        weekday && local.hour() >= self.start_hour && local.hour() < self.end_hour
    }
}

/// Replicas needed to bring `current` down to 80% of `target`
fn projection(replicas: u32, current: f64, target: f64) -> u32 {
    (replicas as f64 * current / (target * TARGET_HEADROOM)).ceil().max(0.0) as u32
}

/// Bounded scale-up target from observed or predicted peaks
fn scale_up_target(replicas: u32, cpu: f64, memory: f64, c: &ScalingConstraints) -> u32 {
    let t = &c.performance_targets;
    let desired = projection(replicas, cpu, t.max_cpu)
        .max(projection(replicas, memory, t.max_memory))
        .max(replicas + 1);
    desired
        .min(replicas.saturating_add(c.max_scale_up_step))
        .min(c.max_replicas)
}

fn breaches(cpu: f64, memory: f64, latency: f64, c: &ScalingConstraints) -> Vec<String> {
    let t = &c.performance_targets;
    let mut reasons = Vec::new();
    if cpu > t.max_cpu {
        reasons.push(format!("cpu {:.1}% > {:.1}%", cpu, t.max_cpu));
    }
    if memory > t.max_memory {
        reasons.push(format!("memory {:.1}% > {:.1}%", memory, t.max_memory));
    }
    if latency > t.max_latency_ms {
        reasons.push(format!("latency {:.0}ms > {:.0}ms", latency, t.max_latency_ms));
    }
    reasons
}

fn peak_ratio(cpu: f64, memory: f64, latency: f64, c: &ScalingConstraints) -> f64 {
    let t = &c.performance_targets;
    (cpu / t.max_cpu)
        .max(memory / t.max_memory)
        .max(latency / t.max_latency_ms)
}

/// Threshold policy on current utilization
pub fn reactive(metrics: &ServiceMetrics, c: &ScalingConstraints) -> Option<Proposal> {
    let t = &c.performance_targets;
    let replicas = metrics.replicas;
    let ratio = peak_ratio(metrics.cpu, metrics.memory, metrics.latency_ms, c);

    if ratio > 1.0 {
        let target = scale_up_target(replicas, metrics.cpu, metrics.memory, c);
        if target <= replicas {
            return None;
        }
        let reasons = breaches(metrics.cpu, metrics.memory, metrics.latency_ms, c);
        return Some(Proposal {
            direction: ScaleDirection::ScaleUp,
            target_replicas: target,
            reason: format!("Targets exceeded: {}", reasons.join(", ")),
            confidence: 0.9,
            urgency: Urgency::from_ratio(ratio),
            scheduled_time: None,
            policy: ScalingPolicy::Reactive,
        });
    }

    let underused = metrics.cpu < t.max_cpu / 2.0
        && metrics.memory < t.max_memory / 2.0
        && metrics.latency_ms < t.max_latency_ms / 2.0;
    if !underused || replicas <= c.min_replicas {
        return None;
    }

    let utilization = (metrics.cpu / t.max_cpu).max(metrics.memory / t.max_memory);
    let safe = (replicas as f64 * utilization * SCALE_DOWN_SAFETY).ceil() as u32;
    if safe >= replicas {
        return None;
    }
    let target = safe
        .max(replicas.saturating_sub(c.max_scale_down_step))
        .max(c.min_replicas);
    if target >= replicas {
        return None;
    }

    Some(Proposal {
        direction: ScaleDirection::ScaleDown,
        target_replicas: target,
        reason: format!(
            "Utilization {:.0}% of target; {} replicas suffice",
            utilization * 100.0,
            safe.max(c.min_replicas)
        ),
        confidence: 0.7,
        urgency: Urgency::Low,
        scheduled_time: None,
        policy: ScalingPolicy::Reactive,
    })
}

/// Scale ahead of a forecast breach, `lead_minutes` before it lands
pub fn predictive(
    prediction: &ResourcePrediction,
    replicas: u32,
    c: &ScalingConstraints,
    now: DateTime<Utc>,
    lead_minutes: i64,
) -> Option<Proposal> {
    let t = &c.performance_targets;
    let p = &prediction.predictions;

    let first_breach = (0..p.cpu.len()).find(|&i| {
        p.cpu[i] > t.max_cpu
            || p.memory.get(i).is_some_and(|m| *m > t.max_memory)
            || p.latency.get(i).is_some_and(|l| *l > t.max_latency_ms)
    })?;

    let max_cpu = p.cpu.iter().copied().fold(0.0, f64::max);
    let max_memory = p.memory.iter().copied().fold(0.0, f64::max);
    let max_latency = p.latency.iter().copied().fold(0.0, f64::max);

    let target = scale_up_target(replicas, max_cpu, max_memory, c);
    if target <= replicas {
        return None;
    }

    let spike_time = now + ChronoDuration::minutes(first_breach as i64);
    let scheduled = (spike_time - ChronoDuration::minutes(lead_minutes)).max(now);
    let reasons = breaches(max_cpu, max_memory, max_latency, c);

    Some(Proposal {
        direction: ScaleDirection::ScaleUp,
        target_replicas: target,
        reason: format!(
            "Forecast breach in {} min: {}",
            first_breach,
            reasons.join(", ")
        ),
        confidence: prediction.confidence,
        urgency: Urgency::from_ratio(peak_ratio(max_cpu, max_memory, max_latency, c)),
        scheduled_time: Some(scheduled),
        policy: ScalingPolicy::Predictive,
    })
}

/// Time-of-day floor: double the minimum during business hours
///
/// Off-hours the service drops back to `min_replicas`, but only while it
/// is running inside its targets.
pub fn scheduled(
    metrics: &ServiceMetrics,
    c: &ScalingConstraints,
    now: DateTime<Utc>,
    hours: &BusinessHours,
) -> Option<Proposal> {
    let replicas = metrics.replicas;

    if hours.contains(now) {
        let floor = (c.min_replicas * 2).min(c.max_replicas);
        if replicas >= floor {
            return None;
        }
        let target = floor.min(replicas.saturating_add(c.max_scale_up_step));
        return Some(Proposal {
            direction: ScaleDirection::ScaleUp,
            target_replicas: target,
            reason: format!("Business hours floor of {} replicas", floor),
            confidence: 0.8,
            urgency: Urgency::Medium,
            scheduled_time: None,
            policy: ScalingPolicy::Scheduled,
        });
    }

    let within_targets = peak_ratio(metrics.cpu, metrics.memory, metrics.latency_ms, c) < 1.0;
    if replicas <= c.min_replicas || !within_targets {
        return None;
    }
    let target = replicas
        .saturating_sub(c.max_scale_down_step)
        .max(c.min_replicas);

    Some(Proposal {
        direction: ScaleDirection::ScaleDown,
        target_replicas: target,
        reason: "Outside business hours".to_string(),
        confidence: 0.7,
        urgency: Urgency::Low,
        scheduled_time: None,
        policy: ScalingPolicy::Scheduled,
    })
}
