//! Anomaly surfacing on forecast series

use crate::analysis::calculate_trend;
use crate::models::{AnomalyDetection, AnomalySeverity, AnomalyType, MetricKind, PredictedSeries};
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Predicted CPU above this is a spike
pub const CPU_SPIKE_THRESHOLD: f64 = 80.0;

/// Predicted CPU at or above this makes a spike high severity
pub const CPU_SPIKE_HIGH_THRESHOLD: f64 = 95.0;

/// Minimum predicted memory slope (percent per minute) for a trend anomaly
pub const MEMORY_SLOPE_THRESHOLD: f64 = 0.5;

/// Predicted memory ceiling for a trend anomaly
pub const MEMORY_MAX_THRESHOLD: f64 = 80.0;

/// Latency above this counts as degraded
pub const LATENCY_THRESHOLD_MS: f64 = 1000.0;

/// Fraction of degraded latency samples that raises an anomaly
pub const LATENCY_DEGRADED_FRACTION: f64 = 0.3;

/// Scan a forecast for spike, trend and latency anomalies
pub fn detect(series: &PredictedSeries, now: DateTime<Utc>) -> Vec<AnomalyDetection> {
    let mut anomalies = Vec::new();

    if let Some(anomaly) = cpu_spike(&series.cpu, now) {
        anomalies.push(anomaly);
    }
    if let Some(anomaly) = memory_trend(&series.memory, now) {
        anomalies.push(anomaly);
    }
    if let Some(anomaly) = latency_degradation(&series.latency, now) {
        anomalies.push(anomaly);
    }

    anomalies
}

fn minutes_ahead(now: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    now + ChronoDuration::minutes(index as i64)
}

fn cpu_spike(cpu: &[f64], now: DateTime<Utc>) -> Option<AnomalyDetection> {
    let first = cpu.iter().position(|v| *v > CPU_SPIKE_THRESHOLD)?;
    let max = cpu.iter().copied().fold(0.0, f64::max);

    let severity = if max >= CPU_SPIKE_HIGH_THRESHOLD {
        AnomalySeverity::High
    } else {
        AnomalySeverity::Medium
    };

    Some(AnomalyDetection {
        anomaly_type: AnomalyType::Spike,
        metric: MetricKind::Cpu,
        severity,
        probability: 0.85,
        expected_time: minutes_ahead(now, first),
        recommendation: format!(
            "CPU expected to reach {:.1}%; add replicas before the spike",
            max
        ),
    })
}

fn memory_trend(memory: &[f64], now: DateTime<Utc>) -> Option<AnomalyDetection> {
    let slope = calculate_trend(memory);
    let max = memory.iter().copied().fold(0.0, f64::max);
    if slope <= MEMORY_SLOPE_THRESHOLD || max <= MEMORY_MAX_THRESHOLD {
        return None;
    }

    let first = memory
        .iter()
        .position(|v| *v > MEMORY_MAX_THRESHOLD)
        .unwrap_or(0);

    Some(AnomalyDetection {
        anomaly_type: AnomalyType::Trend,
        metric: MetricKind::Memory,
        severity: if max > 90.0 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        },
        probability: 0.75,
        expected_time: minutes_ahead(now, first),
        recommendation: format!(
            "Memory rising {:.2}%/min toward {:.1}%; check for leaks or raise limits",
            slope, max
        ),
    })
}

fn latency_degradation(latency: &[f64], now: DateTime<Utc>) -> Option<AnomalyDetection> {
    if latency.is_empty() {
        return None;
    }
    let degraded = latency.iter().filter(|v| **v > LATENCY_THRESHOLD_MS).count();
    let fraction = degraded as f64 / latency.len() as f64;
    if fraction <= LATENCY_DEGRADED_FRACTION {
        return None;
    }

    let first = latency
        .iter()
        .position(|v| *v > LATENCY_THRESHOLD_MS)
        .unwrap_or(0);

    Some(AnomalyDetection {
        anomaly_type: AnomalyType::Pattern,
        metric: MetricKind::Latency,
        severity: if fraction > 0.6 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Medium
        },
        probability: 0.9,
        expected_time: minutes_ahead(now, first),
        recommendation: format!(
            "{:.0}% of forecast latency exceeds {}ms; investigate slow dependencies",
            fraction * 100.0,
            LATENCY_THRESHOLD_MS
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(cpu: f64, memory: Vec<f64>, latency: f64) -> PredictedSeries {
        PredictedSeries {
            cpu: vec![cpu; 60],
            requests: vec![100.0; memory.len()],
            latency: vec![latency; 60],
            memory,
        }
    }

    #[test]
    fn test_quiet_forecast() {
        let s = series(40.0, vec![50.0; 60], 200.0);
        assert!(detect(&s, Utc::now()).is_empty());
    }

    #[test]
    fn test_cpu_spike_severity() {
        let now = Utc::now();
        let high = detect(&series(95.0, vec![50.0; 60], 200.0), now);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].anomaly_type, AnomalyType::Spike);
        assert_eq!(high[0].severity, AnomalySeverity::High);
        assert_eq!(high[0].expected_time, now);

        let medium = detect(&series(85.0, vec![50.0; 60], 200.0), now);
        assert_eq!(medium[0].severity, AnomalySeverity::Medium);
    }

    #[test]
    fn test_memory_trend() {
        let memory: Vec<f64> = (0..60).map(|i| 60.0 + i as f64).collect();
        let found = detect(&series(40.0, memory, 200.0), Utc::now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metric, MetricKind::Memory);
        assert_eq!(found[0].severity, AnomalySeverity::High);
    }

    #[test]
    fn test_latency_degradation() {
        let found = detect(&series(40.0, vec![50.0; 60], 1500.0), Utc::now());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metric, MetricKind::Latency);
        assert!((found[0].probability - 0.9).abs() < 1e-9);
    }
}
