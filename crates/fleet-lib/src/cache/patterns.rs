//! Per-key access pattern tracking
//!
//! Access timestamps drive next-access forecasts for warming, per-key
//! prediction accuracy for TTL tuning, and the eviction score.

use crate::analysis::{coefficient_of_variation, mean};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum access timestamps retained per key
pub const MAX_ACCESS_TIMES: usize = 100;

/// Accesses required before a next-access forecast is made
pub const MIN_ACCESSES_FOR_FORECAST: usize = 3;

/// Observed reads of one cache key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPattern {
    pub key: String,
    pub access_times: VecDeque<DateTime<Utc>>,
    pub hit_count: u64,
    pub last_access: DateTime<Utc>,
    pub predicted_next_access: Option<DateTime<Utc>>,
}

impl AccessPattern {
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            access_times: VecDeque::new(),
            hit_count: 0,
            last_access: now,
            predicted_next_access: None,
        }
    }

    /// Record a read hit and refresh the next-access forecast
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        if self.access_times.len() >= MAX_ACCESS_TIMES {
            self.access_times.pop_front();
        }
        self.access_times.push_back(now);
        self.hit_count += 1;
        self.last_access = now;

        self.predicted_next_access = if self.access_times.len() >= MIN_ACCESSES_FOR_FORECAST {
            self.mean_interval_secs()
                .map(|secs| now + chrono::Duration::milliseconds((secs * 1000.0) as i64))
        } else {
            None
        };
    }

    /// Gaps between consecutive accesses, in seconds
    pub fn intervals_secs(&self) -> Vec<f64> {
        self.access_times
            .iter()
            .zip(self.access_times.iter().skip(1))
            .map(|(a, b)| (*b - *a).num_milliseconds() as f64 / 1000.0)
            .collect()
    }

    pub fn mean_interval_secs(&self) -> Option<f64> {
        let intervals = self.intervals_secs();
        if intervals.is_empty() {
            None
        } else {
            Some(mean(&intervals))
        }
    }

    /// Regularity of access: `clamp(1 - CV(intervals), 0.1, 0.9)`
    pub fn forecast_confidence(&self) -> f64 {
        (1.0 - coefficient_of_variation(&self.intervals_secs())).clamp(0.1, 0.9)
    }

    /// How close an access landed to the forecast, in `[0, 1]`
    ///
    /// `None` when there was no forecast or no usable interval.
    pub fn accuracy_of(&self, actual: DateTime<Utc>) -> Option<f64> {
        let predicted = self.predicted_next_access?;
        let interval = self.mean_interval_secs().filter(|m| *m > 0.0)?;
        let error = (actual - predicted).num_milliseconds().abs() as f64 / 1000.0;
        Some((1.0 - error / interval).clamp(0.0, 1.0))
    }

    /// Retention value; the lowest scoring keys are evicted first
    ///
    /// `1/(recency+1) + ln(frequency+1) + 1/mean_interval`, seconds throughout.
    pub fn eviction_score(&self, now: DateTime<Utc>) -> f64 {
        let recency = ((now - self.last_access).num_milliseconds().max(0) as f64) / 1000.0;
        let frequency = self.hit_count as f64;
        let regularity = match self.mean_interval_secs() {
            Some(m) if m > 0.0 => 1.0 / m,
            _ => 0.0,
        };
        1.0 / (recency + 1.0) + (frequency + 1.0).ln() + regularity
    }
}

/// Running mean of forecast accuracy for one key
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KeyAccuracy {
    total: f64,
    samples: u64,
}

impl KeyAccuracy {
    pub fn record(&mut self, accuracy: f64) {
        self.total += accuracy;
        self.samples += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples == 0 {
            None
        } else {
            Some(self.total / self.samples as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn accessed_every(secs: i64, count: usize, start: DateTime<Utc>) -> AccessPattern {
        let mut pattern = AccessPattern::new("k", start);
        for i in 0..count {
            pattern.record_access(start + ChronoDuration::seconds(secs * i as i64));
        }
        pattern
    }

    #[test]
    fn test_forecast_after_three_accesses() {
        let start = Utc::now();
        let two = accessed_every(60, 2, start);
        assert!(two.predicted_next_access.is_none());

        let three = accessed_every(60, 3, start);
        assert_eq!(
            three.predicted_next_access,
            Some(start + ChronoDuration::seconds(180))
        );
        assert!((three.forecast_confidence() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_access_times_bounded() {
        let pattern = accessed_every(1, 150, Utc::now());
        assert_eq!(pattern.access_times.len(), MAX_ACCESS_TIMES);
        assert_eq!(pattern.hit_count, 150);
    }

    #[test]
    fn test_accuracy_of_on_time_access() {
        let start = Utc::now();
        let pattern = accessed_every(60, 4, start);
        let predicted = start + ChronoDuration::seconds(240);
        assert_eq!(pattern.accuracy_of(predicted), Some(1.0));
        assert_eq!(
            pattern.accuracy_of(predicted + ChronoDuration::seconds(30)),
            Some(0.5)
        );
        assert_eq!(
            pattern.accuracy_of(predicted + ChronoDuration::seconds(600)),
            Some(0.0)
        );
    }

    #[test]
    fn test_eviction_score_prefers_hot_keys() {
        let start = Utc::now();
        let hot = accessed_every(5, 20, start);
        let cold = accessed_every(600, 2, start - ChronoDuration::hours(2));
        let now = start + ChronoDuration::seconds(100);
        assert!(hot.eviction_score(now) > cold.eviction_score(now));
    }

    #[test]
    fn test_key_accuracy_running_mean() {
        let mut acc = KeyAccuracy::default();
        assert!(acc.mean().is_none());
        acc.record(1.0);
        acc.record(0.5);
        assert_eq!(acc.mean(), Some(0.75));
    }
}
