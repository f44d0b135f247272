//! Lightweight additive forecasting model
//!
//! One model per metric family: a least-squares trend, the last
//! exponentially smoothed level, and a seasonal component from an additive
//! decomposition. Forecasts are `level + seasonal[i mod period]`, floored at
//! zero.

use crate::analysis::{calculate_trend, decompose, exponential_smoothing};
use crate::models::{MetricKind, PredictedSeries, ResourceMetric};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Trained components for a single metric
#[derive(Debug, Clone)]
pub struct MetricModel {
    pub trend: f64,
    pub last_smoothed: f64,
    pub seasonal: Vec<f64>,
}

impl MetricModel {
    /// Fit the model to a raw series; `None` when the series is empty
    pub fn fit(values: &[f64], alpha: f64, period: usize) -> Option<Self> {
        let smoothed = exponential_smoothing(values, alpha);
        let last_smoothed = *smoothed.last()?;
        let parts = decompose(values, period);

        Some(Self {
            trend: calculate_trend(values),
            last_smoothed,
            seasonal: parts.seasonal,
        })
    }

    /// Forecast `horizon` steps ahead
    pub fn forecast(&self, horizon: usize) -> Vec<f64> {
        (0..horizon)
            .map(|i| {
                let seasonal = if self.seasonal.is_empty() {
                    0.0
                } else {
                    self.seasonal[i % self.seasonal.len()]
                };
                (self.last_smoothed + seasonal).max(0.0)
            })
            .collect()
    }
}

/// Trained model for all tracked metrics of one service
#[derive(Debug, Clone)]
pub struct ServiceModel {
    pub metrics: HashMap<MetricKind, MetricModel>,
    pub trained_at: DateTime<Utc>,
    pub samples_used: usize,
}

impl ServiceModel {
    /// Train from a history snapshot
    pub fn train(
        history: &[ResourceMetric],
        alpha: f64,
        period: usize,
        trained_at: DateTime<Utc>,
    ) -> Option<Self> {
        let mut metrics = HashMap::new();
        for kind in MetricKind::ALL {
            let values: Vec<f64> = history.iter().map(|m| kind.extract(m)).collect();
            metrics.insert(kind, MetricModel::fit(&values, alpha, period)?);
        }

        Some(Self {
            metrics,
            trained_at,
            samples_used: history.len(),
        })
    }

    /// Forecast every metric family
    pub fn forecast(&self, horizon: usize) -> PredictedSeries {
        let mut series = PredictedSeries::default();
        for kind in MetricKind::ALL {
            if let Some(model) = self.metrics.get(&kind) {
                *series.series_mut(kind) = model.forecast(horizon);
            }
        }
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_constant_series() {
        let model = MetricModel::fit(&[50.0; 30], 0.3, 24).unwrap();
        assert!(model.trend.abs() < 1e-9);
        assert!((model.last_smoothed - 50.0).abs() < 1e-9);
        let forecast = model.forecast(60);
        assert_eq!(forecast.len(), 60);
        assert!(forecast.iter().all(|v| (v - 50.0).abs() < 1e-6));
    }

    #[test]
    fn test_forecast_floored_at_zero() {
        let model = MetricModel {
            trend: -1.0,
            last_smoothed: 1.0,
            seasonal: vec![-5.0, 2.0],
        };
        assert_eq!(model.forecast(4), vec![0.0, 3.0, 0.0, 3.0]);
    }

    #[test]
    fn test_fit_empty_series() {
        assert!(MetricModel::fit(&[], 0.3, 24).is_none());
    }
}
