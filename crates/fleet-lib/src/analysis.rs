//! Time series analysis toolkit
//!
//! Stateless numeric helpers used by the predictor, cache, scaler and
//! monitor: moving averages, exponential smoothing, additive decomposition,
//! z-score anomaly detection, least-squares trend and Pearson correlation.

use serde::{Deserialize, Serialize};

/// Default smoothing factor for exponential smoothing
pub const DEFAULT_ALPHA: f64 = 0.3;

/// Default seasonal period (hourly samples over a day)
pub const DEFAULT_PERIOD: usize = 24;

/// Default z-score threshold for anomaly detection
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.0;

/// Additive decomposition of a series
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

/// Arithmetic mean (0 for an empty slice)
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population variance (0 for an empty slice)
pub fn variance(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / data.len() as f64
}

/// Population standard deviation
pub fn std_dev(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Ratio of standard deviation to mean (0 when the mean is zero)
pub fn coefficient_of_variation(data: &[f64]) -> f64 {
    let m = mean(data);
    if m.abs() < f64::EPSILON {
        return 0.0;
    }
    std_dev(data) / m
}

/// Trailing-window arithmetic means
///
/// Returns `len - window + 1` values, or an empty vector when the window
/// does not fit the data.
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window > data.len() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(data.len() - window + 1);
    let mut sum: f64 = data[..window].iter().sum();
    result.push(sum / window as f64);

    for i in window..data.len() {
        sum += data[i] - data[i - window];
        result.push(sum / window as f64);
    }

    result
}

/// Simple exponential smoothing; output has the same length as the input
pub fn exponential_smoothing(data: &[f64], alpha: f64) -> Vec<f64> {
    let mut smoothed = Vec::with_capacity(data.len());
    let Some(&first) = data.first() else {
        return smoothed;
    };

    smoothed.push(first);
    for value in &data[1..] {
        let prev = smoothed[smoothed.len() - 1];
        smoothed.push(prev + alpha * (value - prev));
    }
    smoothed
}

/// Additive trend/seasonal/residual decomposition
///
/// Series shorter than `period` are decomposed with a period equal to their
/// length. Where moving-average coverage runs short, the last trend value
/// is reused.
pub fn decompose(data: &[f64], period: usize) -> Decomposition {
    if data.is_empty() || period == 0 {
        return Decomposition::default();
    }

    let period = period.min(data.len());
    let trend = moving_average(data, period);
    let trend_at = |i: usize| trend[i.min(trend.len() - 1)];

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, value) in data.iter().enumerate() {
        sums[i % period] += value - trend_at(i);
        counts[i % period] += 1;
    }
    let seasonal: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(sum, count)| if *count > 0 { sum / *count as f64 } else { 0.0 })
        .collect();

    let residual = data
        .iter()
        .enumerate()
        .map(|(i, value)| value - trend_at(i) - seasonal[i % period])
        .collect();

    Decomposition {
        trend,
        seasonal,
        residual,
    }
}

/// Indices whose z-score exceeds `threshold`
pub fn detect_anomalies(data: &[f64], threshold: f64) -> Vec<usize> {
    let sd = std_dev(data);
    if sd < f64::EPSILON {
        return Vec::new();
    }
    let m = mean(data);

    data.iter()
        .enumerate()
        .filter(|(_, v)| ((*v - m).abs() / sd) > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Least-squares slope of value against index
pub fn calculate_trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}

/// Pearson correlation of two parallel series
///
/// Mismatched lengths, fewer than two points and zero variance all yield 0.
pub fn calculate_correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return 0.0;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }
    cov / denom
}
