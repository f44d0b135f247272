//! Resource forecast commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ServicePrediction};
use crate::output::{color_level, color_ratio, print_json, print_warning, render_table, OutputFormat};

/// Row for the forecast summary table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Horizon")]
    horizon: String,
    #[tabled(rename = "CPU peak")]
    cpu_peak: String,
    #[tabled(rename = "Mem peak")]
    memory_peak: String,
    #[tabled(rename = "Req/min peak")]
    requests_peak: String,
    #[tabled(rename = "Latency avg")]
    latency_mean: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Anomalies")]
    anomalies: String,
}

fn peak(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Show per-service forecasts over the given horizon
pub async fn show_predictions(
    client: &ApiClient,
    horizon: Option<usize>,
    service: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let path = match horizon {
        Some(h) => format!("api/v1/predictions?horizon={}", h),
        None => "api/v1/predictions".to_string(),
    };
    let predictions: Vec<ServicePrediction> = client.get(&path).await?;

    let filtered: Vec<ServicePrediction> = predictions
        .into_iter()
        .filter(|p| service.as_ref().map(|s| &p.service == s).unwrap_or(true))
        .collect();

    match format {
        OutputFormat::Json => print_json(&filtered)?,
        OutputFormat::Table => {
            if filtered.is_empty() {
                print_warning("No predictions available (services need history first)");
                return Ok(());
            }

            let rows: Vec<PredictionRow> = filtered
                .iter()
                .map(|p| {
                    let series = &p.predictions;
                    let anomalies = if p.anomalies.is_empty() {
                        "-".to_string()
                    } else {
                        p.anomalies
                            .iter()
                            .map(|a| {
                                format!(
                                    "{} {} ({})",
                                    a.metric,
                                    a.anomaly_type,
                                    color_level(&a.severity)
                                )
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    PredictionRow {
                        service: p.service.clone(),
                        horizon: format!("{}m", p.horizon_minutes),
                        cpu_peak: format!("{:.1}%", peak(&series.cpu)),
                        memory_peak: format!("{:.1}%", peak(&series.memory)),
                        requests_peak: format!("{:.0}", peak(&series.requests)),
                        latency_mean: format!("{:.0}ms", mean(&series.latency)),
                        confidence: color_ratio(p.confidence),
                        anomalies,
                    }
                })
                .collect();

            println!("{}", render_table(rows));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_and_mean() {
        assert_eq!(peak(&[10.0, 42.5, 7.0]), 42.5);
        assert_eq!(peak(&[]), 0.0);
        assert_eq!(mean(&[10.0, 20.0]), 15.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
