//! Predictive alert commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{AckResponse, Alert, ApiClient};
use crate::output::{color_level, print_json, print_success, print_warning, render_table, OutputFormat};

/// Row for the alerts table
#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Type")]
    alert_type: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Raised")]
    timestamp: String,
    #[tabled(rename = "Ack")]
    acknowledged: String,
}

/// List alerts, optionally only unacknowledged ones
pub async fn list_alerts(
    client: &ApiClient,
    active_only: bool,
    service: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/alerts?active={}", active_only);
    let alerts: Vec<Alert> = client.get(&path).await?;

    let filtered: Vec<Alert> = alerts
        .into_iter()
        .filter(|a| service.as_ref().map(|s| &a.service == s).unwrap_or(true))
        .collect();

    match format {
        OutputFormat::Json => print_json(&filtered)?,
        OutputFormat::Table => {
            if filtered.is_empty() {
                print_warning("No alerts found");
                return Ok(());
            }

            let rows: Vec<AlertRow> = filtered
                .iter()
                .map(|a| AlertRow {
                    id: a.id.clone(),
                    service: a.service.clone(),
                    alert_type: a.alert_type.clone(),
                    level: color_level(&a.level),
                    title: a.title.clone(),
                    timestamp: a.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                    acknowledged: if a.acknowledged { "yes" } else { "no" }.to_string(),
                })
                .collect();

            println!("{}", render_table(rows));
            println!("\nTotal: {} alerts", filtered.len());
        }
    }

    Ok(())
}

/// Acknowledge an alert by id
pub async fn acknowledge_alert(client: &ApiClient, id: &str, format: OutputFormat) -> Result<()> {
    let path = format!("api/v1/alerts/{}/ack", id);
    let response: AckResponse = client.post(&path, &()).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_success(&format!("Alert {} acknowledged", response.id)),
    }

    Ok(())
}
