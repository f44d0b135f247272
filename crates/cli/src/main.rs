//! Fleet optimizer CLI
//!
//! A command-line tool for querying forecasts, health, alerts and
//! scaling activity from a running fleet optimizer.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alerts, predictions, status};

/// Fleet optimizer CLI
#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about = "CLI for the MCP Fleet Optimizer", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FLEET_API_URL env var)
    #[arg(long, env = "FLEET_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show optimizer status and component statistics
    Status,

    /// Show the aggregated performance report
    Report,

    /// Show the monitoring dashboard with per-service health
    Dashboard,

    /// Show resource forecasts per service
    Predictions {
        /// Forecast horizon in minutes (1-1440)
        #[arg(long)]
        horizon: Option<usize>,

        /// Only show this service
        #[arg(long, short)]
        service: Option<String>,
    },

    /// Inspect and acknowledge predictive alerts
    #[command(subcommand)]
    Alerts(AlertCommands),

    /// Show scaling performance and audit summary
    Scaling,
}

#[derive(Subcommand)]
pub enum AlertCommands {
    /// List alerts
    List {
        /// Show only unacknowledged alerts
        #[arg(long)]
        active: bool,

        /// Only show alerts for this service
        #[arg(long, short)]
        service: Option<String>,
    },

    /// Acknowledge an alert
    Ack {
        /// Alert ID to acknowledge
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Status => status::show_status(&client, cli.format).await?,
        Commands::Report => status::show_report(&client, cli.format).await?,
        Commands::Dashboard => status::show_dashboard(&client, cli.format).await?,
        Commands::Scaling => status::show_scaling(&client, cli.format).await?,
        Commands::Predictions { horizon, service } => {
            predictions::show_predictions(&client, horizon, service, cli.format).await?;
        }
        Commands::Alerts(alert_cmd) => match alert_cmd {
            AlertCommands::List { active, service } => {
                alerts::list_alerts(&client, active, service, cli.format).await?;
            }
            AlertCommands::Ack { id } => {
                alerts::acknowledge_alert(&client, &id, cli.format).await?;
            }
        },
    }

    Ok(())
}
