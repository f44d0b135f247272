//! System status, performance report, dashboard and scaling commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, Dashboard, PerformanceReport, ScalingReport, SystemStatus};
use crate::output::{
    color_level, color_ratio, color_score, color_trend, format_currency, format_percent,
    print_heading, print_info, print_json, print_warning, render_table, OutputFormat,
};

/// Row for the per-service health table
#[derive(Tabled)]
struct HealthRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Overall")]
    overall: String,
    #[tabled(rename = "Perf")]
    performance: String,
    #[tabled(rename = "Reliab")]
    reliability: String,
    #[tabled(rename = "Avail")]
    availability: String,
    #[tabled(rename = "Scale")]
    scalability: String,
    #[tabled(rename = "Trend")]
    trend: String,
    #[tabled(rename = "Risks")]
    risks: usize,
}

/// Row for the per-service scaling table
#[derive(Tabled)]
struct ScalingRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Events")]
    events: usize,
    #[tabled(rename = "Up")]
    scale_ups: usize,
    #[tabled(rename = "Down")]
    scale_downs: usize,
    #[tabled(rename = "Failed")]
    failures: usize,
}

fn enabled(flag: bool) -> String {
    if flag {
        "enabled".green().to_string()
    } else {
        "disabled".dimmed().to_string()
    }
}

/// Show the optimizer's system status
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: SystemStatus = client.get("api/v1/status").await?;

    if let OutputFormat::Json = format {
        return print_json(&status);
    }

    print_heading("Fleet Optimizer Status");
    let initialized = if status.initialized {
        "yes".green()
    } else {
        "no".yellow()
    };
    println!("Initialized:            {}", initialized);
    println!("Services:               {}", status.services.join(", ").cyan());
    println!(
        "Automation level:       {}",
        color_ratio(status.automation_level)
    );
    println!();

    println!("{}", "Optimizations".bold());
    println!("{}", "-".repeat(50));
    println!("Predictive scaling:     {}", enabled(status.toggles.predictive_scaling));
    println!("Adaptive caching:       {}", enabled(status.toggles.adaptive_caching));
    println!("Predictive monitoring:  {}", enabled(status.toggles.predictive_monitoring));
    println!("Auto-remediation:       {}", enabled(status.auto_remediation));
    println!();

    println!("{}", "Components".bold());
    println!("{}", "-".repeat(50));
    println!(
        "Predictor:              {} services, {} trained, {} samples",
        status.predictor.services_tracked,
        status.predictor.trained_models,
        status.predictor.total_samples
    );
    println!(
        "Cache:                  {}/{} entries, hit ratio {}",
        status.cache.entries,
        status.cache.max_size,
        format_percent(status.cache.hit_ratio())
    );
    println!("Active alerts:          {}", status.active_alerts);
    println!("Pending scale actions:  {}", status.pending_scale_actions);

    match status.last_analysis_at {
        Some(at) => println!("Last analysis:          {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last analysis:          {}", "never".dimmed()),
    }

    Ok(())
}

/// Show the aggregated performance report
pub async fn show_report(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report: PerformanceReport = client.get("api/v1/report").await?;

    if let OutputFormat::Json = format {
        return print_json(&report);
    }

    print_heading("Performance Report");
    println!(
        "Generated:              {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "Automation level:       {}",
        color_ratio(report.automation_level)
    );
    println!();

    println!("{}", "Cache".bold());
    println!("{}", "-".repeat(50));
    println!(
        "Average hit rate:       {}",
        color_ratio(report.cache.average_hit_rate)
    );
    println!(
        "Average response time:  {:.1}ms",
        report.cache.average_response_time_ms
    );
    println!("Base TTL:               {}s", report.cache.base_ttl_ms / 1000);
    println!("Load level:             {}", report.cache.load);
    println!();

    println!("{}", "Scaling".bold());
    println!("{}", "-".repeat(50));
    println!("Events:                 {}", report.scaling.total_events);
    println!(
        "Success rate:           {}",
        color_ratio(report.scaling.success_rate)
    );
    println!(
        "Cost impact:            {}",
        format_currency(report.scaling.total_cost_impact)
    );
    println!();

    println!("{}", "Fleet Health".bold());
    println!("{}", "-".repeat(50));
    println!(
        "Healthy / at risk / critical: {} / {} / {}",
        report.overview.healthy.to_string().green(),
        report.overview.at_risk.to_string().yellow(),
        report.overview.critical.to_string().red()
    );
    println!("Predicted failures:     {}", report.overview.predicted_failures);

    if !report.insights.is_empty() {
        println!();
        println!("{}", "Insights".bold());
        println!("{}", "-".repeat(50));
        for insight in &report.insights {
            println!(
                "[{}] {}: {}",
                color_level(&insight.impact),
                insight.title,
                insight.description
            );
        }
    }

    if !report.recommendations.is_empty() {
        println!();
        println!("{}", "Recommendations".bold());
        println!("{}", "-".repeat(50));
        for recommendation in &report.recommendations {
            println!("  • {}", recommendation);
        }
    }

    Ok(())
}

/// Show the monitoring dashboard
pub async fn show_dashboard(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let dashboard: Dashboard = client.get("api/v1/dashboard").await?;

    if let OutputFormat::Json = format {
        return print_json(&dashboard);
    }

    print_heading("Fleet Dashboard");
    let overview = &dashboard.overview;
    println!(
        "{} services: {} healthy, {} at risk, {} critical",
        overview.total_services,
        overview.healthy.to_string().green(),
        overview.at_risk.to_string().yellow(),
        overview.critical.to_string().red()
    );
    println!(
        "{} active alerts, {} predicted failures",
        overview.active_alerts, overview.predicted_failures
    );
    println!();

    if dashboard.health_scores.is_empty() {
        print_warning("No health scores yet");
    } else {
        let rows: Vec<HealthRow> = dashboard
            .health_scores
            .values()
            .map(|score| HealthRow {
                service: score.service.clone(),
                overall: color_score(score.overall),
                performance: format!("{:.0}", score.components.performance),
                reliability: format!("{:.0}", score.components.reliability),
                availability: format!("{:.0}", score.components.availability),
                scalability: format!("{:.0}", score.components.scalability),
                trend: color_trend(&score.trend),
                risks: score.risk_factors.len(),
            })
            .collect();
        println!("{}", render_table(rows));
    }

    if !dashboard.alerts.is_empty() {
        println!();
        println!("{}", "Recent Alerts".bold());
        for alert in &dashboard.alerts {
            println!(
                "  [{}] {} {}",
                color_level(&alert.level),
                alert.service.cyan(),
                alert.title
            );
        }
    }

    if !dashboard.insights.is_empty() {
        println!();
        println!("{}", "Insights".bold());
        for insight in &dashboard.insights {
            println!(
                "  [{}] {} ({} confidence)",
                insight.insight_type,
                insight.title,
                format_percent(insight.confidence)
            );
        }
    }

    Ok(())
}

/// Show scaling performance
pub async fn show_scaling(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report: ScalingReport = client.get("api/v1/scaling").await?;

    if let OutputFormat::Json = format {
        return print_json(&report);
    }

    print_heading("Scaling Performance");
    println!("Total events:           {}", report.total_events);
    println!(
        "Successful / failed:    {} / {}",
        report.successful.to_string().green(),
        report.failed.to_string().red()
    );
    println!("Success rate:           {}", color_ratio(report.success_rate));
    println!("Average duration:       {:.0}ms", report.average_duration_ms);
    println!(
        "Cost impact:            {}",
        format_currency(report.total_cost_impact)
    );
    println!("Pending actions:        {}", report.pending_actions);
    println!();

    if report.per_service.is_empty() {
        print_info("No scaling events recorded");
    } else {
        let rows: Vec<ScalingRow> = report
            .per_service
            .iter()
            .map(|(service, summary)| ScalingRow {
                service: service.clone(),
                events: summary.events,
                scale_ups: summary.scale_ups,
                scale_downs: summary.scale_downs,
                failures: summary.failures,
            })
            .collect();
        println!("{}", render_table(rows));
    }

    for recommendation in &report.recommendations {
        print_warning(recommendation);
    }

    Ok(())
}
