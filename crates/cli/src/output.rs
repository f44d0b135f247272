//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render rows as a rounded table
pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a section heading with an underline
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(50));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a 0.0-1.0 ratio as a percentage
pub fn format_percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

/// Format currency
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

/// Color a severity or level label
pub fn color_level(level: &str) -> String {
    match level.to_lowercase().as_str() {
        "critical" | "error" | "high" => level.red().to_string(),
        "warning" | "medium" => level.yellow().to_string(),
        "info" | "low" => level.blue().to_string(),
        _ => level.to_string(),
    }
}

/// Color a health trend label
pub fn color_trend(trend: &str) -> String {
    match trend.to_lowercase().as_str() {
        "improving" => trend.green().to_string(),
        "degrading" => trend.red().to_string(),
        _ => trend.to_string(),
    }
}

/// Color a 0-100 health score
pub fn color_score(score: f64) -> String {
    let formatted = format!("{:.0}", score);
    if score > 70.0 {
        formatted.green().to_string()
    } else if score > 40.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color a confidence or success ratio
pub fn color_ratio(ratio: f64) -> String {
    let formatted = format_percent(ratio);
    if ratio >= 0.8 {
        formatted.green().to_string()
    } else if ratio >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
