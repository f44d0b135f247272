//! API client for communicating with the fleet optimizer daemon

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the optimizer HTTP API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }
}

// API response types. Only the fields the CLI renders are decoded; the
// JSON output re-serializes these slimmed views.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toggles {
    pub predictive_scaling: bool,
    pub adaptive_caching: bool,
    pub predictive_monitoring: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorStats {
    pub services_tracked: usize,
    pub trained_models: usize,
    pub total_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub max_size: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub initialized: bool,
    pub services: Vec<String>,
    pub automation_level: f64,
    pub toggles: Toggles,
    pub auto_remediation: bool,
    pub predictor: PredictorStats,
    pub cache: CacheStats,
    pub active_alerts: usize,
    pub pending_scale_actions: usize,
    pub last_analysis_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemOverview {
    pub total_services: usize,
    pub healthy: usize,
    pub at_risk: usize,
    pub critical: usize,
    pub active_alerts: usize,
    pub predicted_failures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub insight_type: String,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub confidence: f64,
    pub estimated_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePerformance {
    pub average_hit_rate: f64,
    pub average_response_time_ms: f64,
    pub base_ttl_ms: u64,
    pub load: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceScalingSummary {
    pub events: usize,
    pub scale_ups: usize,
    pub scale_downs: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingReport {
    pub total_events: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub total_cost_impact: f64,
    pub pending_actions: usize,
    #[serde(default)]
    pub per_service: BTreeMap<String, ServiceScalingSummary>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub automation_level: f64,
    pub cache: CachePerformance,
    pub scaling: ScalingReport,
    pub overview: SystemOverview,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthComponents {
    pub performance: f64,
    pub reliability: f64,
    pub availability: f64,
    pub scalability: f64,
    pub security: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    pub service: String,
    pub overall: f64,
    pub components: HealthComponents,
    pub trend: String,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub service: String,
    pub alert_type: String,
    pub level: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub health_scores: BTreeMap<String, HealthScore>,
    pub alerts: Vec<Alert>,
    pub insights: Vec<Insight>,
    pub overview: SystemOverview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedSeries {
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
    pub requests: Vec<f64>,
    pub latency: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub anomaly_type: String,
    pub metric: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePrediction {
    pub service: String,
    pub predictions: PredictedSeries,
    pub confidence: f64,
    pub horizon_minutes: usize,
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub id: String,
    pub acknowledged: bool,
}
