//! Optimization orchestrator
//!
//! Owns the predictor, cache, scaler and monitor, wires them together,
//! runs their periodic tasks and produces fleet-wide status and reports.

use crate::cache::{AdaptiveCache, CachePerformanceReport, CacheStats, CacheTuning};
use crate::clock::SharedClock;
use crate::config::OptimizerConfig;
use crate::error::{FleetError, Result};
use crate::health::{
    assess_cache, assess_monitor, assess_predictor, assess_scaler, Component, ComponentStatus,
    HealthRegistry, LOW_CACHE_HIT_RATE, LOW_PREDICTION_CONFIDENCE, LOW_SCALING_SUCCESS_RATE,
    SCALER_FAILURE_STREAK,
};
use crate::models::{LoadLevel, ResourceMetric, ServiceMetrics};
use crate::monitor::{
    insight, AlertNotifier, InsightType, PredictiveMonitor, Rating, SystemInsight, SystemOverview,
    TracingNotifier,
};
use crate::observability::{OptimizerMetrics, StructuredLogger};
use crate::predictor::{aggregate_predictions, PredictorStats, ResourcePredictor, SystemLoadPrediction};
use crate::scaler::{AutoScaler, InfrastructureController, LoggingController, ScalingPerformanceReport};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Synthetic samples seeded per service at startup
pub const WARMUP_SAMPLES: usize = 144;

/// Cross-cutting insights retained by the orchestrator
pub const MAX_INTEGRATED_INSIGHTS: usize = 100;

/// Which optimization loops run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationToggles {
    pub predictive_scaling: bool,
    pub adaptive_caching: bool,
    pub predictive_monitoring: bool,
}

impl Default for OptimizationToggles {
    fn default() -> Self {
        Self {
            predictive_scaling: true,
            adaptive_caching: true,
            predictive_monitoring: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Services known at startup
    pub services: Vec<String>,
    pub integrated_interval_secs: u64,
    /// Seed synthetic history so forecasts exist immediately
    pub seed_warmup_history: bool,
    pub toggles: OptimizationToggles,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            services: ["filesystem", "database", "search", "email", "calendar"]
                .into_iter()
                .map(String::from)
                .collect(),
            integrated_interval_secs: 300,
            seed_warmup_history: true,
            toggles: OptimizationToggles::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.integrated_interval_secs == 0 {
            return Err(FleetError::invalid_config(
                "orchestrator.integrated_interval_secs must be positive",
            ));
        }
        if self.services.iter().any(|s| s.trim().is_empty()) {
            return Err(FleetError::invalid_config(
                "orchestrator.services must not contain empty names",
            ));
        }
        Ok(())
    }
}

/// Output of one integrated analysis tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratedAnalysis {
    pub timestamp: DateTime<Utc>,
    pub services_reporting: usize,
    pub load: LoadLevel,
    pub system_load: Option<SystemLoadPrediction>,
    pub mean_confidence: Option<f64>,
    pub cache_hit_rate: Option<f64>,
    pub scaling_success_rate: f64,
    pub insights: Vec<SystemInsight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub initialized: bool,
    pub services: Vec<String>,
    pub automation_level: f64,
    pub toggles: OptimizationToggles,
    pub auto_remediation: bool,
    pub predictor: PredictorStats,
    pub cache: CacheStats,
    pub active_alerts: usize,
    pub pending_scale_actions: usize,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub automation_level: f64,
    pub system_load: Option<SystemLoadPrediction>,
    pub cache: CachePerformanceReport,
    pub scaling: ScalingPerformanceReport,
    pub overview: SystemOverview,
    pub insights: Vec<SystemInsight>,
    pub recommendations: Vec<String>,
}

struct RunningTasks {
    shutdown: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

/// Owner of every optimization component
pub struct Orchestrator {
    config: OptimizerConfig,
    clock: SharedClock,
    predictor: Arc<ResourcePredictor>,
    cache: Arc<AdaptiveCache<serde_json::Value>>,
    scaler: Arc<AutoScaler>,
    monitor: Arc<PredictiveMonitor>,
    health: HealthRegistry,
    tasks: Mutex<Option<RunningTasks>>,
    initialized: RwLock<bool>,
    insights: RwLock<VecDeque<SystemInsight>>,
    last_analysis: RwLock<Option<IntegratedAnalysis>>,
    metrics: OptimizerMetrics,
    logger: StructuredLogger,
}

impl Orchestrator {
    /// Build all components with logging-only infrastructure seams
    pub fn new(config: OptimizerConfig, clock: SharedClock) -> Result<Self> {
        Self::with_seams(
            config,
            clock,
            Arc::new(LoggingController),
            Arc::new(TracingNotifier),
        )
    }

    /// Build all components around the given controller and notifier
    pub fn with_seams(
        config: OptimizerConfig,
        clock: SharedClock,
        controller: Arc<dyn InfrastructureController>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Result<Self> {
        config.validate()?;

        let predictor = Arc::new(ResourcePredictor::new(config.predictor.clone(), clock.clone())?);
        let cache = Arc::new(AdaptiveCache::new(config.cache.clone(), clock.clone())?);
        let scaler = Arc::new(
            AutoScaler::new(config.scaler.clone(), clock.clone())?
                .with_predictor(predictor.clone())
                .with_controller(controller.clone()),
        );
        let monitor = Arc::new(
            PredictiveMonitor::new(config.monitor.clone(), predictor.clone(), clock.clone())?
                .with_scaler(scaler.clone())
                .with_controller(controller)
                .with_notifier(notifier),
        );
        let health = HealthRegistry::new(clock.clone());

        Ok(Self {
            config,
            clock,
            predictor,
            cache,
            scaler,
            monitor,
            health,
            tasks: Mutex::new(None),
            initialized: RwLock::new(false),
            insights: RwLock::new(VecDeque::new()),
            last_analysis: RwLock::new(None),
            metrics: OptimizerMetrics::new(),
            logger: StructuredLogger::new("orchestrator"),
        })
    }

    pub fn predictor(&self) -> &Arc<ResourcePredictor> {
        &self.predictor
    }

    pub fn cache(&self) -> &Arc<AdaptiveCache<serde_json::Value>> {
        &self.cache
    }

    pub fn scaler(&self) -> &Arc<AutoScaler> {
        &self.scaler
    }

    pub fn monitor(&self) -> &Arc<PredictiveMonitor> {
        &self.monitor
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// One-time setup; later calls are no-ops
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if *self.initialized.read().await {
            debug!("Orchestrator already initialized");
            return Ok(());
        }

        let constraints = self.config.scaler.default_constraints.clone();
        for service in &self.config.orchestrator.services {
            self.scaler.set_constraints(service, constraints.clone()).await?;
            if self.config.orchestrator.seed_warmup_history {
                self.seed_history(service).await;
            }
        }

        let tuning = if self.config.orchestrator.toggles.adaptive_caching {
            self.config.cache.tuning
        } else {
            CacheTuning::all_disabled()
        };
        self.cache.set_tuning(tuning).await;

        *tasks = Some(self.spawn_tasks());
        *self.initialized.write().await = true;
        self.health.set_ready(true).await;

        self.logger
            .log_startup(env!("CARGO_PKG_VERSION"), self.config.orchestrator.services.len());
        Ok(())
    }

    /// Synthetic daily-shaped history ending now; skipped for services with data
    async fn seed_history(&self, service: &str) {
        if self.predictor.history_len(service).await > 0 {
            debug!(service = %service, "Service has history, skipping warm-up seed");
            return;
        }
        let now = self.clock.now();
        for i in 0..WARMUP_SAMPLES {
            let wave = (i as f64 / 24.0).sin();
            let metric = ResourceMetric {
                timestamp: now - ChronoDuration::minutes((WARMUP_SAMPLES - i) as i64),
                cpu: 50.0 + 20.0 * wave,
                memory: 45.0 + 10.0 * wave,
                requests_per_minute: 100.0 + 40.0 * wave,
                latency_ms: 150.0 + 30.0 * wave,
                errors_per_minute: 0.5,
            };
            self.predictor.add_historical_data(service, metric).await;
        }
        self.predictor.train(service).await;
        debug!(service = %service, samples = WARMUP_SAMPLES, "Seeded warm-up history");
    }

    fn spawn_tasks(self: &Arc<Self>) -> RunningTasks {
        let (shutdown, _) = broadcast::channel(1);
        let toggles = self.config.orchestrator.toggles;
        let mut handles = Vec::new();

        if toggles.adaptive_caching {
            handles.push(tokio::spawn(self.cache.clone().run_sampler(shutdown.subscribe())));
            handles.push(tokio::spawn(self.cache.clone().run_warmer(shutdown.subscribe())));
        }
        if toggles.predictive_scaling {
            handles.push(tokio::spawn(self.scaler.clone().run(shutdown.subscribe())));
        }
        if toggles.predictive_monitoring {
            handles.push(tokio::spawn(self.monitor.clone().run(shutdown.subscribe())));
        }
        handles.push(tokio::spawn(self.clone().run_integrated(shutdown.subscribe())));

        info!(tasks = handles.len(), "Started optimization tasks");
        RunningTasks { shutdown, handles }
    }

    /// Feed a live sample to the predictor and the scaler
    pub async fn ingest(&self, service: &str, metrics: ServiceMetrics) {
        self.predictor
            .add_historical_data(service, metrics.to_resource_metric())
            .await;
        self.scaler.add_metrics(service, metrics).await;
    }

    /// Enabled toggles over all toggles, auto-remediation included
    pub async fn automation_level(&self) -> f64 {
        let toggles = self.config.orchestrator.toggles;
        let remediation = self.monitor.config().await.auto_remediation;
        let flags = [
            toggles.predictive_scaling,
            toggles.adaptive_caching,
            toggles.predictive_monitoring,
            remediation,
        ];
        flags.iter().filter(|f| **f).count() as f64 / flags.len() as f64
    }

    /// Cross-component analysis tick
    pub async fn integrated_analysis(&self) -> IntegratedAnalysis {
        let now = self.clock.now();

        let mut current_cpu = Vec::new();
        for service in self.scaler.services().await {
            if let Some(latest) = self.scaler.latest_metrics(&service).await {
                current_cpu.push(latest.cpu);
            }
        }

        let horizon = self.config.predictor.default_horizon_minutes;
        let predictions = self.predictor.predict_all_services(horizon).await;
        let system_load = aggregate_predictions(&predictions, horizon, now);
        let mean_confidence = system_load.as_ref().map(|l| l.confidence);

        let cache_stats = self.cache.stats().await;
        let cache_hit_rate =
            (cache_stats.hits + cache_stats.misses > 0).then(|| cache_stats.hit_ratio());
        let scaling = self.scaler.analyze_scaling_performance().await;
        self.assess_health(now, mean_confidence, cache_hit_rate, &scaling)
            .await;

        let fleet_cpu = if !current_cpu.is_empty() {
            Some(current_cpu.iter().sum::<f64>() / current_cpu.len() as f64)
        } else {
            system_load
                .as_ref()
                .and_then(|l| l.predictions.cpu.first().map(|cpu| cpu / l.services as f64))
        };
        let load = fleet_cpu.map(LoadLevel::from_cpu_percent).unwrap_or_default();
        if self.config.orchestrator.toggles.adaptive_caching {
            self.cache.set_system_load(load).await;
        }

        let mut insights = Vec::new();
        if let Some(rate) = cache_hit_rate.filter(|r| *r < LOW_CACHE_HIT_RATE) {
            insights.push(insight(
                InsightType::Optimization,
                "Low cache hit rate".to_string(),
                format!(
                    "Cache hit rate is {:.0}%; review TTLs and enable predictive warming",
                    rate * 100.0
                ),
                Rating::Medium,
                0.8,
                0.0,
                Rating::Low,
                now,
            ));
        }
        if scaling.total_events > 0 && scaling.success_rate < LOW_SCALING_SUCCESS_RATE {
            insights.push(insight(
                InsightType::Risk,
                "Scaling actions failing".to_string(),
                format!(
                    "{} of {} scale actions failed; check the infrastructure controller",
                    scaling.failed, scaling.total_events
                ),
                Rating::High,
                0.9,
                0.0,
                Rating::Medium,
                now,
            ));
        }
        if let Some(confidence) = mean_confidence.filter(|c| *c < LOW_PREDICTION_CONFIDENCE) {
            insights.push(insight(
                InsightType::Risk,
                "Low prediction confidence".to_string(),
                format!(
                    "Mean forecast confidence is {:.2}; predictive decisions are unreliable",
                    confidence
                ),
                Rating::Medium,
                0.7,
                0.0,
                Rating::Medium,
                now,
            ));
        }

        {
            let mut stored = self.insights.write().await;
            for insight in &insights {
                if stored.len() >= MAX_INTEGRATED_INSIGHTS {
                    stored.pop_front();
                }
                stored.push_back(insight.clone());
            }
        }

        if let Some(rate) = cache_hit_rate {
            self.metrics.set_cache_hit_rate(rate);
        }
        self.metrics
            .set_services_tracked(self.predictor.services().await.len() as i64);

        let analysis = IntegratedAnalysis {
            timestamp: now,
            services_reporting: current_cpu.len(),
            load,
            system_load,
            mean_confidence,
            cache_hit_rate,
            scaling_success_rate: scaling.success_rate,
            insights,
        };
        *self.last_analysis.write().await = Some(analysis.clone());
        analysis
    }

    /// File a health verdict for every component from this tick's signals
    async fn assess_health(
        &self,
        now: DateTime<Utc>,
        mean_confidence: Option<f64>,
        cache_hit_rate: Option<f64>,
        scaling: &ScalingPerformanceReport,
    ) {
        let toggles = self.config.orchestrator.toggles;

        self.health
            .report(Component::Predictor, assess_predictor(mean_confidence))
            .await;

        let cache = if toggles.adaptive_caching {
            assess_cache(cache_hit_rate)
        } else {
            (ComponentStatus::Healthy, Some("Adaptive tuning disabled".to_string()))
        };
        self.health.report(Component::Cache, cache).await;

        let recent = self.scaler.events(SCALER_FAILURE_STREAK).await;
        self.health
            .report(Component::Scaler, assess_scaler(&recent, scaling.success_rate))
            .await;

        let monitor = if toggles.predictive_monitoring {
            let interval_secs = self.monitor.config().await.analysis_interval_secs;
            assess_monitor(
                self.monitor.last_analysis_at().await,
                now,
                interval_secs,
                &self.monitor.remediation_log().await,
            )
        } else {
            (ComponentStatus::Healthy, Some("Predictive monitoring disabled".to_string()))
        };
        self.health.report(Component::Monitor, monitor).await;
    }

    /// Insights from the integrated tick, newest first
    pub async fn insights(&self, limit: usize) -> Vec<SystemInsight> {
        self.insights.read().await.iter().rev().take(limit).cloned().collect()
    }

    pub async fn last_analysis(&self) -> Option<IntegratedAnalysis> {
        self.last_analysis.read().await.clone()
    }

    pub async fn system_status(&self) -> SystemStatus {
        let last_analysis_at = self.last_analysis.read().await.as_ref().map(|a| a.timestamp);
        SystemStatus {
            initialized: self.is_initialized().await,
            services: self.predictor.services().await,
            automation_level: self.automation_level().await,
            toggles: self.config.orchestrator.toggles,
            auto_remediation: self.monitor.config().await.auto_remediation,
            predictor: self.predictor.stats().await,
            cache: self.cache.stats().await,
            active_alerts: self.monitor.active_alerts().await.len(),
            pending_scale_actions: self.scaler.pending_actions().await.len(),
            last_analysis_at,
            timestamp: self.clock.now(),
        }
    }

    /// Fleet report from the components' latest published state
    pub async fn generate_performance_report(&self) -> PerformanceReport {
        let cache = self.cache.performance_report().await;
        let scaling = self.scaler.analyze_scaling_performance().await;
        let dashboard = self.monitor.dashboard_data().await;
        let system_load = self
            .last_analysis
            .read()
            .await
            .as_ref()
            .and_then(|a| a.system_load.clone());

        let mut insights = self.insights(10).await;
        insights.extend(dashboard.insights);

        let mut recommendations = scaling.recommendations.clone();
        recommendations.extend(insights.iter().map(|i| format!("{}: {}", i.title, i.description)));
        if dashboard.overview.critical > 0 {
            recommendations.push(format!(
                "{} services in critical health; review active alerts",
                dashboard.overview.critical
            ));
        }

        PerformanceReport {
            generated_at: self.clock.now(),
            automation_level: self.automation_level().await,
            system_load,
            cache,
            scaling,
            overview: dashboard.overview,
            insights,
            recommendations,
        }
    }

    /// Periodic integrated analysis loop
    pub async fn run_integrated(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let interval_secs = self.config.orchestrator.integrated_interval_secs;
        info!(interval_secs = interval_secs, "Starting integrated analysis");

        let mut ticker = interval(Duration::from_secs(interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    let analysis = self.integrated_analysis().await;
                    if !analysis.insights.is_empty() {
                        info!(insights = analysis.insights.len(), "Integrated analysis produced insights");
                    }
                    self.metrics.observe_tick_latency("integrated", started.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    info!("Shutting down integrated analysis");
                    break;
                }
            }
        }
    }

    /// Stop every periodic task; errors are logged only
    pub async fn shutdown(&self, reason: &str) {
        let Some(running) = self.tasks.lock().await.take() else {
            debug!("Orchestrator not running");
            return;
        };
        self.logger.log_shutdown(reason);
        self.health.set_ready(false).await;

        if running.shutdown.send(()).is_err() {
            warn!("No tasks were listening for shutdown");
        }
        for handle in running.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Task ended abnormally during shutdown");
            }
        }
        for component in Component::ALL {
            self.health
                .report(component, (ComponentStatus::Degraded, Some("Stopped".to_string())))
                .await;
        }
        *self.initialized.write().await = false;
    }
}
