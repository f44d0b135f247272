//! Adaptive cache
//!
//! A capacity-bounded LRU cache whose per-key TTL follows system load,
//! access-pattern predictability and recent hit-rate feedback. It can
//! pre-warm keys that are about to be read and evicts in load-sized
//! batches ranked by an access score.

mod patterns;

pub use patterns::{AccessPattern, KeyAccuracy, MAX_ACCESS_TIMES, MIN_ACCESSES_FOR_FORECAST};

use crate::analysis::mean;
use crate::clock::SharedClock;
use crate::error::{FleetError, Result};
use crate::models::LoadLevel;
use crate::observability::OptimizerMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Shortest TTL the dynamic calculation may produce
pub const MIN_TTL: Duration = Duration::from_secs(10);

/// Longest TTL the dynamic calculation may produce
pub const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Base TTL never shrinks below this
pub const BASE_TTL_FLOOR: Duration = Duration::from_secs(30);

/// Rolling performance history capacity
pub const PERFORMANCE_HISTORY_CAPACITY: usize = 100;

/// Samples considered for the trailing hit rate
const TRAILING_SAMPLES: usize = 5;

/// Accuracy assumed for keys with no forecast history
const UNKNOWN_KEY_ACCURACY: f64 = 0.5;

/// Independently toggleable tunings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTuning {
    pub dynamic_ttl: bool,
    pub predictive_warming: bool,
    pub load_based_eviction: bool,
    pub performance_tuning: bool,
}

impl Default for CacheTuning {
    fn default() -> Self {
        Self {
            dynamic_ttl: true,
            predictive_warming: true,
            load_based_eviction: true,
            performance_tuning: true,
        }
    }
}

impl CacheTuning {
    pub fn all_disabled() -> Self {
        Self {
            dynamic_ttl: false,
            predictive_warming: false,
            load_based_eviction: false,
            performance_tuning: false,
        }
    }

    /// (enabled, total) toggle counts
    pub fn enabled_count(&self) -> (usize, usize) {
        let enabled = [
            self.dynamic_ttl,
            self.predictive_warming,
            self.load_based_eviction,
            self.performance_tuning,
        ]
        .iter()
        .filter(|b| **b)
        .count();
        (enabled, 4)
    }
}

/// Configuration for the adaptive cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: usize,
    pub base_ttl_ms: u64,
    /// Forecast window for predictive warming
    pub warming_window_ms: u64,
    pub max_warm_per_cycle: usize,
    pub sample_interval_secs: u64,
    pub warming_interval_secs: u64,
    pub tuning: CacheTuning,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            base_ttl_ms: 300_000,
            warming_window_ms: 30 * 60 * 1000,
            max_warm_per_cycle: 50,
            sample_interval_secs: 60,
            warming_interval_secs: 300,
            tuning: CacheTuning::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(FleetError::invalid_config("cache.max_size must be positive"));
        }
        if self.base_ttl_ms < BASE_TTL_FLOOR.as_millis() as u64 {
            return Err(FleetError::invalid_config(format!(
                "cache.base_ttl_ms must be at least {}",
                BASE_TTL_FLOOR.as_millis()
            )));
        }
        if self.sample_interval_secs == 0 || self.warming_interval_secs == 0 {
            return Err(FleetError::invalid_config(
                "cache sampling and warming intervals must be positive",
            ));
        }
        Ok(())
    }
}

/// Source for pre-fetching values during predictive warming
#[async_trait]
pub trait CacheWarmer<V>: Send + Sync {
    /// Load the current value for `key`; `None` when it no longer exists
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<V>>;
}

/// Cumulative cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
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

    pub fn fill_ratio(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        self.entries as f64 / self.max_size as f64
    }
}

/// One periodic performance sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePerformanceMetrics {
    pub timestamp: DateTime<Utc>,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub avg_response_time_ms: f64,
    pub memory_efficiency: f64,
    pub prediction_accuracy: f64,
    pub warming_effectiveness: f64,
}

/// Result of one warming cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarmingReport {
    pub candidates: usize,
    pub warmed: usize,
    pub failed: usize,
}

/// Summary of cache behavior for reports and dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePerformanceReport {
    pub latest: Option<CachePerformanceMetrics>,
    pub average_hit_rate: f64,
    pub average_response_time_ms: f64,
    pub base_ttl_ms: u64,
    pub load: LoadLevel,
    pub tuning: CacheTuning,
    pub tracked_patterns: usize,
    pub stats: CacheStats,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    warmed: bool,
}

/// Mutable tuning state shared by the sampling and warming loops
#[derive(Debug)]
struct TuningState {
    base_ttl_ms: u64,
    load: LoadLevel,
    tuning: CacheTuning,
    history: VecDeque<CachePerformanceMetrics>,
    warmed_keys: HashSet<String>,
    warmed_hits: HashSet<String>,
    // Counter values at the previous sample
    sampled_hits: u64,
    sampled_misses: u64,
    sampled_lookups: u64,
    sampled_response_ns: u64,
}

/// Capacity-bounded cache with adaptive TTL, warming and eviction
pub struct AdaptiveCache<V> {
    config: CacheConfig,
    clock: SharedClock,
    store: RwLock<LruCache<String, CacheEntry<V>>>,
    patterns: DashMap<String, AccessPattern>,
    accuracy: DashMap<String, KeyAccuracy>,
    state: RwLock<TuningState>,
    warmer: Option<Arc<dyn CacheWarmer<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    lookups: AtomicU64,
    response_ns: AtomicU64,
    metrics: OptimizerMetrics,
}

impl<V> AdaptiveCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.max_size)
            .ok_or_else(|| FleetError::invalid_config("cache.max_size must be positive"))?;

        let state = TuningState {
            base_ttl_ms: config.base_ttl_ms,
            load: LoadLevel::default(),
            tuning: config.tuning,
            history: VecDeque::with_capacity(PERFORMANCE_HISTORY_CAPACITY),
            warmed_keys: HashSet::new(),
            warmed_hits: HashSet::new(),
            sampled_hits: 0,
            sampled_misses: 0,
            sampled_lookups: 0,
            sampled_response_ns: 0,
        };

        Ok(Self {
            config,
            clock,
            store: RwLock::new(LruCache::new(capacity)),
            patterns: DashMap::new(),
            accuracy: DashMap::new(),
            state: RwLock::new(state),
            warmer: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
            response_ns: AtomicU64::new(0),
            metrics: OptimizerMetrics::new(),
        })
    }

    /// Attach a source used to pre-fetch predicted keys
    pub fn with_warmer(mut self, warmer: Arc<dyn CacheWarmer<V>>) -> Self {
        self.warmer = Some(warmer);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read a value; expired entries count as misses and are dropped
    pub async fn get(&self, key: &str) -> Option<V> {
        let started = Instant::now();
        let now = self.clock.now();

        let found = {
            let mut store = self.store.write().await;
            match store.peek(key).map(|e| e.expires_at > now) {
                Some(true) => store.get_mut(key).map(|entry| {
                    let was_warmed = entry.warmed;
                    entry.warmed = false;
                    (entry.value.clone(), was_warmed)
                }),
                Some(false) => {
                    store.pop(key);
                    None
                }
                None => None,
            }
        };

        let result = match found {
            Some((value, was_warmed)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.record_hit(key, now);
                if was_warmed {
                    self.state.write().await.warmed_hits.insert(key.to_string());
                }
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        };

        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.response_ns
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        result
    }

    fn record_hit(&self, key: &str, now: DateTime<Utc>) {
        let mut pattern = self
            .patterns
            .entry(key.to_string())
            .or_insert_with(|| AccessPattern::new(key, now));

        if let Some(accuracy) = pattern.accuracy_of(now) {
            self.accuracy
                .entry(key.to_string())
                .or_default()
                .record(accuracy);
        }
        pattern.record_access(now);
    }

    /// Insert with a TTL computed from the current tuning inputs
    pub async fn set(&self, key: &str, value: V) {
        let ttl = self.calculate_ttl(key).await;
        self.insert(key, value, ttl, false).await;
    }

    /// Insert with an explicit TTL
    pub async fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        self.insert(key, value, ttl, false).await;
    }

    async fn insert(&self, key: &str, value: V, ttl: Duration, warmed: bool) {
        let now = self.clock.now();
        let load_based = self.state.read().await.tuning.load_based_eviction;
        let load = self.system_load().await;

        let mut store = self.store.write().await;
        if !store.contains(key) && store.len() >= self.config.max_size {
            let evicted = if load_based {
                self.evict_batch(&mut store, load, now)
            } else {
                store.pop_lru().map(|(k, _)| vec![k]).unwrap_or_default()
            };
            for k in &evicted {
                self.patterns.remove(k);
            }
            self.evictions
                .fetch_add(evicted.len() as u64, Ordering::Relaxed);
            debug!(evicted = evicted.len(), load = ?load, "Cache eviction");
        }

        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero());
        store.put(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
                warmed,
            },
        );
    }

    /// Evict the lowest scoring entries; batch size follows system load
    fn evict_batch(
        &self,
        store: &mut LruCache<String, CacheEntry<V>>,
        load: LoadLevel,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let fraction = match load {
            LoadLevel::High => 0.05,
            LoadLevel::Medium => 0.10,
            LoadLevel::Low => 0.20,
        };
        let batch = ((store.len() as f64 * fraction) as usize).max(1);

        let mut scored: Vec<(String, f64)> = store
            .iter()
            .map(|(key, entry)| {
                let score = match self.patterns.get(key) {
                    Some(pattern) => pattern.eviction_score(now),
                    None => {
                        let age = (now - entry.inserted_at).num_milliseconds().max(0) as f64;
                        1.0 / (age / 1000.0 + 1.0)
                    }
                };
                (key.clone(), score)
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));

        scored
            .into_iter()
            .take(batch)
            .filter_map(|(key, _)| store.pop(&key).map(|_| key))
            .collect()
    }

    /// True when a live (unexpired) entry exists
    pub async fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let store = self.store.read().await;
        store.peek(key).is_some_and(|e| e.expires_at > now)
    }

    /// Remove a key; returns true when it was present
    pub async fn delete(&self, key: &str) -> bool {
        self.patterns.remove(key);
        self.accuracy.remove(key);
        self.store.write().await.pop(key).is_some()
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
        self.patterns.clear();
        self.accuracy.clear();
        let mut state = self.state.write().await;
        state.warmed_keys.clear();
        state.warmed_hits.clear();
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len().await,
            max_size: self.config.max_size,
        }
    }

    /// TTL for `key`: base × load × prediction × performance, clamped
    pub async fn calculate_ttl(&self, key: &str) -> Duration {
        let state = self.state.read().await;
        let base = state.base_ttl_ms as f64;
        if !state.tuning.dynamic_ttl {
            return Duration::from_millis(state.base_ttl_ms);
        }

        let load_adj = match state.load {
            LoadLevel::High => 1.5,
            LoadLevel::Medium => 1.0,
            LoadLevel::Low => 0.7,
        };
        let prediction_adj = 0.5 + self.key_accuracy(key);
        let performance_adj = match trailing_hit_rate(&state.history) {
            Some(rate) if rate > 0.8 => 1.2,
            Some(rate) if rate < 0.5 => 0.8,
            _ => 1.0,
        };

        let ttl_ms = (base * load_adj * prediction_adj * performance_adj).clamp(
            MIN_TTL.as_millis() as f64,
            MAX_TTL.as_millis() as f64,
        );
        Duration::from_millis(ttl_ms.round() as u64)
    }

    /// Mean forecast accuracy for a key (0.5 when unknown)
    pub fn key_accuracy(&self, key: &str) -> f64 {
        self.accuracy
            .get(key)
            .and_then(|a| a.mean())
            .unwrap_or(UNKNOWN_KEY_ACCURACY)
    }

    /// Mean accuracy across all tracked keys (0.5 when none)
    pub fn overall_prediction_accuracy(&self) -> f64 {
        let values: Vec<f64> = self.accuracy.iter().filter_map(|a| a.value().mean()).collect();
        if values.is_empty() {
            UNKNOWN_KEY_ACCURACY
        } else {
            mean(&values)
        }
    }

    pub fn access_pattern(&self, key: &str) -> Option<AccessPattern> {
        self.patterns.get(key).map(|p| p.clone())
    }

    pub async fn set_system_load(&self, load: LoadLevel) {
        let mut state = self.state.write().await;
        if state.load != load {
            debug!(from = ?state.load, to = ?load, "Cache system load changed");
            state.load = load;
        }
    }

    pub async fn system_load(&self) -> LoadLevel {
        self.state.read().await.load
    }

    pub async fn set_tuning(&self, tuning: CacheTuning) {
        self.state.write().await.tuning = tuning;
        info!(?tuning, "Cache tuning updated");
    }

    pub async fn tuning(&self) -> CacheTuning {
        self.state.read().await.tuning
    }

    pub async fn base_ttl(&self) -> Duration {
        Duration::from_millis(self.state.read().await.base_ttl_ms)
    }

    /// Forecast next accesses and pre-fetch the most valuable keys
    pub async fn warm_cycle(&self) -> WarmingReport {
        if !self.state.read().await.tuning.predictive_warming {
            return WarmingReport::default();
        }

        let now = self.clock.now();
        let horizon = now + ChronoDuration::milliseconds(self.config.warming_window_ms as i64);

        let mut candidates: Vec<(String, f64)> = self
            .patterns
            .iter()
            .filter_map(|entry| {
                let p = entry.value();
                if p.access_times.len() < MIN_ACCESSES_FOR_FORECAST {
                    return None;
                }
                let next = p.predicted_next_access?;
                if next >= now && next <= horizon {
                    Some((p.key.clone(), p.forecast_confidence() * p.hit_count as f64))
                } else {
                    None
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(self.config.max_warm_per_cycle);

        let mut report = WarmingReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        let Some(warmer) = self.warmer.clone() else {
            debug!(candidates = report.candidates, "No cache warmer configured");
            return report;
        };

        for (key, _) in candidates {
            if self.has(&key).await {
                continue;
            }
            match warmer.fetch(&key).await {
                Ok(Some(value)) => {
                    let ttl = self.calculate_ttl(&key).await;
                    self.insert(&key, value, ttl, true).await;
                    self.state.write().await.warmed_keys.insert(key);
                    report.warmed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache warming fetch failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            candidates = report.candidates,
            warmed = report.warmed,
            failed = report.failed,
            "Cache warming cycle complete"
        );
        report
    }

    /// Record a performance sample and apply self-tuning
    pub async fn sample_performance(&self) -> CachePerformanceMetrics {
        let now = self.clock.now();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = self.lookups.load(Ordering::Relaxed);
        let response_ns = self.response_ns.load(Ordering::Relaxed);
        let entries = self.len().await;
        let prediction_accuracy = self.overall_prediction_accuracy();

        let mut state = self.state.write().await;

        let window_hits = hits.saturating_sub(state.sampled_hits);
        let window_misses = misses.saturating_sub(state.sampled_misses);
        let window_lookups = lookups.saturating_sub(state.sampled_lookups);
        let window_ns = response_ns.saturating_sub(state.sampled_response_ns);
        let window_total = window_hits + window_misses;

        let hit_rate = if window_total > 0 {
            window_hits as f64 / window_total as f64
        } else if hits + misses > 0 {
            hits as f64 / (hits + misses) as f64
        } else {
            0.0
        };
        let avg_response_time_ms = if window_lookups > 0 {
            window_ns as f64 / window_lookups as f64 / 1_000_000.0
        } else {
            0.0
        };
        let warming_effectiveness = if state.warmed_keys.is_empty() {
            0.0
        } else {
            state.warmed_hits.len() as f64 / state.warmed_keys.len() as f64
        };

        let sample = CachePerformanceMetrics {
            timestamp: now,
            hit_rate,
            miss_rate: 1.0 - hit_rate,
            avg_response_time_ms,
            memory_efficiency: entries as f64 / self.config.max_size as f64,
            prediction_accuracy,
            warming_effectiveness,
        };

        state.sampled_hits = hits;
        state.sampled_misses = misses;
        state.sampled_lookups = lookups;
        state.sampled_response_ns = response_ns;

        if state.history.len() >= PERFORMANCE_HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(sample.clone());
        self.metrics.set_cache_hit_rate(hit_rate);

        if state.tuning.performance_tuning {
            if window_total > 0 {
                if let Some(trailing) = trailing_hit_rate(&state.history) {
                    if trailing < 0.6 {
                        let shrunk = (state.base_ttl_ms as f64 * 0.8) as u64;
                        let floor = BASE_TTL_FLOOR.as_millis() as u64;
                        let next = shrunk.max(floor);
                        if next != state.base_ttl_ms {
                            info!(
                                from_ms = state.base_ttl_ms,
                                to_ms = next,
                                hit_rate = trailing,
                                "Shrinking base cache TTL"
                            );
                            state.base_ttl_ms = next;
                        }
                    }
                }
            }
            if prediction_accuracy < 0.6 && !self.accuracy.is_empty() {
                debug!(accuracy = prediction_accuracy, "Resetting key accuracy tracking");
                self.accuracy.clear();
            }
        }

        sample
    }

    pub async fn performance_history(&self) -> Vec<CachePerformanceMetrics> {
        self.state.read().await.history.iter().cloned().collect()
    }

    pub async fn performance_report(&self) -> CachePerformanceReport {
        let stats = self.stats().await;
        let state = self.state.read().await;
        let hit_rates: Vec<f64> = state.history.iter().map(|m| m.hit_rate).collect();
        let response: Vec<f64> = state
            .history
            .iter()
            .map(|m| m.avg_response_time_ms)
            .collect();

        CachePerformanceReport {
            latest: state.history.back().cloned(),
            average_hit_rate: mean(&hit_rates),
            average_response_time_ms: mean(&response),
            base_ttl_ms: state.base_ttl_ms,
            load: state.load,
            tuning: state.tuning,
            tracked_patterns: self.patterns.len(),
            stats,
        }
    }

    /// Periodic performance sampling loop
    pub async fn run_sampler(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.sample_interval_secs,
            "Starting cache performance sampler"
        );
        let mut ticker = interval(Duration::from_secs(self.config.sample_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.sample_performance().await;
                    self.metrics.observe_tick_latency("cache_sampler", started.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    info!("Shutting down cache performance sampler");
                    break;
                }
            }
        }
    }

    /// Periodic predictive warming loop
    pub async fn run_warmer(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.warming_interval_secs,
            "Starting cache warmer"
        );
        let mut ticker = interval(Duration::from_secs(self.config.warming_interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    self.warm_cycle().await;
                    self.metrics.observe_tick_latency("cache_warmer", started.elapsed().as_secs_f64());
                }
                _ = shutdown.recv() => {
                    info!("Shutting down cache warmer");
                    break;
                }
            }
        }
    }
}

/// Mean hit rate of the last few samples
fn trailing_hit_rate(history: &VecDeque<CachePerformanceMetrics>) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let skip = history.len().saturating_sub(TRAILING_SAMPLES);
    let rates: Vec<f64> = history.iter().skip(skip).map(|m| m.hit_rate).collect();
    Some(mean(&rates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicUsize;

    fn cache_with(config: CacheConfig) -> (AdaptiveCache<String>, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let cache = AdaptiveCache::new(config, Arc::new(clock.clone())).unwrap();
        (cache, clock)
    }

    fn small(max_size: usize, tuning: CacheTuning) -> CacheConfig {
        CacheConfig {
            max_size,
            tuning,
            ..Default::default()
        }
    }

    struct CountingWarmer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheWarmer<String> for CountingWarmer {
        async fn fetch(&self, key: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(format!("warm-{key}")))
        }
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let (cache, _clock) = cache_with(CacheConfig::default());
        cache.set("user:1", "alice".to_string()).await;

        assert_eq!(cache.get("user:1").await, Some("alice".to_string()));
        assert!(cache.has("user:1").await);
        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let (cache, clock) = cache_with(CacheConfig::default());
        cache
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(30))
            .await;
        clock.advance(ChronoDuration::seconds(31));

        assert!(!cache.has("k").await);
        assert_eq!(cache.get("k").await, None);
        assert_eq!(cache.stats().await.misses, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (cache, _clock) = cache_with(CacheConfig::default());
        cache.set("a", "1".to_string()).await;
        cache.set("b", "2".to_string()).await;

        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_dynamic_ttl_follows_load() {
        let (cache, _clock) = cache_with(CacheConfig::default());

        // base 300s * 1.0 * (0.5 + 0.5) * 1.0
        assert_eq!(cache.calculate_ttl("k").await, Duration::from_secs(300));

        cache.set_system_load(LoadLevel::High).await;
        assert_eq!(cache.calculate_ttl("k").await, Duration::from_secs(450));

        cache.set_system_load(LoadLevel::Low).await;
        assert_eq!(cache.calculate_ttl("k").await, Duration::from_secs(210));

        cache.set_tuning(CacheTuning::all_disabled()).await;
        assert_eq!(cache.calculate_ttl("k").await, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_dynamic_ttl_follows_hit_rate() {
        let tuning = CacheTuning {
            performance_tuning: false,
            ..Default::default()
        };
        let (cache, _clock) = cache_with(small(100, tuning));

        cache.set("hot", "v".to_string()).await;
        for _ in 0..10 {
            cache.get("hot").await;
        }
        assert_eq!(cache.sample_performance().await.hit_rate, 1.0);
        assert_eq!(cache.calculate_ttl("other").await, Duration::from_secs(360));

        for i in 0..10 {
            cache.get(&format!("missing-{i}")).await;
        }
        cache.sample_performance().await;
        // Trailing mean of 1.0 and 0.0 sits between the bands
        assert_eq!(cache.calculate_ttl("other").await, Duration::from_secs(300));

        for i in 0..10 {
            cache.get(&format!("missing-{i}")).await;
        }
        cache.sample_performance().await;
        assert_eq!(cache.calculate_ttl("other").await, Duration::from_secs(240));
        assert_eq!(cache.base_ttl().await, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_plain_lru_eviction_when_toggle_off() {
        let (cache, _clock) = cache_with(small(3, CacheTuning::all_disabled()));
        for key in ["a", "b", "c"] {
            cache.set(key, key.to_string()).await;
        }
        cache.get("a").await;
        cache.set("d", "d".to_string()).await;

        assert_eq!(cache.len().await, 3);
        assert!(cache.has("a").await);
        assert!(!cache.has("b").await);
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_load_based_eviction_batch() {
        let (cache, clock) = cache_with(small(20, CacheTuning::default()));
        cache.set_system_load(LoadLevel::Low).await;
        for i in 0..20 {
            cache.set(&format!("k{i}"), i.to_string()).await;
        }
        // Keep one key hot so it survives
        for _ in 0..5 {
            clock.advance(ChronoDuration::seconds(1));
            cache.get("k0").await;
        }

        cache.set("new", "x".to_string()).await;

        // 20% of 20 entries evicted before the insert
        assert_eq!(cache.stats().await.evictions, 4);
        assert_eq!(cache.len().await, 17);
        assert!(cache.has("k0").await);
        assert!(cache.has("new").await);
    }

    #[tokio::test]
    async fn test_low_hit_rate_shrinks_base_ttl() {
        let (cache, _clock) = cache_with(CacheConfig::default());
        for i in 0..10 {
            cache.get(&format!("missing-{i}")).await;
        }

        let sample = cache.sample_performance().await;
        assert_eq!(sample.hit_rate, 0.0);
        assert_eq!(cache.base_ttl().await, Duration::from_secs(240));
    }

    #[tokio::test]
    async fn test_base_ttl_floor() {
        let config = CacheConfig {
            base_ttl_ms: 35_000,
            ..Default::default()
        };
        let (cache, _clock) = cache_with(config);
        for _ in 0..3 {
            cache.get("missing").await;
            cache.sample_performance().await;
        }
        assert_eq!(cache.base_ttl().await, BASE_TTL_FLOOR);
    }

    #[tokio::test]
    async fn test_idle_cache_keeps_base_ttl() {
        let (cache, _clock) = cache_with(CacheConfig::default());
        cache.sample_performance().await;
        assert_eq!(cache.base_ttl().await, Duration::from_secs(300));
        assert_eq!(cache.performance_history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_predictive_warming_uses_warmer() {
        let clock = ManualClock::new(Utc::now());
        let warmer = Arc::new(CountingWarmer {
            calls: AtomicUsize::new(0),
        });
        let cache = AdaptiveCache::new(CacheConfig::default(), Arc::new(clock.clone()))
            .unwrap()
            .with_warmer(warmer.clone());

        cache
            .set_with_ttl("report", "v1".to_string(), Duration::from_secs(150))
            .await;
        for _ in 0..3 {
            cache.get("report").await;
            clock.advance(ChronoDuration::seconds(60));
        }
        // Entry expired; next access is forecast for right now
        assert!(!cache.has("report").await);

        let report = cache.warm_cycle().await;
        assert_eq!(report.candidates, 1);
        assert_eq!(report.warmed, 1);
        assert_eq!(warmer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("report").await, Some("warm-report".to_string()));

        let sample = cache.sample_performance().await;
        assert_eq!(sample.warming_effectiveness, 1.0);
    }

    #[tokio::test]
    async fn test_warming_without_warmer_only_counts() {
        let (cache, clock) = cache_with(CacheConfig::default());
        cache
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(3600))
            .await;
        for _ in 0..4 {
            cache.get("k").await;
            clock.advance(ChronoDuration::seconds(30));
        }
        let report = cache.warm_cycle().await;
        assert_eq!(report.candidates, 1);
        assert_eq!(report.warmed, 0);
    }

    #[tokio::test]
    async fn test_key_accuracy_tracks_regular_access() {
        let (cache, clock) = cache_with(CacheConfig::default());
        cache
            .set_with_ttl("k", "v".to_string(), Duration::from_secs(3600))
            .await;
        for _ in 0..5 {
            cache.get("k").await;
            clock.advance(ChronoDuration::seconds(60));
        }
        assert_eq!(cache.key_accuracy("k"), 1.0);
        assert_eq!(cache.key_accuracy("unknown"), 0.5);
        assert_eq!(cache.calculate_ttl("k").await, Duration::from_secs(450));
    }

    #[tokio::test]
    async fn test_performance_report() {
        let (cache, _clock) = cache_with(CacheConfig::default());
        cache.set("a", "1".to_string()).await;
        cache.get("a").await;
        cache.sample_performance().await;

        let report = cache.performance_report().await;
        assert_eq!(report.average_hit_rate, 1.0);
        assert_eq!(report.tracked_patterns, 1);
        assert_eq!(report.tuning.enabled_count(), (4, 4));
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());
        let bad = CacheConfig {
            max_size: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
