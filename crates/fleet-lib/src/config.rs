//! Optimizer configuration
//!
//! One section per component. Every field has a default, so an empty
//! source deserializes to a working configuration.

use crate::cache::CacheConfig;
use crate::error::Result;
use crate::monitor::MonitorConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::predictor::PredictorConfig;
use crate::scaler::ScalerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub orchestrator: OrchestratorConfig,
    pub predictor: PredictorConfig,
    pub cache: CacheConfig,
    pub scaler: ScalerConfig,
    pub monitor: MonitorConfig,
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        self.orchestrator.validate()?;
        self.predictor.validate()?;
        self.cache.validate()?;
        self.scaler.validate()?;
        self.monitor.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.orchestrator.services.is_empty());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: OptimizerConfig = serde_json::from_str(
            r#"{"monitor": {"auto_remediation": true}, "scaler": {"policy": "reactive"}}"#,
        )
        .unwrap();
        assert!(config.monitor.auto_remediation);
        assert_eq!(config.monitor.failure_alert_threshold, 0.8);
        assert_eq!(config.predictor.history_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_section_fails_validation() {
        let mut config = OptimizerConfig::default();
        config.monitor.max_alerts = 0;
        assert!(config.validate().is_err());
    }
}
