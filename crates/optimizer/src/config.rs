//! Daemon configuration

use anyhow::{Context, Result};
use fleet_lib::OptimizerConfig;
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "FLEET_CONFIG";

/// Daemon configuration
///
/// Layered from an optional file and `FLEET_` environment variables, with
/// `__` separating nested keys (`FLEET_OPTIMIZER__MONITOR__AUTO_REMEDIATION=true`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// API server port for health, metrics and dashboard queries
    pub api_port: u16,

    /// Instance name used in structured logs
    pub instance: String,

    pub optimizer: OptimizerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_port: 8080,
            instance: std::env::var("HOSTNAME").unwrap_or_else(|_| "fleet-optimizer".to_string()),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Load from `FLEET_CONFIG` (if set) and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// Load from an optional file layered under the environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("FLEET")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        let daemon: DaemonConfig = config
            .try_deserialize()
            .context("failed to parse configuration")?;
        daemon
            .optimizer
            .validate()
            .context("invalid optimizer configuration")?;
        Ok(daemon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let config = DaemonConfig::load_from(None).unwrap();
        assert_eq!(config.optimizer.monitor.failure_alert_threshold, 0.8);
        assert!(!config.optimizer.orchestrator.services.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api_port = 9191

[optimizer.orchestrator]
services = ["api", "db"]

[optimizer.monitor]
auto_remediation = true

[optimizer.scaler]
policy = "reactive"
"#
        )
        .unwrap();

        let config = DaemonConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.api_port, 9191);
        assert_eq!(config.optimizer.orchestrator.services, vec!["api", "db"]);
        assert!(config.optimizer.monitor.auto_remediation);
        assert_eq!(config.optimizer.cache.max_size, 1000);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[optimizer.cache]\nmax_size = 0").unwrap();
        assert!(DaemonConfig::load_from(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(DaemonConfig::load_from(Some(Path::new("/nonexistent/fleet.toml"))).is_err());
    }
}
