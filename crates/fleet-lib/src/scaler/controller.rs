//! Infrastructure control seam
//!
//! The optimizer decides what to change and when; an
//! [`InfrastructureController`] performs the change against the real
//! container platform.

use async_trait::async_trait;
use tracing::info;

/// Executes scale, restart and configuration changes for a service
#[async_trait]
pub trait InfrastructureController: Send + Sync {
    async fn scale(&self, service: &str, replicas: u32) -> anyhow::Result<()>;

    async fn restart(&self, service: &str) -> anyhow::Result<()>;

    async fn apply_config(&self, service: &str, change: &str) -> anyhow::Result<()>;
}

/// Controller that only logs requested changes
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingController;

#[async_trait]
impl InfrastructureController for LoggingController {
    async fn scale(&self, service: &str, replicas: u32) -> anyhow::Result<()> {
        info!(service = %service, replicas = replicas, "Scale requested");
        Ok(())
    }

    async fn restart(&self, service: &str) -> anyhow::Result<()> {
        info!(service = %service, "Restart requested");
        Ok(())
    }

    async fn apply_config(&self, service: &str, change: &str) -> anyhow::Result<()> {
        info!(service = %service, change = %change, "Configuration change requested");
        Ok(())
    }
}
