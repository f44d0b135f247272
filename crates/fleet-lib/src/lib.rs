//! Fleet optimization library
//!
//! This crate provides the core functionality for:
//! - Time series analysis and per-service resource forecasting
//! - Adaptive caching with predictive warming
//! - Policy-driven auto-scaling
//! - Failure prediction, health scoring and alerting
//! - Health checks and observability

pub mod analysis;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod orchestrator;
pub mod predictor;
pub mod scaler;

pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use config::OptimizerConfig;
pub use error::{FleetError, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{OptimizerMetrics, StructuredLogger};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
