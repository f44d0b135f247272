//! CLI command implementations

pub mod alerts;
pub mod predictions;
pub mod status;
