//! Fleet optimizer daemon internals: HTTP API and configuration loading

pub mod api;
pub mod config;
