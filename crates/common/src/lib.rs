//! Shared configuration and telemetry setup for the RPC latency stats crates.
//!
//! This crate provides:
//! - Configuration loading (files and `RPCSTATS_` environment variables)
//! - Tracing subscriber initialisation

pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use config::{
    MetricsConfig, Precision, SinkConfig, StatsConfig, TagPolicy, TelemetryConfig,
    DEFAULT_PAYLOAD_SIZE, DEFAULT_SINK_ADDRESS,
};
pub use telemetry::init_tracing;
