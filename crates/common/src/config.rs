//! Configuration management for the latency stats layer.
//!
//! Settings are loaded from configuration files and environment variables.
//!
//! ## Example Configuration
//!
//! ```toml
//! [sink]
//! address = "10.0.0.5:8089"
//! payload_size = 512
//! precision = "ms"
//!
//! [metrics]
//! measurement = "rpc_latency"
//! namespace = "rpc_stats"
//! tag_policy = "error_only"
//! write_timeout_ms = 50
//!
//! [telemetry]
//! service_name = "payments"
//! json_logging = true
//! log_level = "info"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default UDP endpoint of the metrics backend.
pub const DEFAULT_SINK_ADDRESS: &str = "127.0.0.1:8089";

/// Default maximum datagram payload, in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 512;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Metrics sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Backend address in `host:port` form. Empty selects [`DEFAULT_SINK_ADDRESS`].
    #[serde(default)]
    pub address: String,

    /// Maximum number of bytes packed into a single datagram
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,

    /// Timestamp precision of encoded points
    #[serde(default)]
    pub precision: Precision,
}

/// Measurement configuration shared by every interceptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Measurement (series) name
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Destination database
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Which outcome tags are attached to points
    #[serde(default)]
    pub tag_policy: TagPolicy,

    /// Upper bound on a single metric write, in milliseconds. 0 waits for the
    /// transport.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable JSON logging format
    #[serde(default)]
    pub json_logging: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Outcome tagging policy for emitted points.
///
/// `Always` tags every point with `error_code` (`OK` on success), so success and
/// failure share one series per method and code. `ErrorOnly` adds `error_code`
/// and `error` only to failed calls, which keeps success points to a single
/// `method` dimension. A failed call with an empty status message is tagged
/// `error=<code name>` so the tag survives encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TagPolicy {
    #[default]
    Always,
    ErrorOnly,
}

impl TagPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::ErrorOnly => "error_only",
        }
    }
}

/// Timestamp precision of the line protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    #[serde(alias = "n")]
    Ns,
    #[serde(alias = "u")]
    Us,
    Ms,
    S,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            payload_size: default_payload_size(),
            precision: Precision::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            measurement: default_measurement(),
            namespace: default_namespace(),
            tag_policy: TagPolicy::default(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            json_logging: false,
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_payload_size() -> usize {
    DEFAULT_PAYLOAD_SIZE
}

fn default_measurement() -> String {
    "rpc_latency".to_string()
}

fn default_namespace() -> String {
    "rpc_stats".to_string()
}

fn default_write_timeout_ms() -> u64 {
    50
}

fn default_service_name() -> String {
    "rpcstats".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SinkConfig {
    /// Address the sink sends to, with the empty string mapped to the default.
    pub fn resolved_address(&self) -> &str {
        if self.address.is_empty() {
            DEFAULT_SINK_ADDRESS
        } else {
            &self.address
        }
    }
}

impl MetricsConfig {
    /// Get the write timeout as a Duration
    pub fn write_timeout(&self) -> Option<Duration> {
        (self.write_timeout_ms > 0).then(|| Duration::from_millis(self.write_timeout_ms))
    }
}

impl StatsConfig {
    /// Load configuration from environment variables and configuration files.
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/{environment}.toml (if exists, where environment is from RPCSTATS_ENV)
    /// 4. Environment variables (prefixed with RPCSTATS_)
    ///
    /// ```no_run
    /// use rpcstats_common::config::StatsConfig;
    ///
    /// let config = StatsConfig::load().expect("Failed to load configuration");
    /// println!("Metrics go to {}", config.sink.resolved_address());
    /// ```
    pub fn load() -> Result<Self> {
        let env = std::env::var("RPCSTATS_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Example: RPCSTATS_SINK__ADDRESS=10.0.0.5:8089
            .add_source(
                config::Environment::with_prefix("RPCSTATS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::from_config(config)
    }

    /// Parse configuration from a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;

        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        let stats_config: StatsConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        stats_config.validate()?;

        Ok(stats_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sink.payload_size == 0 {
            anyhow::bail!("Sink payload size must be greater than 0");
        }

        if self.metrics.measurement.is_empty() {
            anyhow::bail!("Measurement name is required");
        }

        if self.metrics.namespace.is_empty() {
            anyhow::bail!("Namespace is required");
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.telemetry.log_level,
                valid_log_levels.join(", ")
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StatsConfig::default();

        assert_eq!(config.sink.resolved_address(), DEFAULT_SINK_ADDRESS);
        assert_eq!(config.sink.payload_size, 512);
        assert_eq!(config.sink.precision, Precision::Ns);
        assert_eq!(config.metrics.measurement, "rpc_latency");
        assert_eq!(config.metrics.tag_policy, TagPolicy::Always);
        assert_eq!(config.metrics.write_timeout(), Some(Duration::from_millis(50)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = StatsConfig::from_toml_str(
            r#"
            [sink]
            address = "10.0.0.5:9999"
            precision = "ms"

            [metrics]
            namespace = "payments"
            tag_policy = "error_only"
            "#,
        )
        .unwrap();

        assert_eq!(config.sink.resolved_address(), "10.0.0.5:9999");
        assert_eq!(config.sink.payload_size, DEFAULT_PAYLOAD_SIZE);
        assert_eq!(config.sink.precision, Precision::Ms);
        assert_eq!(config.metrics.namespace, "payments");
        assert_eq!(config.metrics.measurement, "rpc_latency");
        assert_eq!(config.metrics.tag_policy, TagPolicy::ErrorOnly);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StatsConfig::default();
        assert!(config.validate().is_ok());

        config.sink.payload_size = 0;
        assert!(config.validate().is_err());
        config.sink.payload_size = 512;

        config.metrics.namespace = String::new();
        assert!(config.validate().is_err());
        config.metrics.namespace = "db".to_string();

        config.telemetry.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_tag_policy_rejected() {
        let result = StatsConfig::from_toml_str("[metrics]\ntag_policy = \"sometimes\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_write_timeout_disables_bound() {
        let config = StatsConfig::from_toml_str("[metrics]\nwrite_timeout_ms = 0\n").unwrap();
        assert_eq!(config.metrics.write_timeout(), None);
    }
}
