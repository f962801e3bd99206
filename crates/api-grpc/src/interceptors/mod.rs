//! gRPC latency interceptors
//!
//! Both interceptors share one sink and one measurement template; see
//! [`LatencyInterceptors`]. [`LatencyLayer`] meters every call of a server
//! from a single registration on the builder.

pub mod layer;
pub mod recorder;
pub mod stream;
pub mod tags;
pub mod unary;

pub use layer::{LatencyLayer, LatencyService, MeteredBody};
pub use recorder::InterceptorSettings;
pub use stream::{MeteredStream, StreamLatencyInterceptor, StreamServerInfo};
pub use tags::{CallFields, CallTags};
pub use unary::{UnaryLatencyInterceptor, UnaryServerInfo};

use anyhow::{Context, Result};
use recorder::LatencyRecorder;
use rpcstats_common::StatsConfig;
use rpcstats_sink::{MetricOptions, MetricSink, UdpSink};
use std::sync::Arc;
use tracing::info;

/// The unary and streaming interceptors registered on one server
#[derive(Clone)]
pub struct LatencyInterceptors {
    pub unary: UnaryLatencyInterceptor,
    pub stream: StreamLatencyInterceptor,
    recorder: LatencyRecorder,
}

impl LatencyInterceptors {
    pub fn new(
        sink: Arc<dyn MetricSink>,
        options: MetricOptions,
        settings: InterceptorSettings,
    ) -> Self {
        info!(
            measurement = %options.measurement,
            namespace = %options.namespace,
            tag_policy = settings.tag_policy.as_str(),
            write_timeout = ?settings.write_timeout,
            "Latency interceptors configured"
        );

        let recorder = LatencyRecorder::new(sink, options, settings);
        Self {
            unary: UnaryLatencyInterceptor::from_recorder(recorder.clone()),
            stream: StreamLatencyInterceptor::from_recorder(recorder.clone()),
            recorder,
        }
    }

    /// Build the UDP sink and measurement template described by `config`.
    ///
    /// Fails if the sink address is invalid; callers should treat this as
    /// fatal at startup.
    pub async fn from_config(config: &StatsConfig) -> Result<Self> {
        let sink = UdpSink::with_config(&config.sink)
            .await
            .with_context(|| {
                format!(
                    "Failed to create metrics sink for {}",
                    config.sink.resolved_address()
                )
            })?;

        let options = MetricOptions::new(
            config.metrics.measurement.as_str(),
            config.metrics.namespace.as_str(),
        );

        Ok(Self::new(
            Arc::new(sink),
            options,
            InterceptorSettings::from(&config.metrics),
        ))
    }

    /// Tower layer for `Server::builder().layer(..)`, sharing this pair's sink
    /// and template.
    pub fn layer(&self) -> LatencyLayer {
        LatencyLayer::from_recorder(self.recorder.clone())
    }

    pub fn options(&self) -> &MetricOptions {
        self.unary.options()
    }
}
