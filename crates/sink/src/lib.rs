//! Metric sinks for RPC latency points.
//!
//! A [`MetricSink`] delivers batches of [`Point`]s to a time-series backend.
//! [`UdpSink`] sends them as line protocol datagrams to an InfluxDB-compatible
//! UDP listener.
//!
//! ```rust,no_run
//! use rpcstats_sink::{FieldValue, MetricOptions, MetricSink, UdpSink};
//!
//! # async fn run() -> Result<(), rpcstats_sink::SinkError> {
//! let sink = UdpSink::new("").await?;
//!
//! let mut opts = MetricOptions::new("rpc_latency", "rpc_stats");
//! opts.tags.insert("method".to_string(), "/pkg.Service/Ping".to_string());
//! opts.fields.insert("latency".to_string(), FieldValue::Float(3.2));
//!
//! sink.write(&opts).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod options;
pub mod point;
pub mod udp;

pub use batch::BatchPoints;
pub use error::{BatchError, PointError, SinkError, SinkResult, TransportError};
pub use options::MetricOptions;
pub use point::{FieldValue, Fields, Point, Tags};
pub use rpcstats_common::Precision;
pub use udp::UdpSink;

use async_trait::async_trait;
use chrono::Utc;

/// Destination for metric points.
///
/// Implementations are shared across concurrent calls, so both methods take
/// `&self`.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Deliver a batch of points to the backend.
    async fn write_batch(&self, batch: &BatchPoints) -> SinkResult<()>;

    /// Timestamp precision used for batches built by [`MetricSink::write`].
    fn precision(&self) -> Precision {
        Precision::Ns
    }

    /// Build one point from `options`, stamped now, and deliver it as a batch
    /// of one.
    async fn write(&self, options: &MetricOptions) -> SinkResult<()> {
        let mut batch = BatchPoints::new(options.namespace.as_str(), self.precision())?;
        let point = Point::new(
            options.measurement.as_str(),
            options.tags.clone(),
            options.fields.clone(),
            Utc::now(),
        )?;
        batch.add_point(point);

        self.write_batch(&batch).await
    }
}
