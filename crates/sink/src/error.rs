//! Error types for metric sinks.

use thiserror::Error;

/// Errors returned by sink construction and [`MetricSink::write`](crate::MetricSink::write).
///
/// Write-time failures collapse into this one type; [`SinkError::kind`] keeps
/// the cause available for log fields.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid sink configuration: {0}")]
    Config(String),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Point error: {0}")]
    Point(#[from] PointError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl SinkError {
    /// Short machine-readable name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Batch(_) => "batch",
            Self::Point(_) => "point",
            Self::Transport(_) => "transport",
        }
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Namespace {0:?} contains control characters")]
    InvalidNamespace(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum PointError {
    #[error("Point has no measurement name")]
    MissingMeasurement,

    #[error("Point without fields is unsupported")]
    NoFields,

    #[error("Tag key cannot be empty")]
    EmptyTagKey,

    #[error("Field key cannot be empty")]
    EmptyFieldKey,

    #[error("Field {field:?} has unsupported value {value}")]
    UnsupportedValue { field: String, value: String },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoded point is {size} bytes, larger than the maximum datagram of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(TransportError::Io(err))
    }
}

pub type SinkResult<T> = Result<T, SinkError>;
