//! Mock sinks for testing interceptors without a metrics backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use rpcstats_sink::{BatchPoints, MetricSink, Point, SinkResult, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sink that keeps every point it is given
#[derive(Clone, Default)]
pub struct RecordingSink {
    points: Arc<RwLock<Vec<Point>>>,
    namespaces: Arc<RwLock<Vec<String>>>,
    writes: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<Point> {
        self.points.read().clone()
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().clone()
    }

    /// Number of batches written
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.points.write().clear();
        self.namespaces.write().clear();
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Wait until at least `count` points arrived. Returns false on timeout.
    pub async fn wait_for_points(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.points.read().len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn write_batch(&self, batch: &BatchPoints) -> SinkResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.namespaces.write().push(batch.namespace().to_string());
        self.points.write().extend(batch.points().iter().cloned());
        Ok(())
    }
}

/// Sink whose transport always fails
#[derive(Clone, Default)]
pub struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSink for FailingSink {
    async fn write_batch(&self, _batch: &BatchPoints) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "metrics backend unreachable",
        ))
        .into())
    }
}

/// Sink that stalls for a fixed delay before recording
#[derive(Clone)]
pub struct SlowSink {
    delay: Duration,
    inner: RecordingSink,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: RecordingSink::new(),
        }
    }

    /// Points whose write completed
    pub fn recorded(&self) -> &RecordingSink {
        &self.inner
    }
}

#[async_trait]
impl MetricSink for SlowSink {
    async fn write_batch(&self, batch: &BatchPoints) -> SinkResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.write_batch(batch).await
    }
}
