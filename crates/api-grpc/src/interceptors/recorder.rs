//! Builds and submits one latency point per call.

use super::tags::{CallFields, CallTags};
use rpcstats_common::{MetricsConfig, TagPolicy};
use rpcstats_sink::{MetricOptions, MetricSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tonic::Status;
use tracing::{debug, warn};

/// Per-interceptor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptorSettings {
    pub tag_policy: TagPolicy,
    /// Points whose write takes longer than this are dropped. `None` waits for
    /// the sink.
    pub write_timeout: Option<Duration>,
}

impl Default for InterceptorSettings {
    fn default() -> Self {
        Self {
            tag_policy: TagPolicy::Always,
            write_timeout: Some(Duration::from_millis(50)),
        }
    }
}

impl From<&MetricsConfig> for InterceptorSettings {
    fn from(config: &MetricsConfig) -> Self {
        Self {
            tag_policy: config.tag_policy,
            write_timeout: config.write_timeout(),
        }
    }
}

/// Immutable state shared by the unary and streaming interceptors
#[derive(Clone)]
pub(crate) struct LatencyRecorder {
    sink: Arc<dyn MetricSink>,
    template: Arc<MetricOptions>,
    settings: InterceptorSettings,
}

impl LatencyRecorder {
    pub(crate) fn new(
        sink: Arc<dyn MetricSink>,
        template: MetricOptions,
        settings: InterceptorSettings,
    ) -> Self {
        Self {
            sink,
            template: Arc::new(template),
            settings,
        }
    }

    pub(crate) fn settings(&self) -> InterceptorSettings {
        self.settings
    }

    pub(crate) fn template(&self) -> &MetricOptions {
        &self.template
    }

    /// Write the point for one finished call. Failures are logged, never returned.
    pub(crate) async fn record(&self, method: &str, outcome: Option<&Status>, elapsed: Duration) {
        let fields = CallFields::from_elapsed(elapsed);
        let tags = CallTags::derive(method, outcome, self.settings.tag_policy);
        let options = self.template.for_call(tags.into_tags(), fields.into_fields());

        let write = self.sink.write(&options);
        let result = match self.settings.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        method = %method,
                        timeout = ?limit,
                        "Latency metric write timed out, point dropped"
                    );
                    return;
                }
            },
            None => write.await,
        };

        match result {
            Ok(()) => debug!(
                method = %method,
                latency_ms = fields.latency_ms,
                "Recorded call latency"
            ),
            Err(e) => warn!(
                method = %method,
                kind = e.kind(),
                error = %e,
                "Failed to write latency metric"
            ),
        }
    }
}

/// One in-flight call whose point is written from a poll context, such as a
/// response stream or body.
///
/// Emits exactly once. A meter dropped before [`CallMeter::finish`] records the
/// call as `CANCELLED`.
pub(crate) struct CallMeter {
    recorder: LatencyRecorder,
    method: String,
    start: Instant,
    finished: bool,
}

impl CallMeter {
    pub(crate) fn start(recorder: LatencyRecorder, method: impl Into<String>) -> Self {
        Self {
            recorder,
            method: method.into(),
            start: Instant::now(),
            finished: false,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Write the point on a spawned task. Later calls are ignored.
    pub(crate) fn finish(&mut self, outcome: Option<Status>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed = self.start.elapsed();
        let recorder = self.recorder.clone();
        let method = std::mem::take(&mut self.method);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    recorder.record(&method, outcome.as_ref(), elapsed).await;
                });
            }
            Err(_) => warn!(
                method = %method,
                "No tokio runtime to write call latency, point dropped"
            ),
        }
    }
}

impl Drop for CallMeter {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(Some(Status::cancelled("call dropped before completion")));
        }
    }
}
