//! Unary call latency interceptor

use super::recorder::{InterceptorSettings, LatencyRecorder};
use rpcstats_sink::{MetricOptions, MetricSink};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

/// Identity of a unary call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryServerInfo {
    /// Fully qualified method, e.g. `/pkg.Service/Method`
    pub full_method: String,
}

impl UnaryServerInfo {
    pub fn new(full_method: impl Into<String>) -> Self {
        Self {
            full_method: full_method.into(),
        }
    }
}

/// Measures each unary call and writes one point per call.
///
/// ```rust,ignore
/// async fn check(&self, request: Request<CheckRequest>) -> Result<Response<CheckReply>, Status> {
///     self.latency
///         .intercept(request, &self.check_info, |req| self.inner.check(req))
///         .await
/// }
/// ```
#[derive(Clone)]
pub struct UnaryLatencyInterceptor {
    recorder: LatencyRecorder,
}

impl UnaryLatencyInterceptor {
    pub fn new(
        sink: Arc<dyn MetricSink>,
        options: MetricOptions,
        settings: InterceptorSettings,
    ) -> Self {
        Self {
            recorder: LatencyRecorder::new(sink, options, settings),
        }
    }

    pub(crate) fn from_recorder(recorder: LatencyRecorder) -> Self {
        Self { recorder }
    }

    pub fn settings(&self) -> InterceptorSettings {
        self.recorder.settings()
    }

    /// Measurement template cloned for every call
    pub fn options(&self) -> &MetricOptions {
        self.recorder.template()
    }

    /// Run `handler` and return its result unchanged, writing the call's
    /// latency point before returning.
    pub async fn intercept<Req, Resp, H, Fut>(
        &self,
        request: Request<Req>,
        info: &UnaryServerInfo,
        handler: H,
    ) -> Result<Response<Resp>, Status>
    where
        H: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        let start = Instant::now();
        let result = handler(request).await;
        let elapsed = start.elapsed();

        self.recorder
            .record(&info.full_method, result.as_ref().err(), elapsed)
            .await;

        result
    }
}
