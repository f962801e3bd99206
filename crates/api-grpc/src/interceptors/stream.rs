//! Streaming call latency interceptor
//!
//! A stream produces one point covering its whole lifetime, never one per
//! message.

use super::recorder::{CallMeter, InterceptorSettings, LatencyRecorder};
use crate::server_stream::{ServerStream, WrappedServerStream};
use futures::Stream;
use rpcstats_sink::{MetricOptions, MetricSink};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tonic::Status;

/// Identity of a streaming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamServerInfo {
    /// Fully qualified method, e.g. `/pkg.Service/Method`
    pub full_method: String,
    pub is_client_stream: bool,
    pub is_server_stream: bool,
}

impl StreamServerInfo {
    pub fn new(full_method: impl Into<String>, is_client_stream: bool, is_server_stream: bool) -> Self {
        Self {
            full_method: full_method.into(),
            is_client_stream,
            is_server_stream,
        }
    }
}

#[derive(Clone)]
pub struct StreamLatencyInterceptor {
    recorder: LatencyRecorder,
}

impl StreamLatencyInterceptor {
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

    /// Run a streaming handler over a pass-through wrapper of `stream` and
    /// return its result unchanged. Latency covers the handler from start to
    /// return.
    pub async fn intercept<Srv, St, H, Fut>(
        &self,
        server: Srv,
        stream: St,
        info: &StreamServerInfo,
        handler: H,
    ) -> Result<(), Status>
    where
        St: ServerStream,
        H: FnOnce(Srv, WrappedServerStream<St>) -> Fut,
        Fut: Future<Output = Result<(), Status>>,
    {
        let start = Instant::now();
        let result = handler(server, WrappedServerStream::new(stream)).await;
        let elapsed = start.elapsed();

        self.recorder
            .record(&info.full_method, result.as_ref().err(), elapsed)
            .await;

        result
    }

    /// Meter a tonic response stream.
    ///
    /// The point is written when the stream ends, when it yields its first
    /// error (recorded as the outcome), or when it is dropped unfinished
    /// (recorded as `CANCELLED`). The write runs on a spawned task.
    pub fn meter<St>(&self, info: &StreamServerInfo, stream: St) -> MeteredStream<St> {
        MeteredStream {
            inner: stream,
            call: CallMeter::start(self.recorder.clone(), info.full_method.as_str()),
        }
    }
}

/// Response stream that writes one latency point for its lifetime.
pub struct MeteredStream<St> {
    inner: St,
    call: CallMeter,
}

impl<St, T> Stream for MeteredStream<St>
where
    St: Stream<Item = Result<T, Status>> + Unpin,
{
    type Item = Result<T, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let item = Pin::new(&mut this.inner).poll_next(cx);

        match &item {
            Poll::Ready(Some(Err(status))) => this.call.finish(Some(status.clone())),
            Poll::Ready(None) => this.call.finish(None),
            _ => {}
        }

        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
