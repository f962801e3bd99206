//! Tower layer that meters every call routed by a tonic server.
//!
//! Registered once on the server builder:
//!
//! ```rust,ignore
//! Server::builder()
//!     .layer(stats.layer())
//!     .add_service(PingServer::new(service))
//!     .serve(addr)
//!     .await?;
//! ```
//!
//! The `method` tag is the request path (`/pkg.Service/Method`) as routed by
//! tonic. The outcome is the `grpc-status` of the response headers for
//! trailers-only responses, otherwise of the trailers. A response body dropped
//! before its trailers were read records `CANCELLED`.

use super::recorder::{CallMeter, InterceptorSettings, LatencyRecorder};
use futures::future::BoxFuture;
use http::{HeaderMap, Request, Response};
use http_body::{Body, SizeHint};
use rpcstats_sink::{MetricOptions, MetricSink};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::{Code, Status};
use tower::{Layer, Service};

/// Layer producing [`LatencyService`]s that share one recorder
#[derive(Clone)]
pub struct LatencyLayer {
    recorder: LatencyRecorder,
}

impl LatencyLayer {
    pub fn new(
        sink: Arc<dyn MetricSink>,
        options: MetricOptions,
        settings: InterceptorSettings,
    ) -> Self {
        Self::from_recorder(LatencyRecorder::new(sink, options, settings))
    }

    pub(crate) fn from_recorder(recorder: LatencyRecorder) -> Self {
        Self { recorder }
    }
}

impl<S> Layer<S> for LatencyLayer {
    type Service = LatencyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LatencyService {
            inner,
            recorder: self.recorder.clone(),
        }
    }
}

/// Service wrapping a tonic router or a single generated server
#[derive(Clone)]
pub struct LatencyService<S> {
    inner: S,
    recorder: LatencyRecorder,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for LatencyService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: 'static,
    ResBody: Send + 'static,
{
    type Response = Response<MeteredBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut call = CallMeter::start(self.recorder.clone(), req.uri().path());
        let response = self.inner.call(req);

        Box::pin(async move {
            match response.await {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    // Trailers-only responses carry the status in the headers
                    if let Some(status) = Status::from_header_map(&parts.headers) {
                        call.finish(failure(status));
                    }
                    Ok(Response::from_parts(parts, MeteredBody { inner: body, call }))
                }
                Err(err) => {
                    call.finish(Some(Status::unknown("service failed before responding")));
                    Err(err)
                }
            }
        })
    }
}

/// Response body that records the call once its trailers arrive
pub struct MeteredBody<B> {
    inner: B,
    call: CallMeter,
}

impl<B> Body for MeteredBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_data(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        let this = &mut *self;
        let item = Pin::new(&mut this.inner).poll_data(cx);
        if let Poll::Ready(Some(Err(_))) = &item {
            this.call.finish(Some(Status::internal("response body failed")));
        }
        item
    }

    fn poll_trailers(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap>, Self::Error>> {
        let this = &mut *self;
        let trailers = Pin::new(&mut this.inner).poll_trailers(cx);

        if !this.call.is_finished() {
            match &trailers {
                Poll::Ready(Ok(trailers)) => {
                    let outcome = trailers
                        .as_ref()
                        .and_then(Status::from_header_map)
                        .map(failure)
                        .unwrap_or_else(|| Some(Status::unknown("missing grpc-status")));
                    this.call.finish(outcome);
                }
                Poll::Ready(Err(_)) => {
                    this.call.finish(Some(Status::internal("response trailers failed")))
                }
                Poll::Pending => {}
            }
        }

        trailers
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// `None` for `OK`, the status itself otherwise.
fn failure(status: Status) -> Option<Status> {
    (status.code() != Code::Ok).then_some(status)
}
