//! Server-side stream handles used by streaming handlers.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tonic::metadata::MetadataMap;
use tonic::{Request, Status};

/// Boxed stream of outbound messages, usable as a tonic response stream
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Bidirectional handle of one streaming call.
#[async_trait]
pub trait ServerStream: Send {
    type Inbound: Send;
    type Outbound: Send;

    /// Request metadata sent by the client
    fn metadata(&self) -> &MetadataMap;

    /// Send one message to the client.
    async fn send(&mut self, message: Self::Outbound) -> Result<(), Status>;

    /// Next message from the client, `None` once the client half-closes.
    async fn recv(&mut self) -> Result<Option<Self::Inbound>, Status>;
}

/// Pass-through decorator handed to instrumented streaming handlers.
///
/// Every operation forwards to the inner stream unchanged.
#[derive(Debug)]
pub struct WrappedServerStream<S> {
    inner: S,
}

impl<S: ServerStream> WrappedServerStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: ServerStream> ServerStream for WrappedServerStream<S> {
    type Inbound = S::Inbound;
    type Outbound = S::Outbound;

    fn metadata(&self) -> &MetadataMap {
        self.inner.metadata()
    }

    async fn send(&mut self, message: Self::Outbound) -> Result<(), Status> {
        self.inner.send(message).await
    }

    async fn recv(&mut self) -> Result<Option<Self::Inbound>, Status> {
        self.inner.recv().await
    }
}

/// [`ServerStream`] over an inbound message stream (such as `tonic::Streaming`)
/// and a bounded channel feeding the response stream.
pub struct ChannelServerStream<S, Out> {
    metadata: MetadataMap,
    inbound: S,
    outbound: mpsc::Sender<Result<Out, Status>>,
}

impl<S, In, Out> ChannelServerStream<S, Out>
where
    S: Stream<Item = Result<In, Status>> + Send + Unpin,
    In: Send,
    Out: Send + 'static,
{
    /// Create the stream handle and the response stream it feeds.
    pub fn new(metadata: MetadataMap, inbound: S, buffer: usize) -> (Self, ResponseStream<Out>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let responses = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        let stream = Self {
            metadata,
            inbound,
            outbound: tx,
        };
        (stream, Box::pin(responses))
    }

    pub fn from_request(request: Request<S>, buffer: usize) -> (Self, ResponseStream<Out>) {
        let (metadata, _extensions, inbound) = request.into_parts();
        Self::new(metadata, inbound, buffer)
    }

    /// Sender into the response stream, e.g. to deliver the handler's final
    /// error status.
    pub fn outbound(&self) -> mpsc::Sender<Result<Out, Status>> {
        self.outbound.clone()
    }
}

#[async_trait]
impl<S, In, Out> ServerStream for ChannelServerStream<S, Out>
where
    S: Stream<Item = Result<In, Status>> + Send + Unpin,
    In: Send,
    Out: Send + 'static,
{
    type Inbound = In;
    type Outbound = Out;

    fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    async fn send(&mut self, message: Out) -> Result<(), Status> {
        self.outbound
            .send(Ok(message))
            .await
            .map_err(|_| Status::cancelled("response stream closed"))
    }

    async fn recv(&mut self) -> Result<Option<In>, Status> {
        self.inbound.next().await.transpose()
    }
}
