//! Latency instrumentation for tonic servers.
//!
//! Meters every call of a server through [`LatencyLayer`], or wraps single
//! unary and streaming handlers. Each call is written as one point (method,
//! outcome, latency in milliseconds) through a
//! [`MetricSink`](rpcstats_sink::MetricSink). Sink failures are logged and
//! never change what the caller receives.

pub mod interceptors;
pub mod server_stream;
pub mod status;

pub use interceptors::{
    InterceptorSettings, LatencyInterceptors, LatencyLayer, LatencyService, MeteredBody,
    MeteredStream, StreamLatencyInterceptor, StreamServerInfo, UnaryLatencyInterceptor,
    UnaryServerInfo,
};
pub use server_stream::{ChannelServerStream, ResponseStream, ServerStream, WrappedServerStream};
pub use status::code_name;
