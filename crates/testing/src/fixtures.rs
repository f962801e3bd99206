//! Test fixtures

use rpcstats_sink::MetricOptions;

pub const TEST_MEASUREMENT: &str = "rpc_latency";
pub const TEST_NAMESPACE: &str = "test_db";

pub const PING_METHOD: &str = "/test.TestService/Ping";
pub const PING_ERROR_METHOD: &str = "/test.TestService/PingError";
pub const PING_LIST_METHOD: &str = "/test.TestService/PingList";
pub const PING_STREAM_METHOD: &str = "/test.TestService/PingStream";

/// Number of responses a `PingList` handler sends
pub const COUNT_LIST_RESPONSES: usize = 20;

pub fn test_options() -> MetricOptions {
    MetricOptions::new(TEST_MEASUREMENT, TEST_NAMESPACE)
}

