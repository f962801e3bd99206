//! UDP sink tests against a local listener.

use chrono::{TimeZone, Utc};
use rpcstats_common::SinkConfig;
use rpcstats_sink::{
    BatchPoints, FieldValue, Fields, MetricOptions, MetricSink, Point, Precision, SinkError,
    Tags, TransportError, UdpSink,
};
use std::time::Duration;
use tokio::net::UdpSocket;

async fn listener() -> (UdpSocket, String) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap().to_string();
    (socket, addr)
}

async fn recv_datagram(socket: &UdpSocket) -> String {
    let mut buf = vec![0u8; 70_000];
    let len = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf))
        .await
        .expect("no datagram received")
        .unwrap();
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

fn point(secs: i64, latency: f64) -> Point {
    let mut tags = Tags::new();
    tags.insert("method".to_string(), "/test.TestService/Ping".to_string());
    let mut fields = Fields::new();
    fields.insert("latency".to_string(), FieldValue::Float(latency));
    Point::new("rpc_latency", tags, fields, Utc.timestamp_opt(secs, 0).unwrap()).unwrap()
}

#[tokio::test]
async fn test_new_sink_with_empty_address_uses_default() {
    let sink = UdpSink::new("").await.expect("empty address should select the default");
    assert_eq!(sink.peer().to_string(), "127.0.0.1:8089");
    assert_eq!(sink.payload_size(), 512);
}

#[tokio::test]
async fn test_new_sink_rejects_bad_address() {
    let err = UdpSink::new("not an address").await.unwrap_err();
    assert!(matches!(err, SinkError::Config(_)));
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn test_zero_payload_size_rejected() {
    let config = SinkConfig {
        address: "127.0.0.1:8089".to_string(),
        payload_size: 0,
        ..Default::default()
    };
    assert!(matches!(
        UdpSink::with_config(&config).await,
        Err(SinkError::Config(_))
    ));
}

#[tokio::test]
async fn test_write_sends_one_line_protocol_datagram() {
    let (server, addr) = listener().await;
    let sink = UdpSink::new(&addr).await.unwrap();

    let mut opts = MetricOptions::new("rpc_latency", "rpc_stats");
    opts.tags.insert("method".to_string(), "/test.TestService/Ping".to_string());
    opts.tags.insert("error_code".to_string(), "OK".to_string());
    opts.fields.insert("latency".to_string(), FieldValue::Float(4.25));

    let before = Utc::now().timestamp_nanos_opt().unwrap();
    sink.write(&opts).await.unwrap();
    let after = Utc::now().timestamp_nanos_opt().unwrap();

    let datagram = recv_datagram(&server).await;
    let line = datagram.strip_suffix('\n').expect("lines are newline-terminated");
    let (head, timestamp) = line.rsplit_once(' ').unwrap();

    assert_eq!(
        head,
        "rpc_latency,error_code=OK,method=/test.TestService/Ping latency=4.25"
    );
    let timestamp: i64 = timestamp.parse().unwrap();
    assert!(timestamp >= before && timestamp <= after);
}

#[tokio::test]
async fn test_write_reports_point_errors() {
    let (_server, addr) = listener().await;
    let sink = UdpSink::new(&addr).await.unwrap();

    // No fields
    let opts = MetricOptions::new("rpc_latency", "rpc_stats");
    let err = sink.write(&opts).await.unwrap_err();
    assert_eq!(err.kind(), "point");

    let mut opts = MetricOptions::new("rpc_latency", "bad\u{7}db");
    opts.fields.insert("latency".to_string(), FieldValue::Float(1.0));
    let err = sink.write(&opts).await.unwrap_err();
    assert_eq!(err.kind(), "batch");
}

#[tokio::test]
async fn test_batch_split_across_datagrams() {
    let (server, addr) = listener().await;
    let config = SinkConfig {
        address: addr,
        payload_size: 80,
        precision: Precision::S,
    };
    let sink = UdpSink::with_config(&config).await.unwrap();

    let mut batch = BatchPoints::new("rpc_stats", Precision::S).unwrap();
    batch.add_point(point(1, 1.0));
    batch.add_point(point(2, 2.0));

    sink.write_batch(&batch).await.unwrap();

    // Each line is 54 bytes, so two lines do not fit in 80
    let first = recv_datagram(&server).await;
    let second = recv_datagram(&server).await;
    assert_eq!(first, "rpc_latency,method=/test.TestService/Ping latency=1 1\n");
    assert_eq!(second, "rpc_latency,method=/test.TestService/Ping latency=2 2\n");
}

#[tokio::test]
async fn test_small_lines_share_a_datagram() {
    let (server, addr) = listener().await;
    let sink = UdpSink::new(&addr).await.unwrap();

    let mut batch = BatchPoints::new("rpc_stats", Precision::S).unwrap();
    batch.add_point(point(1, 1.0));
    batch.add_point(point(2, 2.0));

    sink.write_batch(&batch).await.unwrap();

    let datagram = recv_datagram(&server).await;
    assert_eq!(datagram.lines().count(), 2);
}

#[tokio::test]
async fn test_oversized_line_rejected() {
    let (_server, addr) = listener().await;
    let sink = UdpSink::new(&addr).await.unwrap();

    let mut opts = MetricOptions::new("rpc_latency", "rpc_stats");
    opts.fields.insert("blob".to_string(), FieldValue::String("x".repeat(70_000)));

    let err = sink.write(&opts).await.unwrap_err();
    assert!(matches!(
        err,
        SinkError::Transport(TransportError::PayloadTooLarge { .. })
    ));
}
