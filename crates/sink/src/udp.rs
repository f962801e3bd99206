//! UDP line protocol sink.

use crate::batch::BatchPoints;
use crate::error::{SinkError, SinkResult, TransportError};
use crate::MetricSink;
use async_trait::async_trait;
use rpcstats_common::{Precision, SinkConfig};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Sends batches as newline-terminated line protocol over a connected UDP
/// socket.
///
/// Lines are packed into datagrams of at most `payload_size` bytes; a line
/// longer than that travels alone. Construction binds a local socket and fixes
/// the peer but sends nothing.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    peer: SocketAddr,
    payload_size: usize,
    precision: Precision,
}

impl UdpSink {
    /// Create a sink for `address` with default payload size and precision.
    /// An empty address selects `127.0.0.1:8089`.
    pub async fn new(address: &str) -> SinkResult<Self> {
        let config = SinkConfig {
            address: address.to_string(),
            ..Default::default()
        };
        Self::with_config(&config).await
    }

    pub async fn with_config(config: &SinkConfig) -> SinkResult<Self> {
        if config.payload_size == 0 {
            return Err(SinkError::Config("payload size must be greater than 0".to_string()));
        }

        let address = config.resolved_address();
        let peer = tokio::net::lookup_host(address)
            .await
            .map_err(|e| SinkError::Config(format!("invalid address {:?}: {}", address, e)))?
            .next()
            .ok_or_else(|| SinkError::Config(format!("address {:?} did not resolve", address)))?;

        let local: SocketAddr = if peer.is_ipv4() {
            ([0u8, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;

        info!(
            peer = %peer,
            payload_size = config.payload_size,
            "Metrics UDP sink ready"
        );

        Ok(Self {
            socket,
            peer,
            payload_size: config.payload_size,
            precision: config.precision,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    async fn send(&self, payload: &[u8]) -> SinkResult<()> {
        self.socket.send(payload).await.map_err(TransportError::from)?;
        Ok(())
    }
}

#[async_trait]
impl MetricSink for UdpSink {
    async fn write_batch(&self, batch: &BatchPoints) -> SinkResult<()> {
        let mut payload = String::with_capacity(self.payload_size);
        let mut datagrams = 0usize;

        for mut line in batch.lines() {
            line.push('\n');
            if line.len() > MAX_DATAGRAM_SIZE {
                return Err(TransportError::PayloadTooLarge {
                    size: line.len(),
                    max: MAX_DATAGRAM_SIZE,
                }
                .into());
            }

            if !payload.is_empty() && payload.len() + line.len() > self.payload_size {
                self.send(payload.as_bytes()).await?;
                datagrams += 1;
                payload.clear();
            }
            payload.push_str(&line);
        }

        if !payload.is_empty() {
            self.send(payload.as_bytes()).await?;
            datagrams += 1;
        }

        debug!(
            namespace = %batch.namespace(),
            points = batch.len(),
            datagrams,
            "Wrote metric batch"
        );

        Ok(())
    }

    fn precision(&self) -> Precision {
        self.precision
    }
}
