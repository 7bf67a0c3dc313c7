//! Byte-channel transports.
//!
//! A [`Transport`] knows how to open one duplex byte channel to the
//! device. Closing is dropping the channel.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::SyncError;

/// A duplex byte stream the link task can own.
pub trait ByteChannel: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ByteChannel for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Channel: ByteChannel;

    async fn connect(&self) -> Result<Self::Channel, SyncError>;
}

/// TCP byte channel, e.g. to an RFCOMM bridge.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    address: String,
    timeout: Option<Duration>,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Channel = TcpStream;

    async fn connect(&self) -> Result<TcpStream, SyncError> {
        debug!(address = %self.address, "opening tcp channel");
        let connect = TcpStream::connect(self.address.as_str());
        let stream = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                SyncError::Connection(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", self.address),
                ))
            })??,
            None => connect.await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
