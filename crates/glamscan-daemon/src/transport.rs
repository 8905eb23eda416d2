//! Connections to the scanning daemon.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use glamscan_core::{DaemonConfig, Transport};

use crate::error::DaemonError;

/// Anything a worker can stream a file over.
pub trait DaemonIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DaemonIo for T {}

/// An open daemon connection, TCP or Unix.
pub type DaemonStream = Box<dyn DaemonIo>;

/// Opens fresh connections to one daemon endpoint.
#[derive(Debug, Clone)]
pub struct Connector {
    transport: Transport,
    address: String,
    port: u16,
    timeout: Duration,
}

impl Connector {
    /// Create a connector for the configured endpoint.
    pub fn new(config: &DaemonConfig) -> Self {
        Self {
            transport: config.transport,
            address: config.address.clone(),
            port: config.port,
            timeout: config.timeout,
        }
    }

    /// Human-readable endpoint for logs.
    pub fn endpoint(&self) -> String {
        match self.transport {
            Transport::Tcp => format!("{}:{}", self.address, self.port),
            Transport::Unix => self.address.clone(),
        }
    }

    /// Open a new connection, bounded by the configured timeout.
    pub async fn connect(&self) -> Result<DaemonStream, DaemonError> {
        let attempt = async {
            match self.transport {
                Transport::Tcp => {
                    let stream = TcpStream::connect((self.address.as_str(), self.port)).await?;
                    stream.set_nodelay(true)?;
                    Ok::<DaemonStream, io::Error>(Box::new(stream))
                }
                Transport::Unix => connect_unix(&self.address).await,
            }
        };

        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(stream)) => {
                trace!(endpoint = %self.endpoint(), "connected to daemon");
                Ok(stream)
            }
            Ok(Err(source)) => Err(DaemonError::Connect {
                endpoint: self.endpoint(),
                source,
            }),
            Err(_) => Err(DaemonError::Timeout {
                endpoint: self.endpoint(),
                timeout: self.timeout,
            }),
        }
    }

    /// Open a connection and close it again, proving the daemon is reachable.
    pub async fn probe(&self) -> Result<(), DaemonError> {
        let mut stream = self.connect().await?;
        let _ = stream.shutdown().await;
        Ok(())
    }
}

#[cfg(unix)]
async fn connect_unix(path: &str) -> io::Result<DaemonStream> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn connect_unix(_path: &str) -> io::Result<DaemonStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unix sockets are not supported on this platform",
    ))
}
