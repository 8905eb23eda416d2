//! Error types for daemon communication.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors establishing a daemon connection or building the pool.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The daemon refused or dropped the connection attempt.
    #[error("Cannot connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection attempt did not complete in time.
    #[error("Timed out after {timeout:?} connecting to daemon at {endpoint}")]
    Timeout { endpoint: String, timeout: Duration },

    /// Invalid pool configuration.
    #[error("Invalid daemon configuration: {message}")]
    InvalidConfig { message: String },
}

/// Failure modes of one INSTREAM exchange.
///
/// These never leave a worker; they are logged and resolved to
/// [`Verdict::Errored`](glamscan_core::Verdict::Errored).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The file to scan could not be opened.
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the file failed before end of file.
    #[error("Read error: {0}")]
    Read(#[source] std::io::Error),

    /// Writing the command or a frame to the daemon failed.
    #[error("Write to daemon failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading the reply line failed.
    #[error("Reading daemon reply failed: {0}")]
    Response(#[source] std::io::Error),

    /// The daemon closed the connection before a full reply line.
    #[error("Daemon closed the connection before replying")]
    Truncated,
}

/// Errors submitting work to the queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has been stopped.
    #[error("Scan queue is closed")]
    Closed,
}
