//! clamd client and worker pool for glamscan.
//!
//! This crate owns everything that talks to the scanning daemon:
//!
//! - **Protocol** - the INSTREAM wire codec: a command line, 4-byte
//!   big-endian length-prefixed chunks, a zero-length terminator, then one
//!   reply line
//! - **Transport** - TCP or Unix socket connections with timeouts
//! - **Workers** - one connection each, one job at a time
//! - **Queue** - a bounded dispatcher that hands each submission to the next
//!   idle worker
//!
//! # Example
//!
//! ```rust,no_run
//! use glamscan_core::DaemonConfig;
//! use glamscan_daemon::ScanQueue;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut queue = ScanQueue::connect(&DaemonConfig::tcp("127.0.0.1", 3310)).await?;
//! queue.start();
//!
//! let ticket = queue.handle().submit("/srv/uploads/report.pdf").await?;
//! println!("verdict: {}", ticket.verdict().await);
//!
//! queue.stop().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod job;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
mod protocol;
mod queue;
mod transport;
mod worker;

pub use error::{DaemonError, ProtocolError, QueueError};
pub use job::{ScanJob, ScanTicket};
pub use protocol::{InstreamClient, MAX_REPLY_LEN};
pub use queue::{QueueHandle, ScanQueue};
pub use transport::{Connector, DaemonIo, DaemonStream};

// Re-export core types for convenience
pub use glamscan_core::{DaemonConfig, Transport, Verdict};
