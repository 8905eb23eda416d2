//! Repeating directory scan for glamscan.
//!
//! A [`Sentinel`] walks its root on an interval. Each regular file that is
//! within the size ceiling and not recorded clean at its current
//! modification time is submitted to a [`glamscan_daemon::ScanQueue`]; the
//! walk never waits for a verdict. Verdicts are applied as they arrive:
//!
//! - **Clean** - the modification stamp is recorded, so the file is skipped
//!   until it changes
//! - **Errored** - nothing is recorded; the file is retried next cycle
//! - **Infected** - the content digest is recorded and the file is deleted
//!
//! A cycle ends once every verdict it produced has been applied.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use glamscan_core::{DaemonConfig, ScanConfig};
//! use glamscan_daemon::ScanQueue;
//! use glamscan_scan::Sentinel;
//! use glamscan_store::ScanStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(ScanStore::open("glamscan.db")?);
//! let mut queue = ScanQueue::connect(&DaemonConfig::tcp("127.0.0.1", 3310)).await?;
//! queue.start();
//!
//! let mut sentinel = Sentinel::new(ScanConfig::new("/srv/uploads"), store, queue.handle())?;
//! let mut reports = sentinel.subscribe();
//! sentinel.start();
//!
//! let stats = reports.recv().await?;
//! println!("{stats}");
//!
//! sentinel.stop().await;
//! queue.stop().await;
//! # Ok(())
//! # }
//! ```

mod sentinel;
mod verdict;
mod walk;

pub use sentinel::{REPORT_TARGET, Sentinel};
pub use verdict::{VerdictHandler, digest_file, modified_stamp};

// Re-export core types for convenience
pub use glamscan_core::{CycleStats, ScanConfig, ScanError, Verdict};
