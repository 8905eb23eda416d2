//! Core types and configuration for glamscan.
//!
//! This crate provides the data structures shared by the daemon client,
//! the dedup store and the scan orchestrator: verdicts, content digests,
//! per-cycle statistics, and the configuration surface.

mod config;
mod error;
mod stats;
mod verdict;

pub use config::{
    DEFAULT_STREAM_COMMAND, DaemonConfig, DaemonConfigBuilder, ScanConfig, ScanConfigBuilder,
    Transport,
};
pub use error::ScanError;
pub use stats::{CycleCounters, CycleStats};
pub use verdict::{ContentHash, DETECTION_MARKER, ERROR_MARKER, Verdict};
