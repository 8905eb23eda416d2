//! Persistent records for glamscan.
//!
//! A single [`redb`] database holds two tables:
//!
//! - `files` - path to the modification stamp of the last clean scan; a file
//!   whose current stamp matches is skipped
//! - `viruses` - path to the BLAKE3 digest captured when the file was found
//!   infected; an audit trail never consulted by the scan loop

mod error;
mod store;

pub use error::StoreError;
pub use store::{ScanStore, VirusRecord};
