//! Error types for the record store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing the record database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be created or opened.
    #[error("Cannot open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: redb::DatabaseError,
    },

    #[error("Database transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Database table unavailable: {0}")]
    Table(#[from] redb::TableError),

    #[error("Database storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Database commit failed: {0}")]
    Commit(#[from] redb::CommitError),

    /// A stored digest has the wrong length.
    #[error("Corrupt digest stored for {}: {len} bytes", path.display())]
    CorruptDigest { path: PathBuf, len: usize },
}
