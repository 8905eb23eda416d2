//! redb-backed clean-scan and detection records.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use glamscan_core::ContentHash;

use crate::error::StoreError;

// Keys are raw path bytes; two distinct paths never share a record.

/// Path → modification stamp of the last clean scan.
const FILES: TableDefinition<&[u8], &str> = TableDefinition::new("files");
/// Path → content digest at detection time.
const VIRUSES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("viruses");

/// One entry of the detection history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirusRecord {
    pub path: PathBuf,
    pub digest: ContentHash,
}

/// Handle on the record database.
///
/// Safe to share between tasks; redb serializes write transactions
/// internally. Every call is synchronous, so async callers should move
/// writes onto a blocking thread.
pub struct ScanStore {
    db: Database,
}

impl ScanStore {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let txn = db.begin_write()?;
        txn.open_table(FILES)?;
        txn.open_table(VIRUSES)?;
        txn.commit()?;

        debug!(path = %path.display(), "record store opened");
        Ok(Self { db })
    }

    /// Stamp recorded by the last clean scan of `path`.
    pub fn clean_stamp(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        let stamp = table
            .get(key(path))?
            .map(|guard| guard.value().to_string());
        Ok(stamp)
    }

    /// Whether `path` was scanned clean with exactly this modification stamp.
    pub fn is_unchanged(&self, path: &Path, stamp: &str) -> Result<bool, StoreError> {
        Ok(self.clean_stamp(path)?.as_deref() == Some(stamp))
    }

    /// Record a clean scan of `path` at modification stamp `stamp`.
    pub fn record_clean(&self, path: &Path, stamp: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FILES)?;
            table.insert(key(path), stamp)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Record the digest of an infected file.
    pub fn record_virus(&self, path: &Path, digest: &ContentHash) -> Result<(), StoreError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(VIRUSES)?;
            table.insert(key(path), digest.as_bytes().as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Digest recorded for `path`, if it was ever found infected.
    pub fn virus_digest(&self, path: &Path) -> Result<Option<ContentHash>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(VIRUSES)?;
        match table.get(key(path))? {
            Some(guard) => decode_digest(path, guard.value()).map(Some),
            None => Ok(None),
        }
    }

    /// Every detection on record, ordered by path.
    pub fn viruses(&self) -> Result<Vec<VirusRecord>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(VIRUSES)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (path, digest) = entry?;
            let path = path_from_key(path.value());
            let digest = decode_digest(&path, digest.value())?;
            records.push(VirusRecord { path, digest });
        }
        Ok(records)
    }
}

fn key(path: &Path) -> &[u8] {
    path.as_os_str().as_encoded_bytes()
}

#[cfg(unix)]
fn path_from_key(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
}

// Only valid UTF-8 survives exactly; anything else is for display only.
#[cfg(not(unix))]
fn path_from_key(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

fn decode_digest(path: &Path, bytes: &[u8]) -> Result<ContentHash, StoreError> {
    ContentHash::from_slice(bytes).ok_or_else(|| StoreError::CorruptDigest {
        path: path.to_path_buf(),
        len: bytes.len(),
    })
}
