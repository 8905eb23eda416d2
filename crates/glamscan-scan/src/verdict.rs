//! What happens to a file once its verdict arrives.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, warn};

use glamscan_core::{ContentHash, Verdict};
use glamscan_store::ScanStore;

/// Render a modification time as the string stored in clean records.
///
/// RFC 3339 in UTC with nanoseconds, so any change of the timestamp
/// changes the string.
pub fn modified_stamp(modified: SystemTime) -> String {
    DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// BLAKE3 digest of a file's content.
pub fn digest_file(path: &Path) -> io::Result<ContentHash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Applies verdicts to the record store and the filesystem.
///
/// Every failure is logged and absorbed.
#[derive(Clone)]
pub struct VerdictHandler {
    store: Arc<ScanStore>,
}

impl VerdictHandler {
    pub fn new(store: Arc<ScanStore>) -> Self {
        Self { store }
    }

    /// Apply `verdict` for the file at `path`, seen with modification `stamp`.
    ///
    /// Blocking: touches the database and the filesystem.
    pub fn apply(&self, path: &Path, stamp: &str, verdict: Verdict) {
        match verdict {
            Verdict::Clean => {
                debug!(path = %path.display(), "OK");
                if let Err(err) = self.store.record_clean(path, stamp) {
                    error!(path = %path.display(), error = %err, "cannot record clean scan");
                }
            }
            Verdict::Errored => {
                debug!(path = %path.display(), "scan failed, will retry next cycle");
            }
            Verdict::Infected => {
                warn!(path = %path.display(), "virus found");
                self.quarantine(path);
            }
        }
    }

    /// Record the digest, then delete the file. Neither step undoes the other.
    fn quarantine(&self, path: &Path) {
        match digest_file(path) {
            Ok(digest) => {
                if let Err(err) = self.store.record_virus(path, &digest) {
                    error!(path = %path.display(), error = %err, "cannot record detection");
                } else {
                    debug!(path = %path.display(), digest = %digest, "detection recorded");
                }
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot hash infected file");
            }
        }

        if let Err(err) = std::fs::remove_file(path) {
            error!(path = %path.display(), error = %err, "cannot remove infected file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn handler(dir: &Path) -> (VerdictHandler, Arc<ScanStore>) {
        let store = Arc::new(ScanStore::open(dir.join("glamscan.db")).unwrap());
        (VerdictHandler::new(Arc::clone(&store)), store)
    }

    #[test]
    fn test_stamp_keeps_nanoseconds() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let a = modified_stamp(base);
        let b = modified_stamp(base + Duration::from_nanos(1));

        assert_eq!(a, "2023-11-14T22:13:20.000000000Z");
        assert_ne!(a, b);
    }

    #[test]
    fn test_digest_matches_blake3() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample");
        std::fs::write(&path, b"hello world").unwrap();

        let digest = digest_file(&path).unwrap();
        assert_eq!(digest.as_bytes(), blake3::hash(b"hello world").as_bytes());
    }

    #[test]
    fn test_clean_records_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(dir.path());
        let path = dir.path().join("ok.txt");
        std::fs::write(&path, "fine").unwrap();

        handler.apply(&path, "stamp-1", Verdict::Clean);
        assert!(store.is_unchanged(&path, "stamp-1").unwrap());
        assert!(path.exists());
    }

    #[test]
    fn test_errored_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(dir.path());
        let path = dir.path().join("flaky.bin");
        std::fs::write(&path, "data").unwrap();

        handler.apply(&path, "stamp-1", Verdict::Errored);
        assert_eq!(store.clean_stamp(&path).unwrap(), None);
        assert_eq!(store.virus_digest(&path).unwrap(), None);
        assert!(path.exists());
    }

    #[test]
    fn test_infected_is_recorded_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(dir.path());
        let path = dir.path().join("bad.exe");
        std::fs::write(&path, b"malicious payload").unwrap();

        handler.apply(&path, "stamp-1", Verdict::Infected);

        assert!(!path.exists());
        let digest = store.virus_digest(&path).unwrap().unwrap();
        assert_eq!(digest.as_bytes(), blake3::hash(b"malicious payload").as_bytes());
        assert_eq!(store.clean_stamp(&path).unwrap(), None);
    }

    #[test]
    fn test_infected_file_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let (handler, store) = handler(dir.path());
        let path = dir.path().join("vanished.exe");

        handler.apply(&path, "stamp-1", Verdict::Infected);
        assert_eq!(store.virus_digest(&path).unwrap(), None);
    }
}
