//! Scan jobs and their result handles.

use std::path::{Path, PathBuf};

use tokio::sync::oneshot;

use glamscan_core::Verdict;

/// One file to scan, paired with the sink for its verdict.
#[derive(Debug)]
pub struct ScanJob {
    path: PathBuf,
    result: oneshot::Sender<Verdict>,
}

impl ScanJob {
    /// Create a job and the ticket on which its verdict will appear.
    pub fn new(path: impl Into<PathBuf>) -> (Self, ScanTicket) {
        let (result, rx) = oneshot::channel();
        let job = Self {
            path: path.into(),
            result,
        };
        (job, ScanTicket { rx })
    }

    /// Path of the file to scan.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deliver the verdict. Consumes the job, so it can only happen once.
    pub fn resolve(self, verdict: Verdict) {
        // The submitter may have stopped waiting.
        let _ = self.result.send(verdict);
    }
}

/// Handle on which exactly one verdict is delivered.
#[derive(Debug)]
pub struct ScanTicket {
    rx: oneshot::Receiver<Verdict>,
}

impl ScanTicket {
    /// Wait for the verdict.
    ///
    /// A job dropped without a verdict (for example discarded when the queue
    /// stops) reads as [`Verdict::Errored`], so the file is retried later.
    pub async fn verdict(self) -> Verdict {
        self.rx.await.unwrap_or(Verdict::Errored)
    }
}
