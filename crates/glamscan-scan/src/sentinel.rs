//! The repeating walk → submit → collect → report cycle.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use glamscan_core::{CycleCounters, CycleStats, ScanConfig, ScanError};
use glamscan_daemon::QueueHandle;
use glamscan_store::ScanStore;

use crate::verdict::{VerdictHandler, modified_stamp};
use crate::walk::{FileEntry, Visit, WalkOutcome, walk_files};

/// Log target of the per-cycle summary.
pub const REPORT_TARGET: &str = "glamscan::report";

/// Periodic scanner of one directory root.
///
/// Submits every new or modified file to the scan queue and applies the
/// verdicts as they arrive.
pub struct Sentinel {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    config: ScanConfig,
    store: Arc<ScanStore>,
    queue: QueueHandle,
    handler: VerdictHandler,
    reports: broadcast::Sender<CycleStats>,
}

impl Sentinel {
    /// Create a sentinel for `config.root`.
    ///
    /// The root is canonicalized and must be a directory.
    pub fn new(
        config: ScanConfig,
        store: Arc<ScanStore>,
        queue: QueueHandle,
    ) -> Result<Self, ScanError> {
        let root = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;
        if !root.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }

        let (reports, _) = broadcast::channel(16);
        let inner = Inner {
            config: ScanConfig { root, ..config },
            handler: VerdictHandler::new(Arc::clone(&store)),
            store,
            queue,
            reports,
        };

        Ok(Self {
            inner: Arc::new(inner),
            cancel: CancellationToken::new(),
            task: None,
        })
    }

    /// Canonical root being scanned.
    pub fn root(&self) -> &Path {
        &self.inner.config.root
    }

    /// Subscribe to the report of every finished cycle.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleStats> {
        self.inner.reports.subscribe()
    }

    /// Run one cycle now and return its statistics.
    ///
    /// Returns once every verdict of the cycle has been applied.
    pub async fn run_cycle(&self) -> CycleStats {
        Arc::clone(&self.inner).cycle(self.cancel.clone()).await
    }

    /// Launch the perpetual cycle loop.
    pub fn start(&mut self) {
        if self.task.is_some() {
            warn!("sentinel already started");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                Arc::clone(&inner).cycle(cancel.clone()).await;
                if cancel.is_cancelled() {
                    break;
                }

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(inner.config.interval) => {}
                }
            }
            debug!("sentinel loop exited");
        }));
    }

    /// Abort any walk in progress, wake the sleep, and wait until the
    /// current cycle has applied all its verdicts.
    ///
    /// A stopped sentinel does not start again.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(error = %err, "sentinel task failed");
            }
        }
    }
}

impl Inner {
    async fn cycle(self: Arc<Self>, cancel: CancellationToken) -> CycleStats {
        let start = Instant::now();
        let root = self.config.root.clone();
        if !cancel.is_cancelled() {
            info!(root = %root.display(), "beginning scan");
        }

        let counters = Arc::new(CycleCounters::new());
        let waiters = TaskTracker::new();

        let walk = {
            let inner = Arc::clone(&self);
            let counters = Arc::clone(&counters);
            let waiters = waiters.clone();
            let runtime = Handle::current();
            tokio::task::spawn_blocking(move || {
                walk_files(&inner.config, &cancel, |file| {
                    inner.visit(file, &counters, &waiters, &runtime)
                })
            })
        };

        let aborted = match walk.await {
            Ok(WalkOutcome::Completed) => false,
            Ok(WalkOutcome::Aborted) => true,
            Err(err) => {
                error!(root = %root.display(), error = %err, "walk failed");
                true
            }
        };

        // Drain every verdict of this cycle, aborted or not.
        waiters.close();
        waiters.wait().await;

        let stats = counters.snapshot(start.elapsed(), aborted);
        self.report(&stats);
        stats
    }

    /// Decide one file: skip it, or submit it and spawn its verdict waiter.
    fn visit(
        &self,
        file: FileEntry,
        counters: &Arc<CycleCounters>,
        waiters: &TaskTracker,
        runtime: &Handle,
    ) -> Visit {
        if self.config.exceeds_size_limit(file.size) {
            debug!(path = %file.path.display(), size = file.size, "skipping large file");
            counters.record_skipped();
            return Visit::Continue;
        }

        let stamp = modified_stamp(file.modified);
        match self.store.is_unchanged(&file.path, &stamp) {
            Ok(true) => {
                debug!(path = %file.path.display(), "skipping, already scanned");
                counters.record_skipped();
                return Visit::Continue;
            }
            Ok(false) => {}
            // Rescanning is the safe direction.
            Err(err) => {
                warn!(path = %file.path.display(), error = %err, "cannot read clean record");
            }
        }

        let ticket = match self.queue.blocking_submit(file.path.clone()) {
            Ok(ticket) => ticket,
            Err(err) => {
                error!(path = %file.path.display(), error = %err, "cannot submit file");
                return Visit::Stop;
            }
        };

        let handler = self.handler.clone();
        let counters = Arc::clone(counters);
        let path = file.path;
        waiters.spawn_on(
            async move {
                let verdict = ticket.verdict().await;
                let applied = tokio::task::spawn_blocking({
                    let path = path.clone();
                    move || handler.apply(&path, &stamp, verdict)
                })
                .await;
                if let Err(err) = applied {
                    error!(path = %path.display(), error = %err, "verdict handling failed");
                }
                counters.record(verdict);
            },
            runtime,
        );

        Visit::Continue
    }

    fn report(&self, stats: &CycleStats) {
        let root = self.config.root.display();
        if stats.aborted {
            info!(root = %root, elapsed = ?stats.elapsed, "scan interrupted");
        } else {
            info!(
                root = %root,
                files = stats.visited(),
                seconds = stats.elapsed.as_secs_f64(),
                "finished scan"
            );
        }

        info!(target: REPORT_TARGET, "===========================");
        for line in stats.to_string().lines() {
            info!(target: REPORT_TARGET, "{line}");
        }

        // No subscribers is fine.
        let _ = self.reports.send(stats.clone());
    }
}

impl std::fmt::Debug for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sentinel")
            .field("root", &self.inner.config.root)
            .field("running", &self.task.is_some())
            .finish()
    }
}
