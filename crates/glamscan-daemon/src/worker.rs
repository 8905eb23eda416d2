//! Pool workers: one daemon endpoint, one job at a time.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use glamscan_core::{DaemonConfig, Verdict};

use crate::error::DaemonError;
use crate::job::ScanJob;
use crate::protocol::InstreamClient;
use crate::transport::Connector;

/// Single-use endpoint an idle worker publishes to accept its next job.
pub(crate) type JobSlot = oneshot::Sender<ScanJob>;

/// A worker owns its connection settings and opens a fresh connection per job.
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    connector: Connector,
    client: InstreamClient,
}

impl Worker {
    /// Create a worker, failing if the daemon cannot be reached.
    pub(crate) async fn connect(id: usize, config: &DaemonConfig) -> Result<Self, DaemonError> {
        let connector = Connector::new(config);
        connector.probe().await?;
        Ok(Self {
            id,
            connector,
            client: InstreamClient::new(config),
        })
    }

    /// Accept loop: register as idle, take one job, process it, repeat.
    ///
    /// `stop` only interrupts the wait for the next job. A job already
    /// placed in this worker's slot is always processed.
    pub(crate) async fn run(self, registry: mpsc::Sender<JobSlot>, stop: CancellationToken) {
        trace!(worker = self.id, "worker started");

        loop {
            let (slot, mut assigned) = oneshot::channel();

            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                sent = registry.send(slot) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }

            let job = tokio::select! {
                biased;
                job = &mut assigned => job.ok(),
                () = stop.cancelled() => {
                    // Refuse further hand-offs, but keep a job that already landed.
                    assigned.close();
                    assigned.try_recv().ok()
                }
            };

            match job {
                Some(job) => self.process(job).await,
                None => break,
            }
        }

        trace!(worker = self.id, "worker stopped");
    }

    async fn process(&self, job: ScanJob) {
        debug!(worker = self.id, path = %job.path().display(), "submitting");

        let verdict = match self.connector.connect().await {
            Ok(conn) => self.client.scan_path(conn, job.path()).await,
            Err(err) => {
                warn!(worker = self.id, error = %err, "daemon connection failed");
                Verdict::Errored
            }
        };

        job.resolve(verdict);
    }
}
