//! Bounded dispatcher matching submissions to idle workers.
//!
//! Workers publish a single-use slot on a shared registry whenever they are
//! idle. The dispatcher takes one submission, waits for one slot, and hands
//! the job over. A job is therefore only ever given to a worker that is
//! truly waiting for it, and never queued behind a busy one.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use glamscan_core::{DaemonConfig, Verdict};

use crate::error::{DaemonError, QueueError};
use crate::job::{ScanJob, ScanTicket};
use crate::worker::{JobSlot, Worker};

/// Pool of daemon workers plus the dispatcher that feeds them.
#[derive(Debug)]
pub struct ScanQueue {
    size: usize,
    workers: Vec<Worker>,
    submissions: mpsc::Sender<ScanJob>,
    inbox: Option<mpsc::Receiver<ScanJob>>,
    shutdown: CancellationToken,
    dispatcher: Option<JoinHandle<()>>,
}

impl ScanQueue {
    /// Build the pool, probing the daemon once per worker.
    ///
    /// Fails if any probe fails: a pool that cannot reach the daemon is
    /// never started.
    pub async fn connect(config: &DaemonConfig) -> Result<Self, DaemonError> {
        if config.workers == 0 {
            return Err(DaemonError::InvalidConfig {
                message: "at least one worker is required".to_string(),
            });
        }

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            workers.push(Worker::connect(id, config).await?);
        }

        // One buffered submission per worker.
        let (submissions, inbox) = mpsc::channel(config.workers);

        info!(
            endpoint = %config.endpoint(),
            workers = config.workers,
            "connected to daemon"
        );

        Ok(Self {
            size: config.workers,
            workers,
            submissions,
            inbox: Some(inbox),
            shutdown: CancellationToken::new(),
            dispatcher: None,
        })
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// A cloneable handle for submitting files.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            submissions: self.submissions.clone(),
        }
    }

    /// Launch the workers and the dispatcher.
    pub fn start(&mut self) {
        let Some(inbox) = self.inbox.take() else {
            warn!("scan queue already started");
            return;
        };

        let (registry_tx, registry) = mpsc::channel(self.size);
        let stop_workers = CancellationToken::new();
        let mut workers = JoinSet::new();
        for worker in self.workers.drain(..) {
            workers.spawn(worker.run(registry_tx.clone(), stop_workers.clone()));
        }
        // Only workers hold the registry sender: it closes once all are gone.
        drop(registry_tx);

        let dispatcher = Dispatcher {
            inbox,
            registry,
            shutdown: self.shutdown.clone(),
            stop_workers,
            workers,
        };
        self.dispatcher = Some(tokio::spawn(dispatcher.run()));
    }

    /// Stop accepting work and wait for every in-flight job to finish.
    ///
    /// Submissions still buffered when the stop arrives are discarded; their
    /// tickets read as [`Verdict::Errored`].
    pub async fn stop(&mut self) {
        self.shutdown.cancel();

        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(err) = dispatcher.await {
                error!(error = %err, "dispatcher task failed");
            }
        } else if let Some(inbox) = self.inbox.take() {
            discard_pending(inbox);
        }
    }
}

/// Cloneable submission side of a [`ScanQueue`].
#[derive(Debug, Clone)]
pub struct QueueHandle {
    submissions: mpsc::Sender<ScanJob>,
}

impl QueueHandle {
    /// Enqueue a file, waiting while the submission buffer is full.
    pub async fn submit(&self, path: impl Into<PathBuf>) -> Result<ScanTicket, QueueError> {
        let (job, ticket) = ScanJob::new(path);
        self.submissions
            .send(job)
            .await
            .map_err(|_| QueueError::Closed)?;
        Ok(ticket)
    }

    /// Blocking variant of [`submit`](Self::submit) for use off the async
    /// runtime, such as from a directory walk on a blocking thread.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_submit(&self, path: impl Into<PathBuf>) -> Result<ScanTicket, QueueError> {
        let (job, ticket) = ScanJob::new(path);
        self.submissions
            .blocking_send(job)
            .map_err(|_| QueueError::Closed)?;
        Ok(ticket)
    }

    /// Whether the queue has stopped accepting submissions.
    pub fn is_closed(&self) -> bool {
        self.submissions.is_closed()
    }
}

struct Dispatcher {
    inbox: mpsc::Receiver<ScanJob>,
    registry: mpsc::Receiver<JobSlot>,
    shutdown: CancellationToken,
    stop_workers: CancellationToken,
    workers: JoinSet<()>,
}

impl Dispatcher {
    async fn run(mut self) {
        info!(workers = self.workers.len(), "scan queue started");

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                job = self.inbox.recv() => match job {
                    Some(job) => self.hand_off(job).await,
                    None => break,
                },
            }
        }

        discard_pending(self.inbox);

        self.stop_workers.cancel();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "worker task failed");
            }
        }

        info!("scan queue stopped");
    }

    /// Give `job` to the next idle worker.
    async fn hand_off(&mut self, mut job: ScanJob) {
        while let Some(slot) = self.registry.recv().await {
            match slot.send(job) {
                Ok(()) => return,
                // Worker stopped after registering; try the next one.
                Err(returned) => job = returned,
            }
        }

        warn!(path = %job.path().display(), "no workers left");
        job.resolve(Verdict::Errored);
    }
}

fn discard_pending(mut inbox: mpsc::Receiver<ScanJob>) {
    inbox.close();

    let mut discarded = 0usize;
    while let Ok(job) = inbox.try_recv() {
        job.resolve(Verdict::Errored);
        discarded += 1;
    }

    if discarded > 0 {
        warn!(discarded, "discarded pending submissions on shutdown");
    }
}
