//! Sync dispatch queues
//!
//! Two FIFO queues (manual, recurring) with independent bounded worker
//! pools. Enqueues are de-duplicated so at most one pending job exists per
//! (kind, wallet, target) fingerprint; a job leaves the index the moment a
//! worker pulls it, so a fresh pending job may follow an active one.

pub mod dedupe;
pub mod job;
pub mod monitor;

pub use dedupe::SyncDeduper;
pub use job::{Fingerprint, JobHandle, SyncJob, SyncKind};
pub use monitor::{MonitorParams, SyncOutcome};

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::NodeClient;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::LocalStore;

/// The two sync worker pools and their shared de-dup index
pub struct SyncQueues {
    deduper: SyncDeduper,
    manual_tx: UnboundedSender<SyncJob>,
    recurring_tx: UnboundedSender<SyncJob>,
    // Receivers live on the struct so a zero-worker pool does not drop its
    // receiver and close the channel.
    manual_rx: Arc<Mutex<UnboundedReceiver<SyncJob>>>,
    recurring_rx: Arc<Mutex<UnboundedReceiver<SyncJob>>>,
    client: Arc<dyn NodeClient>,
    store: Arc<dyn LocalStore>,
    monitor_params: MonitorParams,
}

impl SyncQueues {
    /// Create the queues and spawn both worker pools.
    pub fn start(
        config: &EngineConfig,
        client: Arc<dyn NodeClient>,
        store: Arc<dyn LocalStore>,
    ) -> Arc<Self> {
        let (manual_tx, manual_rx) = mpsc::unbounded_channel();
        let (recurring_tx, recurring_rx) = mpsc::unbounded_channel();

        let queues = Arc::new(Self {
            deduper: SyncDeduper::new(),
            manual_tx,
            recurring_tx,
            manual_rx: Arc::new(Mutex::new(manual_rx)),
            recurring_rx: Arc::new(Mutex::new(recurring_rx)),
            client,
            store,
            monitor_params: MonitorParams {
                retry_delay: config.sync_monitoring_retry_delay(),
                max_duration: config.max_sync_monitoring_duration(),
                max_export_clock_range: config.max_export_clock_range,
            },
        });

        queues.spawn_pool(SyncKind::Manual, config.max_manual_sync_concurrency);
        queues.spawn_pool(SyncKind::Recurring, config.max_recurring_sync_concurrency);

        queues
    }

    fn spawn_pool(self: &Arc<Self>, kind: SyncKind, workers: usize) {
        let rx = match kind {
            SyncKind::Manual => &self.manual_rx,
            SyncKind::Recurring => &self.recurring_rx,
        };
        for idx in 0..workers {
            let queues = self.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                queues.worker_loop(kind, idx, rx).await;
            });
        }
    }

    async fn worker_loop(
        self: Arc<Self>,
        kind: SyncKind,
        idx: usize,
        rx: Arc<Mutex<UnboundedReceiver<SyncJob>>>,
    ) {
        debug!("{} sync worker {} started", kind, idx);
        loop {
            let job = {
                let mut rx = rx.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                debug!("{} sync worker {} stopping, queue closed", kind, idx);
                break;
            };

            // Pending → active: free the fingerprint so a new pending job
            // may be enqueued while this one runs.
            self.deduper.remove(&job.fingerprint());

            if let Err(e) = self.process_job(&job).await {
                warn!("Sync job {} failed: {}", job.fingerprint(), e);
            }
        }
    }

    async fn process_job(&self, job: &SyncJob) -> EngineResult<()> {
        let primary_clock = self.store.clock_for(&job.wallet).await?;

        self.client.request_sync(&job.target, &job.request_body()).await?;

        let outcome = monitor::monitor_sync_completion(
            self.client.as_ref(),
            &job.target,
            &job.wallet,
            primary_clock,
            &self.monitor_params,
        )
        .await;

        if outcome == SyncOutcome::AdditionalSyncRequired {
            debug!(
                "Sync for {} on {} needs a successor, re-enqueueing",
                job.wallet, job.target
            );
            self.enqueue(
                job.kind,
                job.wallet.clone(),
                job.source.clone(),
                job.target.clone(),
                false,
            )?;
        }
        Ok(())
    }

    /// Enqueue a sync job, de-duplicated per fingerprint.
    ///
    /// If a job with the same fingerprint is already pending, the existing
    /// handle is returned and no new job is created.
    pub fn enqueue(
        &self,
        kind: SyncKind,
        wallet: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        immediate: bool,
    ) -> EngineResult<JobHandle> {
        let job = SyncJob::new(kind, wallet, source, target, immediate);
        let fingerprint = job.fingerprint();

        if let Some(existing) = self.deduper.lookup(&fingerprint) {
            return Ok(existing);
        }

        let handle = JobHandle::new(fingerprint.clone());
        loop {
            if self.deduper.try_record(&handle) {
                break;
            }
            // Lost the race: return the winner unless it activated already.
            if let Some(existing) = self.deduper.lookup(&fingerprint) {
                return Ok(existing);
            }
        }

        let tx = match kind {
            SyncKind::Manual => &self.manual_tx,
            SyncKind::Recurring => &self.recurring_tx,
        };
        if let Err(e) = tx.send(job) {
            self.deduper.remove(&fingerprint);
            return Err(EngineError::Enqueue(e.to_string()));
        }

        Ok(handle)
    }

    pub fn pending_count(&self) -> usize {
        self.deduper.pending_count()
    }
}
