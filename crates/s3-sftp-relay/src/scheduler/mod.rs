//! Transfer scheduler: bounded worker pool with retry and resumption.
//!
//! Candidates flow from the object store listing through a dispatcher into a
//! bounded multi-consumer channel; each worker claims candidates exclusively,
//! performs ledger-check → fetch → ensure-dir → stream-write → ledger-update
//! strictly in order, and reports an outcome for every candidate it claims.
//! One candidate's exhaustion never aborts the run.

use crate::error::{RelayError, Result};
use crate::ledger::ResumptionLedger;
use crate::report::{ResultAggregator, RunReport, TransferOutcome};
use crate::session::{SessionFactory, TransferSession};
use crate::store::{ObjectStore, TransferCandidate};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Scheduler tuning, resolved from the validated configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of concurrent transfer workers.
    pub concurrency: usize,
    /// Maximum attempts per candidate, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts, doubled each retry.
    pub retry_base_delay: Duration,
    /// Bypass the ledger and re-transfer everything.
    pub force_retry: bool,
    /// Remote destination root.
    pub remote_base: String,
}

/// Coordinates the worker pool for one run.
pub struct TransferScheduler {
    store: Arc<dyn ObjectStore>,
    sessions: Arc<dyn SessionFactory>,
    ledger: Arc<dyn ResumptionLedger>,
    config: SchedulerConfig,
}

/// Everything a worker needs, shared across the pool.
struct WorkerContext {
    store: Arc<dyn ObjectStore>,
    sessions: Arc<dyn SessionFactory>,
    ledger: Arc<dyn ResumptionLedger>,
    aggregator: Arc<ResultAggregator>,
    cancel: CancellationToken,
    /// The setup probe session, handed to the first worker that needs one.
    probe_slot: Arc<Mutex<Option<Box<dyn TransferSession>>>>,
    config: SchedulerConfig,
}

impl TransferScheduler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sessions: Arc<dyn SessionFactory>,
        ledger: Arc<dyn ResumptionLedger>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            ledger,
            config,
        }
    }

    /// Execute one run over all candidates under `prefix`.
    ///
    /// Returns an error only for setup-phase failures (initial session,
    /// listing enumeration); per-candidate failures end up in the report.
    pub async fn run(&self, prefix: &str, cancel: CancellationToken) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();

        info!(
            "starting run {} (prefix: {:?}, workers: {}, max attempts: {})",
            run_id, prefix, self.config.concurrency, self.config.max_attempts
        );

        // Setup probe: inability to establish even one session is fatal.
        let probe = self.sessions.connect().await?;
        let probe_slot = Arc::new(Mutex::new(Some(probe)));

        let mut listing = self.store.list(prefix);
        let (cand_tx, cand_rx) =
            async_channel::bounded::<TransferCandidate>(self.config.concurrency * 2);

        let aggregator = Arc::new(ResultAggregator::new());

        // Dispatcher: forwards candidates until the listing ends or the run
        // is cancelled. Dropping the sender drains the workers.
        let dispatch_cancel = cancel.clone();
        let dispatcher = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = dispatch_cancel.cancelled() => {
                        info!("cancellation requested, no further candidates will be dispatched");
                        return Ok(());
                    }
                    item = listing.recv() => match item {
                        None => return Ok(()),
                        Some(Ok(candidate)) => {
                            if cand_tx.send(candidate).await.is_err() {
                                return Ok(());
                            }
                        }
                        Some(Err(e)) => return Err(e),
                    }
                }
            }
        });

        let mut workers = Vec::with_capacity(self.config.concurrency);
        for worker_id in 0..self.config.concurrency {
            let rx = cand_rx.clone();
            let ctx = WorkerContext {
                store: self.store.clone(),
                sessions: self.sessions.clone(),
                ledger: self.ledger.clone(),
                aggregator: aggregator.clone(),
                cancel: cancel.clone(),
                probe_slot: probe_slot.clone(),
                config: self.config.clone(),
            };
            workers.push(tokio::spawn(worker_loop(worker_id, rx, ctx)));
        }
        drop(cand_rx);

        let dispatch_result = match dispatcher.await {
            Ok(result) => result,
            Err(e) => Err(RelayError::store_listing(format!(
                "listing task panicked: {}",
                e
            ))),
        };

        for (worker_id, handle) in workers.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("worker {} panicked: {}", worker_id, e);
            }
        }

        if let Err(e) = dispatch_result {
            error!("run {} aborted: {}", run_id, e);
            return Err(e);
        }

        let report = aggregator.finalize(run_id, started_at, cancel.is_cancelled());
        info!(
            "run {} {:?}: {} succeeded, {} skipped, {} failed, {} bytes in {:.1}s",
            report.run_id,
            report.status,
            report.succeeded,
            report.skipped,
            report.failed.len(),
            report.bytes_transferred,
            report.duration_seconds
        );

        Ok(report)
    }
}

/// Claim candidates until the channel closes or the run is cancelled.
async fn worker_loop(
    worker_id: usize,
    rx: async_channel::Receiver<TransferCandidate>,
    ctx: WorkerContext,
) {
    let mut session: Option<Box<dyn TransferSession>> = ctx.probe_slot.lock().await.take();

    loop {
        let candidate = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            candidate = rx.recv() => match candidate {
                Ok(candidate) => candidate,
                Err(_) => break,
            }
        };

        let outcome = process_candidate(worker_id, &candidate, &mut session, &ctx).await;
        ctx.aggregator.record(outcome);
    }

    if let Some(mut live) = session.take() {
        if let Err(e) = live.close().await {
            debug!("worker {}: close failed: {}", worker_id, e);
        }
    }
}

/// Drive one candidate to exactly one outcome.
async fn process_candidate(
    worker_id: usize,
    candidate: &TransferCandidate,
    session: &mut Option<Box<dyn TransferSession>>,
    ctx: &WorkerContext,
) -> TransferOutcome {
    let key = candidate.key.as_str();

    if candidate.is_directory_marker {
        debug!("worker {}: skipping {} (directory marker)", worker_id, key);
        return TransferOutcome::skipped(key, "directory marker");
    }

    if !ctx.config.force_retry && ctx.ledger.contains(key).await {
        debug!("worker {}: skipping {} (already transferred)", worker_id, key);
        return TransferOutcome::skipped(key, "already transferred");
    }

    let remote_path = remote_path(&ctx.config.remote_base, candidate);
    let mut attempts = 0u32;
    let mut reconnected = false;

    loop {
        attempts += 1;

        match attempt_transfer(candidate, &remote_path, session, ctx).await {
            Ok(bytes) => {
                if let Err(e) = ctx.ledger.record(key).await {
                    // The object made it across; losing the ledger entry only
                    // costs a redundant re-transfer on the next run.
                    warn!("ledger update for {} failed: {}", key, e);
                }
                info!(
                    "worker {}: {} -> {} ({} bytes, attempt {})",
                    worker_id, key, remote_path, bytes, attempts
                );
                return TransferOutcome::succeeded(key, attempts, bytes);
            }
            Err(e) => {
                if !e.is_transient() || attempts >= ctx.config.max_attempts {
                    error!(
                        "worker {}: {} failed after {} attempt(s): {}",
                        worker_id, key, attempts, e
                    );
                    return TransferOutcome::failed(key, e.to_string(), attempts);
                }

                if e.is_connection() {
                    if let Some(mut dead) = session.take() {
                        let _ = dead.close().await;
                    }
                    if reconnected {
                        // One reconnect per candidate; a second dead session
                        // is not worth burning the remaining attempts on.
                        return TransferOutcome::failed(
                            key,
                            format!("{} (reconnect already attempted)", e),
                            attempts,
                        );
                    }
                    reconnected = true;
                }

                let delay = ctx.config.retry_base_delay * 2u32.saturating_pow(attempts - 1);
                warn!(
                    "worker {}: {} attempt {}/{} failed: {} (retrying in {:?})",
                    worker_id, key, attempts, ctx.config.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// One transfer attempt: connect if needed, fetch, ensure dir, stream write.
async fn attempt_transfer(
    candidate: &TransferCandidate,
    remote_path: &str,
    session: &mut Option<Box<dyn TransferSession>>,
    ctx: &WorkerContext,
) -> Result<u64> {
    let live = match session.as_mut() {
        Some(live) => live,
        None => session.insert(ctx.sessions.connect().await?),
    };

    let body = ctx.store.fetch(&candidate.key).await?;
    live.ensure_dir_all(parent_dir(remote_path)).await?;
    live.write_file(remote_path, body).await
}

/// Destination path for a candidate: `<base>/<basename(key)>`.
fn remote_path(base: &str, candidate: &TransferCandidate) -> String {
    format!("{}/{}", base.trim_end_matches('/'), candidate.basename())
}

/// Parent directory of a remote path.
fn parent_dir(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => "/",
    }
}
