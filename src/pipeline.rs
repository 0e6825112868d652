//! Pipeline orchestration
//!
//! Wires the extractor's output to a fixed pool of delivery workers over
//! one bounded queue. The orchestrator spawns the workers, drives the
//! extraction on its own task, closes the queue when the producer stops,
//! waits for the pool to drain it, and reports how many documents were
//! handed off. A fatal extraction error aborts the run after the drain;
//! per-document failures never do.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::deliver::DeliveryClient;
use crate::error::{Error, Result};
use crate::normalize::{self, RawDocument};
use crate::source::SourceClient;

/// Per-worker delivery accounting, aggregated into the final summary
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct WorkerStats {
    /// Records accepted by the push endpoint
    delivered: u64,
    /// Documents dropped before delivery (normalization failures)
    skipped: u64,
    /// Records rejected by, or unreachable to, the push endpoint
    failed: u64,
}

impl WorkerStats {
    fn absorb(&mut self, other: WorkerStats) {
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// A fully wired migration pipeline
///
/// Construction validates the configuration and both endpoints; running it
/// performs one complete extraction pass.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    source: SourceClient,
    delivery: DeliveryClient,
}

impl Pipeline {
    /// Validate the configuration and construct both HTTP clients
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparseable endpoint URL, a
    /// zero-sized worker pool, or a zero-capacity queue.
    pub fn new(config: Config) -> Result<Self> {
        if config.delivery.workers == 0 {
            return Err(Error::Config {
                message: "worker pool size must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        if config.delivery.queue_capacity == 0 {
            return Err(Error::Config {
                message: "queue capacity must be at least 1".to_string(),
                key: Some("queue_capacity".to_string()),
            });
        }

        let source = SourceClient::new(&config.source)?;
        let delivery = DeliveryClient::new(&config.delivery)?;

        Ok(Self {
            config,
            source,
            delivery,
        })
    }

    /// Run the migration to completion (or fatal error / cancellation)
    ///
    /// Returns the number of documents extracted and handed to the
    /// delivery queue. Delivery failures are logged per document and do
    /// not reduce this count; the aggregate delivered/skipped/failed
    /// totals appear in the final summary log line.
    pub async fn run(&self, cancel: CancellationToken) -> Result<u64> {
        let (tx, rx) = mpsc::channel::<RawDocument>(self.config.delivery.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(self.config.delivery.workers);
        for worker_id in 0..self.config.delivery.workers {
            workers.push(tokio::spawn(deliver_worker(
                worker_id,
                Arc::clone(&rx),
                self.delivery.clone(),
                self.config.index.clone(),
                cancel.clone(),
            )));
        }

        tracing::info!(
            index = %self.config.index,
            workers = self.config.delivery.workers,
            "starting to query logs from source index"
        );

        // The sender moves into the extractor, so the queue closes exactly
        // once, when extraction returns
        let extracted = self.source.extract(&self.config.index, tx, &cancel).await;

        let mut stats = WorkerStats::default();
        for outcome in join_all(workers).await {
            match outcome {
                Ok(worker_stats) => stats.absorb(worker_stats),
                Err(e) => tracing::error!(error = %e, "delivery worker panicked"),
            }
        }

        match extracted {
            Ok(processed) => {
                tracing::info!(
                    processed,
                    delivered = stats.delivered,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "finished processing logs from source index"
                );
                Ok(processed)
            }
            Err(e) => {
                tracing::error!(
                    delivered = stats.delivered,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "extraction aborted after the workers drained the queue"
                );
                Err(e.into())
            }
        }
    }
}

/// One delivery worker
///
/// Loops popping a document from the shared queue (blocking while it is
/// empty and open), normalizing and pushing it. Exits once the queue is
/// closed and drained, or when the run is cancelled. Per-document errors
/// are logged and never halt the pool.
async fn deliver_worker(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<RawDocument>>>,
    client: DeliveryClient,
    source_index: String,
    cancel: CancellationToken,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    loop {
        let doc = {
            let mut queue = queue.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                doc = queue.recv() => doc,
            }
        };
        let Some(doc) = doc else { break };

        let record = match normalize::normalize(&doc, &source_index) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(worker_id, error = %e, "skipping document that could not be normalized");
                stats.skipped += 1;
                continue;
            }
        };

        match client.push(&record).await {
            Ok(()) => stats.delivered += 1,
            Err(e) => {
                tracing::warn!(worker_id, error = %e, "failed to push log to delivery endpoint");
                stats.failed += 1;
            }
        }
    }

    tracing::debug!(
        worker_id,
        delivered = stats.delivered,
        skipped = stats.skipped,
        failed = stats.failed,
        "delivery worker finished"
    );
    stats
}
