//! # graylog-forwarder
//!
//! One-shot migration of historical log documents from an OpenSearch index
//! into Loki.
//!
//! The pipeline scrolls the whole source index with a cursor-based
//! paginated query, pushes each document onto a bounded queue, and drains
//! the queue with a fixed pool of workers that normalize and deliver each
//! document independently. Delivery is best-effort: per-document failures
//! are logged and skipped, and the server-side scroll cursor is cleared on
//! every exit path.
//!
//! ## Quick Start
//!
//! ```no_run
//! use graylog_forwarder::{Config, Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new(
//!         "http://opensearch:9200",
//!         "http://loki:3100/loki/api/v1/push",
//!         "graylog_0",
//!     );
//!
//!     let pipeline = Pipeline::new(config)?;
//!     let processed = pipeline.run(CancellationToken::new()).await?;
//!     println!("migrated {processed} documents");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Delivery client and push wire types
pub mod deliver;
/// Error types
pub mod error;
/// Document normalization
pub mod normalize;
/// Pipeline orchestration and the worker pool
pub mod pipeline;
/// Cursor-paginated extraction from the source
pub mod source;

// Re-export commonly used types
pub use config::{Config, DeliveryConfig, SourceConfig};
pub use deliver::{DeliveryClient, PushRequest, PushStream};
pub use error::{DeliveryError, Error, NormalizeError, Result, SourceError};
pub use normalize::{NormalizedRecord, RawDocument, normalize};
pub use pipeline::Pipeline;
pub use source::SourceClient;

/// Fire the given cancellation token once a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with a `ctrl_c` fallback if
///   signal registration fails (restricted environments, containers).
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Intended to be spawned alongside [`Pipeline::run`]; the extractor stops
/// at the next page boundary and cursor cleanup still runs.
pub async fn cancel_on_signal(cancel: tokio_util::sync::CancellationToken) {
    wait_for_signal().await;
    tracing::info!("termination signal received, cancelling the run");
    cancel.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        _ => {
            // Signal registration can fail in restricted environments
            tracing::warn!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}
