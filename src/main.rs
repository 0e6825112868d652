//! CLI entry point for graylog-forwarder
//!
//! Parses the three required endpoint flags, sets up logging, wires the
//! termination-signal watcher, and runs the pipeline once.

use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use graylog_forwarder::{Config, Pipeline, cancel_on_signal};

/// Migrate historical logs from an OpenSearch index into Loki
#[derive(Debug, Parser)]
#[command(name = "graylog-forwarder", version)]
struct Args {
    /// Base URL of the source OpenSearch cluster
    #[arg(long, value_name = "URL")]
    input: String,

    /// Loki push endpoint URL
    #[arg(long, value_name = "URL")]
    output: String,

    /// Name of the source index to migrate
    #[arg(long, value_name = "NAME")]
    index: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Unknown flags or positional arguments make clap print an error and
    // exit non-zero before the pipeline is built
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::new(args.input, args.output, args.index);
    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    match pipeline.run(cancel).await {
        Ok(processed) => {
            tracing::info!(processed, "log migration complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "log migration failed");
            ExitCode::FAILURE
        }
    }
}
