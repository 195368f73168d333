//! # tnflow
//!
//! Command-line entry point.
//!
//! ```bash
//! # Single-end run with transposon trimming
//! tnflow -s PA14 --sd reads/ --ad annotation/ --at gb --st SE --tn AGATGTGTATAAGAGACAG
//!
//! # Deployment check
//! tnflow --tst
//! ```

mod cli;

use clap::Parser;
use std::process::ExitCode;
use tnflow::observability::{init_tracing, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    // TNFLOW_LOG_FORMAT=json switches to one JSON object per event.
    init_tracing(LogFormat::from_env());

    let cli = cli::Cli::parse();

    match cli::execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
