// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging (tracing, to stderr; stdout carries only the report)
// 3. Build the config, the HTTP transport and the failure sink
// 4. Run the validator, with Ctrl-C wired to cancellation
// 5. Print the report and exit with its status
//    (0 = clean, 1 = non-critical failures, 2 = critical failures or error)
// =============================================================================

mod checker; // src/checker/ - per-reference checks (local + web)
mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - run configuration
mod crawl; // src/crawl/ - document discovery and the validator
mod error; // src/error.rs - error types
mod report; // src/report/ - aggregation, output, failure log

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use checker::ReqwestTransport;
use cli::{CheckArgs, Cli, Commands};
use crawl::{CancelSignal, Validator};
use report::sink::{FailureSink, FileFailureSink, NoopFailureSink};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Configuration problems and the like; no report was produced
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check(args) => handle_check(args).await,
    }
}

// RUST_LOG wins when set; otherwise -v / -vv pick the level
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn handle_check(args: CheckArgs) -> Result<i32> {
    let json = args.json;
    let config = args.into_config().context("invalid configuration")?;

    let transport = Arc::new(
        ReqwestTransport::new(config.request_timeout).context("cannot build HTTP client")?,
    );

    // In CI nothing is written to disk
    let mut sink: Box<dyn FailureSink> = if config.ci {
        Box::new(NoopFailureSink)
    } else {
        Box::new(FileFailureSink::create(&config.log_dir).context("cannot open failure log")?)
    };

    let (handle, signal) = CancelSignal::pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing with the results so far");
            handle.cancel();
        }
    });

    let validator = Validator::new(config, transport);
    let report = validator.run(sink.as_mut(), signal).await;
    ctrl_c.abort();

    info!(
        total = report.total,
        passed = report.passed,
        failed = report.failed,
        exit_code = report.exit_status.code(),
        "resource check finished"
    );
    report::print_report(&report, json)?;

    Ok(report.exit_status.code())
}
