//! # devflow
//!
//! Command-line entry point. Prints the run's result JSON on stdout.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use devflow::app::{prepare, run_until_shutdown, RunOutcome};
use devflow::config::DEFAULT_CONFIG_PATH;
use devflow::observability::init_tracing;
use tracing::{error, info, warn};

/// Turns a meeting transcript into requirements, design, code, tests,
/// documentation and a pull request.
#[derive(Parser, Debug)]
#[command(name = "devflow", version, about)]
struct Cli {
    /// Transcript file to process.
    #[arg(value_name = "TRANSCRIPT")]
    transcript: PathBuf,

    /// YAML config file. Defaults apply when it does not exist.
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH, env = "DEVFLOW_CONFIG")]
    config: PathBuf,

    /// Directory for generated documents and the summary.
    #[arg(short, long, value_name = "DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Raise log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose, cli.json_logs) {
        eprintln!("failed to initialise logging: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "devflow failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    std::fs::metadata(&cli.transcript)
        .and_then(|meta| {
            if meta.is_file() {
                Ok(())
            } else {
                Err(std::io::Error::other("not a regular file"))
            }
        })
        .with_context(|| format!("cannot read transcript {}", cli.transcript.display()))?;

    let pipeline = prepare(&cli.config)
        .with_context(|| format!("failed to prepare workflow from {}", cli.config.display()))?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    let outcome = run_until_shutdown(&pipeline, &cli.transcript, &cli.output_dir, shutdown)
        .await
        .context("workflow setup failed")?;

    let RunOutcome::Finished(result) = outcome else {
        return Ok(ExitCode::from(130));
    };

    let degraded = result.degraded_stages();
    if degraded.is_empty() {
        info!(workflow_id = %result.workflow_id, "Workflow finished");
    } else {
        warn!(
            workflow_id = %result.workflow_id,
            degraded = ?degraded,
            "Workflow finished with degraded stages"
        );
    }

    let json = serde_json::to_string_pretty(&result).context("failed to encode result")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}
