//! CODEOWNERS Generator
//!
//! Regenerates CODEOWNERS from recent contributors and opens a pull request
//! when it changed.

use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use codeowners_generator::config::{Args, Config};
use codeowners_generator::hosting::GitHubClient;
use codeowners_generator::{pipeline, RunOutcome};

fn main() -> ExitCode {
    let env_file = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(&args.log_filter);
    if let Some(err) = unexpected_env_error(env_file) {
        warn!(error = %err, "failed to load .env file");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Errors worth reporting from loading a `.env` file. A missing file is not one.
fn unexpected_env_error<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    result.err().filter(|err| !err.not_found())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::from_args(args)?;
    let client = GitHubClient::new(
        &config.server_url,
        config.token.as_deref(),
        config.request_timeout,
    )
    .context("failed to create GitHub client")?;

    let rt = Runtime::new().context("failed to start async runtime")?;
    rt.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping before the next stage");
                on_interrupt.cancel();
            }
        });

        let report = pipeline::run(&config, &client, Utc::now(), &cancel).await?;
        match report.outcome {
            RunOutcome::UpToDate => println!("CODEOWNERS file is up-to-date."),
            RunOutcome::WouldUpdate => {
                print!("{}", report.document);
                println!("CODEOWNERS file would change (dry run, nothing published).");
            }
            RunOutcome::Opened(pull_request) if pull_request.created => {
                println!("Pull request created successfully: {}", pull_request.url);
            }
            RunOutcome::Opened(pull_request) => {
                println!("Pull request already open: {}", pull_request.url);
            }
        }
        Ok::<_, anyhow::Error>(())
    })
}
