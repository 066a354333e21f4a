//! CLI entry point for the harvester tool.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use harvester_core::fetch::DEFAULT_BASE_URL;
use harvester_core::{
    GraphqlSessionFactory, HarvestSettings, Harvester, Pacing, QueueSource, RecordBuilder,
    RecordStore, audit, plan_queue, render_summary,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{load_default_file_config, resolve_data_dir};
use cli::{Cli, CliValueSources, Command, ScrapeArgs};
use progress::ProgressObserver;

/// Process outcome mapped to the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Everything requested was done (or there was nothing to do).
    Success,
    /// The run completed but some items are still failing.
    Partial,
    /// The run could not be carried out.
    Failure,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

/// Determines the process exit outcome from the residual failure count.
fn determine_exit_outcome(residual_failures: usize) -> ProcessExit {
    if residual_failures == 0 {
        ProcessExit::Success
    } else {
        ProcessExit::Partial
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (cli, sources) = cli::parse_cli_with_sources();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level()));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();

    debug!(?cli, "CLI arguments parsed");

    match run(cli, sources).await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run(cli: Cli, sources: CliValueSources) -> Result<ProcessExit> {
    let loaded = load_default_file_config()?;
    if loaded.config.is_some()
        && let Some(path) = &loaded.path
    {
        debug!(path = %path.display(), "loaded config file");
    }
    let file_config = loaded.config.as_ref();

    let data_dir = resolve_data_dir(cli.data_dir.as_deref(), file_config);
    let store = RecordStore::open(&data_dir)
        .with_context(|| format!("Failed to open record store '{}'", data_dir.display()))?;

    match cli.command {
        Command::Scrape(args) => {
            let args = app_config::apply_config_defaults(args, &sources, file_config);
            scrape(args, store, cli.quiet).await
        }
        Command::Report => report(&store),
    }
}

async fn scrape(args: ScrapeArgs, store: RecordStore, quiet: bool) -> Result<ProcessExit> {
    let pacing = Pacing::from_secs_f64(args.delay_min, args.delay_max)?;
    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let factory = GraphqlSessionFactory::new(&base_url)
        .with_context(|| format!("Invalid base URL '{base_url}'"))?;

    let input_dir = args
        .input_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(app_config::DEFAULT_INPUT_DIR));
    let source = args.queue_source(input_dir);

    if source == QueueSource::RetryFailed && !store.failures_path().exists() {
        info!(path = %store.failures_path().display(), "no failure set found, nothing to retry");
        return Ok(ProcessExit::Success);
    }

    let plan = plan_queue(&source, &store, args.plan_options())
        .context("Failed to select problems to fetch")?;
    info!(
        candidates = plan.candidates,
        skipped_existing = plan.skipped_existing,
        removed = plan.removed.len(),
        queued = plan.queue.len(),
        "queue selected"
    );
    if plan.is_empty() {
        info!("Nothing to scrape");
        return Ok(ProcessExit::Success);
    }

    let settings = HarvestSettings {
        pacing,
        retry_no_data: args.retry_no_data,
        ..HarvestSettings::default()
    }
    .with_max_retries(u32::from(args.max_retries));

    let use_progress = progress::should_use_progress(
        std::io::stderr().is_terminal(),
        quiet,
        progress::is_dumb_terminal(),
    );
    let observer = Arc::new(ProgressObserver::new(use_progress));

    let harvester = Harvester::new(Arc::new(factory), store.clone(), settings)
        .with_builder(RecordBuilder::new().with_site_url(base_url))
        .with_observer(observer.clone());
    let summary = harvester.run(plan.queue).await?;
    observer.finish();

    if summary.is_complete() {
        info!(succeeded = summary.succeeded, "All problems scraped successfully");
    } else {
        warn!(
            succeeded = summary.succeeded,
            still_failed = summary.residual_failures.len(),
            passes = summary.passes,
            "Some problems still failed"
        );
        if let Some(path) = &summary.failures_path {
            warn!(path = %path.display(), "Failure set written");
        }
    }

    let total = store.identifiers()?.len();
    info!(total, "Total records in store");

    Ok(determine_exit_outcome(summary.residual_failures.len()))
}

fn report(store: &RecordStore) -> Result<ProcessExit> {
    let report = audit(store).context("Failed to audit record store")?;
    println!("{}", render_summary(&report));

    let path = store
        .save_report(&report)
        .context("Failed to write quality report")?;
    println!("\nFull report saved to {}", path.display());
    Ok(ProcessExit::Success)
}
