//! Command-line interface for gnosis.
//!
//! Provides commands for processing the URL stream, processing a single
//! URL, inspecting stored content, and checking past runs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::core::{Processor, RunLog};
use crate::domain::{BatchSummary, PipelineState, Stage};
use crate::ingest::parse_url;
use crate::library::{ContentStore, Namespace};

/// gnosis - Cache-first URL acquisition and enrichment pipeline
#[derive(Parser, Debug)]
#[command(name = "gnosis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process every URL in the stream file
    Run {
        /// Stream file (defaults to the configured stream)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Override the I/O concurrency gate
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Only process the first N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Process a single URL
    Process {
        /// URL to acquire
        url: String,

        /// Quality tag recorded with the event
        #[arg(short, long, default_value = "A")]
        quality: String,
    },

    /// Show a stored content record
    Show {
        /// Digest of the URL (MD5 hex)
        digest: String,

        /// Print the full extracted text
        #[arg(short, long)]
        full: bool,
    },

    /// Check the summary of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Commands::Run {
                input,
                concurrency,
                limit,
            } => run_stream(config, input, concurrency, limit).await,
            Commands::Process { url, quality } => process_url(&config, &url, &quality).await,
            Commands::Show { digest, full } => show_content(&config, &digest, full).await,
            Commands::Status { run_id } => show_status(&config, &run_id).await,
            Commands::Runs { limit } => list_runs(&config, limit).await,
            Commands::Config => show_config(&config),
        }
    }
}

async fn run_stream(
    mut config: Config,
    input: Option<PathBuf>,
    concurrency: Option<usize>,
    limit: Option<usize>,
) -> Result<()> {
    if let Some(input) = input {
        config = config.with_stream(input);
    }
    if let Some(concurrency) = concurrency {
        config = config.with_concurrency(concurrency);
    }
    config.validate()?;

    let processor = Processor::from_config(&config)?;
    let summary = processor
        .run_stream(&config.stream, &config.runs_dir(), limit)
        .await
        .with_context(|| format!("Failed to process stream: {}", config.stream.display()))?;

    print_summary(&summary);
    Ok(())
}

async fn process_url(config: &Config, raw: &str, quality: &str) -> Result<()> {
    config.validate()?;
    let url = parse_url(raw, quality).with_context(|| format!("Cannot process '{}'", raw))?;
    let digest = url.digest();

    let processor = Processor::from_config(config)?;
    let outcome = processor.process(Uuid::new_v4(), url).await;

    match &outcome.state {
        PipelineState::Done => {
            println!("Processed {} ({})", outcome.url, outcome.kind);
            println!("  Digest:   {}", digest);
            println!(
                "  Archive:  {}",
                outcome
                    .archive_source
                    .map(|s| format!("{:?}", s).to_lowercase())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!("  Enriched: {}", outcome.enriched);
            println!(
                "  Content:  {}",
                processor.store().path(Namespace::Content, &digest).display()
            );
        }
        PipelineState::Failed { stage, cause } => {
            eprintln!("Failed at {}: {}", stage, cause);
            std::process::exit(1);
        }
        other => {
            eprintln!("Event ended in state {:?}", other);
        }
    }

    Ok(())
}

async fn show_content(config: &Config, digest: &str, full: bool) -> Result<()> {
    let store = ContentStore::from_config(config);
    let record = store
        .load_content(digest)
        .await
        .with_context(|| format!("Content not found: {}", digest))?;

    println!("URL:      {}", record.url.raw);
    println!("Kind:     {}", record.url.kind());
    println!("Title:    {}", record.title.as_deref().unwrap_or("-"));
    println!("Author:   {}", record.author.as_deref().unwrap_or("-"));
    println!("Date:     {}", record.date.as_deref().unwrap_or("-"));
    if let Some(duration) = record.duration {
        println!("Duration: {}s", duration);
    }
    if let Some(image) = &record.image {
        println!("Image:    {}", image);
    }
    if !record.tags.is_empty() {
        println!("Tags:     {}", record.tags.join(", "));
    }
    if !record.categories.is_empty() {
        println!("Categories: {}", record.categories.join(", "));
    }
    println!("Links:    {}", record.neighbors.len());

    if full {
        println!("\n{}", record.text);
    } else {
        println!("Text:     {} chars (use --full to print)", record.text.chars().count());
    }

    Ok(())
}

async fn show_status(config: &Config, run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let log = RunLog::existing(&config.runs_dir(), run_id).await?;
    let summary = log.summary().await?;

    println!("Run ID: {}", run_id);
    println!("Events log: {}", log.events_path().display());
    print_summary(&summary);

    let failed: Vec<_> = log
        .replay()
        .await?
        .into_iter()
        .filter(|o| o.failed_stage().is_some())
        .collect();
    if !failed.is_empty() {
        println!("\nFailed events:");
        for outcome in failed {
            if let PipelineState::Failed { stage, cause } = &outcome.state {
                println!("  [{}] {}: {}", stage, outcome.url, cause);
            }
        }
    }

    Ok(())
}

async fn list_runs(config: &Config, limit: usize) -> Result<()> {
    let runs_dir = config.runs_dir();
    let runs = RunLog::list_runs(&runs_dir).await?;

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<38} {:>8} {:>8} {:>8} {:>8}", "RUN ID", "TOTAL", "DONE", "FAILED", "CACHED");
    println!("{}", "-".repeat(74));

    for run_id in runs.into_iter().take(limit) {
        let log = RunLog::existing(&runs_dir, run_id).await?;
        let summary = log.summary().await?;
        println!(
            "{:<38} {:>8} {:>8} {:>8} {:>8}",
            run_id, summary.total, summary.done, summary.failed, summary.cache_hits
        );
    }

    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    println!("gnosis configuration");
    println!();
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home (run logs): {}", config.home.display());
    println!("  Stream:          {}", config.stream.display());
    println!("  Archives:        {}", config.archives.display());
    println!("  Enrichments:     {}", config.enrichments.display());
    println!("  Content:         {}", config.content.display());
    println!("  Runs:            {}", config.runs_dir().display());
    println!();
    println!("Processing:");
    println!("  Concurrency:      {}", config.processing.concurrency);
    println!("  Batch size:       {}", config.processing.batch_size);
    println!("  Request timeout:  {}s", config.processing.request_timeout_seconds);
    println!("  Max image length: {}", config.processing.max_image_length);
    println!("  Transcripts:      {}", config.processing.transcript_endpoint);

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    if let Some(run_id) = summary.run_id {
        println!("Run {} finished", run_id);
    }
    println!("  Total:          {}", summary.total);
    println!("  Done:           {}", summary.done);
    println!("  Failed:         {}", summary.failed);
    println!("  Parse failures: {}", summary.parse_failures);
    println!("  Cache hits:     {}", summary.cache_hits);
    println!("  Fetched:        {}", summary.fetched);
    println!("  Enriched:       {}", summary.enriched);

    let stages = [Stage::Parse, Stage::Fetch, Stage::Enrich, Stage::Extract, Stage::Persist];
    let failing: Vec<_> = stages
        .iter()
        .filter(|s| summary.failures_at(**s) > 0)
        .map(|s| format!("{}={}", s, summary.failures_at(*s)))
        .collect();
    if !failing.is_empty() {
        println!("  By stage:       {}", failing.join(" "));
    }
}
