//! Append-only run log with file-based persistence.
//!
//! Each batch run gets a directory under the runs dir:
//!
//! ```text
//! <home>/runs/<run_id>/
//! ├── events.jsonl    # one EventOutcome per line, in completion order
//! └── summary.json    # BatchSummary written when the run finishes
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{BatchSummary, EventOutcome};

/// JSONL log of event outcomes for one run
pub struct RunLog {
    run_id: Uuid,

    /// Directory containing the run
    run_dir: PathBuf,

    /// Path to the events.jsonl file
    events_path: PathBuf,

    /// Serializes appends from concurrent pipelines
    write_lock: Mutex<()>,
}

impl RunLog {
    /// Create or open the log for a run
    pub async fn open(runs_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = runs_dir.join(run_id.to_string());

        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        Ok(Self::at(run_dir, run_id))
    }

    /// Open the log of a run that must already exist
    pub async fn existing(runs_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = runs_dir.join(run_id.to_string());
        if !fs::try_exists(&run_dir).await.unwrap_or(false) {
            anyhow::bail!("No run found with id {}", run_id);
        }
        Ok(Self::at(run_dir, run_id))
    }

    fn at(run_dir: PathBuf, run_id: Uuid) -> Self {
        Self {
            run_id,
            events_path: run_dir.join("events.jsonl"),
            run_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get the path to the events file
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    fn summary_path(&self) -> PathBuf {
        self.run_dir.join("summary.json")
    }

    /// Append an outcome to the log
    pub async fn append(&self, outcome: &EventOutcome) -> Result<()> {
        let json = serde_json::to_string(outcome).context("Failed to serialize outcome")?;

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.events_path)
            .await
            .with_context(|| {
                format!("Failed to open events file: {}", self.events_path.display())
            })?;

        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write outcome")?;
        file.flush().await.context("Failed to flush outcome")?;

        Ok(())
    }

    /// Replay all outcomes in order
    pub async fn replay(&self) -> Result<Vec<EventOutcome>> {
        if !fs::try_exists(&self.events_path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let file = File::open(&self.events_path)
            .await
            .with_context(|| format!("Failed to open events file: {}", self.events_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut outcomes = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let outcome: EventOutcome = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse outcome: {}", line))?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Persist the final summary of the run
    pub async fn write_summary(&self, summary: &BatchSummary) -> Result<()> {
        let path = self.summary_path();
        let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write summary: {}", path.display()))
    }

    /// Summary rebuilt from the log. Parse failures are only known from the
    /// written summary, when there is one.
    pub async fn summary(&self) -> Result<BatchSummary> {
        let outcomes = self.replay().await?;
        let mut summary = BatchSummary::from_outcomes(&outcomes);
        summary.run_id = Some(self.run_id);

        let path = self.summary_path();
        if fs::try_exists(&path).await.unwrap_or(false) {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read summary: {}", path.display()))?;
            let written: BatchSummary =
                serde_json::from_str(&content).context("Failed to parse summary JSON")?;
            summary.record_parse_failures(written.parse_failures);
        }

        Ok(summary)
    }

    /// List all run IDs, most recent first
    pub async fn list_runs(runs_dir: &Path) -> Result<Vec<Uuid>> {
        if !fs::try_exists(runs_dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut runs: Vec<(SystemTime, Uuid)> = Vec::new();
        let mut entries = fs::read_dir(runs_dir)
            .await
            .with_context(|| format!("Failed to read runs directory: {}", runs_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            if let Some(uuid) = entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) {
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                runs.push((modified, uuid));
            }
        }

        runs.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(runs.into_iter().map(|(_, id)| id).collect())
    }
}
