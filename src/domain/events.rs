//! Per-event pipeline states and outcomes.
//!
//! Every URL event walks the same state machine:
//!
//! ```text
//! Start → Fetching | CacheHit → Enriching | EnrichmentSkipped
//!       → Extracting → Persisting → Done
//! ```
//!
//! A failure at any stage moves the event to `Failed { stage, cause }` and
//! ends that event only. Outcomes are appended to the run log as JSONL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::url_event::{UrlEvent, UrlKind};

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Fetch,
    Enrich,
    Extract,
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Parse => "parse",
            Stage::Fetch => "fetch",
            Stage::Enrich => "enrich",
            Stage::Extract => "extract",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// State of a single event's pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PipelineState {
    Start,
    Fetching,
    CacheHit,
    Enriching,
    EnrichmentSkipped,
    Extracting,
    Persisting,
    Done,
    Failed { stage: Stage, cause: String },
}

impl PipelineState {
    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        if matches!(next, Failed { .. }) {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Start, Fetching)
                | (Start, CacheHit)
                | (Fetching, Enriching)
                | (Fetching, EnrichmentSkipped)
                | (CacheHit, Enriching)
                | (CacheHit, EnrichmentSkipped)
                | (Enriching, Extracting)
                | (EnrichmentSkipped, Extracting)
                | (Extracting, Persisting)
                | (Persisting, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::Start
    }
}

/// Where the archive for an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveSource {
    Cache,
    Network,
}

/// Final report for one event, one JSONL line in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOutcome {
    /// Batch run this event belonged to
    pub run_id: Uuid,

    pub digest: String,

    pub kind: UrlKind,

    /// Raw URL
    pub url: String,

    /// Terminal state (`done` or `failed`)
    #[serde(flatten)]
    pub state: PipelineState,

    pub archive_source: Option<ArchiveSource>,

    /// Whether the record was built with an enrichment
    #[serde(default)]
    pub enriched: bool,

    pub finished_at: DateTime<Utc>,

    pub duration_ms: Option<u64>,
}

impl EventOutcome {
    /// Start an outcome for an event
    pub fn new(run_id: Uuid, url: &UrlEvent) -> Self {
        Self {
            run_id,
            digest: url.digest(),
            kind: url.kind(),
            url: url.raw.clone(),
            state: PipelineState::Start,
            archive_source: None,
            enriched: false,
            finished_at: Utc::now(),
            duration_ms: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == PipelineState::Done
    }

    /// Stage of the failure, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        match self.state {
            PipelineState::Failed { stage, .. } => Some(stage),
            _ => None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
