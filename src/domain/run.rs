//! Batch summaries rebuilt from event outcomes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{ArchiveSource, EventOutcome, Stage};

/// Counters for one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Option<Uuid>,

    /// Events handed to the processor
    pub total: usize,

    pub done: usize,

    pub failed: usize,

    /// Lines dropped before processing
    pub parse_failures: usize,

    pub cache_hits: usize,

    pub fetched: usize,

    pub enriched: usize,

    /// Failures per stage
    pub failures_by_stage: HashMap<Stage, usize>,
}

impl BatchSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id: Some(run_id),
            ..Default::default()
        }
    }

    /// Rebuild a summary by replaying outcomes in order
    pub fn from_outcomes(outcomes: &[EventOutcome]) -> Self {
        let mut summary = Self {
            run_id: outcomes.first().map(|o| o.run_id),
            ..Default::default()
        };

        for outcome in outcomes {
            summary.record(outcome);
        }

        summary
    }

    /// Apply one outcome
    pub fn record(&mut self, outcome: &EventOutcome) {
        self.total += 1;

        match outcome.failed_stage() {
            Some(stage) => {
                self.failed += 1;
                *self.failures_by_stage.entry(stage).or_insert(0) += 1;
            }
            None if outcome.is_done() => self.done += 1,
            None => {}
        }

        match outcome.archive_source {
            Some(ArchiveSource::Cache) => self.cache_hits += 1,
            Some(ArchiveSource::Network) => self.fetched += 1,
            None => {}
        }

        if outcome.enriched {
            self.enriched += 1;
        }
    }

    /// Count lines that never became events
    pub fn record_parse_failures(&mut self, count: usize) {
        self.parse_failures += count;
        if count > 0 {
            *self.failures_by_stage.entry(Stage::Parse).or_insert(0) += count;
        }
    }

    pub fn failures_at(&self, stage: Stage) -> usize {
        self.failures_by_stage.get(&stage).copied().unwrap_or(0)
    }
}
