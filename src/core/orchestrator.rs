//! Per-event pipeline and batch fan-out.
//!
//! Each URL event runs `fetch → enrich → extract → persist` on its own.
//! A failure ends that event only; the batch always completes with one
//! outcome per event.
//!
//! One semaphore gates every network call and store read/write. A permit
//! is held around a single I/O call and never across two, so the gate
//! cannot deadlock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::enricher::Enricher;
use super::event_store::RunLog;
use super::extractor::Extractor;
use crate::adapters::{FetchRequest, Fetcher, HttpFetcher};
use crate::config::Config;
use crate::domain::{
    ArchiveSource, BatchSummary, Enrichment, EventOutcome, NetworkArchive, PipelineState,
    RawArchive, UrlEvent,
};
use crate::error::{CacheError, FetchError, PipelineError};
use crate::ingest::load_stream;
use crate::library::{ContentStore, Namespace};

type PendingWrite = (Namespace, JoinHandle<Result<PathBuf, CacheError>>);

/// Fetcher that takes a gate permit for the duration of each call
struct GatedFetcher {
    inner: Arc<dyn Fetcher>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl Fetcher for GatedFetcher {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<NetworkArchive, FetchError> {
        let _permit = self.gate.acquire().await.ok();
        self.inner.fetch(request).await
    }
}

/// Drives URL events through the pipeline
pub struct Processor {
    fetcher: Arc<dyn Fetcher>,
    enricher: Enricher,
    extractor: Extractor,
    store: ContentStore,
    gate: Arc<Semaphore>,
    batch_size: usize,
}

impl Processor {
    /// Create a processor over an injected fetcher
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let processing = &config.processing;
        let gate = Arc::new(Semaphore::new(processing.concurrency.max(1)));
        let gated: Arc<dyn Fetcher> = Arc::new(GatedFetcher {
            inner: fetcher,
            gate: Arc::clone(&gate),
        });

        Self {
            enricher: Enricher::new(Arc::clone(&gated), &processing.transcript_endpoint),
            fetcher: gated,
            extractor: Extractor::with_defaults(processing.max_image_length),
            store: ContentStore::from_config(config),
            gate,
            batch_size: processing.batch_size.max(1),
        }
    }

    /// Create a processor with the reqwest fetcher
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.processing.request_timeout_seconds);
        let fetcher = HttpFetcher::new(timeout)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Gate permit for one store call. The gate is never closed.
    async fn permit(&self) -> Option<SemaphorePermit<'_>> {
        self.gate.acquire().await.ok()
    }

    // ========================================================================
    // Single event
    // ========================================================================

    /// Run one event to a terminal state. Never fails: errors end up in the
    /// outcome.
    #[instrument(skip(self, url), fields(digest = %url.digest(), kind = %url.kind()))]
    pub async fn process(&self, run_id: Uuid, url: UrlEvent) -> EventOutcome {
        let started = Instant::now();
        let mut outcome = EventOutcome::new(run_id, &url);
        let mut pending: Vec<PendingWrite> = Vec::new();

        let result = self.pipeline(&url, &mut outcome, &mut pending).await;

        // Background writes land before the outcome is reported
        for (namespace, handle) in pending {
            match handle.await {
                Ok(Ok(path)) => debug!(%namespace, path = %path.display(), "Background write done"),
                Ok(Err(e)) => warn!(%namespace, error = %e, "Background write failed"),
                Err(e) => warn!(%namespace, error = %e, "Background write task panicked"),
            }
        }

        match result {
            Ok(()) => advance(&mut outcome, PipelineState::Done),
            Err(e) => {
                let stage = e.stage();
                error!(%stage, digest = %outcome.digest, kind = %outcome.kind, error = %e, "Event failed");
                advance(
                    &mut outcome,
                    PipelineState::Failed {
                        stage,
                        cause: e.to_string(),
                    },
                );
            }
        }

        outcome.finished_at = Utc::now();
        outcome.with_duration(started.elapsed().as_millis() as u64)
    }

    async fn pipeline(
        &self,
        url: &UrlEvent,
        outcome: &mut EventOutcome,
        pending: &mut Vec<PendingWrite>,
    ) -> Result<(), PipelineError> {
        // Archive: cache first, network second
        let archive = match self.cached_archive(url).await {
            Some(archive) => {
                advance(outcome, PipelineState::CacheHit);
                outcome.archive_source = Some(ArchiveSource::Cache);
                archive
            }
            None => {
                advance(outcome, PipelineState::Fetching);
                let archive = self.fetch_archive(url).await?;
                outcome.archive_source = Some(ArchiveSource::Network);
                pending.push(self.spawn_archive_write(archive.clone()));
                archive
            }
        };

        // Enrichment: optional, never fails the event
        let enrichment = if Enricher::applies_to(url.kind()) {
            advance(outcome, PipelineState::Enriching);
            self.enrichment(url, pending).await
        } else {
            advance(outcome, PipelineState::EnrichmentSkipped);
            None
        };
        outcome.enriched = enrichment.is_some();

        advance(outcome, PipelineState::Extracting);
        let record = self.extractor.dispatch(&archive, enrichment.as_ref())?;

        advance(outcome, PipelineState::Persisting);
        let _permit = self.permit().await;
        self.store
            .save_content(&record)
            .await
            .map_err(PipelineError::Persist)?;

        Ok(())
    }

    async fn cached_archive(&self, url: &UrlEvent) -> Option<RawArchive> {
        let _permit = self.permit().await;
        match self.store.load_archive(url).await {
            Ok(archive) => Some(archive),
            Err(e) if e.is_miss() => {
                debug!(reason = %e, "Archive cache miss");
                None
            }
            Err(e) => {
                warn!(error = %e, "Unusable cached archive, fetching");
                None
            }
        }
    }

    async fn fetch_archive(&self, url: &UrlEvent) -> Result<RawArchive, FetchError> {
        let request = FetchRequest::new(url.fetch_url());
        let network = self.fetcher.fetch(&request).await?;

        if !network.is_success() {
            return Err(FetchError::Status {
                url: url.raw.clone(),
                status: network.response_status,
            });
        }

        Ok(RawArchive::new(url.clone(), network))
    }

    /// Cached enrichment, else a fresh one. Any failure means "absent".
    async fn enrichment(&self, url: &UrlEvent, pending: &mut Vec<PendingWrite>) -> Option<Enrichment> {
        let cached = {
            let _permit = self.permit().await;
            self.store.load_enrichment(url).await
        };

        match cached {
            Ok(enrichment) => return Some(enrichment),
            Err(e) if e.is_miss() => debug!(reason = %e, "Enrichment cache miss"),
            Err(e) => warn!(error = %e, "Unusable cached enrichment, fetching"),
        }

        match self.enricher.fetch(url).await {
            Ok(Some(enrichment)) => {
                pending.push(self.spawn_enrichment_write(enrichment.clone()));
                Some(enrichment)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(stage = "enrich", error = %e, "Enrichment unavailable, continuing without");
                None
            }
        }
    }

    fn spawn_archive_write(&self, archive: RawArchive) -> PendingWrite {
        let store = self.store.clone();
        let gate = Arc::clone(&self.gate);
        let handle = tokio::spawn(async move {
            let _permit = gate.acquire_owned().await.ok();
            store.save_archive(&archive).await
        });
        (Namespace::Archives, handle)
    }

    fn spawn_enrichment_write(&self, enrichment: Enrichment) -> PendingWrite {
        let store = self.store.clone();
        let gate = Arc::clone(&self.gate);
        let handle = tokio::spawn(async move {
            let _permit = gate.acquire_owned().await.ok();
            store.save_enrichment(&enrichment).await
        });
        (Namespace::Enrichments, handle)
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Process events in chunks of `batch_size`, each chunk fanned out and
    /// joined before the next starts. Outcomes are appended to `log` as
    /// they complete.
    pub async fn process_batch(
        &self,
        run_id: Uuid,
        events: Vec<UrlEvent>,
        log: Option<&RunLog>,
    ) -> Vec<EventOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());

        for (index, chunk) in events.chunks(self.batch_size).enumerate() {
            debug!(chunk = index, size = chunk.len(), "Processing chunk");

            let futures = chunk.iter().cloned().map(|url| async move {
                let outcome = self.process(run_id, url).await;
                if let Some(log) = log {
                    if let Err(e) = log.append(&outcome).await {
                        warn!(error = %e, digest = %outcome.digest, "Failed to log outcome");
                    }
                }
                outcome
            });

            outcomes.extend(join_all(futures).await);
        }

        outcomes
    }

    /// Load a stream file and process every parsed event as one run
    #[instrument(skip(self, stream, runs_dir), fields(stream = %stream.display()))]
    pub async fn run_stream(
        &self,
        stream: &Path,
        runs_dir: &Path,
        limit: Option<usize>,
    ) -> Result<BatchSummary> {
        let mut parsed = load_stream(stream).await?;
        if let Some(limit) = limit {
            parsed.truncate(limit);
        }

        let run_id = Uuid::new_v4();
        let log = RunLog::open(runs_dir, run_id).await?;
        info!(%run_id, events = parsed.events.len(), dropped = parsed.failures.len(), "Starting run");

        let outcomes = self.process_batch(run_id, parsed.events, Some(&log)).await;

        let mut summary = BatchSummary::from_outcomes(&outcomes);
        summary.run_id = Some(run_id);
        summary.record_parse_failures(parsed.failures.len());
        log.write_summary(&summary).await?;

        info!(
            %run_id,
            total = summary.total,
            done = summary.done,
            failed = summary.failed,
            cache_hits = summary.cache_hits,
            "Run finished"
        );
        Ok(summary)
    }
}

fn advance(outcome: &mut EventOutcome, next: PipelineState) {
    debug_assert!(
        outcome.state.can_advance_to(&next),
        "illegal transition {:?} -> {:?}",
        outcome.state,
        next
    );
    debug!(state = ?next, "State change");
    outcome.state = next;
}
