//! Error taxonomy for the acquisition pipeline.
//!
//! Each concern has its own enum; [`PipelineError`] unifies them at the
//! processor boundary and attributes every failure to a [`Stage`].

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::Stage;

/// Malformed input line or unusable URL. The event is dropped upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Expected 3 tab-separated fields, found {fields}")]
    MalformedLine { fields: usize },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("No hostname found in '{0}'")]
    NoHostname(String),
}

/// Network retrieval failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

/// Content store failures. `Miss`, `Stale` and `Mismatch` are cache misses,
/// the rest are real I/O or format problems.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("No cache entry for {0}")]
    Miss(String),

    #[error("Cache entry {digest} is stale ({reason}), evicted")]
    Stale { digest: String, reason: String },

    #[error("Cache entry {digest} belongs to a different URL")]
    Mismatch { digest: String },

    #[error("Cache entry {digest} is unreadable: {source}")]
    Corrupt {
        digest: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Archive {digest} with status {status} is not cacheable")]
    NotCacheable { digest: String, status: u16 },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// True for the signals that simply mean "go fetch it".
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            CacheError::Miss(_) | CacheError::Stale { .. } | CacheError::Mismatch { .. }
        )
    }
}

/// Enrichment failures. These degrade to "no enrichment", never abort.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("No video id in query '{0}'")]
    NotAVideo(String),

    #[error("Transcripts disabled for video {0}")]
    TranscriptDisabled(String),

    #[error("Transcript service answered HTTP {0}")]
    TranscriptStatus(u16),

    #[error("Transcript body is not valid XML: {0}")]
    TranscriptParse(String),

    #[error("Transcript for video {0} is empty")]
    EmptyTranscript(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Content structuring failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Unsupported mime type {0}")]
    UnsupportedMimeType(String),

    #[error("HTML extraction failed: {0}")]
    Html(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// A failure of one event's pipeline, attributed to the stage it hit.
///
/// Parse failures never reach here: unparseable lines are dropped before
/// an event exists and are counted at [`Stage::Parse`] in the summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Persist failed: {0}")]
    Persist(#[source] CacheError),
}

impl PipelineError {
    /// The stage this failure belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Fetch(_) => Stage::Fetch,
            PipelineError::Enrich(_) => Stage::Enrich,
            PipelineError::Extract(_) => Stage::Extract,
            PipelineError::Persist(_) => Stage::Persist,
        }
    }
}
