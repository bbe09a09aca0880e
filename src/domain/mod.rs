//! Domain types for the acquisition pipeline.
//!
//! - UrlEvent: parsed, classified input URL and its digest
//! - RawArchive: captured network response
//! - Enrichment: kind-specific supplemental text
//! - ContentRecord: final structured output
//! - Events/Run: per-event states, outcomes and batch summaries

pub mod archive;
pub mod content;
pub mod enrichment;
pub mod events;
pub mod run;
pub mod url_event;

// Re-export commonly used types
pub use archive::{parse_content_type, Headers, NetworkArchive, RawArchive};
pub use content::{reading_time, ContentRecord};
pub use enrichment::Enrichment;
pub use events::{ArchiveSource, EventOutcome, PipelineState, Stage};
pub use run::BatchSummary;
pub use url_event::{digest_of, normalize_query, UrlEvent, UrlKind};
