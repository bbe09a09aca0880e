//! gnosis - Cache-first URL acquisition and enrichment pipeline
//!
//! Turns a line-delimited stream of bookmarked URLs into structured
//! content records for a personal reading archive.
//!
//! # Architecture
//!
//! Every URL walks the same per-event pipeline:
//! - Parse the stream line into a normalized [`UrlEvent`]
//! - Load the raw archive from the content store, or fetch it
//! - Fetch an enrichment (YouTube transcripts) when the kind calls for one
//! - Dispatch to an extraction strategy by kind and MIME type
//! - Persist the [`ContentRecord`] keyed by the URL digest
//!
//! Failures are attributed to a stage and end that event only. Each run
//! appends one outcome per event to a JSONL log.
//!
//! # Modules
//!
//! - `adapters`: Network and document extraction collaborators
//! - `core`: Processor, enricher, extractor dispatch, run log
//! - `domain`: Data structures (UrlEvent, archives, records, outcomes)
//! - `ingest`: Stream parsing
//! - `library`: Digest-keyed content store
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process the configured stream
//! gnosis run
//!
//! # Process one URL
//! gnosis process https://www.youtube.com/watch?v=dQw4w9WgXcQ
//!
//! # Inspect a run
//! gnosis status <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod library;
pub mod result;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{Enricher, Extractor, Processor, RunLog};
pub use domain::{
    BatchSummary, ContentRecord, Enrichment, EventOutcome, NetworkArchive, PipelineState,
    RawArchive, Stage, UrlEvent, UrlKind,
};
pub use error::{CacheError, EnrichError, ExtractError, FetchError, ParseError, PipelineError};
pub use ingest::{parse_line, parse_url};
pub use library::ContentStore;
pub use result::ResultExt;
