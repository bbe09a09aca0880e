//! Core pipeline logic.
//!
//! This module contains:
//! - Enricher: kind-specific supplemental retrieval
//! - Metadata: fixed page metadata lookups
//! - Extractor: (kind, mime) dispatch to a content record
//! - Processor: per-event state machine and batch fan-out
//! - RunLog: append-only outcome log per run

pub mod enricher;
pub mod event_store;
pub mod extractor;
pub mod metadata;
pub mod orchestrator;

// Re-export commonly used types
pub use enricher::Enricher;
pub use event_store::RunLog;
pub use extractor::{Extractor, Strategy};
pub use metadata::PageMetadata;
pub use orchestrator::Processor;
