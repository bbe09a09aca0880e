//! Content-addressed storage for pipeline artifacts.
//!
//! # Storage Layout
//!
//! ```text
//! <archives>/<digest>.json       # RawArchive, body base64-encoded
//! <enrichments>/<digest>.json    # Enrichment
//! <content>/<digest>.json        # ContentRecord
//! ```
//!
//! `digest` is the MD5 hex of the URL's raw string.

pub mod store;

pub use store::{ContentStore, Namespace};
