//! Kind-specific supplemental data, e.g. a video transcript.

use serde::{Deserialize, Serialize};

use super::url_event::UrlEvent;

/// Supplemental text blocks resolved from a second source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Owning event; the digest key is shared with its archive
    pub url: UrlEvent,

    /// Text fragments in source order
    #[serde(default)]
    pub transcriptions: Vec<String>,
}

impl Enrichment {
    pub fn new(url: UrlEvent, transcriptions: Vec<String>) -> Self {
        Self {
            url,
            transcriptions,
        }
    }

    pub fn digest(&self) -> String {
        self.url.digest()
    }

    /// Fragments joined by single spaces
    pub fn joined(&self) -> String {
        self.transcriptions.join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.transcriptions.iter().all(|t| t.trim().is_empty())
    }
}
