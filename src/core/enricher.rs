//! Kind-specific enrichment.
//!
//! Only YouTube has a rule today: resolve the video's transcript from a
//! third-party service. Every other kind has no enrichment, which is not an
//! error.

use std::sync::{Arc, LazyLock};

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use crate::adapters::{FetchRequest, Fetcher};
use crate::domain::{Enrichment, UrlEvent, UrlKind};
use crate::error::EnrichError;

/// Body the transcript service answers with when captions are off
pub const TRANSCRIPTS_DISABLED: &str = "Error: transcripts disabled for that video";

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|&)v=([A-Za-z0-9_-]+)").expect("valid video id regex"));

/// Resolves enrichments through an injected fetcher
pub struct Enricher {
    fetcher: Arc<dyn Fetcher>,
    transcript_endpoint: String,
}

impl Enricher {
    pub fn new(fetcher: Arc<dyn Fetcher>, transcript_endpoint: impl Into<String>) -> Self {
        Self {
            fetcher,
            transcript_endpoint: transcript_endpoint.into(),
        }
    }

    /// Whether `kind` has an enrichment rule
    pub fn applies_to(kind: UrlKind) -> bool {
        match kind {
            UrlKind::YouTube => true,
            UrlKind::Arxiv | UrlKind::GithubIo | UrlKind::DataSkeptic | UrlKind::Other => false,
        }
    }

    /// Fetch a fresh enrichment. `Ok(None)` when the kind has no rule.
    pub async fn fetch(&self, url: &UrlEvent) -> Result<Option<Enrichment>, EnrichError> {
        match url.kind() {
            UrlKind::YouTube => self.youtube_transcript(url).await.map(Some),
            UrlKind::Arxiv | UrlKind::GithubIo | UrlKind::DataSkeptic | UrlKind::Other => Ok(None),
        }
    }

    async fn youtube_transcript(&self, url: &UrlEvent) -> Result<Enrichment, EnrichError> {
        let video_id = video_id(&url.query).ok_or_else(|| EnrichError::NotAVideo(url.query.clone()))?;

        let request = FetchRequest::new(&self.transcript_endpoint).with_query("server_vid", &video_id);
        let archive = self.fetcher.fetch(&request).await?;

        if !archive.is_success() {
            return Err(EnrichError::TranscriptStatus(archive.response_status));
        }

        let body = archive.text();
        if body.trim() == TRANSCRIPTS_DISABLED {
            return Err(EnrichError::TranscriptDisabled(video_id));
        }

        let fragments = parse_transcript(&body)?;
        if fragments.join(" ") == TRANSCRIPTS_DISABLED {
            return Err(EnrichError::TranscriptDisabled(video_id));
        }
        if fragments.is_empty() {
            return Err(EnrichError::EmptyTranscript(video_id));
        }

        debug!(%video_id, fragments = fragments.len(), "Resolved transcript");
        Ok(Enrichment::new(url.clone(), fragments))
    }
}

/// Video id from a query string (`v=<id>`)
pub fn video_id(query: &str) -> Option<String> {
    VIDEO_ID
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Text nodes of a transcript document, in order
pub fn parse_transcript(body: &str) -> Result<Vec<String>, EnrichError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut fragments = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| EnrichError::TranscriptParse(e.to_string()))?;
                push_fragment(&mut fragments, &text);
            }
            Ok(Event::CData(e)) => {
                push_fragment(&mut fragments, &String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(EnrichError::TranscriptParse(format!(
                    "at byte {}: {}",
                    reader.error_position(),
                    e
                )))
            }
        }
    }

    Ok(fragments)
}

fn push_fragment(fragments: &mut Vec<String>, text: &str) {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        fragments.push(text);
    }
}
