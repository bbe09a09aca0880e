//! URL events: the identity every cached artifact hangs off.

use serde::{Deserialize, Serialize};

/// Coarse classification of a URL by hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    YouTube,
    Arxiv,
    GithubIo,
    DataSkeptic,
    Other,
}

impl UrlKind {
    /// Hostname fragments checked in order, first match wins.
    const RULES: &'static [(&'static [&'static str], UrlKind)] = &[
        (&["youtube.com", "youtu.be"], UrlKind::YouTube),
        (&["arxiv.org", "arxiv.com"], UrlKind::Arxiv),
        (&["github.io"], UrlKind::GithubIo),
        (&["dataskeptic.com"], UrlKind::DataSkeptic),
    ];

    /// Classify a hostname
    pub fn from_host(host: &str) -> Self {
        let host = host.to_lowercase();
        Self::RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| host.contains(n)))
            .map(|(_, kind)| *kind)
            .unwrap_or(UrlKind::Other)
    }
}

impl std::fmt::Display for UrlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlKind::YouTube => write!(f, "youtube"),
            UrlKind::Arxiv => write!(f, "arxiv"),
            UrlKind::GithubIo => write!(f, "github.io"),
            UrlKind::DataSkeptic => write!(f, "dataskeptic"),
            UrlKind::Other => write!(f, "other"),
        }
    }
}

/// A parsed, normalized URL from the input stream.
///
/// Immutable: use the `with_*` helpers to derive a changed copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlEvent {
    /// The URL exactly as it appeared in the stream
    pub raw: String,

    /// Quality/priority tag from the stream
    pub quality: String,

    pub scheme: String,

    /// Hostname without port or credentials
    pub host: String,

    /// Authority section (`user@host:port`)
    pub netloc: String,

    pub path: String,

    /// Query string without the leading `?`, tracking parameters removed
    pub query: String,
}

impl UrlEvent {
    pub fn kind(&self) -> UrlKind {
        UrlKind::from_host(&self.host)
    }

    /// MD5 hex of the raw URL string
    pub fn digest(&self) -> String {
        digest_of(&self.raw)
    }

    /// URL to request. The raw string, with the scheme added when it was
    /// written without one.
    pub fn fetch_url(&self) -> String {
        if self.raw.contains("://") {
            self.raw.clone()
        } else {
            format!("{}://{}", self.scheme, self.raw)
        }
    }

    /// Copy with a different query string
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..self.clone()
        }
    }

    /// Copy with a different quality tag
    pub fn with_quality(&self, quality: impl Into<String>) -> Self {
        Self {
            quality: quality.into(),
            ..self.clone()
        }
    }

    /// Copy with tracking parameters stripped from the query.
    ///
    /// `utm_*` is always removed; a numeric `t` timestamp only for YouTube.
    pub fn normalized(&self) -> Self {
        self.with_query(normalize_query(&self.query, self.kind()))
    }
}

/// MD5 hex digest of a URL string
pub fn digest_of(raw: &str) -> String {
    hex::encode(md5::compute(raw.as_bytes()).0)
}

/// Drop tracking parameters from a query string.
pub fn normalize_query(query: &str, kind: UrlKind) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            if key.starts_with("utm_") {
                return false;
            }
            if kind == UrlKind::YouTube && key == "t" {
                let value = pair.split_once('=').map(|(_, v)| v).unwrap_or_default();
                return !value.starts_with(|c: char| c.is_ascii_digit());
            }
            true
        })
        .collect::<Vec<_>>()
        .join("&")
}
