//! Raw network archives.
//!
//! An archive is the unmodified response captured for a URL, plus enough
//! request provenance to know how it was obtained. Bodies are stored
//! base64-encoded so an archive round-trips through JSON byte for byte.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::url_event::UrlEvent;

/// MIME type used when a response carries no Content-Type
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Header snapshot, names lowercased, repeated values joined with ", "
pub type Headers = BTreeMap<String, String>;

/// Everything captured from one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkArchive {
    /// Host that answered
    pub host: String,

    pub request_method: String,

    /// URL as sent, query included
    pub request_url: String,

    pub request_headers: Headers,

    pub response_status: u16,

    /// Final URL after redirects
    pub response_url: String,

    pub response_headers: Headers,

    /// Lowercased MIME type without parameters
    pub response_content_type: String,

    pub response_charset: Option<String>,

    #[serde(with = "base64_bytes")]
    pub response_content: Vec<u8>,
}

impl NetworkArchive {
    /// True for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.response_status)
    }

    /// Body decoded as text. Invalid sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.response_content).into_owned()
    }
}

/// A fetched resource tied to the event that asked for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArchive {
    pub url: UrlEvent,
    pub content: NetworkArchive,
}

impl RawArchive {
    pub fn new(url: UrlEvent, content: NetworkArchive) -> Self {
        Self { url, content }
    }

    pub fn digest(&self) -> String {
        self.url.digest()
    }

    pub fn status(&self) -> u16 {
        self.content.response_status
    }

    pub fn mime(&self) -> &str {
        &self.content.response_content_type
    }

    pub fn is_success(&self) -> bool {
        self.content.is_success()
    }
}

/// Split a Content-Type header into (mime, charset).
///
/// `text/html; charset=UTF-8` becomes `("text/html", Some("utf-8"))`.
pub fn parse_content_type(header: Option<&str>) -> (String, Option<String>) {
    let Some(header) = header.filter(|h| !h.trim().is_empty()) else {
        return (DEFAULT_MIME.to_string(), None);
    };

    let mut parts = header.split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME.to_string());

    let charset = parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_lowercase())
        } else {
            None
        }
    });

    (mime, charset)
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
