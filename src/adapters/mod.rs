//! Adapter interfaces for external collaborators.
//!
//! - [`Fetcher`]: network retrieval (reqwest by default)
//! - [`ContentExtractor`]: HTML boilerplate removal (scraper by default)
//! - [`PdfExtractor`]: PDF text and metadata (lopdf by default)
//!
//! The pipeline only sees these traits, so tests swap in mocks.

pub mod extractor;
pub mod http;
pub mod pdf;

use async_trait::async_trait;

use crate::domain::{Headers, NetworkArchive};
use crate::error::FetchError;

pub use extractor::{ContentExtractor, ExtractOptions, ExtractedDocument, HeuristicExtractor};
pub use http::HttpFetcher;
pub use pdf::{LopdfExtractor, PdfDocument, PdfExtractor};

/// Desktop browser User-Agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/83.0.4103.116 Safari/537.36";

/// A single GET to perform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,

    /// Extra query pairs appended to the URL
    pub query: Vec<(String, String)>,

    /// Extra headers. The User-Agent is always set by the fetcher.
    pub headers: Headers,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }
}

/// Network retrieval of one resource.
///
/// Non-2xx responses are returned as archives; only transport problems
/// and timeouts are errors. No retries happen at this layer.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable fetcher name
    fn name(&self) -> &str;

    async fn fetch(&self, request: &FetchRequest) -> Result<NetworkArchive, FetchError>;
}
