//! Extractor dispatch: (kind, mime, enrichment) → ContentRecord.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::Html;

use super::metadata::{page_image, youtube_metadata};
use crate::adapters::extractor::split_list;
use crate::adapters::{
    ContentExtractor, ExtractOptions, HeuristicExtractor, LopdfExtractor, PdfExtractor,
};
use crate::domain::{reading_time, ContentRecord, Enrichment, RawArchive, UrlKind};
use crate::error::ExtractError;

pub const MIME_HTML: &str = "text/html";
pub const MIME_PDF: &str = "application/pdf";

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!?)\[[^\]]*\]\(([^)\s]+)\)").expect("valid markdown link regex")
});

/// How an archive is turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Video page metadata, text from the transcript
    YouTubePage,
    HtmlArticle,
    Pdf,
    Unsupported(String),
}

impl Strategy {
    pub fn select(kind: UrlKind, mime: &str) -> Self {
        match (kind, mime) {
            (UrlKind::YouTube, MIME_HTML) => Strategy::YouTubePage,
            (
                UrlKind::Arxiv | UrlKind::GithubIo | UrlKind::DataSkeptic | UrlKind::Other,
                MIME_HTML,
            ) => Strategy::HtmlArticle,
            (_, MIME_PDF) => Strategy::Pdf,
            (_, other) => Strategy::Unsupported(other.to_string()),
        }
    }
}

/// Builds content records from archives
pub struct Extractor {
    html: Arc<dyn ContentExtractor>,
    pdf: Arc<dyn PdfExtractor>,
    options: ExtractOptions,
    max_image_length: usize,
}

impl Extractor {
    pub fn new(
        html: Arc<dyn ContentExtractor>,
        pdf: Arc<dyn PdfExtractor>,
        max_image_length: usize,
    ) -> Self {
        Self {
            html,
            pdf,
            options: ExtractOptions::default(),
            max_image_length,
        }
    }

    /// scraper and lopdf collaborators
    pub fn with_defaults(max_image_length: usize) -> Self {
        Self::new(
            Arc::new(HeuristicExtractor::new()),
            Arc::new(LopdfExtractor::new()),
            max_image_length,
        )
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the record for an archive and optional enrichment
    pub fn dispatch(
        &self,
        archive: &RawArchive,
        enrichment: Option<&Enrichment>,
    ) -> Result<ContentRecord, ExtractError> {
        match Strategy::select(archive.url.kind(), archive.mime()) {
            Strategy::YouTubePage => Ok(self.youtube_page(archive, enrichment)),
            Strategy::HtmlArticle => self.html_article(archive),
            Strategy::Pdf => self.pdf(archive),
            Strategy::Unsupported(mime) => Err(ExtractError::UnsupportedMimeType(mime)),
        }
    }

    fn youtube_page(&self, archive: &RawArchive, enrichment: Option<&Enrichment>) -> ContentRecord {
        let meta = youtube_metadata(&archive.content.text(), self.max_image_length);
        let text = enrichment.map(Enrichment::joined).unwrap_or_default();

        ContentRecord {
            text,
            title: meta.title,
            author: meta.author,
            date: meta.date,
            duration: meta.duration,
            image: meta.image,
            tags: meta.tags,
            categories: meta.categories,
            ..ContentRecord::new(archive.url.clone())
        }
    }

    fn html_article(&self, archive: &RawArchive) -> Result<ContentRecord, ExtractError> {
        let html = archive.content.text();
        let doc = self.html.extract(&html, &self.options)?;
        let image = page_image(&Html::parse_document(&html), self.max_image_length);

        Ok(ContentRecord {
            duration: Some(reading_time(&doc.text)),
            neighbors: markdown_links(&doc.text),
            title: doc.title,
            author: doc.author,
            date: doc.date,
            tags: doc.tags,
            categories: doc.categories,
            ..ContentRecord::new(archive.url.clone())
                .with_text(doc.text)
                .with_image(image)
        })
    }

    fn pdf(&self, archive: &RawArchive) -> Result<ContentRecord, ExtractError> {
        let doc = self.pdf.extract(&archive.content.response_content)?;

        Ok(ContentRecord {
            duration: Some(reading_time(&doc.text)),
            title: doc.title,
            author: doc.author,
            date: doc.modified,
            tags: doc.keywords.as_deref().map(split_list).unwrap_or_default(),
            categories: doc.subject.into_iter().collect(),
            ..ContentRecord::new(archive.url.clone()).with_text(doc.text)
        })
    }
}

/// Targets of `[text](target)` links, images excluded, first-seen order
pub fn markdown_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MARKDOWN_LINK
        .captures_iter(text)
        .filter(|caps| caps.get(1).map_or(true, |bang| bang.as_str().is_empty()))
        .filter_map(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .filter(|target| seen.insert(target.clone()))
        .collect()
}
