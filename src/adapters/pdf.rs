//! PDF text and metadata.

use chrono::NaiveDate;
use lopdf::{Dictionary, Document, Object};

use crate::error::ExtractError;

/// What the PDF collaborator returns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfDocument {
    pub text: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub keywords: Option<String>,
    pub subject: Option<String>,
    /// Modification date as `YYYY-MM-DD`
    pub modified: Option<String>,
}

/// Pure bytes → text/metadata collaborator
pub trait PdfExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, bytes: &[u8]) -> Result<PdfDocument, ExtractError>;
}

/// Extractor built on `lopdf`
#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl PdfExtractor for LopdfExtractor {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<PdfDocument, ExtractError> {
        let document = Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let pages: Vec<u32> = document.get_pages().keys().copied().collect();
        let text = document
            .extract_text(&pages)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let mut out = PdfDocument {
            text: text.trim().to_string(),
            ..Default::default()
        };

        if let Some(info) = info_dictionary(&document) {
            out.author = info_string(&document, info, b"Author");
            out.title = info_string(&document, info, b"Title");
            out.keywords = info_string(&document, info, b"Keywords");
            out.subject = info_string(&document, info, b"Subject");
            out.modified = info_string(&document, info, b"ModDate").and_then(|d| pdf_date(&d));
        }

        Ok(out)
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    match resolve(document, info)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(document: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let Object::String(bytes, _) = resolve(document, info.get(key).ok()?)? else {
        return None;
    };
    Some(decode_pdf_string(bytes).trim().to_string()).filter(|s| !s.is_empty())
}

/// Text strings are UTF-16BE when they start with a BOM, otherwise
/// single-byte.
fn decode_pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// `D:YYYYMMDDHHmmSS...` → `YYYY-MM-DD`
fn pdf_date(raw: &str) -> Option<String> {
    let digits = raw.trim().trim_start_matches("D:");
    let day = digits.get(..8)?;
    NaiveDate::parse_from_str(day, "%Y%m%d")
        .ok()
        .map(|d| d.to_string())
}
