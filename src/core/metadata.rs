//! Fixed metadata-tag lookups over a page.
//!
//! Every lookup walks its candidates in priority order (open-graph,
//! twitter-card, itemprop, generic tag) and returns the first non-empty
//! value.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::adapters::extractor::{first_attr, first_text, split_list};

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$").expect("valid duration regex")
});

/// Metadata found on a video page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    /// Seconds
    pub duration: Option<u64>,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
}

/// Page title: og → twitter → itemprop → `article h1` → `head title` → `title`
pub fn page_title(document: &Html) -> Option<String> {
    first_attr(
        document,
        &[
            r#"meta[property="og:title"]"#,
            r#"meta[name="og:title"]"#,
            r#"meta[name="twitter:title"]"#,
            r#"meta[itemprop="name"]"#,
        ],
        "content",
    )
    .or_else(|| first_text(document, &["article h1", "head title", "title"]))
}

/// Preview image: og → twitter → itemprop (`image`, then `thumbnailUrl`)
/// → icon → first `<img>`.
///
/// Values longer than `max_length` are treated as noise (inline data URIs
/// and the like) and rejected.
pub fn page_image(document: &Html, max_length: usize) -> Option<String> {
    first_attr(
        document,
        &[
            r#"meta[property="og:image"]"#,
            r#"meta[name="twitter:image"]"#,
            r#"meta[itemprop="image"]"#,
        ],
        "content",
    )
    .or_else(|| first_attr(document, &[r#"link[itemprop="thumbnailUrl"]"#], "href"))
    .or_else(|| first_attr(document, &[r#"head link[rel~="icon"]"#], "href"))
    .or_else(|| first_attr(document, &["img[src]"], "src"))
    .filter(|image| image.len() <= max_length)
}

/// Metadata pass over a YouTube watch page
pub fn youtube_metadata(html: &str, max_image_length: usize) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = page_title(&document);

    let author = first_attr(
        &document,
        &[r#"span[itemprop="author"] link[itemprop="url"]"#],
        "href",
    )
    .or_else(|| {
        first_attr(
            &document,
            &[r#"span[itemprop="author"] link[itemprop="name"]"#],
            "content",
        )
    });

    let date = first_attr(
        &document,
        &[
            r#"meta[itemprop="datePublished"]"#,
            r#"meta[itemprop="uploadDate"]"#,
        ],
        "content",
    );

    let duration = first_attr(&document, &[r#"meta[itemprop="duration"]"#], "content")
        .and_then(|raw| parse_iso_duration(&raw));

    let image = page_image(&document, max_image_length);

    let tags = first_attr(&document, &[r#"meta[name="keywords"]"#], "content")
        .map(|raw| split_list(&raw))
        .unwrap_or_default();

    let categories = first_attr(&document, &[r#"meta[itemprop="genre"]"#], "content")
        .into_iter()
        .collect();

    PageMetadata {
        title,
        author,
        date,
        duration,
        image,
        tags,
        categories,
    }
}

/// `PT1H2M3S` → 3723. `None` when unparseable or too large for `u64`.
pub fn parse_iso_duration(raw: &str) -> Option<u64> {
    let caps = ISO_DURATION.captures(raw.trim())?;
    if (1..=4).all(|i| caps.get(i).is_none()) {
        return None;
    }

    // components come from page markup, so every step is checked
    [(1, 86_400u64), (2, 3_600), (3, 60), (4, 1)]
        .into_iter()
        .try_fold(0u64, |total, (i, unit)| {
            let component = match caps.get(i) {
                Some(m) => m.as_str().parse::<u64>().ok()?,
                None => 0,
            };
            total.checked_add(component.checked_mul(unit)?)
        })
}
