//! HTML boilerplate removal.
//!
//! [`HeuristicExtractor`] picks the main content container, drops page
//! chrome, and renders what is left as light markdown: links become
//! `[text](href)`, images `![alt](src)`, headings `#`-prefixed.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate};
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ExtractError;

/// Feature flags for extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub include_links: bool,
    pub include_images: bool,
    pub include_formatting: bool,
    pub include_tables: bool,
    pub include_comments: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_links: true,
            include_images: true,
            include_formatting: true,
            include_tables: true,
            include_comments: false,
        }
    }
}

/// What the extractor pulls out of a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    /// `YYYY-MM-DD` when the page date could be parsed, raw otherwise
    pub date: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

/// Pure HTML → text/metadata collaborator
pub trait ContentExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<ExtractedDocument, ExtractError>;
}

/// Main-content extractor built on `scraper`
#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Candidate content containers, most specific first
const CONTAINERS: &[&str] = &["article", "main", "[role=main]", "body"];

/// Elements that never carry article text
const BOILERPLATE: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "template", "button", "select", "input", "head",
];

const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "main", "blockquote", "pre", "ul", "ol", "dl", "dt", "dd",
    "table", "tr", "figure", "figcaption", "hr",
];

impl ContentExtractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<ExtractedDocument, ExtractError> {
        let document = Html::parse_document(html);

        let text = CONTAINERS
            .iter()
            .filter_map(|css| select_first(&document, css))
            .map(|container| render(container, options))
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| render(document.root_element(), options));

        if text.is_empty() {
            return Err(ExtractError::Html("no extractable text".to_string()));
        }

        let title = first_attr(
            &document,
            &[r#"meta[property="og:title"]"#, r#"meta[name="twitter:title"]"#],
            "content",
        )
        .or_else(|| first_text(&document, &["title", "h1"]));

        let author = first_attr(
            &document,
            &[r#"meta[name="author"]"#, r#"meta[property="article:author"]"#],
            "content",
        )
        .or_else(|| first_text(&document, &[r#"[rel="author"]"#, r#"[itemprop="author"]"#]));

        let date = first_attr(
            &document,
            &[
                r#"meta[property="article:published_time"]"#,
                r#"meta[name="date"]"#,
                r#"meta[itemprop="datePublished"]"#,
            ],
            "content",
        )
        .or_else(|| first_attr(&document, &["time[datetime]"], "datetime"))
        .map(|raw| normalize_date(&raw));

        let categories = all_attrs(&document, r#"meta[property="article:section"]"#, "content");

        let mut tags = all_attrs(&document, r#"meta[property="article:tag"]"#, "content");
        if let Some(keywords) = first_attr(&document, &[r#"meta[name="keywords"]"#], "content") {
            tags.extend(split_list(&keywords));
        }

        Ok(ExtractedDocument {
            text,
            title,
            author,
            date,
            categories: dedupe(categories),
            tags: dedupe(tags),
        })
    }
}

// ============================================================================
// Selector helpers
// ============================================================================

/// First element matching `css`
pub fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

/// First non-empty attribute value across selectors, in order
pub fn first_attr(document: &Html, selectors: &[&str], attr: &str) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    })
}

/// First non-empty element text across selectors, in order
pub fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document
            .select(&selector)
            .map(|el| collapse(&el.text().collect::<String>()))
            .find(|t| !t.is_empty())
    })
}

/// Every non-empty attribute value for a selector
pub fn all_attrs(document: &Html, css: &str, attr: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

/// Reduce timestamps to a calendar date
fn normalize_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive().to_string();
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .map(|d| d.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// `comment`, `comments`, `comment-list`, `comments_area` and the like.
/// `commentary` or `uncommented` are content.
fn is_comment_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    ["comment", "comments"].iter().any(|stem| {
        token == *stem
            || token
                .strip_prefix(stem)
                .is_some_and(|rest| rest.starts_with(['-', '_']))
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Rendering
// ============================================================================

fn render(element: ElementRef<'_>, options: &ExtractOptions) -> String {
    let mut renderer = Renderer::new(options);
    renderer.children(element);
    renderer
        .out
        .lines()
        .map(collapse)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

struct Renderer<'o> {
    options: &'o ExtractOptions,
    out: String,
}

impl<'o> Renderer<'o> {
    fn new(options: &'o ExtractOptions) -> Self {
        Self {
            options,
            out: String::new(),
        }
    }

    fn children(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el);
                    }
                }
                _ => {}
            }
        }
    }

    /// Render children into a detached buffer
    fn inline(&self, element: ElementRef<'_>) -> String {
        let mut nested = Renderer::new(self.options);
        nested.children(element);
        collapse(&nested.out)
    }

    fn element(&mut self, el: ElementRef<'_>) {
        if self.is_skipped(el) {
            return;
        }

        let value = el.value();
        let name = value.name();
        let formatting = self.options.include_formatting;

        match name {
            "br" => self.newline(),
            "img" => {
                if self.options.include_images {
                    if let Some(src) = value.attr("src").filter(|s| !s.trim().is_empty()) {
                        let alt = value.attr("alt").unwrap_or_default().trim();
                        self.out.push_str(&format!("![{}]({})", alt, src.trim()));
                    }
                }
            }
            "a" => {
                let href = value
                    .attr("href")
                    .map(str::trim)
                    .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"));
                match href {
                    Some(href) if self.options.include_links => {
                        let label = self.inline(el);
                        if label.is_empty() {
                            return;
                        }
                        self.out.push_str(&format!(" [{}]({}) ", label, href));
                    }
                    _ => self.children(el),
                }
            }
            "strong" | "b" if formatting => self.wrapped(el, "**"),
            "em" | "i" if formatting => self.wrapped(el, "*"),
            "code" if formatting => self.wrapped(el, "`"),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.newline();
                if formatting {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                }
                self.children(el);
                self.newline();
            }
            "li" => {
                self.newline();
                self.out.push_str("- ");
                self.children(el);
                self.newline();
            }
            "td" | "th" => {
                self.children(el);
                self.out.push_str(" | ");
            }
            _ if BLOCKS.contains(&name) => {
                self.newline();
                self.children(el);
                self.newline();
            }
            _ => self.children(el),
        }
    }

    fn wrapped(&mut self, el: ElementRef<'_>, marker: &str) {
        let inner = self.inline(el);
        if !inner.is_empty() {
            self.out.push_str(&format!(" {}{}{} ", marker, inner, marker));
        }
    }

    fn is_skipped(&self, el: ElementRef<'_>) -> bool {
        let value = el.value();
        let name = value.name();

        if BOILERPLATE.contains(&name) {
            return true;
        }
        if name == "table" && !self.options.include_tables {
            return true;
        }
        if value.attr("hidden").is_some() || value.attr("aria-hidden") == Some("true") {
            return true;
        }
        if !self.options.include_comments {
            let id = value.attr("id").into_iter();
            let classes = value.attr("class").into_iter().flat_map(str::split_whitespace);
            if id.chain(classes).any(is_comment_token) {
                return true;
            }
        }
        false
    }

    fn text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                if !self.out.ends_with(char::is_whitespace) {
                    self.out.push(' ');
                }
            } else {
                self.out.push(c);
            }
        }
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }
}
