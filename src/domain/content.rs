//! Final structured content records.

use serde::{Deserialize, Serialize};

use super::url_event::UrlEvent;

/// Average characters per word used by the reading-time estimate
pub const CHARS_PER_WORD: f64 = 5.0;

/// Reading speed used by the reading-time estimate
pub const WORDS_PER_MINUTE: f64 = 250.0;

/// The normalized page representation written once per URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub url: UrlEvent,

    pub text: String,

    pub title: Option<String>,

    pub author: Option<String>,

    /// Publication or modification date as found in the source
    pub date: Option<String>,

    /// Length in seconds (video runtime or estimated reading time)
    pub duration: Option<u64>,

    pub image: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub comments: Vec<String>,

    /// Link targets found in the text
    #[serde(default)]
    pub neighbors: Vec<String>,
}

impl ContentRecord {
    /// Create an empty record for a URL
    pub fn new(url: UrlEvent) -> Self {
        Self {
            url,
            text: String::new(),
            title: None,
            author: None,
            date: None,
            duration: None,
            image: None,
            tags: Vec::new(),
            categories: Vec::new(),
            comments: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    pub fn digest(&self) -> String {
        self.url.digest()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_duration(mut self, duration: Option<u64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

/// Estimated reading time in seconds: `ceil(chars / 5 / 250) * 60`
pub fn reading_time(text: &str) -> u64 {
    let chars = text.chars().count() as f64;
    let minutes = (chars / CHARS_PER_WORD / WORDS_PER_MINUTE).ceil() as u64;
    minutes * 60
}
