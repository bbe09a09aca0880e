//! Load the line-delimited URL stream.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::parser::parse_line;
use crate::domain::UrlEvent;
use crate::error::ParseError;

/// Events parsed from a stream, plus the lines that were dropped
#[derive(Debug, Default)]
pub struct ParsedStream {
    pub events: Vec<UrlEvent>,

    /// (1-based line number, cause)
    pub failures: Vec<(usize, ParseError)>,
}

impl ParsedStream {
    /// Keep at most `limit` events
    pub fn truncate(&mut self, limit: usize) {
        self.events.truncate(limit);
    }
}

/// Parse stream text. The first line is a header and is skipped, as are
/// blank lines.
pub fn parse_stream(contents: &str) -> ParsedStream {
    let mut parsed = ParsedStream::default();

    for (index, line) in contents.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }

        let line_no = index + 1;
        match parse_line(line) {
            Ok(event) => parsed.events.push(event),
            Err(e) => {
                warn!(line = line_no, error = %e, "Dropping unparseable line");
                parsed.failures.push((line_no, e));
            }
        }
    }

    parsed
}

/// Read and parse a stream file
pub async fn load_stream(path: &Path) -> Result<ParsedStream> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read URL stream: {}", path.display()))?;

    let parsed = parse_stream(&contents);
    debug!(
        path = %path.display(),
        events = parsed.events.len(),
        failures = parsed.failures.len(),
        "Loaded URL stream"
    );

    Ok(parsed)
}
