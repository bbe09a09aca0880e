//! Parse raw stream lines into [`UrlEvent`]s.
//!
//! A line is `<date>\t<quality>\t<url>`. Parsing never panics: every
//! problem comes back as a [`ParseError`].

use url::Url;

use crate::domain::{normalize_query, UrlEvent, UrlKind};
use crate::error::ParseError;
use crate::result::ResultExt;

/// Scheme assumed when a URL is written without one
const DEFAULT_SCHEME: &str = "http";

/// Parse one stream line.
pub fn parse_line(line: &str) -> Result<UrlEvent, ParseError> {
    let fields: Vec<&str> = line.trim().split('\t').collect();
    let [_date, quality, url] = fields.as_slice() else {
        return Err(ParseError::MalformedLine {
            fields: fields.len(),
        });
    };

    parse_url(url.trim(), quality.trim())
}

/// Parse and normalize a single URL with its quality tag.
pub fn parse_url(raw: &str, quality: &str) -> Result<UrlEvent, ParseError> {
    let parsed = Url::parse(raw)
        .map_err(|e| ParseError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
        .recover(|_| {
            if raw.contains("://") {
                return Err(());
            }
            Url::parse(&format!("{}://{}", DEFAULT_SCHEME, raw)).map_err(|_| ())
        })?;

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    if host.is_empty() {
        return Err(ParseError::NoHostname(raw.to_string()));
    }

    let kind = UrlKind::from_host(&host);
    let query = normalize_query(parsed.query().unwrap_or_default(), kind);

    Ok(UrlEvent {
        raw: raw.to_string(),
        quality: quality.to_string(),
        scheme: parsed.scheme().to_string(),
        netloc: netloc(&parsed, &host),
        host,
        path: parsed.path().to_string(),
        query,
    })
}

/// Authority section: `user:pass@host:port`
fn netloc(url: &Url, host: &str) -> String {
    let mut out = String::new();
    if !url.username().is_empty() {
        out.push_str(url.username());
        if let Some(password) = url.password() {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }
    out.push_str(host);
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::digest_of;

    #[test]
    fn test_parse_line_strips_tracking() {
        let event = parse_line("2024-01-01\tA\thttps://example.com/a?utm_source=x&id=1").unwrap();

        assert_eq!(event.host, "example.com");
        assert_eq!(event.query, "id=1");
        assert_eq!(event.path, "/a");
        assert_eq!(event.scheme, "https");
        assert_eq!(event.quality, "A");
        assert_eq!(event.raw, "https://example.com/a?utm_source=x&id=1");
        assert_eq!(
            event.digest(),
            digest_of("https://example.com/a?utm_source=x&id=1")
        );
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            parse_line("only\ttwo"),
            Err(ParseError::MalformedLine { fields: 2 })
        );
        assert_eq!(
            parse_line("a\tb\tc\td"),
            Err(ParseError::MalformedLine { fields: 4 })
        );
        assert_eq!(parse_line(""), Err(ParseError::MalformedLine { fields: 1 }));
    }

    #[test]
    fn test_missing_scheme_defaults_to_http() {
        let event = parse_url("example.com/post?id=7", "B").unwrap();
        assert_eq!(event.scheme, "http");
        assert_eq!(event.host, "example.com");
        assert_eq!(event.query, "id=7");
        // raw is kept as written
        assert_eq!(event.raw, "example.com/post?id=7");
    }

    #[test]
    fn test_no_hostname() {
        assert!(matches!(
            parse_url("file:///tmp/notes.txt", "A"),
            Err(ParseError::NoHostname(_))
        ));
    }

    #[test]
    fn test_invalid_url_keeps_original_cause() {
        let err = parse_url("https://", "A").unwrap_err();
        assert!(matches!(err, ParseError::InvalidUrl { .. }));

        let err = parse_url("", "A").unwrap_err();
        assert!(matches!(err, ParseError::InvalidUrl { .. }));
    }

    #[test]
    fn test_garbage_never_panics() {
        let inputs = [
            "\t\t",
            "2024\tA\thttp://[::1",
            "2024\tA\t:::::",
            "2024\tA\thttps://exa mple.com",
            "\t\t\t\t\t",
        ];
        for input in inputs {
            assert!(parse_line(input).is_err(), "{:?} should fail", input);
        }
    }

    #[test]
    fn test_netloc_and_kind() {
        let event = parse_url("https://user:pw@www.YouTube.com:8443/watch?v=abc&t=30", "A").unwrap();
        assert_eq!(event.host, "www.youtube.com");
        assert_eq!(event.netloc, "user:pw@www.youtube.com:8443");
        assert_eq!(event.kind(), UrlKind::YouTube);
        assert_eq!(event.query, "v=abc");
    }

    #[test]
    fn test_parse_is_idempotent_under_normalization() {
        let event = parse_line("2024-01-01\tA\thttps://www.youtube.com/watch?utm_medium=m&v=xyz&t=5s").unwrap();
        assert_eq!(event.normalized(), event);
    }
}
