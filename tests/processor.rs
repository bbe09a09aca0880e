//! Processor Integration Tests
//!
//! Drives whole events and batches through the pipeline against an
//! in-memory fetcher and a temp-dir store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gnosis::adapters::{
    ContentExtractor, ExtractOptions, ExtractedDocument, FetchRequest, Fetcher, LopdfExtractor,
};
use gnosis::config::Config;
use gnosis::core::enricher::TRANSCRIPTS_DISABLED;
use gnosis::core::{Extractor, Processor, RunLog};
use gnosis::domain::{
    ArchiveSource, Enrichment, Headers, NetworkArchive, PipelineState, RawArchive, Stage,
};
use gnosis::error::{ExtractError, FetchError};
use gnosis::ingest::parse_url;
use gnosis::library::{ContentStore, Namespace};
use tempfile::TempDir;
use uuid::Uuid;

const TRANSCRIPTS: &str = "https://transcripts.test/";

const ARTICLE: &str = r#"<html>
<head><title>An Article</title><meta property="og:image" content="https://img.test/a.png"></head>
<body><article><p>Plain words about engines. See <a href="https://example.org/ref">the reference</a>.</p></article></body>
</html>"#;

const VIDEO_PAGE: &str = r#"<html><body>
<meta itemprop="name" content="A Talk">
<meta itemprop="duration" content="PT1M30S">
<meta itemprop="datePublished" content="2020-01-02">
</body></html>"#;

const TRANSCRIPT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<transcript><text start="0" dur="1">hello</text><text start="1" dur="1">world</text></transcript>"#;

// ============================================================================
// Mock fetcher
// ============================================================================

#[derive(Default)]
struct MockFetcher {
    responses: HashMap<String, (u16, String, Vec<u8>)>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn respond(mut self, url: &str, status: u16, mime: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), (status, mime.to_string(), body.as_bytes().to_vec()));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn key(request: &FetchRequest) -> String {
        if request.query.is_empty() {
            return request.url.clone();
        }
        let query: Vec<String> = request
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", request.url, query.join("&"))
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<NetworkArchive, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let key = Self::key(request);
        let (status, mime, body) = self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or((404, "text/html".to_string(), Vec::new()));

        Ok(NetworkArchive {
            host: "mock".into(),
            request_method: "GET".into(),
            request_url: key.clone(),
            request_headers: Headers::new(),
            response_status: status,
            response_url: key,
            response_headers: Headers::new(),
            response_content_type: mime,
            response_charset: None,
            response_content: body,
        })
    }
}

fn config(dir: &TempDir, concurrency: usize) -> Config {
    let mut config = Config::from_home(dir.path()).with_concurrency(concurrency);
    config.processing.transcript_endpoint = TRANSCRIPTS.to_string();
    config
}

// ============================================================================
// Single events
// ============================================================================

#[tokio::test]
async fn test_html_article_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(MockFetcher::default().respond(
        "https://example.com/post",
        200,
        "text/html",
        ARTICLE,
    ));
    let processor = Processor::new(&config, fetcher.clone());

    let url = parse_url("https://example.com/post", "A").unwrap();
    let digest = url.digest();
    let outcome = processor.process(Uuid::new_v4(), url).await;

    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.archive_source, Some(ArchiveSource::Network));
    assert!(!outcome.enriched);
    assert!(outcome.duration_ms.is_some());

    let record = processor.store().load_content(&digest).await.unwrap();
    assert!(record.text.contains("Plain words about engines"));
    assert_eq!(record.title.as_deref(), Some("An Article"));
    assert_eq!(record.image.as_deref(), Some("https://img.test/a.png"));
    assert_eq!(record.neighbors, vec!["https://example.org/ref"]);
    assert!(record.duration.is_some());
}

#[tokio::test]
async fn test_archive_written_before_process_returns() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(MockFetcher::default().respond(
        "https://example.com/post",
        200,
        "text/html",
        ARTICLE,
    ));
    let processor = Processor::new(&config, fetcher);

    let url = parse_url("https://example.com/post", "A").unwrap();
    let digest = url.digest();
    processor.process(Uuid::new_v4(), url).await;

    let store = ContentStore::from_config(&config);
    assert!(store.path(Namespace::Archives, &digest).exists());
    assert!(store.path(Namespace::Content, &digest).exists());
    // non-YouTube events never write enrichments
    assert!(!store.path(Namespace::Enrichments, &digest).exists());
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(MockFetcher::default().respond(
        "https://example.com/post",
        200,
        "text/html",
        ARTICLE,
    ));
    let url = parse_url("https://example.com/post", "A").unwrap();

    let first = Processor::new(&config, fetcher.clone())
        .process(Uuid::new_v4(), url.clone())
        .await;
    assert_eq!(first.archive_source, Some(ArchiveSource::Network));
    assert_eq!(fetcher.calls(), 1);

    let second = Processor::new(&config, fetcher.clone())
        .process(Uuid::new_v4(), url)
        .await;
    assert_eq!(second.state, PipelineState::Done);
    assert_eq!(second.archive_source, Some(ArchiveSource::Cache));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_stale_cached_archive_is_refetched() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let url = parse_url("https://example.com/post", "A").unwrap();
    let digest = url.digest();

    // plant a 500 archive the way an older writer might have left it
    let stale = RawArchive::new(
        url.clone(),
        NetworkArchive {
            host: "example.com".into(),
            request_method: "GET".into(),
            request_url: url.raw.clone(),
            request_headers: Headers::new(),
            response_status: 500,
            response_url: url.raw.clone(),
            response_headers: Headers::new(),
            response_content_type: "text/html".into(),
            response_charset: None,
            response_content: Vec::new(),
        },
    );
    let path = ContentStore::from_config(&config).path(Namespace::Archives, &digest);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, serde_json::to_vec(&stale).unwrap()).unwrap();

    let fetcher = Arc::new(MockFetcher::default().respond(
        "https://example.com/post",
        200,
        "text/html",
        ARTICLE,
    ));
    let outcome = Processor::new(&config, fetcher.clone())
        .process(Uuid::new_v4(), url.clone())
        .await;

    assert_eq!(outcome.state, PipelineState::Done);
    assert_eq!(outcome.archive_source, Some(ArchiveSource::Network));
    assert_eq!(fetcher.calls(), 1);

    let cached = ContentStore::from_config(&config)
        .load_archive(&url)
        .await
        .unwrap();
    assert_eq!(cached.status(), 200);
}

#[tokio::test]
async fn test_fetch_status_failure_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(MockFetcher::default());
    let processor = Processor::new(&config, fetcher);

    let url = parse_url("https://example.com/missing", "A").unwrap();
    let digest = url.digest();
    let outcome = processor.process(Uuid::new_v4(), url).await;

    assert_eq!(outcome.failed_stage(), Some(Stage::Fetch));
    match &outcome.state {
        PipelineState::Failed { cause, .. } => assert!(cause.contains("404")),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(!processor.store().path(Namespace::Archives, &digest).exists());
    assert!(!processor.store().path(Namespace::Content, &digest).exists());
}

#[tokio::test]
async fn test_unsupported_mime_fails_extract() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(MockFetcher::default().respond(
        "https://example.com/pic",
        200,
        "image/png",
        "\u{89}PNG",
    ));
    let processor = Processor::new(&config, fetcher);

    let url = parse_url("https://example.com/pic", "A").unwrap();
    let digest = url.digest();
    let outcome = processor.process(Uuid::new_v4(), url).await;

    assert_eq!(outcome.failed_stage(), Some(Stage::Extract));
    // the archive itself was fine and stays cached
    assert!(processor.store().path(Namespace::Archives, &digest).exists());
    assert!(!processor.store().path(Namespace::Content, &digest).exists());
}

// ============================================================================
// YouTube enrichment
// ============================================================================

#[tokio::test]
async fn test_youtube_transcript_becomes_text() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let page = "https://www.youtube.com/watch?v=abc123";
    let fetcher = Arc::new(
        MockFetcher::default()
            .respond(page, 200, "text/html", VIDEO_PAGE)
            .respond(
                &format!("{}?server_vid=abc123", TRANSCRIPTS),
                200,
                "text/xml",
                TRANSCRIPT,
            ),
    );
    let processor = Processor::new(&config, fetcher.clone());

    let url = parse_url(page, "A").unwrap();
    let digest = url.digest();
    let outcome = processor.process(Uuid::new_v4(), url.clone()).await;

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(outcome.enriched);
    assert_eq!(fetcher.calls(), 2);

    let record = processor.store().load_content(&digest).await.unwrap();
    assert_eq!(record.text, "hello world");
    assert_eq!(record.title.as_deref(), Some("A Talk"));
    assert_eq!(record.duration, Some(90));
    assert_eq!(record.date.as_deref(), Some("2020-01-02"));

    let enrichment: Enrichment = processor.store().load_enrichment(&url).await.unwrap();
    assert_eq!(enrichment.transcriptions, vec!["hello", "world"]);

    // both archive and enrichment now come from the cache
    let again = Processor::new(&config, fetcher.clone())
        .process(Uuid::new_v4(), url)
        .await;
    assert!(again.enriched);
    assert_eq!(again.archive_source, Some(ArchiveSource::Cache));
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_youtube_without_video_id_degrades() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let page = "https://www.youtube.com/channel/UC123";
    let fetcher = Arc::new(MockFetcher::default().respond(page, 200, "text/html", VIDEO_PAGE));
    let processor = Processor::new(&config, fetcher.clone());

    let url = parse_url(page, "A").unwrap();
    let digest = url.digest();
    let outcome = processor.process(Uuid::new_v4(), url).await;

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(!outcome.enriched);
    // no transcript request without a video id
    assert_eq!(fetcher.calls(), 1);

    let record = processor.store().load_content(&digest).await.unwrap();
    assert_eq!(record.text, "");
    assert_eq!(record.title.as_deref(), Some("A Talk"));
    assert!(!processor.store().path(Namespace::Enrichments, &digest).exists());
}

#[tokio::test]
async fn test_disabled_transcript_degrades_without_caching() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let page = "https://www.youtube.com/watch?v=quiet";
    let fetcher = Arc::new(
        MockFetcher::default()
            .respond(page, 200, "text/html", VIDEO_PAGE)
            .respond(
                &format!("{}?server_vid=quiet", TRANSCRIPTS),
                200,
                "text/html",
                TRANSCRIPTS_DISABLED,
            ),
    );
    let processor = Processor::new(&config, fetcher.clone());

    let url = parse_url(page, "A").unwrap();
    let digest = url.digest();
    let outcome = processor.process(Uuid::new_v4(), url).await;

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(!outcome.enriched);
    assert_eq!(fetcher.calls(), 2);
    assert!(!processor.store().path(Namespace::Enrichments, &digest).exists());

    let record = processor.store().load_content(&digest).await.unwrap();
    assert_eq!(record.text, "");
    assert_eq!(record.title.as_deref(), Some("A Talk"));
}

#[tokio::test]
async fn test_transcript_service_error_degrades() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let page = "https://www.youtube.com/watch?v=gone";
    let fetcher = Arc::new(MockFetcher::default().respond(page, 200, "text/html", VIDEO_PAGE));
    let processor = Processor::new(&config, fetcher);

    let outcome = processor
        .process(Uuid::new_v4(), parse_url(page, "A").unwrap())
        .await;

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(!outcome.enriched);
}

// ============================================================================
// Injected extractor
// ============================================================================

struct FixedHtml;

impl ContentExtractor for FixedHtml {
    fn name(&self) -> &str {
        "fixed"
    }

    fn extract(&self, html: &str, options: &ExtractOptions) -> Result<ExtractedDocument, ExtractError> {
        let text = if options.include_links {
            "see [docs](https://docs.test/)".to_string()
        } else {
            "see docs".to_string()
        };
        Ok(ExtractedDocument {
            text,
            title: Some(format!("{} bytes", html.len())),
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn test_injected_extractor_and_options() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(MockFetcher::default().respond(
        "https://example.com/post",
        200,
        "text/html",
        ARTICLE,
    ));

    let linked = Extractor::new(Arc::new(FixedHtml), Arc::new(LopdfExtractor::new()), 2048);
    let processor = Processor::new(&config, fetcher.clone()).with_extractor(linked);
    let url = parse_url("https://example.com/post", "A").unwrap();
    let digest = url.digest();
    assert!(processor.process(Uuid::new_v4(), url.clone()).await.is_done());

    let record = processor.store().load_content(&digest).await.unwrap();
    assert_eq!(record.text, "see [docs](https://docs.test/)");
    assert_eq!(record.title, Some(format!("{} bytes", ARTICLE.len())));
    assert_eq!(record.neighbors, vec!["https://docs.test/"]);

    let plain = Extractor::new(Arc::new(FixedHtml), Arc::new(LopdfExtractor::new()), 2048)
        .with_options(ExtractOptions {
            include_links: false,
            ..Default::default()
        });
    let processor = Processor::new(&config, fetcher).with_extractor(plain);
    assert!(processor.process(Uuid::new_v4(), url).await.is_done());

    let record = processor.store().load_content(&digest).await.unwrap();
    assert_eq!(record.text, "see docs");
    assert!(record.neighbors.is_empty());
}

// ============================================================================
// Batches
// ============================================================================

#[tokio::test]
async fn test_concurrency_gate_bounds_in_flight_fetches() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 10);

    let mut fetcher = MockFetcher::with_delay(Duration::from_millis(5));
    let mut events = Vec::new();
    for i in 0..100 {
        let raw = format!("https://example.com/post/{}", i);
        fetcher = fetcher.respond(&raw, 200, "text/html", ARTICLE);
        events.push(parse_url(&raw, "A").unwrap());
    }
    let fetcher = Arc::new(fetcher);
    let processor = Processor::new(&config, fetcher.clone());

    let outcomes = processor.process_batch(Uuid::new_v4(), events, None).await;

    assert_eq!(outcomes.len(), 100);
    assert!(outcomes.iter().all(|o| o.is_done()));
    assert_eq!(fetcher.calls(), 100);
    let max = fetcher.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 10, "max in flight was {}", max);
    assert!(max >= 1);
}

#[tokio::test]
async fn test_failures_are_isolated_in_a_batch() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let fetcher = Arc::new(
        MockFetcher::default()
            .respond("https://example.com/a", 200, "text/html", ARTICLE)
            .respond("https://example.com/pic", 200, "image/png", "x")
            .respond("https://example.com/c", 200, "text/html", ARTICLE),
    );
    let processor = Processor::new(&config, fetcher);

    let events = ["https://example.com/a", "https://example.com/missing", "https://example.com/pic", "https://example.com/c"]
        .iter()
        .map(|raw| parse_url(raw, "A").unwrap())
        .collect();
    let outcomes = processor.process_batch(Uuid::new_v4(), events, None).await;

    assert_eq!(outcomes.len(), 4);
    assert!(outcomes[0].is_done());
    assert_eq!(outcomes[1].failed_stage(), Some(Stage::Fetch));
    assert_eq!(outcomes[2].failed_stage(), Some(Stage::Extract));
    assert!(outcomes[3].is_done());
}

#[tokio::test]
async fn test_run_stream_writes_log_and_summary() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let stream = dir.path().join("stream.tsv");
    std::fs::write(
        &stream,
        "date\tquality\turl\n\
         2021-01-01\tA\thttps://example.com/a\n\
         broken line\n\
         2021-01-02\tB\thttps://example.com/missing\n\
         \n\
         2021-01-03\tA\thttps://example.com/c\n",
    )
    .unwrap();

    let fetcher = Arc::new(
        MockFetcher::default()
            .respond("https://example.com/a", 200, "text/html", ARTICLE)
            .respond("https://example.com/c", 200, "text/html", ARTICLE),
    );
    let processor = Processor::new(&config, fetcher);

    let summary = processor
        .run_stream(&stream, &config.runs_dir(), None)
        .await
        .unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.done, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.parse_failures, 1);
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.failures_at(Stage::Fetch), 1);
    assert_eq!(summary.failures_at(Stage::Parse), 1);

    let run_id = summary.run_id.unwrap();
    let log = RunLog::existing(&config.runs_dir(), run_id).await.unwrap();
    assert_eq!(log.replay().await.unwrap().len(), 3);
    assert_eq!(log.summary().await.unwrap(), summary);
}

#[tokio::test]
async fn test_run_stream_limit() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir, 4);
    let stream = dir.path().join("stream.tsv");
    std::fs::write(
        &stream,
        "date\tquality\turl\n\
         2021-01-01\tA\thttps://example.com/a\n\
         2021-01-02\tA\thttps://example.com/b\n\
         2021-01-03\tA\thttps://example.com/c\n",
    )
    .unwrap();

    let fetcher = Arc::new(MockFetcher::default());
    let summary = Processor::new(&config, fetcher.clone())
        .run_stream(&stream, &config.runs_dir(), Some(2))
        .await
        .unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(fetcher.calls(), 2);
}
