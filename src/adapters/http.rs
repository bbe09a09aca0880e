//! reqwest-backed [`Fetcher`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use tracing::debug;

use super::{FetchRequest, Fetcher, USER_AGENT};
use crate::domain::{parse_content_type, Headers, NetworkArchive};
use crate::error::FetchError;

/// Fetcher over a shared reqwest client
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a hard per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    fn build(&self, request: &FetchRequest) -> Result<reqwest::Request, FetchError> {
        let mut builder = self
            .client
            .get(&request.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder.build().map_err(|e| transport(&request.url, e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<NetworkArchive, FetchError> {
        let outbound = self.build(request)?;

        let request_method = outbound.method().to_string();
        let request_url = outbound.url().to_string();
        let request_headers = snapshot(outbound.headers());
        let request_host = outbound.url().host_str().unwrap_or_default().to_string();

        let response = self
            .client
            .execute(outbound)
            .await
            .map_err(|e| transport(&request_url, e))?;

        let response_status = response.status().as_u16();
        let response_url = response.url().to_string();
        let response_headers = snapshot(response.headers());
        let host = response
            .url()
            .host_str()
            .map(str::to_string)
            .unwrap_or(request_host);
        let (response_content_type, response_charset) = parse_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );

        let body = response
            .bytes()
            .await
            .map_err(|e| transport(&request_url, e))?;

        debug!(
            url = %request_url,
            status = response_status,
            mime = %response_content_type,
            bytes = body.len(),
            "Fetched"
        );

        Ok(NetworkArchive {
            host,
            request_method,
            request_url,
            request_headers,
            response_status,
            response_url,
            response_headers,
            response_content_type,
            response_charset,
            response_content: body.to_vec(),
        })
    }
}

/// Lowercased header names, repeated values joined with ", "
fn snapshot(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        out.insert(name.as_str().to_string(), values.join(", "));
    }
    out
}

fn transport(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
