//! HTTP page fetcher for the AjaxPro draw-result endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use vietlott_core::GameDescriptor;
use vietlott_core::game::{self, AJAX_METHOD, AJAX_METHOD_HEADER};

use crate::pipeline::FetchTask;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("unexpected response envelope: {0}")]
    Malformed(String),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// The HTML fragment carried by a results response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePayload {
    pub html: String,
}

/// Anything that can answer a page request. The crawler only sees this.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(
        &self,
        game: &GameDescriptor,
        task: &FetchTask,
    ) -> Result<PagePayload, FetchError>;
}

#[derive(Deserialize)]
struct Envelope {
    value: Option<EnvelopeValue>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct EnvelopeValue {
    #[serde(rename = "HtmlContent")]
    html_content: Option<String>,
}

/// Decode `{"value": {"HtmlContent": "..."}}`.
pub fn decode_envelope(text: &str) -> Result<PagePayload, FetchError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| FetchError::Malformed(e.to_string()))?;
    if let Some(err) = envelope.error {
        return Err(FetchError::Malformed(format!("endpoint error: {err}")));
    }
    let html = envelope
        .value
        .and_then(|v| v.html_content)
        .ok_or_else(|| FetchError::Malformed("missing value.HtmlContent".into()))?;
    Ok(PagePayload { html })
}

/// reqwest-backed client for the draw-result endpoints.
///
/// Holds the shared header set; each request only varies in URL and body.
pub struct DrawClient {
    client: reqwest::Client,
}

impl DrawClient {
    /// `cookies` is sent verbatim as the `Cookie` header on every request.
    pub fn new(timeout: Duration, cookies: Option<&str>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(game::USER_AGENT));
        headers.insert(AJAX_METHOD_HEADER, HeaderValue::from_static(AJAX_METHOD));
        if let Some(cookies) = cookies {
            headers.insert(COOKIE, HeaderValue::from_str(cookies)?);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch one page outside of a crawl.
    pub async fn fetch_page(
        &self,
        game: &GameDescriptor,
        page_index: u32,
    ) -> Result<PagePayload, FetchError> {
        let task = FetchTask {
            task_id: 0,
            page_index,
            request_body: game.request_body(page_index),
        };
        self.fetch(game, &task).await
    }
}

#[async_trait]
impl PageSource for DrawClient {
    async fn fetch(
        &self,
        game: &GameDescriptor,
        task: &FetchTask,
    ) -> Result<PagePayload, FetchError> {
        debug!(game = %game.name, page = task.page_index, "fetching page");
        let resp = self
            .client
            .post(&game.url)
            .json(&task.request_body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        decode_envelope(&text)
    }
}
