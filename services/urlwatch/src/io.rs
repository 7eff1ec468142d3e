//! HTTP client abstraction for testability

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{
    HeaderMap, HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// Upper bound for a single request, including reading the body
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response body, read lazily so it can be digested in chunks or dropped unread
pub type Body = Box<dyn AsyncRead + Send + Unpin>;

/// Conditional request headers attached to a GET
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

/// HTTP response from a request
pub struct HttpResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: Body,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .finish_non_exhaustive()
    }
}

/// Abstraction over HTTP client for dependency injection
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait HttpClient: Send + Sync {
    /// Send a GET request, attaching whichever conditional headers are set.
    ///
    /// Only transport failures are errors; every HTTP status is returned as
    /// a response.
    async fn get(
        &self,
        url: &str,
        conditions: &ConditionalHeaders,
    ) -> crate::Result<HttpResponse>;
}

/// Production HTTP client using reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> crate::Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                crate::UrlWatchError::Transport(format!("Building HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(&name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(
        &self,
        url: &str,
        conditions: &ConditionalHeaders,
    ) -> crate::Result<HttpResponse> {
        tracing::debug!("GET {} ({:?})", url, conditions);
        let mut request = self.client.get(url);
        if let Some(etag) = &conditions.if_none_match {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &conditions.if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                crate::UrlWatchError::Transport(format!("GET {} failed: {}", url, e))
            })?;

        let status = response.status().as_u16();
        let etag = header_string(response.headers(), ETAG);
        let last_modified = header_string(response.headers(), LAST_MODIFIED);
        tracing::debug!(
            "GET {} -> {} (etag={:?}, last_modified={:?})",
            url,
            status,
            etag,
            last_modified
        );

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let body: Body = Box::new(StreamReader::new(Box::pin(stream)));

        Ok(HttpResponse {
            status,
            etag,
            last_modified,
            body,
        })
    }
}
