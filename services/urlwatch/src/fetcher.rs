//! Conditional GET and change classification
//!
//! One call to [`ConditionalFetcher::fetch`] issues exactly one request. The
//! prior validators become `If-None-Match` / `If-Modified-Since` headers and
//! the response is classified as unchanged, changed or failed. Header
//! comparison is exact string equality; the body digest is only computed
//! when the headers cannot prove a change.

use std::sync::Arc;

use crate::digest::digest;
use crate::io::{ConditionalHeaders, HttpClient};

/// What is known about the last representation seen for a URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub digest: Option<String>,
}

impl Validators {
    /// Request headers that let the server answer 304
    pub fn conditional_headers(&self) -> ConditionalHeaders {
        ConditionalHeaders {
            if_none_match: self.etag.clone(),
            if_modified_since: self.last_modified.clone(),
        }
    }
}

/// Why a fetch did not produce a usable response
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, DNS, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Any status other than 200 or 304
    #[error("HTTP status {0}")]
    Status(u16),
}

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// `observed` is `None` for a 304, whose body is never read
    Unchanged { observed: Option<Validators> },
    Changed { observed: Validators },
    Error(FetchError),
}

/// Issues conditional GETs through an [`HttpClient`]
pub struct ConditionalFetcher {
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for ConditionalFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalFetcher").finish_non_exhaustive()
    }
}

impl ConditionalFetcher {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }

    /// Fetch `url` and compare the response against `prior`.
    ///
    /// With no prior validators (the baseline) a 200 is always reported as
    /// `Changed` and its validators always include a body digest.
    pub async fn fetch(&self, url: &str, prior: Option<&Validators>) -> FetchOutcome {
        let conditions = prior
            .map(Validators::conditional_headers)
            .unwrap_or_default();

        let mut response = match self.http.get(url, &conditions).await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Error(FetchError::Transport(e.to_string())),
        };

        match response.status {
            200 => {}
            304 => {
                tracing::debug!("{} not modified", url);
                return FetchOutcome::Unchanged { observed: None };
            }
            status => {
                tracing::debug!("{} answered with status {}", url, status);
                return FetchOutcome::Error(FetchError::Status(status));
            }
        }

        let mut observed = Validators {
            etag: response.etag.take(),
            last_modified: response.last_modified.take(),
            digest: None,
        };

        if let Some(reason) = prior.and_then(|prior| header_change(prior, &observed)) {
            tracing::debug!("{} changed: {}", url, reason);
            return FetchOutcome::Changed { observed };
        }

        match digest(&mut response.body).await {
            Ok(hash) => observed.digest = Some(hash),
            Err(e) => {
                return FetchOutcome::Error(FetchError::Transport(format!(
                    "reading body of {}: {}",
                    url, e
                )))
            }
        }

        match prior.and_then(|prior| prior.digest.as_ref()) {
            Some(previous) if Some(previous) == observed.digest.as_ref() => {
                FetchOutcome::Unchanged {
                    observed: Some(observed),
                }
            }
            Some(_) => {
                tracing::debug!("{} changed: body digest differs", url);
                FetchOutcome::Changed { observed }
            }
            None => FetchOutcome::Changed { observed },
        }
    }
}

/// A header present on the response that differs from the recorded value
/// proves a change. Absent headers prove nothing.
fn header_change(prior: &Validators, observed: &Validators) -> Option<&'static str> {
    if observed.etag.is_some() && observed.etag != prior.etag {
        return Some("ETag differs");
    }
    if observed.last_modified.is_some() && observed.last_modified != prior.last_modified {
        return Some("Last-Modified differs");
    }
    None
}
