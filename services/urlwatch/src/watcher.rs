//! Per-URL watch loop
//!
//! `Baselining -> Polling -> Done`. The baseline fetch records the
//! validators every later poll is compared against; polling sleeps for the
//! target delay, fetches conditionally and stops on the first change.
//! Cancellation is observed while sleeping and before each fetch.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Target;
use crate::fetcher::{ConditionalFetcher, FetchError, FetchOutcome, Validators};
use crate::notifier::{NotificationEvent, Notifier};

/// Lifecycle of a watch loop; `Done` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Baselining,
    Polling,
    Done,
}

/// Why a watch loop reached `Done`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchExit {
    /// A change was detected and notified
    Changed,
    /// The first fetch did not produce a usable baseline
    BaselineFailed(FetchError),
    /// Shutdown was requested
    Cancelled,
}

/// Watches a single target until it changes, fails to baseline, or is cancelled
pub struct WatchLoop {
    target: Target,
    fetcher: Arc<ConditionalFetcher>,
    notifier: Arc<dyn Notifier>,
    liveness_delay: Duration,
    cancel: CancellationToken,
    state: WatcherState,
    validators: Validators,
}

impl std::fmt::Debug for WatchLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("url", &self.target.url)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl WatchLoop {
    pub fn new(
        target: Target,
        fetcher: Arc<ConditionalFetcher>,
        notifier: Arc<dyn Notifier>,
        liveness_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            fetcher,
            notifier,
            liveness_delay,
            cancel,
            state: WatcherState::Baselining,
            validators: Validators::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.target.url
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Validators recorded by the most recent successful fetch
    pub fn validators(&self) -> &Validators {
        &self.validators
    }

    /// Drive the loop to `Done`. Calling it again after that is a no-op
    /// that reports `Cancelled`.
    pub async fn run(&mut self) -> WatchExit {
        if self.state == WatcherState::Done {
            return WatchExit::Cancelled;
        }

        let started = Instant::now();
        let exit = self.drive().await;
        self.state = WatcherState::Done;

        tracing::info!(
            "Stopped watching {} ({:?}). Duration = {:.0}s.",
            self.target.url,
            exit,
            started.elapsed().as_secs_f64()
        );
        exit
    }

    async fn drive(&mut self) -> WatchExit {
        if self.cancel.is_cancelled() {
            return WatchExit::Cancelled;
        }
        if let Err(e) = self.baseline().await {
            return WatchExit::BaselineFailed(e);
        }
        self.poll().await
    }

    async fn baseline(&mut self) -> Result<(), FetchError> {
        let url = self.target.url.clone();
        let error = match self.fetcher.fetch(&url, None).await {
            FetchOutcome::Changed { observed } => {
                tracing::debug!(
                    "Baseline for {}: ETag={:?} Last-Modified={:?} digest={:?}",
                    url,
                    observed.etag,
                    observed.last_modified,
                    observed.digest
                );
                self.validators = observed;
                self.state = WatcherState::Polling;
                return Ok(());
            }
            // Nothing was sent that could earn a 304, so there is no body to compare against
            FetchOutcome::Unchanged { .. } => FetchError::Status(304),
            FetchOutcome::Error(e) => e,
        };

        let message = match &error {
            FetchError::Status(code) => format!("Got {} for {}. Exiting.", code, url),
            FetchError::Transport(reason) => {
                format!("Failed to fetch {}: {}. Exiting.", url, reason)
            }
        };
        tracing::error!("{}", message);
        self.notifier
            .notify(&NotificationEvent::error(message, &url))
            .await;
        Err(error)
    }

    async fn poll(&mut self) -> WatchExit {
        let url = self.target.url.clone();
        let mut liveness_at = Some(Instant::now() + self.liveness_delay);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.target.delay) => {}
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Polling loop for {} cancelled", url);
                    return WatchExit::Cancelled;
                }
            }

            if liveness_at.is_some_and(|at| at <= Instant::now()) {
                tracing::info!("Sending a notification that we're watching {}", url);
                self.notifier
                    .notify(&NotificationEvent::liveness(&url))
                    .await;
                liveness_at = None;
            }

            if self.cancel.is_cancelled() {
                tracing::debug!("Polling loop for {} cancelled", url);
                return WatchExit::Cancelled;
            }

            match self.fetcher.fetch(&url, Some(&self.validators)).await {
                FetchOutcome::Unchanged { observed } => {
                    tracing::debug!("{} not changed", url);
                    if let Some(last_modified) = observed.and_then(|v| v.last_modified) {
                        self.validators.last_modified = Some(last_modified);
                    }
                }
                FetchOutcome::Changed { observed } => {
                    tracing::info!("{} changed, sending notification", url);
                    self.validators = observed;
                    self.notifier
                        .notify(&NotificationEvent::changed(&url))
                        .await;
                    return WatchExit::Changed;
                }
                FetchOutcome::Error(FetchError::Status(code)) => {
                    tracing::error!("Got {} for {}. Continuing.", code, url);
                }
                FetchOutcome::Error(FetchError::Transport(reason)) => {
                    tracing::warn!("Fetching {} failed: {}. Continuing.", url, reason);
                }
            }
        }
    }
}
