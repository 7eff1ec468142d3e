//! urlwatch - notify when a URL changes
//!
//! Polls each URL, uses ETag / Last-Modified conditional requests when the
//! server supports them, falls back to a body digest, and runs a notification
//! command on the first change.

pub mod config;
pub mod digest;
pub mod error;
pub mod fetcher;
pub mod io;
pub mod logging;
pub mod notifier;
pub mod supervisor;
pub mod watcher;

pub use config::{load_config, NotificationConfig, Target, WatchSettings};
pub use error::{Result, UrlWatchError};

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::fetcher::ConditionalFetcher;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::notifier::{CommandNotifier, NotificationEvent, Notifier};
use crate::supervisor::{Supervisor, WatchReport};

/// Watch `urls` with the given settings until every loop is done or the
/// process receives SIGINT / SIGTERM
pub async fn run(
    urls: Vec<String>,
    settings: WatchSettings,
    notification: NotificationConfig,
) -> Result<()> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
    let notifier: Arc<dyn Notifier> = Arc::new(CommandNotifier::new(notification));

    tracing::info!("PID={} Started.", std::process::id());

    let targets = urls
        .into_iter()
        .map(|url| Target::new(url, settings.delay))
        .collect();

    watch_until(
        targets,
        Arc::new(ConditionalFetcher::new(http)),
        notifier,
        settings,
        shutdown_signal(),
    )
    .await;

    tracing::info!("urlwatch stopped");
    Ok(())
}

/// Run the supervisor until all loops finish or `shutdown` resolves.
///
/// `shutdown` yields the name of whatever stopped us. On shutdown every loop
/// is cancelled and the shutdown notification is delivered before this
/// returns. When the loops finish on their own a single `Exiting.`
/// notification is sent instead.
pub async fn watch_until<S>(
    targets: Vec<Target>,
    fetcher: Arc<ConditionalFetcher>,
    notifier: Arc<dyn Notifier>,
    settings: WatchSettings,
    shutdown: S,
) -> Vec<WatchReport>
where
    S: Future<Output = String> + Send + 'static,
{
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    let notifier_for_signal = Arc::clone(&notifier);
    let shutdown_task = tokio::spawn(async move {
        let signal = shutdown.await;
        tracing::warn!("PID={} signal={} Exiting.", std::process::id(), signal);
        cancel_for_signal.cancel();
        notifier_for_signal
            .notify(&NotificationEvent::shutdown())
            .await;
    });

    let supervisor = Supervisor::new(
        fetcher,
        Arc::clone(&notifier),
        settings.liveness_delay,
        cancel.clone(),
    );
    let reports = supervisor.run(targets).await;

    if cancel.is_cancelled() {
        if let Err(e) = shutdown_task.await {
            tracing::error!("Shutdown notification task failed: {}", e);
        }
    } else {
        shutdown_task.abort();
        notifier.notify(&NotificationEvent::finished()).await;
    }

    reports
}

/// Resolves with the signal name on SIGINT or SIGTERM
pub async fn shutdown_signal() -> String {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = interrupt() => "SIGINT".to_string(),
                    _ = terminate.recv() => "SIGTERM".to_string(),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to register SIGTERM handler: {}", e);
                interrupt().await;
                "SIGINT".to_string()
            }
        }
    }

    #[cfg(not(unix))]
    {
        interrupt().await;
        "CTRL_C".to_string()
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
