//! Runs one watch loop per target and waits for all of them

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Target;
use crate::fetcher::ConditionalFetcher;
use crate::notifier::Notifier;
use crate::watcher::{WatchExit, WatchLoop};

/// How a single watch loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchReport {
    pub url: String,
    /// `None` when the task panicked or was aborted
    pub exit: Option<WatchExit>,
}

/// Fans out watch loops and joins them
pub struct Supervisor {
    fetcher: Arc<ConditionalFetcher>,
    notifier: Arc<dyn Notifier>,
    liveness_delay: Duration,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(
        fetcher: Arc<ConditionalFetcher>,
        notifier: Arc<dyn Notifier>,
        liveness_delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            liveness_delay,
            cancel,
        }
    }

    fn watch_loop(&self, target: Target) -> WatchLoop {
        WatchLoop::new(
            target,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.notifier),
            self.liveness_delay,
            self.cancel.clone(),
        )
    }

    /// Watch every target until each loop is done. A single target runs on
    /// the current task; several targets get one spawned task each. Reports
    /// come back in target order.
    pub async fn run(&self, mut targets: Vec<Target>) -> Vec<WatchReport> {
        if targets.len() == 1 {
            if let Some(target) = targets.pop() {
                let url = target.url.clone();
                tracing::info!("Watching {} every {:?}", url, target.delay);
                let exit = self.watch_loop(target).run().await;
                return vec![WatchReport {
                    url,
                    exit: Some(exit),
                }];
            }
        }

        let mut tasks = JoinSet::new();
        let mut started = HashMap::with_capacity(targets.len());
        for (index, target) in targets.into_iter().enumerate() {
            let url = target.url.clone();
            tracing::info!("Watching {} every {:?}", url, target.delay);
            let mut watch = self.watch_loop(target);
            let handle = tasks.spawn(async move { watch.run().await });
            started.insert(handle.id(), (index, url));
        }

        // Joined as they finish so a failed task is reported right away
        let mut reports = Vec::with_capacity(started.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, exit)) => {
                    if let Some((index, url)) = started.remove(&id) {
                        tracing::debug!("Watch task for {} finished: {:?}", url, exit);
                        reports.push((index, WatchReport { url, exit: Some(exit) }));
                    }
                }
                Err(e) => {
                    if let Some((index, url)) = started.remove(&e.id()) {
                        tracing::error!("Watch task for {} failed: {}", url, e);
                        reports.push((index, WatchReport { url, exit: None }));
                    }
                }
            }
        }

        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }
}
