//! Notification sink for watcher events
//!
//! Every event is rendered into the configured argv template and executed as
//! an external command. A single lock is held for the whole execution, so
//! notifications from concurrent watchers never overlap. Failures are logged
//! and turned into a descriptive string; they never reach the watcher as an
//! error.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::NotificationConfig;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Liveness,
    Changed,
    Error,
    /// Stopped by a signal
    Shutdown,
    /// Every watch loop ended on its own
    Finished,
}

/// A message for the user, optionally tied to a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub message: String,
    pub url: String,
}

impl NotificationEvent {
    pub fn liveness(url: &str) -> Self {
        Self {
            kind: EventKind::Liveness,
            message: "Watching".to_string(),
            url: url.to_string(),
        }
    }

    pub fn changed(url: &str) -> Self {
        Self {
            kind: EventKind::Changed,
            message: "Site changed".to_string(),
            url: url.to_string(),
        }
    }

    pub fn error(message: impl Into<String>, url: &str) -> Self {
        Self {
            kind: EventKind::Error,
            message: message.into(),
            url: url.to_string(),
        }
    }

    pub fn finished() -> Self {
        Self {
            kind: EventKind::Finished,
            message: "Exiting.".to_string(),
            url: String::new(),
        }
    }

    pub fn shutdown() -> Self {
        Self {
            kind: EventKind::Shutdown,
            message: "Watcher exiting.".to_string(),
            url: String::new(),
        }
    }
}

/// Trait for delivering notifications
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Deliver `event`, returning the command output or an error description
    async fn notify(&self, event: &NotificationEvent) -> String;
}

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for running external commands
///
/// Abstracts process execution so the notifier can be tested without
/// spawning anything.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `argv[0]` with the remaining arguments and wait for it to exit
    async fn run(&self, argv: &[String]) -> crate::Result<CommandOutput>;
}

/// Tokio implementation of CommandRunner
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, argv: &[String]) -> crate::Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| crate::UrlWatchError::Notifier("empty command".to_string()))?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                crate::UrlWatchError::Notifier(format!("Failed to start {}: {}", program, e))
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Notifier that runs the templated command from [`NotificationConfig`]
pub struct CommandNotifier {
    config: NotificationConfig,
    runner: Arc<dyn CommandRunner>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for CommandNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNotifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CommandNotifier {
    /// Create a notifier that spawns real processes
    pub fn new(config: NotificationConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioCommandRunner::new()))
    }

    /// Create a notifier with a custom command runner
    pub fn with_runner(config: NotificationConfig, runner: Arc<dyn CommandRunner>) -> Self {
        tracing::debug!("Created CommandNotifier with template {:?}", config.notification);
        Self {
            config,
            runner,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, event: &NotificationEvent) -> String {
        let argv = self.config.render(&event.message, &event.url);

        let _guard = self.lock.lock().await;
        let result = self.runner.run(&argv).await;

        match result {
            Ok(output) if output.success() => {
                tracing::debug!("run({:?}) got 0", argv);
                output.stdout
            }
            Ok(output) => {
                let code = output.code.unwrap_or(-1);
                tracing::error!(
                    "run({:?}) failed with code {}: {}",
                    argv,
                    code,
                    output.stderr.trim()
                );
                format!("Error {} trying to run({:?})", code, argv)
            }
            Err(e) => {
                tracing::error!("run({:?}) failed: {}", argv, e);
                format!("Error trying to run({:?}): {}", argv, e)
            }
        }
    }
}
