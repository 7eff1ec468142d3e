//! Configuration types for the urlwatch service

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the watched URL in the notification template
pub const URL_TOKEN: &str = "URL";

/// Placeholder replaced by the event message in the notification template
pub const MSG_TOKEN: &str = "MSG";

/// Notification command template, read from the JSON sidecar file.
///
/// `notification` is an argument vector; every occurrence of [`URL_TOKEN`]
/// and [`MSG_TOKEN`] inside a token is substituted before the command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub notification: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            notification: vec!["echo".to_string(), "URL MSG".to_string()],
        }
    }
}

impl NotificationConfig {
    /// Reject templates that cannot be executed
    pub fn validate(&self) -> crate::Result<()> {
        match self.notification.first() {
            None => Err(crate::UrlWatchError::Config(
                "notification command is empty".to_string(),
            )),
            Some(program) if program.trim().is_empty() => Err(crate::UrlWatchError::Config(
                "notification program name is blank".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// Build the argv for one notification
    pub fn render(&self, message: &str, url: &str) -> Vec<String> {
        self.notification
            .iter()
            .map(|token| substitute(token, message, url))
            .collect()
    }
}

/// Single left-to-right pass, so text coming from `message` or `url` is
/// never itself treated as a placeholder.
fn substitute(token: &str, message: &str, url: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut rest = token;
    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix(URL_TOKEN) {
            out.push_str(url);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(MSG_TOKEN) {
            out.push_str(message);
            rest = tail;
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

/// Timing shared by every watch loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchSettings {
    /// Pause between two polls of the same URL
    pub delay: Duration,
    /// How long after polling starts the one-shot "Watching" ping is sent
    pub liveness_delay: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            liveness_delay: default_liveness_delay(),
        }
    }
}

/// A single URL to watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub delay: Duration,
}

impl Target {
    pub fn new(url: impl Into<String>, delay: Duration) -> Self {
        Self {
            url: url.into(),
            delay,
        }
    }
}

fn default_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_liveness_delay() -> Duration {
    Duration::from_secs(10)
}

/// Parse a poll delay given in (fractional) seconds.
///
/// Used as a clap value parser, hence the `String` error.
pub fn parse_delay(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid delay '{}': {}", value, e))?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!(
            "delay must be a positive number of seconds, got {}",
            value
        ));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid delay '{}': {}", value, e))
}

/// Location of the sidecar config: the running executable with a `.json`
/// extension (`/usr/bin/urlwatch` -> `/usr/bin/urlwatch.json`)
pub fn sidecar_config_path() -> crate::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe.with_extension("json"))
}

/// Load and validate the notification configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<NotificationConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::UrlWatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: NotificationConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
