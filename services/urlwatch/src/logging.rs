//! Log output setup
//!
//! Lines look like `<timestamp> <LEVEL> ThreadId(NN) <message>` and go to
//! stdout, or are appended to `--outfile` when one is given.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;

/// Install the global subscriber. Fails if the log file cannot be opened or
/// a subscriber is already installed.
pub fn init_logging(level: Level, outfile: Option<&Path>) -> crate::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_ids(true)
        .with_target(false);

    let installed = match outfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    crate::UrlWatchError::Config(format!(
                        "Failed to open log file {:?}: {}",
                        path, e
                    ))
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stdout).try_init(),
    };

    installed.map_err(|e| crate::UrlWatchError::Config(format!("Failed to set up logging: {}", e)))
}
