//! urlwatch CLI
//!
//! Command-line interface for watching URLs and notifying on change.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;
use urlwatch::config::{parse_delay, sidecar_config_path};
use urlwatch::logging::init_logging;
use urlwatch::{load_config, WatchSettings};

#[derive(Parser)]
#[command(name = "urlwatch")]
#[command(about = "Notify when a URL changes")]
#[command(version)]
struct Args {
    /// Seconds to wait between polls of each URL
    #[arg(short, long, default_value = "5.0", value_parser = parse_delay)]
    delay: Duration,

    /// Write the log to this file instead of stdout
    #[arg(short, long)]
    outfile: Option<PathBuf>,

    /// Notification config (defaults to the .json file next to the executable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// URLs to watch
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logging(args.log_level, args.outfile.as_deref())?;

    tracing::debug!(
        "Parsed command line arguments: delay={:?}, outfile={:?}, config={:?}, urls={:?}",
        args.delay,
        args.outfile,
        args.config,
        args.urls
    );

    let config_path = match args.config {
        Some(path) => path,
        None => sidecar_config_path()?,
    };
    tracing::debug!("Loading notification config from {:?}", config_path);
    let notification = load_config(&config_path).map_err(|e| {
        tracing::error!("{}", e);
        e
    })?;

    let settings = WatchSettings {
        delay: args.delay,
        ..WatchSettings::default()
    };

    urlwatch::run(args.urls, settings, notification).await?;

    Ok(())
}
