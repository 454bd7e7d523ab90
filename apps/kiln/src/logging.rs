//! Tracing setup and event forwarding
//!
//! Console logging goes to stderr and is filtered by `RUST_LOG` (default
//! `warn`). `--debug` switches to JSON records in a timestamped file under
//! the state directory's `logs/`; `--json` keeps the console silent so stdout
//! carries nothing but the JSON result.

use kiln_events::AppEvent;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";
const DEBUG_FILTER: &str = "info,kiln=debug,kiln_ops=debug,kiln::events=debug";

/// Initialize tracing/logging
///
/// Returns the log file path when debug logging to a file is active.
pub fn init_tracing(json_mode: bool, debug_enabled: bool, logs_dir: &Path) -> Option<PathBuf> {
    if debug_enabled {
        match open_log_file(logs_dir) {
            Ok((path, file)) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(env_filter(DEBUG_FILTER))
                    .init();
                return Some(path);
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
            }
        }
    }

    if json_mode {
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter(DEFAULT_FILTER))
            .init();
    }
    None
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn open_log_file(logs_dir: &Path) -> std::io::Result<(PathBuf, std::fs::File)> {
    std::fs::create_dir_all(logs_dir)?;
    let path = logs_dir.join(format!(
        "kiln-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    let file = std::fs::File::create(&path)?;
    Ok((path, file))
}

/// Forward an event to tracing at its mapped level
///
/// The domain's log target and source are carried as fields; the whole
/// event is attached as JSON so file logs keep every detail.
pub fn log_event_with_tracing(event: &AppEvent) {
    let domain = event.log_target();
    let source = event.event_source();
    let payload = serde_json::to_string(event).unwrap_or_default();
    let level = event.log_level();

    if level == Level::ERROR {
        error!(target: "kiln::events", domain, source = %source, event = %payload);
    } else if level == Level::WARN {
        warn!(target: "kiln::events", domain, source = %source, event = %payload);
    } else if level == Level::INFO {
        info!(target: "kiln::events", domain, source = %source, event = %payload);
    } else if level == Level::DEBUG {
        debug!(target: "kiln::events", domain, source = %source, event = %payload);
    } else {
        trace!(target: "kiln::events", domain, source = %source, event = %payload);
    }
}
