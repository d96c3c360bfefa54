//! tracing-subscriber setup
//!
//! Filter precedence: `AGENSIGHT_LOG` > `-v` count > `[log] level` > `warn`.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Result;

pub const LOG_ENV: &str = "AGENSIGHT_LOG";

/// Where formatted events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stderr,
    /// Append to a file; used while the dashboard owns the terminal
    File(&'a Path),
}

/// Filter directive for a `-v` count
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Pick the filter directive without consulting the environment
pub fn resolve_directive(env: Option<&str>, verbose: u8, configured: Option<&str>) -> String {
    if let Some(env) = env.filter(|s| !s.trim().is_empty()) {
        return env.to_string();
    }
    if verbose > 0 {
        return verbosity_directive(verbose).to_string();
    }
    configured
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("warn")
        .to_string()
}

/// Install the global subscriber; later calls are ignored
pub fn init(verbose: u8, configured: Option<&str>, target: LogTarget<'_>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let directive = resolve_directive(env.as_deref(), verbose, configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match target {
        LogTarget::Stderr => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false),
                )
                .try_init()
        }
    };
    // A subscriber already being set (tests, repeated init) is not an error
    let _ = installed;
    tracing::debug!(filter = %directive, "logging initialised");
    Ok(())
}
