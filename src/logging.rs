// src/logging.rs

//! `tracing` subscriber for the dispatcher binary.
//!
//! The filter comes from `--log-level` when given. Otherwise `DUODAG_LOG`
//! is read as a full filter directive, so `duodag::engine=debug,info`
//! narrows worker tracing to the state machine. Everything else runs at
//! `info`.
//!
//! Output goes to stderr; stdout carries console replies only.

use anyhow::{Result, anyhow};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::LogLevel;

const LOG_ENV: &str = "DUODAG_LOG";

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the global subscriber. Call once, before the service starts.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = build_filter(cli_level, env.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))?;

    if let Some(directive) = rejected {
        warn!(env = LOG_ENV, %directive, "ignoring unparsable log filter; using info");
    }
    Ok(())
}

/// Pick the filter. The second value is an env directive that did not parse.
fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> (EnvFilter, Option<String>) {
    if let Some(level) = cli_level {
        return (level_filter(level.into()), None);
    }

    match env.map(str::trim).filter(|d| !d.is_empty()) {
        None => (level_filter(LevelFilter::INFO), None),
        Some(directive) => match EnvFilter::try_new(directive) {
            Ok(filter) => (filter, None),
            Err(_) => (level_filter(LevelFilter::INFO), Some(directive.to_string())),
        },
    }
}

fn level_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}
