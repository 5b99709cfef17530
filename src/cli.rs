// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::ModeVariant;

/// Command-line arguments for `duodag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "duodag",
    version,
    about = "Dispatch tasks between a human operator and a robot, gated on shared dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task catalog (TOML).
    ///
    /// A missing or malformed catalog is logged and treated as "no
    /// dependency constraints".
    #[arg(long, value_name = "PATH", default_value = "tasks.toml")]
    pub catalog: String,

    /// Use the in-process simulated actuator instead of the dashboard.
    #[arg(long)]
    pub simulate: bool,

    /// Queue an automated program at startup. May be repeated.
    #[arg(long, value_name = "PROGRAM")]
    pub enqueue: Vec<String>,

    /// Start processing the queue immediately.
    #[arg(long)]
    pub autostart: bool,

    /// Program variant the actuator should run.
    #[arg(long, value_enum, value_name = "MODE", default_value = "primary")]
    pub mode: ModeArg,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DUODAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Load + validate the catalog, print tasks and groups, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Primary,
    Alternate,
}

impl From<ModeArg> for ModeVariant {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Primary => ModeVariant::Primary,
            ModeArg::Alternate => ModeVariant::Alternate,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["duodag"]).unwrap();
        assert_eq!(args.catalog, "tasks.toml");
        assert!(!args.simulate);
        assert!(args.enqueue.is_empty());
        assert_eq!(ModeVariant::from(args.mode), ModeVariant::Primary);
    }

    #[test]
    fn repeated_enqueue_keeps_order() {
        let args = CliArgs::try_parse_from([
            "duodag",
            "--simulate",
            "--enqueue",
            "pick_a",
            "--enqueue",
            "place_b",
            "--mode",
            "alternate",
        ])
        .unwrap();
        assert!(args.simulate);
        assert_eq!(args.enqueue, vec!["pick_a", "place_b"]);
        assert_eq!(ModeVariant::from(args.mode), ModeVariant::Alternate);
    }
}
