// src/exec/dashboard.rs

//! Actuator backed by a robot dashboard server.
//!
//! The dashboard speaks a line protocol over TCP: on connect it sends a
//! banner line, then answers each newline-terminated command with one line.
//! Every command uses a fresh connection, and every connect, read and write
//! is bounded by `io_timeout_ms`.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, anyhow};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::model::ActuatorSettings;
use crate::errors::{DuodagError, Result};
use crate::exec::backend::{Actuator, ActuatorFuture};
use crate::types::{ModeVariant, RunState};

static STOPPED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(STOPPED|IDLE)\b").expect("invalid stopped regex"));
static RUNNING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(PLAYING|RUNNING)\b").expect("invalid running regex"));
static REJECTED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(could not understand|file not found|error|failed)")
        .expect("invalid rejection regex")
});

const STOP_SETTLE: Duration = Duration::from_millis(500);
const FORCED_STOP_SETTLE: Duration = Duration::from_secs(1);
const LOAD_SETTLE: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct DashboardActuator {
    settings: ActuatorSettings,
}

impl DashboardActuator {
    pub fn new(settings: ActuatorSettings) -> Self {
        Self { settings }
    }

    fn address(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    /// Program file path for `program` in the given variant.
    pub fn program_path(&self, program: &str, mode: ModeVariant) -> String {
        let s = &self.settings;
        match mode {
            ModeVariant::Primary => format!("{}/{program}.{}", s.program_dir, s.program_extension),
            ModeVariant::Alternate => format!(
                "{}/{}{program}.{}",
                s.alternate_program_dir, s.alternate_prefix, s.program_extension
            ),
        }
    }

    /// Send one command and return the trimmed response line.
    async fn send(&self, command: &str) -> Result<String> {
        let io = self.settings.io_timeout();
        let addr = self.address();

        let stream = timeout(io, TcpStream::connect(&addr))
            .await
            .map_err(|_| anyhow!("connect to {addr} timed out"))?
            .with_context(|| format!("failed to connect to dashboard at {addr}"))?;

        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        // Banner.
        let banner = timeout(io, lines.next_line())
            .await
            .map_err(|_| anyhow!("no banner from {addr}"))?
            .context("failed to read dashboard banner")?;
        debug!(?banner, "dashboard connected");

        timeout(io, writer.write_all(format!("{command}\n").as_bytes()))
            .await
            .map_err(|_| anyhow!("sending '{command}' timed out"))?
            .with_context(|| format!("failed to send '{command}'"))?;

        let response = timeout(io, lines.next_line())
            .await
            .map_err(|_| anyhow!("no response to '{command}'"))?
            .with_context(|| format!("failed to read response to '{command}'"))?
            .ok_or_else(|| anyhow!("dashboard closed connection after '{command}'"))?;

        let response = response.trim().to_string();
        debug!(command, %response, "dashboard exchange");
        Ok(response)
    }

    /// Send a command whose response must not be a rejection.
    async fn send_checked(&self, command: &str) -> Result<String> {
        let response = self.send(command).await?;
        if response.is_empty() {
            return Err(DuodagError::ActuatorError(format!(
                "empty response to '{command}'"
            )));
        }
        if let Some(reason) = rejection(&response) {
            return Err(DuodagError::ActuatorError(format!(
                "'{command}' rejected ({reason}): {response}"
            )));
        }
        Ok(response)
    }

    async fn start_program(&self, program: &str, mode: ModeVariant) -> Result<()> {
        // Make sure nothing is running before loading.
        if let Err(err) = self.send("stop").await {
            warn!(error = %err, "pre-load stop failed");
        }
        sleep(STOP_SETTLE).await;

        match self.send("programState").await {
            Ok(state) if classify_state(&state) == RunState::Running => {
                warn!(%state, "actuator still running after stop; forcing stop");
                if let Err(err) = self.send("stop").await {
                    warn!(error = %err, "forced stop failed");
                }
                sleep(FORCED_STOP_SETTLE).await;
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "could not read state before load"),
        }

        let path = self.program_path(program, mode);
        info!(program, %path, %mode, "loading program");
        self.send_checked(&format!("load {path}")).await?;
        sleep(LOAD_SETTLE).await;

        self.send_checked("play").await?;
        info!(program, %path, "program started");
        Ok(())
    }
}

impl Actuator for DashboardActuator {
    fn start<'a>(&'a self, program: &'a str, mode: ModeVariant) -> ActuatorFuture<'a, ()> {
        Box::pin(self.start_program(program, mode))
    }

    fn poll_run_state(&self) -> ActuatorFuture<'_, RunState> {
        Box::pin(async move {
            let response = self.send("programState").await?;
            Ok(classify_state(&response))
        })
    }

    fn force_stop(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.send("stop").await?;
            Ok(())
        })
    }

    fn pause(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.send_checked("pause").await?;
            Ok(())
        })
    }

    fn resume(&self) -> ActuatorFuture<'_, ()> {
        Box::pin(async move {
            self.send_checked("play").await?;
            Ok(())
        })
    }
}

/// Map a `programState` response to a coarse run-state.
pub fn classify_state(response: &str) -> RunState {
    if STOPPED_RE.is_match(response) {
        RunState::Stopped
    } else if RUNNING_RE.is_match(response) {
        RunState::Running
    } else {
        RunState::Unknown
    }
}

/// The rejection phrase in a dashboard response, if any.
pub fn rejection(response: &str) -> Option<String> {
    REJECTED_RE
        .find(response)
        .map(|m| m.as_str().to_lowercase())
}
