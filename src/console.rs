// src/console.rs

//! Line-based operator console.
//!
//! One command per input line, one JSON object per output line. This is the
//! request/response surface operators (or a wrapper process) use to drive
//! the dispatcher.

use std::path::PathBuf;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::load_or_empty;
use crate::dag::TrackAssignments;
use crate::engine::DispatchService;
use crate::errors::Result;
use crate::types::{ModeVariant, Track};

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Enqueue(String),
    Assign(TrackAssignments),
    Done(String),
    Deps(Track),
    Status,
    History,
    Start,
    Pause,
    Resume,
    Mode(ModeVariant),
    Reset,
    Reload,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let cmd = match verb.to_lowercase().as_str() {
            "enqueue" => Command::Enqueue(required(rest, "program id")?),
            "assign" => Command::Assign(parse_assignments(rest)?),
            "done" => Command::Done(required(rest, "task name")?),
            "deps" => Command::Deps(rest.parse()?),
            "status" => Command::Status,
            "history" => Command::History,
            "start" => Command::Start,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "mode" => Command::Mode(rest.parse()?),
            "reset" => Command::Reset,
            "reload" => Command::Reload,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(cmd)
    }
}

fn required(rest: &str, what: &str) -> std::result::Result<String, String> {
    if rest.is_empty() {
        Err(format!("missing {what}"))
    } else {
        Ok(rest.to_string())
    }
}

/// Parse `human=A,B; automated=C,D`. Task names may contain spaces; either
/// side may be omitted or empty.
fn parse_assignments(rest: &str) -> std::result::Result<TrackAssignments, String> {
    let mut assignments = TrackAssignments::default();

    for part in rest.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| format!("expected track=names, got '{part}'"))?;
        let names: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        match key.trim().parse::<Track>()? {
            Track::Human => assignments.human = names,
            Track::Automated => assignments.automated = names,
        }
    }

    Ok(assignments)
}

pub struct Console {
    service: DispatchService,
    catalog_path: PathBuf,
}

impl Console {
    pub fn new(service: DispatchService, catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            catalog_path: catalog_path.into(),
        }
    }

    /// Serve commands until `quit` or end of input.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            debug!(%line, "console command");

            let (reply, keep_running) = match Command::parse(&line) {
                Ok(cmd) => self.handle(cmd).await,
                Err(err) => (json!({ "ok": false, "error": err }), true),
            };

            let mut out = serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_string());
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;

            if !keep_running {
                break;
            }
        }

        info!("console closed");
        Ok(())
    }

    /// Apply one command. Returns the reply and whether to keep reading.
    pub async fn handle(&self, cmd: Command) -> (Value, bool) {
        let svc = &self.service;
        let reply = match cmd {
            Command::Enqueue(program) => match svc.enqueue(&program) {
                Ok(()) => {
                    json!({ "ok": true, "queued": program, "queue_depth": svc.status().queue_depth })
                }
                Err(err) => json!({ "ok": false, "error": err.to_string() }),
            },
            Command::Assign(assignments) => match svc.set_assignments(assignments) {
                Ok(()) => json!({ "ok": true }),
                Err(err) => json!({ "ok": false, "error": err.to_string() }),
            },
            Command::Done(name) => match svc.complete_human_task(&name) {
                Some(event) => json!({ "ok": true, "event": event }),
                None => json!({ "ok": true, "already_finished": name }),
            },
            Command::Deps(track) => json!({
                "ok": true,
                "readiness": svc.dependency_status(track),
                "requires": svc.dependency_requirement(track),
            }),
            Command::Status => json!({ "ok": true, "status": svc.status() }),
            Command::History => json!({
                "ok": true,
                "history": svc.history(),
                "finished": svc.finished_tasks(),
            }),
            Command::Start => {
                svc.start_processing();
                json!({ "ok": true })
            }
            Command::Pause => {
                svc.pause_processing();
                json!({ "ok": true })
            }
            Command::Resume => {
                svc.resume_processing();
                json!({ "ok": true })
            }
            Command::Mode(mode) => {
                svc.set_mode(mode);
                json!({ "ok": true, "mode": mode })
            }
            Command::Reset => {
                svc.reset().await;
                json!({ "ok": true })
            }
            Command::Reload => {
                let catalog = load_or_empty(&self.catalog_path);
                svc.reload_catalog(&catalog);
                json!({ "ok": true, "tasks": catalog.task.len() })
            }
            Command::Quit => return (json!({ "ok": true, "bye": true }), false),
        };
        (reply, true)
    }
}
