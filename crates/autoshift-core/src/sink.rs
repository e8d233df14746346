//! [`EventSink`] implementations.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::capability::EventSink;
use crate::error::Result;
use crate::run::{RunOutcome, RunState};

// ─── TracingSink ──────────────────────────────────────────────────────────

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn log(&self, line: &str) {
        tracing::info!("{line}");
    }

    fn complete(&self, outcome: &RunOutcome) {
        let run_id = outcome.run.id.short();
        match outcome.state {
            RunState::Succeeded => tracing::info!(run_id = %run_id, "run succeeded"),
            _ => tracing::warn!(run_id = %run_id, "run ended: {outcome}"),
        }
    }
}

// ─── CollectingSink ───────────────────────────────────────────────────────

/// Keeps every line and completion in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<String>>,
    completions: Mutex<Vec<RunOutcome>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn completions(&self) -> Vec<RunOutcome> {
        self.completions
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn log(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }

    fn complete(&self, outcome: &RunOutcome) {
        if let Ok(mut completions) = self.completions.lock() {
            completions.push(outcome.clone());
        }
    }
}

// ─── BroadcastSink ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Log { line: String },
    Complete { outcome: RunOutcome },
}

/// Publishes [`RunEvent`]s to any number of subscribers.
///
/// Events sent while nobody is subscribed are dropped; a slow subscriber sees
/// `RecvError::Lagged` rather than blocking the run.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<RunEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventSink for BroadcastSink {
    fn log(&self, line: &str) {
        let _ = self.tx.send(RunEvent::Log {
            line: line.to_string(),
        });
    }

    fn complete(&self, outcome: &RunOutcome) {
        let _ = self.tx.send(RunEvent::Complete {
            outcome: outcome.clone(),
        });
    }
}

// ─── FileSink ─────────────────────────────────────────────────────────────

/// Appends timestamped lines to a log file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileSink {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Open a fresh per-session file named after the current time inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        let name = format!("autoshift-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
        Self::open(&dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) {
        let stamped = format!("{} {line}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        if let Err(e) = file.write_all(stamped.as_bytes()) {
            tracing::warn!(path = %self.path.display(), "failed to write log line: {e}");
        }
    }
}

impl EventSink for FileSink {
    fn log(&self, line: &str) {
        self.write_line(line);
    }

    fn complete(&self, outcome: &RunOutcome) {
        self.write_line(&format!("run {} {outcome}", outcome.run.id.short()));
    }
}

// ─── FanoutSink ───────────────────────────────────────────────────────────

/// Sends every event to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn log(&self, line: &str) {
        for sink in &self.sinks {
            sink.log(line);
        }
    }

    fn complete(&self, outcome: &RunOutcome) {
        for sink in &self.sinks {
            sink.complete(outcome);
        }
    }
}
