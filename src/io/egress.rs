//! Event egress - appends simulation events to a file
//!
//! Events are written in JSONL format (one JSON object per line), each
//! tagged with the run id and the time the dispatcher handled it.

use crate::domain::SimEvent;
use crate::io::sink::PresentationSink;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_run_id() -> String {
    Uuid::now_v7().to_string()
}

/// One line of the event log
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    run_id: &'a str,
    /// Handling timestamp (RFC 3339, millisecond precision)
    ts: String,
    #[serde(flatten)]
    event: &'a SimEvent,
}

/// JSONL writer for simulation events
pub struct JsonlSink {
    file_path: PathBuf,
    run_id: String,
    writer: BufWriter<File>,
    lines: u64,
}

impl JsonlSink {
    /// Open (or create) the file in append mode, creating parent directories
    pub fn open(file_path: impl AsRef<Path>, run_id: impl Into<String>) -> anyhow::Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .with_context(|| format!("opening event log {}", file_path.display()))?;

        let run_id = run_id.into();
        info!(file = %file_path.display(), run_id = %run_id, "event_log_opened");
        Ok(Self { file_path, run_id, writer: BufWriter::new(file), lines: 0 })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }
}

impl PresentationSink for JsonlSink {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn deliver(&mut self, event: &SimEvent) -> anyhow::Result<()> {
        let record = EventRecord {
            run_id: &self.run_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;

        // Lifecycle events are flushed right away so a crash cannot lose them
        if matches!(event, SimEvent::ShutdownNotice { .. }) {
            self.writer.flush()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        debug!(file = %self.file_path.display(), lines = %self.lines, "event_log_closed");
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
