//! Tracer implementations: an append-only JSONL progress log and an
//! in-process recorder.
//!
//! Both are fire-and-forget: `step` never fails from the caller's point of
//! view. Write failures are logged with `warn!`, counted, and dropped.

use crate::TelemetryError;
use crate::model::{RunStats, TraceEvent};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;
use weekforge_core::collaborator::Tracer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Appends one JSON object per step to `run_logs/week{N}.jsonl`.
pub struct JsonlTracer {
    run_id: String,
    path: PathBuf,
    file: Mutex<Option<File>>,
    stats: Mutex<RunStats>,
}

impl JsonlTracer {
    /// Open (or create) the trace file for a week under `dir`.
    ///
    /// Failing to open the file is not fatal: the tracer still counts
    /// events, it just cannot persist them.
    pub fn for_week(dir: &Path, week_number: u32) -> Self {
        let path = dir.join(format!("week{week_number}.jsonl"));
        let file = match open_append(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Trace file unavailable, events will not be persisted");
                None
            }
        };

        Self {
            run_id: Uuid::new_v4().to_string(),
            path,
            file: Mutex::new(file),
            stats: Mutex::new(RunStats::default()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the statistics gathered so far.
    pub fn stats(&self) -> RunStats {
        lock(&self.stats).clone()
    }

    fn write_event(&self, event: &TraceEvent) -> Result<(), TelemetryError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = lock(&self.file);
        match file.as_mut() {
            Some(f) => f
                .write_all(line.as_bytes())
                .and_then(|_| f.flush())
                .map_err(|e| TelemetryError::Io(e.to_string())),
            None => Err(TelemetryError::Io("trace file not open".into())),
        }
    }
}

fn open_append(path: &Path) -> Result<File, TelemetryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| TelemetryError::Io(e.to_string()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| TelemetryError::Io(e.to_string()))
}

impl Tracer for JsonlTracer {
    fn step(&self, name: &str, message: &str, context: serde_json::Value) {
        let event = TraceEvent::new(&self.run_id, name, message, context);
        debug!(step = name, "{message}");

        let result = self.write_event(&event);
        let mut stats = lock(&self.stats);
        stats.record(&event);
        if let Err(e) = result {
            stats.dropped_writes += 1;
            // Warn once per tracer.
            if stats.dropped_writes == 1 {
                warn!(path = %self.path.display(), error = %e, "Failed to write trace event");
            }
        }
    }
}

/// Keeps every event in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct RecordingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step names in the order they were traced.
    pub fn steps(&self) -> Vec<String> {
        lock(&self.events).iter().map(|e| e.step.clone()).collect()
    }

    pub fn count(&self, step: &str) -> usize {
        lock(&self.events).iter().filter(|e| e.step == step).count()
    }

    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for event in lock(&self.events).iter() {
            stats.record(event);
        }
        stats
    }
}

impl Tracer for RecordingTracer {
    fn step(&self, name: &str, message: &str, context: serde_json::Value) {
        lock(&self.events).push(TraceEvent::new("recording", name, message, context));
    }
}
