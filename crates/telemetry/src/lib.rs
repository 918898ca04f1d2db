//! Progress tracing and run statistics for weekforge.
//!
//! Implements the `weekforge_core::Tracer` collaborator: a JSONL trace file
//! per week for post-run inspection, and an in-memory recorder for tests.

pub mod engine;
pub mod model;

pub use engine::{JsonlTracer, RecordingTracer};
pub use model::{RunStats, TraceEvent};

/// Errors from the telemetry subsystem. Never surfaced past a tracer.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("trace file I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
