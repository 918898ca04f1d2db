//! Data model for progress trace events and run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ── Event ─────────────────────────────────────────────────────────────────

/// One progress step, as written to the trace file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Unique identifier.
    pub id: String,
    /// Identifier shared by every event of one run.
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    /// Step name, e.g. `section_start`, `quality_regression`.
    pub step: String,
    pub message: String,
    /// Structured context supplied by the caller.
    #[serde(default)]
    pub context: serde_json::Value,
}

impl TraceEvent {
    pub fn new(
        run_id: impl Into<String>,
        step: impl Into<String>,
        message: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            timestamp: Utc::now(),
            step: step.into(),
            message: message.into(),
            context,
        }
    }
}

// ── Statistics ────────────────────────────────────────────────────────────

/// Running tallies over the events of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Events seen per step name.
    pub steps: BTreeMap<String, u64>,
    /// Total events.
    pub total_events: u64,
    /// Events whose context carried `"fallback": true`.
    pub fallbacks: u64,
    /// Trace writes that failed and were dropped.
    pub dropped_writes: u64,
    pub first_event_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn record(&mut self, event: &TraceEvent) {
        *self.steps.entry(event.step.clone()).or_insert(0) += 1;
        self.total_events += 1;
        if event.context.get("fallback").and_then(|v| v.as_bool()) == Some(true) {
            self.fallbacks += 1;
        }
        if self.first_event_at.is_none() {
            self.first_event_at = Some(event.timestamp);
        }
        self.last_event_at = Some(event.timestamp);
    }

    pub fn count(&self, step: &str) -> u64 {
        self.steps.get(step).copied().unwrap_or(0)
    }

    /// Wall-clock time between the first and last event, in milliseconds.
    pub fn elapsed_ms(&self) -> Option<i64> {
        match (self.first_event_at, self.last_event_at) {
            (Some(first), Some(last)) => Some((last - first).num_milliseconds()),
            _ => None,
        }
    }
}
