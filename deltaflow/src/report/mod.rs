//! Run report: the explicit, append-only log every stage writes to.
//!
//! A [`RunReport`] is created by the caller, handed to every stage call, and
//! flushed exactly once into a [`ReportSink`] when the run is over. Scoped
//! children created with [`RunReport::scoped`] share the parent's buffer, so
//! concurrent module workers append to one report; their relative ordering
//! only affects presentation.

mod logging;
mod sink;

pub use logging::{init_tracing, parse_level};
pub use sink::{CollectingReportSink, ReportSink, TracingReportSink};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Severity of a report entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    /// Progress information.
    Info,
    /// Something the user should look at; the run continues.
    Warn,
    /// A failure.
    Error,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: ReportLevel,
    /// Scope path, e.g. `run` or `run/app`.
    pub scope: String,
    /// The message.
    pub message: String,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.scope, self.level, self.message)
    }
}

/// Append-only, thread-safe run report.
#[derive(Debug, Clone)]
pub struct RunReport {
    run_id: Uuid,
    scope: String,
    entries: Arc<Mutex<Vec<ReportEntry>>>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Creates an empty report with a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scope: "run".to_string(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a child report that appends to the same buffer under a
    /// nested scope.
    #[must_use]
    pub fn scoped(&self, scope: &str) -> Self {
        Self {
            run_id: self.run_id,
            scope: format!("{}/{scope}", self.scope),
            entries: Arc::clone(&self.entries),
        }
    }

    /// The id shared by every scope of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// This report's scope path.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Appends an entry.
    pub fn push(&self, level: ReportLevel, message: impl Into<String>) {
        self.entries.lock().push(ReportEntry {
            timestamp: Utc::now(),
            level,
            scope: self.scope.clone(),
            message: message.into(),
        });
    }

    /// Appends an info entry.
    pub fn info(&self, message: impl Into<String>) {
        self.push(ReportLevel::Info, message);
    }

    /// Appends a warning.
    pub fn warn(&self, message: impl Into<String>) {
        self.push(ReportLevel::Warn, message);
    }

    /// Appends an error.
    pub fn error(&self, message: impl Into<String>) {
        self.push(ReportLevel::Error, message);
    }

    /// A snapshot of every entry appended so far, across all scopes.
    #[must_use]
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().clone()
    }

    /// Entries at a given level.
    #[must_use]
    pub fn entries_at(&self, level: ReportLevel) -> Vec<ReportEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    /// Returns true if any entry's message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drains the buffer into a sink. Returns the number of entries written.
    pub fn flush(&self, sink: &dyn ReportSink) -> usize {
        let drained: Vec<ReportEntry> = std::mem::take(&mut *self.entries.lock());
        let count = drained.len();
        for entry in &drained {
            sink.write(self.run_id, entry);
        }
        count
    }
}
