//! Report sinks.

use super::{ReportEntry, ReportLevel};
use parking_lot::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Destination for a flushed run report.
pub trait ReportSink: Send + Sync {
    /// Writes one entry.
    fn write(&self, run_id: Uuid, entry: &ReportEntry);
}

/// Forwards entries to `tracing` at the entry's level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn write(&self, run_id: Uuid, entry: &ReportEntry) {
        match entry.level {
            ReportLevel::Info => {
                info!(run_id = %run_id, scope = %entry.scope, "{}", entry.message);
            }
            ReportLevel::Warn => {
                warn!(run_id = %run_id, scope = %entry.scope, "{}", entry.message);
            }
            ReportLevel::Error => {
                error!(run_id = %run_id, scope = %entry.scope, "{}", entry.message);
            }
        }
    }
}

/// Keeps flushed entries in memory. Used by tests.
#[derive(Debug, Default)]
pub struct CollectingReportSink {
    entries: RwLock<Vec<ReportEntry>>,
}

impl CollectingReportSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.read().clone()
    }

    /// Returns the collected messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.message.clone()).collect()
    }

    /// Returns the number of collected entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ReportSink for CollectingReportSink {
    fn write(&self, _run_id: Uuid, entry: &ReportEntry) {
        self.entries.write().push(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunReport;

    #[test]
    fn test_tracing_sink_accepts_every_level() {
        let report = RunReport::new();
        report.info("info");
        report.warn("warn");
        report.error("error");

        assert_eq!(report.flush(&TracingReportSink), 3);
    }

    #[test]
    fn test_collecting_sink_keeps_order() {
        let report = RunReport::new();
        let sink = CollectingReportSink::new();
        report.info("first");
        report.warn("second");
        report.flush(&sink);

        assert_eq!(sink.messages(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(sink.entries()[1].level, ReportLevel::Warn);
    }
}
