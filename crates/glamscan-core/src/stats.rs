//! Per-cycle scan statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::verdict::Verdict;

/// Summary of one walk over the scan root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Files not submitted (too large or unchanged since a clean scan).
    pub skipped: u64,
    /// Files the daemon reported clean.
    pub clean: u64,
    /// Files that could not be scanned.
    pub errored: u64,
    /// Files the daemon reported infected.
    pub found: u64,
    /// Wall time of the walk plus the verdict drain.
    pub elapsed: Duration,
    /// The walk was cut short by a stop request.
    pub aborted: bool,
}

impl CycleStats {
    /// Number of files that received a verdict.
    pub fn scanned(&self) -> u64 {
        self.clean + self.errored + self.found
    }

    /// Number of regular files visited by the walk.
    pub fn visited(&self) -> u64 {
        self.skipped + self.scanned()
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results:")?;
        writeln!(f, "  Skipped files: {}", self.skipped)?;
        writeln!(f, "  Scanned files:")?;
        writeln!(f, "    Ok: {}", self.clean)?;
        writeln!(f, "    Errors: {}", self.errored)?;
        write!(f, "    Viruses: {}", self.found)
    }
}

/// Concurrent counters shared by the walk and the verdict waiters.
#[derive(Debug, Default)]
pub struct CycleCounters {
    skipped: AtomicU64,
    clean: AtomicU64,
    errored: AtomicU64,
    found: AtomicU64,
}

impl CycleCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delivered verdict.
    pub fn record(&self, verdict: Verdict) {
        let counter = match verdict {
            Verdict::Clean => &self.clean,
            Verdict::Errored => &self.errored,
            Verdict::Infected => &self.found,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Freeze the counters into a report.
    pub fn snapshot(&self, elapsed: Duration, aborted: bool) -> CycleStats {
        CycleStats {
            skipped: self.skipped.load(Ordering::Relaxed),
            clean: self.clean.load(Ordering::Relaxed),
            errored: self.errored.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            elapsed,
            aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = CycleCounters::new();
        counters.record_skipped();
        counters.record_skipped();
        counters.record(Verdict::Clean);
        counters.record(Verdict::Infected);
        counters.record(Verdict::Errored);
        counters.record(Verdict::Errored);

        let stats = counters.snapshot(Duration::from_millis(10), false);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.clean, 1);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.errored, 2);
        assert_eq!(stats.scanned(), 4);
        assert_eq!(stats.visited(), 6);
        assert!(!stats.aborted);
    }

    #[test]
    fn test_report_format() {
        let stats = CycleStats {
            skipped: 3,
            clean: 2,
            errored: 1,
            found: 0,
            ..Default::default()
        };
        let report = stats.to_string();
        assert!(report.contains("Skipped files: 3"));
        assert!(report.contains("Ok: 2"));
        assert!(report.contains("Errors: 1"));
        assert!(report.contains("Viruses: 0"));
    }
}
