//! Per-cycle summary published to logs, metrics and the health surface.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Result of one full pass over the universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Monotonic cycle number, starting at 1.
    pub cycle: u64,
    pub date: Option<NaiveDate>,
    /// Symbol tasks scheduled.
    pub scheduled: usize,
    pub emitted: usize,
    pub suppressed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Failures that point at a broken market-data connection.
    pub connectivity_failures: usize,
    pub duration_ms: u64,
    pub resident_memory_bytes: Option<u64>,
    /// Emissions by direction label.
    pub emitted_by_direction: BTreeMap<String, usize>,
    /// Suppressions by policy rejection reason.
    pub suppressed_by_reason: BTreeMap<String, usize>,
    /// Skips and failures by reason.
    pub skipped_by_reason: BTreeMap<String, usize>,
    /// Set when shutdown interrupted the fan-out.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
        *map.entry(key.to_string()).or_default() += 1;
    }

    /// Symbols that reached a terminal outcome.
    pub fn completed(&self) -> usize {
        self.emitted + self.suppressed + self.skipped + self.failed
    }
}
