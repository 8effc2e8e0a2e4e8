//! Run outcome accounting
//!
//! Counters, status derivation and the process-wide "last run" snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Final status of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Partial,
    Failed,
}

/// Classification of one processed video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Updated,
    Skipped,
    Unmatched,
    Failed,
}

/// Per-run outcome counters.
///
/// Invariant: `processed` always equals the sum of the four outcome buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub processed: u64,
    pub updated: u64,
    pub skipped: u64,
    pub unmatched: u64,
    pub failed: u64,
}

impl RunCounters {
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Updated => self.updated += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Unmatched => self.unmatched += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    /// Derive the run status: any failure with at least one other outcome is
    /// partial; failures across the board sink the run.
    pub fn status(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Succeeded
        } else if self.updated + self.skipped + self.unmatched > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        }
    }

    pub fn is_conserved(&self) -> bool {
        self.processed == self.updated + self.skipped + self.unmatched + self.failed
    }
}

/// Summary of one synchronization run, immutable once finished.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub status: RunStatus,
}

/// Copy-on-publish holder for the latest completed report.
///
/// Writers swap in a fresh `Arc`; readers clone the handle and never observe
/// a partially written report.
#[derive(Default)]
pub struct ReportSlot {
    inner: RwLock<Option<Arc<SyncRunReport>>>,
}

impl ReportSlot {
    pub fn publish(&self, report: SyncRunReport) -> Arc<SyncRunReport> {
        let report = Arc::new(report);
        *self.inner.write() = Some(report.clone());
        report
    }

    pub fn latest(&self) -> Option<Arc<SyncRunReport>> {
        self.inner.read().clone()
    }
}
