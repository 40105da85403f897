//! Data types flowing through a batch run.
//!
//! A [`WorkItem`] goes in, exactly one [`ProcessingOutcome`] comes out, and
//! the dispatcher folds all outcomes into a [`BatchSummary`] wrapped in a
//! [`BatchReport`].

use crate::error::ItemError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// One source file enumerated for possible processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Absolute (or root-joined) path to the source file.
    pub source_path: PathBuf,
    /// Path relative to the source root.
    pub relative_path: PathBuf,
}

/// Where an item's output goes, and what is already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTarget {
    pub path: PathBuf,
    pub exists: bool,
    pub last_modified: Option<SystemTime>,
}

/// Why an item was not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Destination is at least as new as the source.
    UpToDate,
    /// No transform is registered for this file type.
    NoStrategy { discriminator: String },
    /// Split pipeline: no heading at the chosen level and fallback is `skip`.
    NoHeadings,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpToDate => f.write_str("up-to-date"),
            SkipReason::NoStrategy { discriminator } => {
                write!(f, "no strategy for '{discriminator}'")
            }
            SkipReason::NoHeadings => f.write_str("no headings"),
        }
    }
}

/// The result of processing one [`WorkItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Skipped {
        reason: SkipReason,
    },
    Converted {
        destination: PathBuf,
    },
    Failed {
        error: ItemError,
        /// Sidecar diagnostic file, when one was written.
        error_artifact: Option<PathBuf>,
    },
}

impl ProcessingOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, ProcessingOutcome::Converted { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ProcessingOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessingOutcome::Failed { .. })
    }
}

/// Per-item entry of a [`BatchReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub relative_path: PathBuf,
    pub outcome: ProcessingOutcome,
}

/// Aggregate counts for a batch run.
///
/// `total == succeeded + skipped + failed` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &ProcessingOutcome) {
        self.total += 1;
        match outcome {
            ProcessingOutcome::Skipped { .. } => self.skipped += 1,
            ProcessingOutcome::Converted { .. } => self.succeeded += 1,
            ProcessingOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a ProcessingOutcome>) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} total, {} succeeded, {} skipped, {} failed",
            self.total, self.succeeded, self.skipped, self.failed
        )
    }
}

/// Everything a finished batch run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    /// One entry per item, in enumeration (sorted path) order.
    pub items: Vec<ItemReport>,
    pub duration_ms: u64,
}

impl BatchReport {
    /// Items that failed, for post-run reporting.
    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|i| i.outcome.is_failed())
    }
}
