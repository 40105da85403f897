//! Eager (whole-batch) entry points.
//!
//! [`run_batch`] enumerates the source tree, processes every item across a
//! bounded worker pool, and returns a [`BatchReport`] once all items have an
//! outcome. Use [`crate::stream::stream_batch`] instead to receive outcomes
//! as they complete.

use crate::config::{BatchConfig, PipelineMode};
use crate::error::{BatchError, ItemError};
use crate::output::{BatchReport, BatchSummary, ItemReport, ProcessingOutcome};
use crate::pipeline::enumerate::{enumerate_items, is_markdown};
use crate::pipeline::pool::{fan_out_ordered, WorkerPanic};
use crate::pipeline::process::{ItemProcessor, PlannedItem};
use crate::progress::Severity;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Run a whole batch.
///
/// # Returns
/// `Ok(BatchReport)` whenever the batch could start, even if items failed
/// (check `report.summary.failed`).
///
/// # Errors
/// Returns `Err(BatchError)` only for batch-level problems, all detected
/// before any item is processed:
/// - source root missing or not a directory
/// - destination root cannot be created
/// - source tree cannot be walked
pub async fn run_batch(config: &BatchConfig) -> Result<BatchReport, BatchError> {
    let start = Instant::now();
    let plan = prepare(config)?;
    let total = plan.items.len();
    let workers = config.effective_workers();
    let observer = Arc::clone(&config.observer);

    observer.on_event(
        Severity::Info,
        &format!(
            "Processing {} file(s) from '{}' using {} worker(s)",
            total,
            config.source_root.display(),
            workers
        ),
    );
    observer.on_batch_start(total);

    let relative: Vec<PathBuf> = plan
        .items
        .iter()
        .map(|p| p.item.relative_path.clone())
        .collect();
    let processor = Arc::new(plan.processor);
    let process = Arc::new(move |planned: PlannedItem| processor.run(&planned));

    let mut summary = BatchSummary::default();
    let results = fan_out_ordered(plan.items, workers, process, |completed, total, index, result| {
        let report = item_report(&relative[index], result);
        summary.record(&report.outcome);
        observer.on_item_complete(completed, total, &report);
    })
    .await;

    let items: Vec<ItemReport> = results
        .iter()
        .zip(&relative)
        .map(|(result, rel)| item_report(rel, result))
        .collect();

    observer.on_batch_complete(&summary);

    Ok(BatchReport {
        summary,
        items,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a tokio runtime internally; do not call from async code.
pub fn run_batch_sync(config: &BatchConfig) -> Result<BatchReport, BatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_batch(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Everything needed to start processing.
pub(crate) struct BatchPlan {
    pub items: Vec<PlannedItem>,
    pub processor: ItemProcessor,
}

/// Validate roots, create the destination root, enumerate items, and check
/// that no two items share an output path.
pub(crate) fn prepare(config: &BatchConfig) -> Result<BatchPlan, BatchError> {
    let source = &config.source_root;
    if !source.exists() {
        return Err(BatchError::SourceNotFound {
            path: source.clone(),
        });
    }
    if !source.is_dir() {
        return Err(BatchError::SourceNotADirectory {
            path: source.clone(),
        });
    }

    if !config.dry_run {
        std::fs::create_dir_all(&config.dest_root).map_err(|e| {
            BatchError::DestinationUnavailable {
                path: config.dest_root.clone(),
                source: e,
            }
        })?;
    }

    let exclude = nested_destination(source, &config.dest_root);
    let observer = &config.observer;
    let on_skip = |path: &Path, reason: &str| {
        observer.on_event(
            Severity::Warning,
            &format!("Skipping unreadable entry {}: {reason}", path.display()),
        )
    };
    let items = match &config.mode {
        PipelineMode::Convert { registry } => {
            enumerate_items(source, exclude.as_deref(), |p| registry.handles(p), on_skip)?
        }
        PipelineMode::Split(_) => {
            enumerate_items(source, exclude.as_deref(), is_markdown, on_skip)?
        }
    };

    if items.is_empty() {
        config.observer.on_event(
            Severity::Warning,
            &format!("No eligible files found under {}", source.display()),
        );
    }

    let processor = ItemProcessor::new(config);
    Ok(BatchPlan {
        items: processor.plan(items),
        processor,
    })
}

/// If `dest` lies inside `source`, the path under `source` to skip while walking.
fn nested_destination(source: &Path, dest: &Path) -> Option<PathBuf> {
    let source_abs = std::fs::canonicalize(source).ok()?;
    let dest_abs = std::fs::canonicalize(dest).ok()?;
    let inner = dest_abs.strip_prefix(&source_abs).ok()?;
    Some(source.join(inner))
}

pub(crate) fn item_report(relative: &Path, result: &Result<ProcessingOutcome, WorkerPanic>) -> ItemReport {
    let outcome = match result {
        Ok(outcome) => outcome.clone(),
        Err(panic) => ProcessingOutcome::Failed {
            error: ItemError::Panicked(panic.message.clone()),
            error_artifact: None,
        },
    };
    ItemReport {
        relative_path: relative.to_path_buf(),
        outcome,
    }
}
