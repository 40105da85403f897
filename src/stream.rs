//! Streaming batch API: emit item outcomes as they complete.
//!
//! Unlike the eager [`crate::batch::run_batch`], which returns only after
//! every item finishes, [`stream_batch`] yields one `(index, ItemReport)` per
//! item as soon as it is done. Items arrive in completion order; `index` is
//! the item's position in enumeration order, so callers can restore it.
//!
//! The stream does not call the configured observer's progress hooks;
//! callers consuming the stream own progress reporting. Diagnostic events
//! from item processing still go to the observer.

use crate::batch::{item_report, prepare};
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::ItemReport;
use crate::pipeline::pool::fan_out;
use crate::pipeline::process::PlannedItem;
use futures::StreamExt;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// A boxed stream of `(enumeration index, report)` pairs.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = (usize, ItemReport)> + Send>>;

/// Start a batch and stream outcomes as items finish.
///
/// Enumeration happens before this returns, so `total` (the first tuple
/// field) is exact.
///
/// # Returns
/// - `Ok((total, OutcomeStream))`
/// - `Err(BatchError)` — the batch could not start (same checks as
///   [`crate::batch::run_batch`])
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc2md::{stream_batch, BatchConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::builder("data_raw", "data_md").build()?;
/// let (total, mut outcomes) = stream_batch(&config)?;
/// let mut done = 0;
/// while let Some((_, report)) = outcomes.next().await {
///     done += 1;
///     println!("{done}/{total}: {}", report.relative_path.display());
/// }
/// # Ok(())
/// # }
/// ```
pub fn stream_batch(config: &BatchConfig) -> Result<(usize, OutcomeStream), BatchError> {
    let plan = prepare(config)?;
    let total = plan.items.len();
    let relative: Arc<Vec<PathBuf>> = Arc::new(
        plan.items
            .iter()
            .map(|p| p.item.relative_path.clone())
            .collect(),
    );

    let processor = Arc::new(plan.processor);
    let process = Arc::new(move |planned: PlannedItem| processor.run(&planned));

    let s = fan_out(plan.items, config.effective_workers(), process)
        .map(move |(index, result)| (index, item_report(&relative[index], &result)));

    Ok((total, Box::pin(s)))
}
