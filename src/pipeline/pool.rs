//! Bounded fan-out of blocking work.
//!
//! Each item runs to completion on a tokio blocking thread
//! (`spawn_blocking`) because conversion means external processes and file
//! I/O, neither of which may stall the async workers. `buffer_unordered`
//! caps how many items are in flight, so `workers` is the real degree of
//! parallelism regardless of the blocking pool's own size.
//!
//! The pool knows nothing about documents: it is generic over the item and
//! outcome types and tags every result with the item's index, so callers
//! can slot results back into enumeration order.

use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;

/// A worker that panicked instead of returning an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPanic {
    pub index: usize,
    pub message: String,
}

/// Run `process` over `items` with at most `workers` in flight.
///
/// Yields `(index, result)` in completion order. `workers` is clamped to at
/// least 1; with 1 the items run strictly one after another in input order.
pub fn fan_out<I, O, F>(
    items: Vec<I>,
    workers: usize,
    process: Arc<F>,
) -> impl Stream<Item = (usize, Result<O, WorkerPanic>)> + Send
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    let workers = workers.max(1);
    stream::iter(items.into_iter().enumerate().map(move |(index, item)| {
        let process = Arc::clone(&process);
        async move {
            let result = tokio::task::spawn_blocking(move || process(item))
                .await
                .map_err(|e| WorkerPanic {
                    index,
                    message: panic_message(e),
                });
            (index, result)
        }
    }))
    .buffer_unordered(workers)
}

/// Run `process` over `items` and return results in input order.
///
/// `on_complete(completed, total, index, &result)` fires once per item as it
/// finishes, with `completed` counting up from 1 to `items.len()`.
pub async fn fan_out_ordered<I, O, F, C>(
    items: Vec<I>,
    workers: usize,
    process: Arc<F>,
    mut on_complete: C,
) -> Vec<Result<O, WorkerPanic>>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
    C: FnMut(usize, usize, usize, &Result<O, WorkerPanic>),
{
    let total = items.len();
    let mut slots: Vec<Option<Result<O, WorkerPanic>>> = (0..total).map(|_| None).collect();

    let mut results = Box::pin(fan_out(items, workers, process));
    let mut completed = 0;
    while let Some((index, result)) = results.next().await {
        completed += 1;
        on_complete(completed, total, index, &result);
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(WorkerPanic {
                    index,
                    message: "worker produced no result".into(),
                })
            })
        })
        .collect()
}

fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
