//! Observer trait for batch progress and diagnostic events.
//!
//! Inject an [`Arc<dyn BatchObserver>`] via
//! [`crate::config::BatchConfigBuilder::observer`] to receive events as the
//! dispatcher works through the batch. The library itself never logs through
//! a global logger: every diagnostic line is handed to
//! [`BatchObserver::on_event`] with a [`Severity`], and the default
//! [`TracingObserver`] forwards those to `tracing`.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2md::{BatchObserver, ItemReport};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchObserver for Counter {
//!     fn on_item_complete(&self, completed: usize, total: usize, _item: &ItemReport) {
//!         self.0.store(completed, Ordering::SeqCst);
//!         eprintln!("Progress: {completed}/{total}");
//!     }
//! }
//! ```

use crate::output::{BatchSummary, ItemReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// Receives batch events.
///
/// Implementations must be `Send + Sync`: `on_event` is called from worker
/// threads concurrently. `on_batch_start`, `on_item_complete` and
/// `on_batch_complete` are only ever called from the single collecting task,
/// so `completed` arrives strictly increasing by one.
///
/// All methods have default no-op implementations.
pub trait BatchObserver: Send + Sync {
    /// Called once after enumeration, before any item is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called after each item finishes.
    ///
    /// # Arguments
    /// * `completed` — items finished so far, including this one (1-based)
    /// * `total`     — items in the batch
    /// * `item`      — the finished item and its outcome
    fn on_item_complete(&self, completed: usize, total: usize, item: &ItemReport) {
        let _ = (completed, total, item);
    }

    /// A diagnostic message.
    fn on_event(&self, severity: Severity, message: &str) {
        let _ = (severity, message);
    }

    /// Called once when every item has an outcome.
    fn on_batch_complete(&self, summary: &BatchSummary) {
        let _ = summary;
    }
}

/// Discards everything.
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// Forwards events and progress to `tracing`.
///
/// This is the default when no observer is configured.
pub struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_batch_start(&self, total: usize) {
        tracing::info!("Found {} files to process.", total);
    }

    fn on_item_complete(&self, completed: usize, total: usize, _item: &ItemReport) {
        tracing::info!("Progress: {}/{}", completed, total);
    }

    fn on_event(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        tracing::info!("All files processed: {}", summary);
    }
}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type SharedObserver = Arc<dyn BatchObserver>;
