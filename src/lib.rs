//! # edgequake-doc2md
//!
//! Batch-convert a tree of documents (PDF, EPUB, DOC/DOCX, Kindle formats,
//! plain text) to Markdown, and split Markdown files into chapter "books" by
//! heading.
//!
//! ## Why this crate?
//!
//! Converting a library of documents is mostly orchestration: walk the tree,
//! skip what is already done, run many converters at once, and make sure one
//! corrupt file does not sink the other thousand. This crate does that part
//! and treats the actual converters (`unstructured`, `pandoc`, Calibre's
//! `ebook-convert`, or your own) as opaque [`Transform`]s.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source tree
//!  │
//!  ├─ 1. Enumerate  walk once, sorted, eligible files only
//!  ├─ 2. Mirror     same relative path under the destination root
//!  ├─ 3. Gate       skip when the destination is newer (unless forced)
//!  ├─ 4. Transform  converter by extension, or heading split
//!  ├─ 5. Capture    failures → <name>.error.txt sidecar, batch continues
//!  └─ 6. Report     per-item outcomes + succeeded/skipped/failed counts
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{run_batch, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder("data_raw", "data_md")
//!         .workers(4)
//!         .build()?;
//!     let report = run_batch(&config).await?;
//!     eprintln!("{}", report.summary);
//!     for failed in report.failures() {
//!         eprintln!("failed: {}", failed.relative_path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, run_batch_sync};
pub use config::{BatchConfig, BatchConfigBuilder, NoHeadingFallback, PipelineMode, SplitOptions};
pub use error::{BatchError, ConversionError, ItemError};
pub use output::{
    BatchReport, BatchSummary, DestinationTarget, ItemReport, ProcessingOutcome, SkipReason,
    WorkItem,
};
pub use pipeline::registry::{CommandTransform, CopyTransform, DocumentKind, Transform, TransformRegistry};
pub use pipeline::split::{split_markdown, Segment};
pub use progress::{BatchObserver, NoopObserver, Severity, SharedObserver, TracingObserver};
pub use stream::{stream_batch, OutcomeStream};
