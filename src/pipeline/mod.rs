//! Pipeline stages for batch document processing.
//!
//! Each submodule implements exactly one concern, so each is testable on
//! its own and the conversion and split pipelines share everything except
//! the per-file strategy.
//!
//! ## Data Flow
//!
//! ```text
//! enumerate ──▶ mirror ──▶ staleness ──▶ registry | split ──▶ outcome
//!  (walkdir)    (paths)    (mtimes)      (strategy)
//!        ╰──────────── pool: bounded fan-out of process ────────────╯
//! ```
//!
//! 1. [`enumerate`] — sorted list of eligible source files
//! 2. [`mirror`]    — source path → destination path, pure
//! 3. [`staleness`] — skip items whose destination is fresh
//! 4. [`registry`]  — extension → converter dispatch table
//! 5. [`split`]     — heading-based splitting into chapter books
//! 6. [`process`]   — runs 2–5 for one item, captures failures
//! 7. [`pool`]      — runs [`process`] for many items with bounded concurrency

pub mod enumerate;
pub mod mirror;
pub mod pool;
pub mod process;
pub mod registry;
pub mod split;
pub mod staleness;
