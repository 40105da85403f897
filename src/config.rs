//! Configuration types for a batch run.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. One struct holds every knob so a config can be
//! cloned into worker tasks and logged as a whole.

use crate::error::BatchError;
use crate::pipeline::registry::TransformRegistry;
use crate::progress::{SharedObserver, TracingObserver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one batch run.
///
/// # Example
/// ```rust
/// use edgequake_doc2md::{BatchConfig, NoHeadingFallback, SplitOptions};
///
/// let config = BatchConfig::builder("notes_md", "books")
///     .split(SplitOptions {
///         heading_level: 2,
///         no_heading_fallback: NoHeadingFallback::Copy,
///     })
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_workers(), 4);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Root of the tree to read.
    pub source_root: PathBuf,

    /// Root of the mirrored tree to write.
    pub dest_root: PathBuf,

    /// Maximum items processed at once. `0` means one per available CPU.
    /// Default: 0.
    ///
    /// `1` processes strictly sequentially; results are identical for any
    /// value since items never share state.
    pub workers: usize,

    /// Reprocess every item even when its destination looks fresh. Default: false.
    pub force: bool,

    /// Log what would happen without writing anything. Default: false.
    pub dry_run: bool,

    /// Conversion or splitting.
    pub mode: PipelineMode,

    /// Receives progress and diagnostic events. Default: [`TracingObserver`].
    pub observer: SharedObserver,
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("source_root", &self.source_root)
            .field("dest_root", &self.dest_root)
            .field("workers", &self.workers)
            .field("force", &self.force)
            .field("dry_run", &self.dry_run)
            .field("mode", &self.mode)
            .field("observer", &"<dyn BatchObserver>")
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder. Defaults to the conversion pipeline with the
    /// stock converter table.
    pub fn builder(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: BatchConfig {
                source_root: source_root.into(),
                dest_root: dest_root.into(),
                workers: 0,
                force: false,
                dry_run: false,
                mode: PipelineMode::Convert {
                    registry: Arc::new(TransformRegistry::with_default_converters()),
                },
                observer: Arc::new(TracingObserver),
            },
        }
    }

    /// Resolve `workers`, mapping `0` to the machine's available parallelism.
    pub fn effective_workers(&self) -> usize {
        resolve_workers(self.workers)
    }
}

/// `0` → available parallelism (at least 1); anything else unchanged.
pub fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    }
}

/// Builder for [`BatchConfig`].
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl fmt::Debug for BatchConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl BatchConfigBuilder {
    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn force(mut self, v: bool) -> Self {
        self.config.force = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    /// Convert with the given converter table.
    pub fn convert_with(mut self, registry: Arc<TransformRegistry>) -> Self {
        self.config.mode = PipelineMode::Convert { registry };
        self
    }

    /// Split Markdown files into books.
    pub fn split(mut self, options: SplitOptions) -> Self {
        self.config.mode = PipelineMode::Split(options);
        self
    }

    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.config.observer = observer;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.source_root.as_os_str().is_empty() {
            return Err(BatchError::InvalidConfig("source root is empty".into()));
        }
        if c.dest_root.as_os_str().is_empty() {
            return Err(BatchError::InvalidConfig(
                "destination root is empty".into(),
            ));
        }
        if same_directory(&c.source_root, &c.dest_root) {
            return Err(BatchError::InvalidConfig(format!(
                "source and destination are the same directory: {}",
                c.source_root.display()
            )));
        }
        match &c.mode {
            PipelineMode::Split(opts) if !(1..=6).contains(&opts.heading_level) => {
                return Err(BatchError::InvalidConfig(format!(
                    "heading level must be 1–6, got {}",
                    opts.heading_level
                )));
            }
            PipelineMode::Convert { registry } if registry.is_empty() => {
                return Err(BatchError::InvalidConfig(
                    "no converters registered".into(),
                ));
            }
            _ => {}
        }
        Ok(self.config)
    }
}

/// Literal equality, or equal canonical paths when both exist
/// (`data` vs `./data`, symlinked roots).
fn same_directory(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which per-file transformation a batch applies.
#[derive(Clone)]
pub enum PipelineMode {
    /// Convert every file with a registered converter to `.md`.
    Convert { registry: Arc<TransformRegistry> },
    /// Split every `.md` file into a book directory.
    Split(SplitOptions),
}

impl fmt::Debug for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::Convert { registry } => f
                .debug_struct("Convert")
                .field("registry", registry)
                .finish(),
            PipelineMode::Split(opts) => f.debug_tuple("Split").field(opts).finish(),
        }
    }
}

/// Options for the split pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Heading level that starts a new chapter, 1–6. Default: 1.
    pub heading_level: u8,
    /// What to do with files that have no heading at that level. Default: skip.
    pub no_heading_fallback: NoHeadingFallback,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            heading_level: 1,
            no_heading_fallback: NoHeadingFallback::default(),
        }
    }
}

/// Handling of files that yield at most one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoHeadingFallback {
    /// Leave the file out of the destination tree. (default)
    #[default]
    Skip,
    /// Copy it unchanged to `<book dir>.md`.
    Copy,
}

impl FromStr for NoHeadingFallback {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(NoHeadingFallback::Skip),
            "copy" => Ok(NoHeadingFallback::Copy),
            other => Err(BatchError::InvalidConfig(format!(
                "no-heading fallback must be 'skip' or 'copy', got '{other}'"
            ))),
        }
    }
}
