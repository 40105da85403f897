//! One item in, one [`ProcessingOutcome`] out.
//!
//! [`ItemProcessor::process`] never returns an error and never panics on
//! bad input: every failure becomes `ProcessingOutcome::Failed`, plus a
//! sidecar `<name>.error.txt` beside the intended destination so failures
//! can be inspected after the run without re-running in verbose mode.
//!
//! The processor holds only immutable, shared state (roots, flags, the
//! converter table), so one instance serves every worker thread at once.

use crate::config::{BatchConfig, PipelineMode, SplitOptions};
use crate::error::ItemError;
use crate::output::{ProcessingOutcome, SkipReason, WorkItem};
use crate::pipeline::mirror::{book_sidecar_path, mirror_path, sidecar_path, ClaimSet};
use crate::pipeline::registry::{Transform, TransformRegistry};
use crate::pipeline::split::{fallback_copy_path, write_book, BookOutcome};
use crate::pipeline::staleness::{newest, inspect, target_needs_processing};
use crate::progress::{SharedObserver, Severity};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Per-file strategy, resolved from [`PipelineMode`].
#[derive(Clone)]
enum Strategy {
    Convert(Arc<TransformRegistry>),
    Split(SplitOptions),
}

/// A work item plus the conflict that bars it from running, if any.
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub item: WorkItem,
    pub conflict: Option<ItemError>,
}

/// Processes single work items against a fixed configuration.
#[derive(Clone)]
pub struct ItemProcessor {
    source_root: PathBuf,
    dest_root: PathBuf,
    force: bool,
    dry_run: bool,
    strategy: Strategy,
    observer: SharedObserver,
}

impl ItemProcessor {
    pub fn new(config: &BatchConfig) -> Self {
        let strategy = match &config.mode {
            PipelineMode::Convert { registry } => Strategy::Convert(Arc::clone(registry)),
            PipelineMode::Split(opts) => Strategy::Split(*opts),
        };
        Self {
            source_root: config.source_root.clone(),
            dest_root: config.dest_root.clone(),
            force: config.force,
            dry_run: config.dry_run,
            strategy,
            observer: Arc::clone(&config.observer),
        }
    }

    /// Destination for `item`: `<dest>/<rel>.md` when converting,
    /// `<dest>/<rel minus extension>` (a book directory) when splitting.
    pub fn destination(&self, item: &WorkItem) -> Result<PathBuf, ItemError> {
        let ext = match self.strategy {
            Strategy::Convert(_) => Some("md"),
            Strategy::Split(_) => None,
        };
        mirror_path(&self.source_root, &self.dest_root, &item.source_path, ext)
    }

    /// Every path the item may write: its output(s) and its sidecar.
    pub fn claimed_paths(&self, item: &WorkItem) -> Result<Vec<PathBuf>, ItemError> {
        let dest = self.destination(item)?;
        Ok(match self.strategy {
            Strategy::Convert(_) => vec![sidecar_path(&dest), dest],
            Strategy::Split(_) => vec![
                fallback_copy_path(&dest),
                book_sidecar_path(&dest),
                dest,
            ],
        })
    }

    /// Pair each item with the reason it must not run, if any.
    ///
    /// Items are checked in order; the first item to claim a path keeps it,
    /// and any later item whose paths equal or nest with it is rejected with
    /// [`ItemError::DestinationConflict`]. The outcome depends only on the
    /// (sorted) item order, never on worker scheduling.
    pub fn plan(&self, items: Vec<WorkItem>) -> Vec<PlannedItem> {
        let mut claims = ClaimSet::new();
        items
            .into_iter()
            .map(|item| {
                let conflict = match self.claimed_paths(&item) {
                    Ok(paths) => claims
                        .try_claim(&item.relative_path, &paths)
                        .err()
                        .map(|(path, owner)| ItemError::DestinationConflict { path, owner }),
                    // Reported by `process` itself.
                    Err(_) => None,
                };
                PlannedItem { item, conflict }
            })
            .collect()
    }

    /// Run a planned item: reject it on conflict, otherwise [`Self::process`].
    pub fn run(&self, planned: &PlannedItem) -> ProcessingOutcome {
        match &planned.conflict {
            Some(error) => {
                self.log(
                    Severity::Error,
                    format!(
                        "Failed to process {}: {error}",
                        planned.item.relative_path.display()
                    ),
                );
                // The sidecar location may itself belong to the other item.
                ProcessingOutcome::Failed {
                    error: error.clone(),
                    error_artifact: None,
                }
            }
            None => self.process(&planned.item),
        }
    }

    /// Process one item to completion.
    pub fn process(&self, item: &WorkItem) -> ProcessingOutcome {
        let rel = item.relative_path.display();

        let dest = match self.destination(item) {
            Ok(d) => d,
            Err(e) => {
                self.log(Severity::Error, format!("Failed {rel}: {e}"));
                // No valid destination means nowhere sensible for a sidecar.
                return ProcessingOutcome::Failed {
                    error: e,
                    error_artifact: None,
                };
            }
        };

        let source_modified = match std::fs::metadata(&item.source_path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => return self.fail(item, &dest, ItemError::io(&item.source_path, e)),
        };

        if !self.is_stale(source_modified, &dest) {
            self.log(Severity::Debug, format!("Skipping (already up-to-date): {rel}"));
            return ProcessingOutcome::Skipped {
                reason: SkipReason::UpToDate,
            };
        }

        let outcome = match &self.strategy {
            Strategy::Convert(registry) => self.convert(item, &dest, registry),
            Strategy::Split(opts) => self.split(item, &dest, opts),
        };

        if outcome.is_converted() && !self.dry_run {
            // A success supersedes the diagnostic from an earlier failed run.
            let _ = std::fs::remove_file(self.sidecar(&dest));
        }
        outcome
    }

    fn is_stale(&self, source_modified: SystemTime, dest: &Path) -> bool {
        if self.force {
            return true;
        }
        let target = match self.strategy {
            Strategy::Convert(_) => inspect(dest),
            // A book is a directory or, after the copy fallback, one file;
            // whichever was written last reflects the latest run.
            Strategy::Split(_) => newest(inspect(dest), inspect(&fallback_copy_path(dest))),
        };
        target_needs_processing(source_modified, &target, false)
    }

    fn convert(&self, item: &WorkItem, dest: &Path, registry: &TransformRegistry) -> ProcessingOutcome {
        let rel = item.relative_path.display();
        let discriminator = item
            .source_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let transform = match registry.lookup(&discriminator) {
            Ok(t) => t,
            Err(_) => {
                self.log(
                    Severity::Warning,
                    format!("No converter found for .{discriminator}, skipping: {rel}"),
                );
                return ProcessingOutcome::Skipped {
                    reason: SkipReason::NoStrategy { discriminator },
                };
            }
        };

        if self.dry_run {
            self.log(
                Severity::Info,
                format!("[DRY-RUN] would convert: {rel} -> {}", dest.display()),
            );
            return ProcessingOutcome::Converted {
                destination: dest.to_path_buf(),
            };
        }

        if let Err(e) = ensure_parent(dest) {
            return self.fail(item, dest, e);
        }

        self.log(
            Severity::Info,
            format!("Converting: {rel} -> {}", self.display_dest(dest)),
        );
        match run_staged(transform.as_ref(), &item.source_path, dest) {
            Ok(()) => {
                self.log(Severity::Debug, format!("Successfully converted: {rel}"));
                ProcessingOutcome::Converted {
                    destination: dest.to_path_buf(),
                }
            }
            Err(e) => self.fail(item, dest, e),
        }
    }

    fn split(&self, item: &WorkItem, book_dir: &Path, opts: &SplitOptions) -> ProcessingOutcome {
        let rel = item.relative_path.display();

        if !self.dry_run {
            if let Err(e) = ensure_parent(book_dir) {
                return self.fail(item, book_dir, e);
            }
        }

        match write_book(&item.source_path, book_dir, opts, self.dry_run) {
            Ok(BookOutcome::Split { book_dir, chapters }) => {
                let prefix = if self.dry_run { "[DRY-RUN] would split" } else { "Processed" };
                self.log(Severity::Info, format!("{prefix} {rel} ({chapters} chapters)"));
                ProcessingOutcome::Converted {
                    destination: book_dir,
                }
            }
            Ok(BookOutcome::Copied { destination }) => {
                let prefix = if self.dry_run { "[DRY-RUN] would copy" } else { "Copied" };
                self.log(Severity::Info, format!("{prefix} (no headings): {rel}"));
                ProcessingOutcome::Converted { destination }
            }
            Ok(BookOutcome::NotSplittable) => {
                self.log(Severity::Info, format!("Skipped (no headings): {rel}"));
                ProcessingOutcome::Skipped {
                    reason: SkipReason::NoHeadings,
                }
            }
            Err(e) => self.fail(item, book_dir, e),
        }
    }

    /// Record a failure: log it, write the sidecar (unless dry-run), build the outcome.
    fn fail(&self, item: &WorkItem, dest: &Path, error: ItemError) -> ProcessingOutcome {
        self.log(
            Severity::Error,
            format!("Failed to process {}: {error}", item.relative_path.display()),
        );

        let error_artifact = if self.dry_run {
            None
        } else {
            let sidecar = self.sidecar(dest);
            match write_sidecar(&sidecar, &item.source_path, &error) {
                Ok(()) => Some(sidecar),
                Err(e) => {
                    self.log(
                        Severity::Error,
                        format!("Could not write error file {}: {e}", sidecar.display()),
                    );
                    None
                }
            }
        };

        ProcessingOutcome::Failed {
            error,
            error_artifact,
        }
    }

    fn sidecar(&self, dest: &Path) -> PathBuf {
        match self.strategy {
            Strategy::Convert(_) => sidecar_path(dest),
            Strategy::Split(_) => book_sidecar_path(dest),
        }
    }

    fn display_dest(&self, dest: &Path) -> String {
        dest.strip_prefix(&self.dest_root)
            .unwrap_or(dest)
            .display()
            .to_string()
    }

    fn log(&self, severity: Severity, message: String) {
        self.observer.on_event(severity, &message);
    }
}

/// Create `path`'s parent directory. Racing workers are fine:
/// `create_dir_all` succeeds when the directory already exists.
fn ensure_parent(path: &Path) -> Result<(), ItemError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| ItemError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Run `transform` into a temp file beside `dest`, then move it into place.
/// The temp file is removed on failure, so a failed item leaves no partial
/// destination behind.
fn run_staged(transform: &dyn Transform, src: &Path, dest: &Path) -> Result<(), ItemError> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let suffix = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let staged = tempfile::Builder::new()
        .prefix(".doc2md-")
        .suffix(&suffix)
        .tempfile_in(parent)
        .map_err(|e| ItemError::io(parent, e))?;

    transform.transform(src, staged.path())?;

    staged
        .persist(dest)
        .map_err(|e| ItemError::io(dest, e.error))?;
    Ok(())
}

fn write_sidecar(sidecar: &Path, source: &Path, error: &ItemError) -> std::io::Result<()> {
    if let Some(parent) = sidecar.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        sidecar,
        format!("Failed to process {}:\n\n{error}\n", source.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoHeadingFallback;
    use crate::error::ConversionError;
    use crate::pipeline::registry::{CopyTransform, DocumentKind};
    use crate::progress::NoopObserver;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        src: PathBuf,
        dst: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        Fixture { _dir: dir, src, dst }
    }

    fn item(fx: &Fixture, rel: &str, content: &str) -> WorkItem {
        let source_path = fx.src.join(rel);
        fs::create_dir_all(source_path.parent().unwrap()).unwrap();
        fs::write(&source_path, content).unwrap();
        WorkItem {
            source_path,
            relative_path: PathBuf::from(rel),
        }
    }

    fn failing(_: &Path, _: &Path) -> Result<(), ConversionError> {
        Err(ConversionError::Other("converter exploded".into()))
    }

    fn converter(fx: &Fixture, registry: TransformRegistry) -> ItemProcessor {
        let config = BatchConfig::builder(&fx.src, &fx.dst)
            .convert_with(Arc::new(registry))
            .observer(Arc::new(NoopObserver))
            .build()
            .unwrap();
        ItemProcessor::new(&config)
    }

    fn copy_registry() -> TransformRegistry {
        TransformRegistry::new().register(DocumentKind::Txt, Arc::new(CopyTransform))
    }

    #[test]
    fn test_convert_writes_mirrored_md() {
        let fx = fixture();
        let it = item(&fx, "deep/notes.txt", "hello");
        let outcome = converter(&fx, copy_registry()).process(&it);

        let dest = fx.dst.join("deep/notes.md");
        assert!(matches!(&outcome, ProcessingOutcome::Converted { destination } if *destination == dest));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "hello");
        // No staging leftovers.
        assert_eq!(fs::read_dir(fx.dst.join("deep")).unwrap().count(), 1);
    }

    #[test]
    fn test_second_run_is_up_to_date() {
        let fx = fixture();
        let it = item(&fx, "a.txt", "x");
        let p = converter(&fx, copy_registry());
        assert!(p.process(&it).is_converted());
        assert!(matches!(
            p.process(&it),
            ProcessingOutcome::Skipped {
                reason: SkipReason::UpToDate
            }
        ));
    }

    #[test]
    fn test_newer_source_is_reprocessed() {
        let fx = fixture();
        let it = item(&fx, "a.txt", "v1");
        let p = converter(&fx, copy_registry());
        p.process(&it);

        fs::write(&it.source_path, "v2").unwrap();
        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options()
            .write(true)
            .open(&it.source_path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert!(p.process(&it).is_converted());
        assert_eq!(fs::read_to_string(fx.dst.join("a.md")).unwrap(), "v2");
    }

    #[test]
    fn test_unknown_kind_is_skipped() {
        let fx = fixture();
        let it = item(&fx, "a.pdf", "%PDF");
        match converter(&fx, copy_registry()).process(&it) {
            ProcessingOutcome::Skipped {
                reason: SkipReason::NoStrategy { discriminator },
            } => assert_eq!(discriminator, "pdf"),
            other => panic!("expected NoStrategy skip, got {other:?}"),
        }
        assert!(!fx.dst.join("a.md").exists());
    }

    #[test]
    fn test_failure_writes_sidecar_and_no_output() {
        let fx = fixture();
        let it = item(&fx, "sub/bad.txt", "x");
        let registry = TransformRegistry::new().register(DocumentKind::Txt, Arc::new(failing));
        let outcome = converter(&fx, registry).process(&it);

        let sidecar = fx.dst.join("sub/bad.error.txt");
        match outcome {
            ProcessingOutcome::Failed {
                error,
                error_artifact,
            } => {
                assert!(error.to_string().contains("converter exploded"));
                assert_eq!(error_artifact, Some(sidecar.clone()));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        let text = fs::read_to_string(&sidecar).unwrap();
        assert!(text.contains("bad.txt"));
        assert!(text.contains("converter exploded"));
        assert!(!fx.dst.join("sub/bad.md").exists());
        assert_eq!(fs::read_dir(fx.dst.join("sub")).unwrap().count(), 1);
    }

    #[test]
    fn test_success_clears_old_sidecar() {
        let fx = fixture();
        let it = item(&fx, "a.txt", "x");
        fs::create_dir_all(&fx.dst).unwrap();
        fs::write(fx.dst.join("a.error.txt"), "old failure").unwrap();

        assert!(converter(&fx, copy_registry()).process(&it).is_converted());
        assert!(!fx.dst.join("a.error.txt").exists());
    }

    #[test]
    fn test_outside_root_fails_without_sidecar() {
        let fx = fixture();
        let stray = WorkItem {
            source_path: PathBuf::from("/somewhere/else.txt"),
            relative_path: PathBuf::from("else.txt"),
        };
        match converter(&fx, copy_registry()).process(&stray) {
            ProcessingOutcome::Failed {
                error: ItemError::OutsideRoot { .. },
                error_artifact: None,
            } => {}
            other => panic!("expected OutsideRoot, got {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let fx = fixture();
        let it = item(&fx, "x/a.txt", "x");
        let config = BatchConfig::builder(&fx.src, &fx.dst)
            .convert_with(Arc::new(copy_registry()))
            .observer(Arc::new(NoopObserver))
            .dry_run(true)
            .build()
            .unwrap();
        assert!(ItemProcessor::new(&config).process(&it).is_converted());
        assert!(!fx.dst.exists());
    }

    #[test]
    fn test_split_book_then_up_to_date() {
        let fx = fixture();
        let it = item(&fx, "vol/one.md", "# A\na\n# B\nb\n");
        let config = BatchConfig::builder(&fx.src, &fx.dst)
            .split(SplitOptions::default())
            .observer(Arc::new(NoopObserver))
            .build()
            .unwrap();
        let p = ItemProcessor::new(&config);

        let book = fx.dst.join("vol/one");
        assert!(matches!(p.process(&it), ProcessingOutcome::Converted { destination } if destination == book));
        assert!(book.join("ch00_a.md").exists());
        assert!(p.process(&it).is_skipped());
    }

    #[test]
    fn test_split_copy_fallback_is_up_to_date_on_rerun() {
        let fx = fixture();
        let it = item(&fx, "flat.md", "just text");
        let config = BatchConfig::builder(&fx.src, &fx.dst)
            .split(SplitOptions {
                heading_level: 1,
                no_heading_fallback: NoHeadingFallback::Copy,
            })
            .observer(Arc::new(NoopObserver))
            .build()
            .unwrap();
        let p = ItemProcessor::new(&config);

        assert!(p.process(&it).is_converted());
        assert_eq!(fs::read_to_string(fx.dst.join("flat.md")).unwrap(), "just text");
        assert!(matches!(
            p.process(&it),
            ProcessingOutcome::Skipped {
                reason: SkipReason::UpToDate
            }
        ));
    }

    #[test]
    fn test_plan_rejects_later_claim_on_same_output() {
        let fx = fixture();
        let registry = copy_registry().register(DocumentKind::Pdf, Arc::new(CopyTransform));
        let p = converter(&fx, registry);
        let first = item(&fx, "a.pdf", "pdf");
        let second = item(&fx, "a.txt", "txt");
        let other = item(&fx, "b.txt", "b");

        let planned = p.plan(vec![first, second, other]);
        assert!(planned[0].conflict.is_none());
        assert!(planned[2].conflict.is_none());
        match &planned[1].conflict {
            Some(ItemError::DestinationConflict { owner, .. }) => {
                assert_eq!(owner, Path::new("a.pdf"))
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        // The rejected item neither converts nor writes a sidecar.
        assert!(matches!(
            p.run(&planned[1]),
            ProcessingOutcome::Failed {
                error: ItemError::DestinationConflict { .. },
                error_artifact: None,
            }
        ));
        assert!(!fx.dst.exists());
        assert!(p.run(&planned[0]).is_converted());
        assert_eq!(fs::read_to_string(fx.dst.join("a.md")).unwrap(), "pdf");
    }

    #[test]
    fn test_plan_rejects_book_around_another_book() {
        let fx = fixture();
        let config = BatchConfig::builder(&fx.src, &fx.dst)
            .split(SplitOptions::default())
            .observer(Arc::new(NoopObserver))
            .build()
            .unwrap();
        let p = ItemProcessor::new(&config);
        let inner = item(&fx, "notes/x.md", "# A\na\n# B\nb\n");
        let outer = item(&fx, "notes.md", "# C\nc\n# D\nd\n");

        let planned = p.plan(vec![inner, outer]);
        assert!(planned[0].conflict.is_none());
        assert!(matches!(
            &planned[1].conflict,
            Some(ItemError::DestinationConflict { owner, .. }) if owner == Path::new("notes/x.md")
        ));
    }
}
