//! Heading-based splitting of Markdown into chapter "books".
//!
//! [`split_markdown`] is pure text-in/segments-out. [`write_book`] turns the
//! segments of one file into a directory of ordered chapter files, or applies
//! the [`NoHeadingFallback`] when the file cannot be split.
//!
//! ## Boundary rule
//!
//! Only headings at exactly the configured level split: with `level = 2`,
//! `## Part` is a boundary while `# Title` and `### Detail` stay inside the
//! surrounding chapter. The marker must be followed by a space or tab and a
//! non-empty title, so `#hashtag` and a bare `#` are ordinary text.

use crate::config::{NoHeadingFallback, SplitOptions};
use crate::error::ItemError;
use crate::pipeline::mirror::append_extension;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Title of the segment holding text before the first heading.
pub const PROLOGUE_TITLE: &str = "prologue";

/// Longest sanitized title kept in a chapter filename.
pub const MAX_TITLE_LEN: usize = 80;

/// One chapter of a split document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub title: String,
    /// Trimmed chapter text. Non-prologue bodies start with their heading line.
    pub body: String,
}

impl Segment {
    pub fn is_prologue(&self) -> bool {
        self.title == PROLOGUE_TITLE
    }
}

// One compiled pattern per heading level (index 0 = level 1).
static HEADING_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    (1..=6)
        .map(|level| {
            Regex::new(&format!(r"(?m)^#{{{level}}}[ \t]+(\S.*?)[ \t]*\r?$"))
                .expect("heading pattern is valid")
        })
        .collect()
});

static RE_INVALID_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9._-]+").expect("filename pattern is valid"));

/// Split `text` at headings of exactly `level` (1–6, clamped).
///
/// Returns segments in document order:
/// 1. `"prologue"` for text before the first heading, if it is not blank
/// 2. one segment per heading, running up to the next heading
///
/// Every body is trimmed; blank segments are dropped. A document with no
/// matching heading comes back as a single prologue (or nothing at all when
/// the text is blank).
pub fn split_markdown(text: &str, level: u8) -> Vec<Segment> {
    let level = level.clamp(1, 6);
    let re = &HEADING_RES[usize::from(level) - 1];
    let marker = "#".repeat(usize::from(level));

    let mut segments = Vec::new();
    let mut last_pos = 0;
    // None while still in the prologue.
    let mut heading: Option<String> = None;

    for caps in re.captures_iter(text) {
        let start = caps.get(0).map_or(last_pos, |m| m.start());
        push_segment(&mut segments, heading.as_deref(), &text[last_pos..start], &marker);
        heading = Some(caps[1].trim().to_string());
        last_pos = start;
    }
    push_segment(&mut segments, heading.as_deref(), &text[last_pos..], &marker);

    segments
}

fn push_segment(segments: &mut Vec<Segment>, heading: Option<&str>, chunk: &str, marker: &str) {
    let body = chunk.trim();
    if body.is_empty() {
        return;
    }
    let segment = match heading {
        None => Segment {
            title: PROLOGUE_TITLE.to_string(),
            body: body.to_string(),
        },
        Some(title) if starts_with_heading(body, marker) => Segment {
            title: title.to_string(),
            body: body.to_string(),
        },
        Some(title) => Segment {
            title: title.to_string(),
            body: format!("{marker} {title}\n\n{body}"),
        },
    };
    segments.push(segment);
}

fn starts_with_heading(body: &str, marker: &str) -> bool {
    body.strip_prefix(marker)
        .is_some_and(|rest| rest.starts_with([' ', '\t']))
}

/// Filename-safe form of a heading title.
///
/// Lower-cased; every run of characters outside `[a-z0-9._-]` becomes a
/// single `_`; leading/trailing `_` removed; capped at [`MAX_TITLE_LEN`].
/// An empty result becomes `"untitled"`.
pub fn sanitize_filename(name: &str) -> String {
    let lower = name.to_lowercase();
    let clean = RE_INVALID_FILENAME_CHARS.replace_all(&lower, "_");
    let clean = clean.trim_matches('_');
    // Only ASCII survives the substitution, so byte slicing is safe.
    let capped = &clean[..clean.len().min(MAX_TITLE_LEN)];
    if capped.is_empty() {
        "untitled".to_string()
    } else {
        capped.to_string()
    }
}

/// Chapter filename: zero-padded index, then the sanitized title.
///
/// The index prefix keeps names unique even when titles sanitize alike, and
/// makes lexical order match document order.
pub fn chapter_file_name(index: usize, title: &str, total: usize) -> String {
    let width = digits(total.saturating_sub(1)).max(2);
    format!("ch{index:0width$}_{}.md", sanitize_filename(title))
}

fn digits(mut n: usize) -> usize {
    let mut d = 1;
    while n >= 10 {
        n /= 10;
        d += 1;
    }
    d
}

/// What [`write_book`] did (or would do, in dry-run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookOutcome {
    /// A book directory with this many chapters.
    Split { book_dir: PathBuf, chapters: usize },
    /// The source had no usable headings and was copied unchanged.
    Copied { destination: PathBuf },
    /// The source had no usable headings and was left alone.
    NotSplittable,
}

/// Destination of the `copy` fallback for the book directory `book_dir`:
/// `dir/v1.2` → `dir/v1.2.md`.
pub fn fallback_copy_path(book_dir: &Path) -> PathBuf {
    append_extension(book_dir, "md")
}

/// Split `source` and materialise it at `book_dir`.
///
/// Chapters are first written into a temporary directory next to
/// `book_dir`, which then replaces any previous book in one rename. A
/// failure part-way leaves the old book (if any) untouched. With
/// `dry_run` nothing is written.
///
/// Whatever shape the output takes, the artifacts of the other shapes left
/// by earlier runs are removed: a fallback copy replaces an old book
/// directory, a book replaces an old copy, and an unsplittable source under
/// `skip` leaves neither.
pub fn write_book(
    source: &Path,
    book_dir: &Path,
    options: &SplitOptions,
    dry_run: bool,
) -> Result<BookOutcome, ItemError> {
    let bytes = std::fs::read(source).map_err(|e| ItemError::io(source, e))?;
    let text = String::from_utf8_lossy(&bytes);
    let segments = split_markdown(&text, options.heading_level);

    let copy_path = fallback_copy_path(book_dir);

    if segments.len() <= 1 {
        return match options.no_heading_fallback {
            NoHeadingFallback::Skip => {
                if !dry_run {
                    remove_book_dir(book_dir)?;
                    remove_file_if_exists(&copy_path)?;
                }
                Ok(BookOutcome::NotSplittable)
            }
            NoHeadingFallback::Copy => {
                if !dry_run {
                    write_staged(&copy_path, &bytes)?;
                    remove_book_dir(book_dir)?;
                }
                Ok(BookOutcome::Copied {
                    destination: copy_path,
                })
            }
        };
    }

    if dry_run {
        return Ok(BookOutcome::Split {
            book_dir: book_dir.to_path_buf(),
            chapters: segments.len(),
        });
    }

    let parent = book_dir.parent().unwrap_or_else(|| Path::new("."));
    let staging = tempfile::Builder::new()
        .prefix(".doc2md-book-")
        .tempdir_in(parent)
        .map_err(|e| ItemError::io(parent, e))?;

    let total = segments.len();
    for (idx, seg) in segments.iter().enumerate() {
        let path = staging.path().join(chapter_file_name(idx, &seg.title, total));
        std::fs::write(&path, format!("{}\n", seg.body)).map_err(|e| ItemError::io(&path, e))?;
    }

    remove_book_dir(book_dir)?;
    let staged = staging.keep();
    std::fs::rename(&staged, book_dir).map_err(|e| {
        let _ = std::fs::remove_dir_all(&staged);
        ItemError::io(book_dir, e)
    })?;
    remove_file_if_exists(&copy_path)?;

    Ok(BookOutcome::Split {
        book_dir: book_dir.to_path_buf(),
        chapters: total,
    })
}

/// Remove a previous book. The batch plan guarantees `book_dir` holds no
/// other item's output.
fn remove_book_dir(book_dir: &Path) -> Result<(), ItemError> {
    match std::fs::remove_dir_all(book_dir) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(ItemError::io(book_dir, e)),
        _ => Ok(()),
    }
}

fn remove_file_if_exists(path: &Path) -> Result<(), ItemError> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(ItemError::io(path, e)),
        _ => Ok(()),
    }
}

/// Write `bytes` to a temp file beside `destination`, then move it into place.
fn write_staged(destination: &Path, bytes: &[u8]) -> Result<(), ItemError> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| ItemError::io(parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| ItemError::io(destination, e))?;
    tmp.persist(destination)
        .map_err(|e| ItemError::io(destination, e.error))?;
    Ok(())
}
