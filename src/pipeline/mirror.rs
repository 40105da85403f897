//! Source → destination path mapping.
//!
//! Pure path arithmetic: no filesystem access, so the same inputs always map
//! to the same destination.
//!
//! Relative paths are unique within a source tree, but the mapping is not
//! injective: `a.pdf` and `a.epub` both convert to `a.md`, and the book
//! directory of `notes.md` is the mirrored directory `notes/` of
//! `notes/x.md`. [`ClaimSet`] detects such overlaps before any work starts,
//! so every item that runs owns its output paths exclusively and workers
//! can write without locking.

use crate::error::ItemError;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix appended to a destination's stem for the failure sidecar.
pub const SIDECAR_SUFFIX: &str = "error.txt";

/// Map `source_path` under `source_root` to the same relative location under
/// `dest_root`.
///
/// `new_extension`:
/// * `Some("md")` replaces the file extension (conversion pipeline)
/// * `None` drops it, leaving the bare stem (split pipeline, where the
///   destination is a book directory named after the file)
///
/// # Errors
/// [`ItemError::OutsideRoot`] when `source_path` is not under `source_root`.
pub fn mirror_path(
    source_root: &Path,
    dest_root: &Path,
    source_path: &Path,
    new_extension: Option<&str>,
) -> Result<PathBuf, ItemError> {
    let relative = source_path
        .strip_prefix(source_root)
        .map_err(|_| ItemError::OutsideRoot {
            path: source_path.to_path_buf(),
            root: source_root.to_path_buf(),
        })?;

    if relative.as_os_str().is_empty() {
        return Err(ItemError::OutsideRoot {
            path: source_path.to_path_buf(),
            root: source_root.to_path_buf(),
        });
    }

    let mut dest = dest_root.join(relative);
    match new_extension {
        Some(ext) => {
            dest.set_extension(ext.trim_start_matches('.'));
        }
        None => {
            dest.set_extension("");
        }
    }
    Ok(dest)
}

/// `path` with `.ext` appended, keeping any dots already in the file name:
/// `dir/v1.2` + `md` → `dir/v1.2.md`.
pub fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext.trim_start_matches('.'));
    PathBuf::from(name)
}

/// Sidecar for a converted file: `dir/name.md` → `dir/name.error.txt`.
pub fn sidecar_path(dest: &Path) -> PathBuf {
    dest.with_extension(SIDECAR_SUFFIX)
}

/// Sidecar for a book directory: `dir/v1.2` → `dir/v1.2.error.txt`.
pub fn book_sidecar_path(book_dir: &Path) -> PathBuf {
    append_extension(book_dir, SIDECAR_SUFFIX)
}

/// Output paths already owned by accepted items.
///
/// A claim conflicts with an owned path when the two are equal or one lies
/// inside the other (a file where another item needs a directory, or a book
/// directory that would contain another item's output).
#[derive(Debug, Default)]
pub struct ClaimSet {
    // owned path → relative path of the owning item
    owned: BTreeMap<PathBuf, PathBuf>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim every path in `paths` for `owner`, or none of them.
    ///
    /// # Errors
    /// `(path, owner)` of the first existing claim that overlaps.
    pub fn try_claim(&mut self, owner: &Path, paths: &[PathBuf]) -> Result<(), (PathBuf, PathBuf)> {
        for path in paths {
            if let Some(conflict) = self.overlapping(path) {
                return Err(conflict);
            }
        }
        for path in paths {
            self.owned.insert(path.clone(), owner.to_path_buf());
        }
        Ok(())
    }

    fn overlapping(&self, path: &Path) -> Option<(PathBuf, PathBuf)> {
        // Equal to, or inside, an owned path.
        for ancestor in path.ancestors() {
            if let Some(owner) = self.owned.get(ancestor) {
                return Some((ancestor.to_path_buf(), owner.clone()));
            }
        }
        // An owned path inside this one. Path ordering is component-wise,
        // so descendants sort directly after `path`.
        self.owned
            .range(path.to_path_buf()..)
            .next()
            .filter(|(owned, _)| owned.starts_with(path))
            .map(|(owned, owner)| (owned.clone(), owner.clone()))
    }
}
