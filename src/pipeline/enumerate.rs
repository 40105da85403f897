//! Source-tree enumeration.
//!
//! The whole tree is walked up front and returned as a sorted `Vec`, so a
//! batch has a known total before the first item starts and the item order
//! (and therefore the report order) does not depend on directory listing
//! order.

use crate::error::BatchError;
use crate::output::WorkItem;
use std::path::Path;
use walkdir::WalkDir;

/// Every regular file under `root` accepted by `eligible`, sorted by path.
///
/// Anything under `exclude` (typically the destination root, when it lives
/// inside the source tree) is left out so a batch never feeds on its own
/// output. Symlinks are followed; an entry that cannot be read (dangling
/// link, link loop, unreadable subdirectory) is reported to `on_skip` with
/// its path and the reason, and the walk goes on.
///
/// # Errors
/// [`BatchError::Walk`] only if `root` itself cannot be read.
pub fn enumerate_items<P, S>(
    root: &Path,
    exclude: Option<&Path>,
    eligible: P,
    mut on_skip: S,
) -> Result<Vec<WorkItem>, BatchError>
where
    P: Fn(&Path) -> bool,
    S: FnMut(&Path, &str),
{
    let mut items = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| exclude.is_none_or(|ex| e.path() != ex));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(BatchError::Walk {
                    path: e.path().unwrap_or(root).to_path_buf(),
                    detail: e.to_string(),
                })
            }
            Err(e) => {
                on_skip(e.path().unwrap_or(root), &e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() || !eligible(entry.path()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| BatchError::Internal(format!("walked outside root: {e}")))?;
        items.push(WorkItem {
            source_path: entry.path().to_path_buf(),
            relative_path: relative.to_path_buf(),
        });
    }

    items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(items)
}

/// `true` for `*.md` files (case-insensitive).
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn no_skips(path: &Path, reason: &str) {
        panic!("unexpected skip of {}: {reason}", path.display());
    }

    fn rels(items: &[WorkItem]) -> Vec<PathBuf> {
        items.iter().map(|i| i.relative_path.clone()).collect()
    }

    #[test]
    fn test_recursive_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.md"));
        touch(&root.join("a/z.md"));
        touch(&root.join("a/y.txt"));
        touch(&root.join("A.MD"));

        let items = enumerate_items(root, None, is_markdown, no_skips).unwrap();
        assert_eq!(
            rels(&items),
            vec![
                PathBuf::from("A.MD"),
                PathBuf::from("a/z.md"),
                PathBuf::from("b.md")
            ]
        );
        assert_eq!(items[1].source_path, root.join("a/z.md"));
    }

    #[test]
    fn test_excludes_nested_destination() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("keep.md"));
        touch(&root.join("out/keep/ch00_x.md"));

        let items = enumerate_items(root, Some(&root.join("out")), is_markdown, no_skips).unwrap();
        assert_eq!(rels(&items), vec![PathBuf::from("keep.md")]);
    }

    #[test]
    fn test_directories_never_items() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("folder.md")).unwrap();
        let items = enumerate_items(dir.path(), None, |_| true, no_skips).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_missing_root_is_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = enumerate_items(&dir.path().join("nope"), None, |_| true, no_skips).unwrap_err();
        assert!(matches!(err, BatchError::Walk { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("good.md"));
        std::os::unix::fs::symlink(root.join("gone.md"), root.join("dangling.md")).unwrap();

        let mut skipped = Vec::new();
        let items = enumerate_items(root, None, is_markdown, |p, _| {
            skipped.push(p.to_path_buf())
        })
        .unwrap();
        assert_eq!(rels(&items), vec![PathBuf::from("good.md")]);
        assert_eq!(skipped, vec![root.join("dangling.md")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("sub/a.md"));
        std::os::unix::fs::symlink(root.join("sub"), root.join("sub/again")).unwrap();

        let mut skips = 0;
        let items = enumerate_items(root, None, is_markdown, |_, _| skips += 1).unwrap();
        assert_eq!(rels(&items), vec![PathBuf::from("sub/a.md")]);
        assert_eq!(skips, 1);
    }

    #[test]
    fn test_is_markdown() {
        assert!(is_markdown(Path::new("a/b.md")));
        assert!(is_markdown(Path::new("B.Md")));
        assert!(!is_markdown(Path::new("b.markdown")));
        assert!(!is_markdown(Path::new("md")));
    }
}
