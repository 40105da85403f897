//! Decide whether an item needs (re)processing.
//!
//! Modification times only, no content hashing. A destination whose mtime is
//! equal to or newer than the source's counts as fresh, so repeated no-op
//! runs do no work. Clock adjustments or coarse filesystem timestamps can
//! make this under- or over-skip; `force` is the escape hatch.

use crate::output::DestinationTarget;
use std::path::Path;
use std::time::SystemTime;

/// `true` when the destination must be (re)built.
///
/// * `force` → always
/// * destination missing (`None`) → yes
/// * otherwise only when the source is strictly newer
pub fn needs_processing(
    source_modified: SystemTime,
    dest_modified: Option<SystemTime>,
    force: bool,
) -> bool {
    if force {
        return true;
    }
    match dest_modified {
        None => true,
        Some(dest) => source_modified > dest,
    }
}

/// Read what currently sits at `path`.
///
/// A destination whose metadata or mtime cannot be read is reported as
/// existing without a timestamp, which [`target_needs_processing`] treats
/// as stale.
pub fn inspect(path: &Path) -> DestinationTarget {
    match std::fs::metadata(path) {
        Ok(meta) => DestinationTarget {
            path: path.to_path_buf(),
            exists: true,
            last_modified: meta.modified().ok(),
        },
        Err(_) => DestinationTarget {
            path: path.to_path_buf(),
            exists: false,
            last_modified: None,
        },
    }
}

/// The more recently modified of two alternative destinations.
///
/// A missing target loses to an existing one; between two existing targets
/// the later mtime wins, and an unreadable mtime counts as oldest.
pub fn newest(a: DestinationTarget, b: DestinationTarget) -> DestinationTarget {
    match (a.exists, b.exists) {
        (false, true) => b,
        (true, true) if b.last_modified > a.last_modified => b,
        _ => a,
    }
}

/// [`needs_processing`] over an inspected [`DestinationTarget`].
pub fn target_needs_processing(
    source_modified: SystemTime,
    target: &DestinationTarget,
    force: bool,
) -> bool {
    if !target.exists {
        return true;
    }
    needs_processing(source_modified, target.last_modified, force)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn t(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn target(name: &str, modified: Option<u64>) -> DestinationTarget {
        DestinationTarget {
            path: PathBuf::from(name),
            exists: modified.is_some(),
            last_modified: modified.map(t),
        }
    }

    #[test]
    fn test_newest_prefers_latest_existing_target() {
        assert_eq!(newest(target("dir", Some(5)), target("copy", Some(9))).path, PathBuf::from("copy"));
        assert_eq!(newest(target("dir", Some(9)), target("copy", Some(5))).path, PathBuf::from("dir"));
        assert_eq!(newest(target("dir", None), target("copy", Some(1))).path, PathBuf::from("copy"));
        assert!(!newest(target("dir", None), target("copy", None)).exists);
    }

    #[test]
    fn test_force_always_processes() {
        assert!(needs_processing(t(10), Some(t(20)), true));
        assert!(needs_processing(t(10), None, true));
    }

    #[test]
    fn test_missing_destination_processes() {
        assert!(needs_processing(t(10), None, false));
    }

    #[test]
    fn test_equal_mtime_skips() {
        assert!(!needs_processing(t(10), Some(t(10)), false));
    }

    #[test]
    fn test_older_destination_processes() {
        assert!(needs_processing(t(11), Some(t(10)), false));
    }

    #[test]
    fn test_newer_destination_skips() {
        assert!(!needs_processing(t(10), Some(t(11)), false));
    }

    #[test]
    fn test_inspect_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = inspect(&dir.path().join("absent.md"));
        assert!(!target.exists);
        assert!(target.last_modified.is_none());
        assert!(target_needs_processing(t(0), &target, false));
    }

    #[test]
    fn test_inspect_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present.md");
        std::fs::write(&path, "x").unwrap();
        let target = inspect(&path);
        assert!(target.exists);
        assert!(target.last_modified.is_some());
        // A source from 1970 is older than a file written just now.
        assert!(!target_needs_processing(t(0), &target, false));
    }
}
