//! Ignore filtering and order-preserving deduplication of resolved files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Files and directories excluded from a run.
///
/// A directory entry excludes everything beneath it at any depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    files: HashSet<PathBuf>,
    dirs: Vec<PathBuf>,
}

impl IgnoreSet {
    pub fn add_file(&mut self, path: PathBuf) {
        self.files.insert(path);
    }

    pub fn add_dir(&mut self, path: PathBuf) {
        if !self.dirs.contains(&path) {
            self.dirs.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    /// True if `path` is an ignored file or lies under an ignored directory.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.files.contains(path) || self.dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Drop ignored candidates and repeats, keeping first-seen order.
pub fn filter_candidates(candidates: Vec<PathBuf>, ignore: &IgnoreSet) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|path| !ignore.is_ignored(path))
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let out = filter_candidates(
            paths(&["/r/b", "/r/a", "/r/b", "/r/c", "/r/a"]),
            &IgnoreSet::default(),
        );
        assert_eq!(out, paths(&["/r/b", "/r/a", "/r/c"]));
    }

    #[test]
    fn ignored_dirs_exclude_all_descendants() {
        let mut ignore = IgnoreSet::default();
        ignore.add_dir(PathBuf::from("/r/sub"));
        let out = filter_candidates(
            paths(&["/r/a", "/r/sub/x", "/r/sub/deep/y", "/r/subway/z"]),
            &ignore,
        );
        assert_eq!(out, paths(&["/r/a", "/r/subway/z"]));
    }

    #[test]
    fn ignored_files_match_exactly() {
        let mut ignore = IgnoreSet::default();
        ignore.add_file(PathBuf::from("/r/a"));
        assert!(ignore.is_ignored(Path::new("/r/a")));
        assert!(!ignore.is_ignored(Path::new("/r/a.md")));
    }
}
