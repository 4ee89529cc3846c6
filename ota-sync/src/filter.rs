//! Inclusion rules shared by the local and remote manifest collectors.

use std::collections::BTreeSet;

use ota_core::{OtaConfig, RelativePath};

/// Ignore prefixes plus an optional exact-match allow list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    ignore: Vec<RelativePath>,
    allow: BTreeSet<RelativePath>,
}

impl PathFilter {
    /// Root entries are dropped from both lists: an ignore entry of `/` would
    /// otherwise exclude everything.
    pub fn new(
        ignore: impl IntoIterator<Item = RelativePath>,
        allow: impl IntoIterator<Item = RelativePath>,
    ) -> Self {
        Self {
            ignore: ignore.into_iter().filter(|p| !p.is_root()).collect(),
            allow: allow.into_iter().filter(|p| !p.is_root()).collect(),
        }
    }

    pub fn from_config(config: &OtaConfig) -> Self {
        Self::new(config.ignore_paths(), config.scope())
    }

    pub fn included(&self, path: &RelativePath) -> bool {
        included(path, &self.ignore, &self.allow)
    }

    /// Whether a directory may hold included entries, i.e. whether a walk
    /// must descend into it. Ignored directories can be pruned whole.
    pub fn may_contain(&self, dir: &RelativePath) -> bool {
        !self.ignore.iter().any(|prefix| dir.starts_with(prefix))
    }
}

/// Decide whether `path` takes part in reconciliation.
///
/// The root is never included. A non-empty `allow` set requires exact
/// membership. Any `ignore` entry that is a segment prefix of `path`
/// excludes it.
pub fn included(
    path: &RelativePath,
    ignore: &[RelativePath],
    allow: &BTreeSet<RelativePath>,
) -> bool {
    if path.is_root() {
        return false;
    }
    if !allow.is_empty() && !allow.contains(path) {
        return false;
    }
    !ignore
        .iter()
        .filter(|prefix| !prefix.is_root())
        .any(|prefix| path.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<RelativePath> {
        raw.iter().map(|s| RelativePath::new(s)).collect()
    }

    #[test]
    fn root_is_always_excluded() {
        let filter = PathFilter::default();
        assert!(!filter.included(&RelativePath::root()));
        assert!(!filter.included(&RelativePath::new("/")));
    }

    #[test]
    fn ignore_prefix_matches_segments_not_substrings() {
        let filter = PathFilter::new(paths(&["lib"]), []);
        assert!(!filter.included(&RelativePath::new("lib")));
        assert!(!filter.included(&RelativePath::new("lib/ota.py")));
        assert!(filter.included(&RelativePath::new("lib2/ota.py")));
        assert!(filter.included(&RelativePath::new("libs")));
    }

    #[test]
    fn ignore_entry_for_single_file() {
        let filter = PathFilter::new(paths(&["/lib/ota.py"]), []);
        assert!(!filter.included(&RelativePath::new("lib/ota.py")));
        assert!(filter.included(&RelativePath::new("lib/other.py")));
        assert!(filter.included(&RelativePath::new("lib")));
    }

    #[test]
    fn allow_list_is_exact_match() {
        let filter = PathFilter::new([], paths(&["lib", "main.py"]));
        assert!(filter.included(&RelativePath::new("lib")));
        assert!(filter.included(&RelativePath::new("main.py")));
        assert!(
            !filter.included(&RelativePath::new("lib/a.py")),
            "allow entries are not prefixes"
        );
        assert!(!filter.included(&RelativePath::new("boot.py")));
    }

    #[test]
    fn ignore_narrows_within_allow() {
        let filter = PathFilter::new(paths(&["main.py"]), paths(&["main.py", "boot.py"]));
        assert!(!filter.included(&RelativePath::new("main.py")));
        assert!(filter.included(&RelativePath::new("boot.py")));
    }

    #[test]
    fn root_ignore_entry_is_dropped() {
        let filter = PathFilter::new(paths(&["/", ""]), []);
        assert!(filter.may_contain(&RelativePath::new("lib")));
        assert!(filter.included(&RelativePath::new("main.py")));
    }

    #[test]
    fn may_contain_prunes_ignored_dirs_only() {
        let filter = PathFilter::new(paths(&["lib/vendor"]), []);
        assert!(filter.may_contain(&RelativePath::new("lib")));
        assert!(!filter.may_contain(&RelativePath::new("lib/vendor")));
        assert!(!filter.may_contain(&RelativePath::new("lib/vendor/deep")));
    }
}
