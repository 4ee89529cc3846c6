//! Domain types shared by the manifest collector, the reconciliation engine
//! and the applier.
//!
//! Relative paths are always `/`-separated strings; conversion to a platform
//! path happens only at the filesystem boundary via [`RelativePath::to_path`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A normalized path relative to the local root (and, equivalently, to the
/// remote root).
///
/// Normalization treats `\` as `/`, drops empty and `.` segments and strips
/// leading/trailing separators. The root itself normalizes to the empty path.
/// A `..` segment cancels the segment before it and is dropped at the root,
/// so a `RelativePath` never resolves outside the directory it is joined to.
/// Untrusted input should be screened with [`RelativePath::has_parent_ref`]
/// first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    pub fn new(raw: &str) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for seg in raw.split(['/', '\\']) {
            match seg {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                seg => segments.push(seg),
            }
        }
        Self(segments.join("/"))
    }

    /// Whether `raw` contains a `..` segment.
    pub fn has_parent_ref(raw: &str) -> bool {
        raw.split(['/', '\\']).any(|seg| seg == "..")
    }

    /// The empty path, i.e. the root itself.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Segment-aware prefix test: `lib/a.py` starts with `lib`, `lib2/a.py`
    /// does not. Every path starts with the root.
    pub fn starts_with(&self, prefix: &RelativePath) -> bool {
        if prefix.is_root() {
            return true;
        }
        match self.0.strip_prefix(prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }

    /// Remove a segment prefix. Returns `None` when `prefix` is not a prefix.
    pub fn strip_prefix(&self, prefix: &RelativePath) -> Option<RelativePath> {
        if !self.starts_with(prefix) {
            return None;
        }
        if prefix.is_root() {
            return Some(self.clone());
        }
        Some(Self::new(&self.0[prefix.0.len()..]))
    }

    pub fn join(&self, child: &str) -> RelativePath {
        if self.is_root() {
            Self::new(child)
        } else {
            Self::new(&format!("{}/{}", self.0, child))
        }
    }

    /// Number of segments (`0` for the root).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Resolve under a platform root directory.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RelativePath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for RelativePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<RelativePath> for String {
    fn from(p: RelativePath) -> Self {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a manifest entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    #[serde(rename = "dir")]
    Directory,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKind::File => write!(f, "file"),
            PathKind::Directory => write!(f, "dir"),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifests
// ---------------------------------------------------------------------------

/// One side (local or remote) of a reconciliation: filtered sets of file and
/// directory paths. Only membership matters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub files: BTreeSet<RelativePath>,
    pub dirs: BTreeSet<RelativePath>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `path` as `kind`. A path is never both a file and a directory:
    /// inserting it as one kind removes it from the other set.
    pub fn insert(&mut self, path: RelativePath, kind: PathKind) {
        match kind {
            PathKind::File => {
                self.dirs.remove(&path);
                self.files.insert(path);
            }
            PathKind::Directory => {
                self.files.remove(&path);
                self.dirs.insert(path);
            }
        }
    }
}

/// An entry from the remote tree listing, already stripped of the remote
/// root prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub path: RelativePath,
    pub kind: PathKind,
    /// The host's own blob/tree identity. Informational only: changes are
    /// always decided by hashing the fetched bytes.
    pub content_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Reconciliation result
// ---------------------------------------------------------------------------

/// A file whose remote content differs from the local copy (or has no local
/// copy at all).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: RelativePath,
    /// Lower-case hex SHA-1 of the remote bytes.
    pub sha1: String,
    /// SHA-1 of the local file when the check ran; `None` when the file did
    /// not exist locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_sha1: Option<String>,
}

/// The four-way diff produced by a check and consumed by one apply.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconciliationResult {
    #[serde(default)]
    pub changed: Vec<ChangedFile>,
    #[serde(default)]
    pub deleted_files: Vec<RelativePath>,
    #[serde(default)]
    pub added_dirs: Vec<RelativePath>,
    #[serde(default)]
    pub deleted_dirs: Vec<RelativePath>,
}

impl ReconciliationResult {
    /// `true` means "no update needed".
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
            && self.deleted_files.is_empty()
            && self.added_dirs.is_empty()
            && self.deleted_dirs.is_empty()
    }

    pub fn total(&self) -> usize {
        self.changed.len() + self.deleted_files.len() + self.added_dirs.len() + self.deleted_dirs.len()
    }

    /// Sort every list. Order carries no meaning; this only makes output and
    /// comparisons stable.
    pub fn sorted(mut self) -> Self {
        self.changed.sort_by(|a, b| a.path.cmp(&b.path));
        self.deleted_files.sort();
        self.added_dirs.sort();
        self.deleted_dirs.sort();
        self
    }

    pub fn changed_paths(&self) -> BTreeSet<&RelativePath> {
        self.changed.iter().map(|c| &c.path).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_edges() {
        assert_eq!(RelativePath::new("/lib/ota.py/").as_str(), "lib/ota.py");
        assert_eq!(RelativePath::new("lib//sub\\x.py").as_str(), "lib/sub/x.py");
        assert_eq!(RelativePath::new("./main.py").as_str(), "main.py");
        assert!(RelativePath::new("/").is_root());
        assert!(RelativePath::new("").is_root());
    }

    #[test]
    fn parent_refs_never_escape_the_root() {
        assert_eq!(RelativePath::new("../escaped.py").as_str(), "escaped.py");
        assert_eq!(RelativePath::new("lib/../../../etc/passwd").as_str(), "etc/passwd");
        assert_eq!(RelativePath::new("lib/sub/../x.py").as_str(), "lib/x.py");
        assert!(RelativePath::new("..").is_root());
        assert!(RelativePath::has_parent_ref("../escaped.py"));
        assert!(RelativePath::has_parent_ref("lib\\..\\x"));
        assert!(!RelativePath::has_parent_ref("lib/..x/y"));
    }

    #[test]
    fn starts_with_is_segment_aware() {
        let lib = RelativePath::new("lib");
        assert!(RelativePath::new("lib").starts_with(&lib));
        assert!(RelativePath::new("lib/a.py").starts_with(&lib));
        assert!(!RelativePath::new("lib2/a.py").starts_with(&lib));
        assert!(!RelativePath::new("li").starts_with(&lib));
        assert!(RelativePath::new("anything").starts_with(&RelativePath::root()));
    }

    #[test]
    fn strip_prefix_is_segment_aware() {
        let p = RelativePath::new("app/src/main.py");
        assert_eq!(
            p.strip_prefix(&RelativePath::new("app")),
            Some(RelativePath::new("src/main.py"))
        );
        assert_eq!(p.strip_prefix(&RelativePath::new("ap")), None);
    }

    #[test]
    fn to_path_joins_segments() {
        let p = RelativePath::new("lib/sub/x.py");
        assert_eq!(
            p.to_path(Path::new("/flash")),
            PathBuf::from("/flash").join("lib").join("sub").join("x.py")
        );
        assert_eq!(RelativePath::root().to_path(Path::new("/flash")), PathBuf::from("/flash"));
    }

    #[test]
    fn manifest_kind_is_exclusive() {
        let mut m = Manifest::new();
        let p = RelativePath::new("thing");
        m.insert(p.clone(), PathKind::File);
        m.insert(p.clone(), PathKind::Directory);
        assert!(!m.files.contains(&p));
        assert!(m.dirs.contains(&p));
    }

    #[test]
    fn empty_result_means_no_update() {
        let mut r = ReconciliationResult::default();
        assert!(r.is_empty());
        r.deleted_dirs.push(RelativePath::new("old"));
        assert!(!r.is_empty());
        assert_eq!(r.total(), 1);
    }

    #[test]
    fn relative_path_serializes_as_plain_string() {
        let r = ReconciliationResult {
            changed: vec![ChangedFile {
                path: RelativePath::new("main.py"),
                sha1: "ab".into(),
                local_sha1: None,
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&r).expect("serialize");
        assert!(json.contains(r#""path":"main.py""#), "got: {json}");
        assert!(!json.contains("local_sha1"));
    }
}
