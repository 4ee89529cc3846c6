//! Manifest collection: the local tree (walk or explicit scope) and the
//! remote tree listing, both reduced to comparable [`Manifest`]s.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use ota_core::{Manifest, PathKind, RelativePath, RemoteEntry};

use crate::error::{io_err, transport_err, SyncError};
use crate::filter::PathFilter;
use crate::fsops;
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

/// Options for [`collect_local`].
#[derive(Debug, Clone)]
pub struct LocalScan<'a> {
    pub root: &'a Path,
    /// Explicit scope. When non-empty the tree is not walked.
    pub scope: &'a [RelativePath],
    pub filter: &'a PathFilter,
    /// Entries nested deeper than this many segments are not listed.
    pub max_depth: usize,
    /// Subtree never reported (the staging area when it lives under `root`).
    pub skip: Option<&'a RelativePath>,
}

/// Build the local manifest.
///
/// Directories appear only when discovered; missing intermediate directories
/// are never synthesized. Explicit-scope entries that do not exist are
/// skipped.
pub fn collect_local(scan: &LocalScan<'_>) -> Result<Manifest, SyncError> {
    let mut manifest = Manifest::new();
    if scan.scope.is_empty() {
        match fsops::kind_of(scan.root)? {
            Some(PathKind::Directory) => {}
            _ => {
                return Err(io_err(
                    scan.root,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "local root is not a directory"),
                ))
            }
        }
        walk(scan, scan.root, &RelativePath::root(), &mut manifest)?;
    } else {
        for path in scan.scope {
            if is_skipped(scan, path) || !scan.filter.included(path) {
                continue;
            }
            if let Some(kind) = fsops::kind_of(&path.to_path(scan.root))? {
                manifest.insert(path.clone(), kind);
            }
        }
    }
    tracing::debug!(
        "local manifest: {} file(s), {} dir(s)",
        manifest.files.len(),
        manifest.dirs.len()
    );
    Ok(manifest)
}

fn walk(
    scan: &LocalScan<'_>,
    dir: &Path,
    rel: &RelativePath,
    manifest: &mut Manifest,
) -> Result<(), SyncError> {
    let entries = fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!("skipping non-UTF-8 entry in {}", dir.display());
            continue;
        };
        let child_rel = rel.join(&name);
        if is_skipped(scan, &child_rel) {
            continue;
        }
        let child = entry.path();
        match fsops::kind_of(&child)? {
            Some(PathKind::Directory) => {
                if scan.filter.included(&child_rel) {
                    manifest.insert(child_rel.clone(), PathKind::Directory);
                }
                if child_rel.depth() < scan.max_depth && scan.filter.may_contain(&child_rel) {
                    walk(scan, &child, &child_rel, manifest)?;
                }
            }
            Some(PathKind::File) => {
                if scan.filter.included(&child_rel) {
                    manifest.insert(child_rel, PathKind::File);
                }
            }
            None => {}
        }
    }
    Ok(())
}

fn is_skipped(scan: &LocalScan<'_>, path: &RelativePath) -> bool {
    scan.skip.is_some_and(|skip| path.starts_with(skip))
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TreeListing {
    tree: Option<Vec<TreeItem>>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    sha: Option<String>,
}

/// Parse a tree listing and strip `remote_root` from every path.
///
/// Entries outside `remote_root`, the root itself, entries with a `..`
/// segment, and entries whose type is neither `blob` nor `tree` are dropped. A listing the host marked as
/// truncated is rejected: an incomplete listing would read as deletions.
pub fn parse_tree(body: &[u8], remote_root: &RelativePath) -> Result<Vec<RemoteEntry>, SyncError> {
    let listing: TreeListing = serde_json::from_slice(body)?;
    if listing.truncated {
        return Err(SyncError::TreeFormat(
            "the host truncated the tree listing".to_string(),
        ));
    }
    let Some(items) = listing.tree else {
        return Err(SyncError::TreeFormat("missing `tree` array".to_string()));
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let kind = match item.kind.as_str() {
            "blob" => PathKind::File,
            "tree" => PathKind::Directory,
            other => {
                tracing::debug!("ignoring tree entry {} of type {other}", item.path);
                continue;
            }
        };
        if RelativePath::has_parent_ref(&item.path) {
            tracing::warn!("ignoring tree entry {} that leaves the repository root", item.path);
            continue;
        }
        let Some(path) = RelativePath::new(&item.path).strip_prefix(remote_root) else {
            continue;
        };
        if path.is_root() {
            continue;
        }
        entries.push(RemoteEntry {
            path,
            kind,
            content_id: item.sha,
        });
    }
    Ok(entries)
}

/// Options for [`collect_remote`].
#[derive(Debug, Clone)]
pub struct RemoteScan<'a> {
    pub api_url: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub remote_root: &'a RelativePath,
    pub filter: &'a PathFilter,
    pub policy: RetryPolicy,
}

/// Fetch the tree listing and build the remote manifest.
///
/// Fails after the policy's attempts are exhausted; a partial manifest is
/// never returned.
pub fn collect_remote<T: Transport>(
    transport: &T,
    scan: &RemoteScan<'_>,
) -> Result<Manifest, SyncError> {
    let body = with_retry(scan.policy, "tree listing request", |_| {
        fetch_listing(transport, scan.api_url, scan.headers)
    })?;

    let mut manifest = Manifest::new();
    for entry in parse_tree(&body, scan.remote_root)? {
        if scan.filter.included(&entry.path) {
            manifest.insert(entry.path, entry.kind);
        }
    }
    tracing::debug!(
        "remote manifest: {} file(s), {} dir(s)",
        manifest.files.len(),
        manifest.dirs.len()
    );
    Ok(manifest)
}

fn fetch_listing<T: Transport>(
    transport: &T,
    url: &str,
    headers: &BTreeMap<String, String>,
) -> Result<Vec<u8>, SyncError> {
    let mut response = transport.get(url, headers)?;
    if !response.is_ok() {
        return Err(transport_err(url, format!("status code {}", response.status)));
    }
    let mut body = Vec::new();
    response
        .body
        .read_to_end(&mut body)
        .map_err(|e| transport_err(url, e))?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rp(s: &str) -> RelativePath {
        RelativePath::new(s)
    }

    fn scan<'a>(root: &'a Path, filter: &'a PathFilter, scope: &'a [RelativePath]) -> LocalScan<'a> {
        LocalScan {
            root,
            scope,
            filter,
            max_depth: 100,
            skip: None,
        }
    }

    fn tree(root: &Path) {
        fs::create_dir_all(root.join("lib/sub")).unwrap();
        fs::write(root.join("main.py"), "main").unwrap();
        fs::write(root.join("lib/ota.py"), "ota").unwrap();
        fs::write(root.join("lib/sub/deep.py"), "deep").unwrap();
    }

    #[test]
    fn walk_discovers_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path());
        let filter = PathFilter::default();
        let m = collect_local(&scan(tmp.path(), &filter, &[])).unwrap();
        assert_eq!(
            m.files.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["lib/ota.py", "lib/sub/deep.py", "main.py"]
        );
        assert_eq!(
            m.dirs.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            vec!["lib", "lib/sub"]
        );
    }

    #[test]
    fn walk_respects_ignore_and_depth() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path());
        let filter = PathFilter::new([rp("lib/sub")], []);
        let m = collect_local(&scan(tmp.path(), &filter, &[])).unwrap();
        assert!(!m.dirs.contains(&rp("lib/sub")));
        assert!(!m.files.contains(&rp("lib/sub/deep.py")));

        let filter = PathFilter::default();
        let mut shallow = scan(tmp.path(), &filter, &[]);
        shallow.max_depth = 1;
        let m = collect_local(&shallow).unwrap();
        assert!(m.dirs.contains(&rp("lib")));
        assert!(!m.files.contains(&rp("lib/ota.py")));
    }

    #[test]
    fn walk_skips_staging_subtree() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path());
        fs::create_dir_all(tmp.path().join("_ota_cache/lib")).unwrap();
        fs::write(tmp.path().join("_ota_cache/lib/ota.py"), "staged").unwrap();
        let filter = PathFilter::default();
        let skip = rp("_ota_cache");
        let mut s = scan(tmp.path(), &filter, &[]);
        s.skip = Some(&skip);
        let m = collect_local(&s).unwrap();
        assert!(m.files.iter().chain(m.dirs.iter()).all(|p| !p.starts_with(&skip)));
    }

    #[test]
    fn explicit_scope_stats_entries_and_skips_missing() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path());
        let scope = vec![rp("main.py"), rp("lib"), rp("gone.py")];
        let filter = PathFilter::new([], scope.clone());
        let m = collect_local(&scan(tmp.path(), &filter, &scope)).unwrap();
        assert_eq!(m.files.iter().collect::<Vec<_>>(), vec![&rp("main.py")]);
        assert_eq!(m.dirs.iter().collect::<Vec<_>>(), vec![&rp("lib")]);
    }

    #[test]
    fn missing_local_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let filter = PathFilter::default();
        let missing = tmp.path().join("nope");
        assert!(matches!(
            collect_local(&scan(&missing, &filter, &[])),
            Err(SyncError::Io { .. })
        ));
    }

    #[test]
    fn parse_tree_strips_remote_root_and_drops_unknown_types() {
        let body = br#"{"sha":"x","tree":[
            {"path":"device","type":"tree","sha":"t0"},
            {"path":"device/main.py","type":"blob","sha":"b1"},
            {"path":"device/lib","type":"tree","sha":"t1"},
            {"path":"device/vendor","type":"commit","sha":"c1"},
            {"path":"devices/other.py","type":"blob","sha":"b2"},
            {"path":"README.md","type":"blob","sha":"b3"}
        ]}"#;
        let entries = parse_tree(body, &rp("device")).unwrap();
        let got: Vec<_> = entries.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(
            got,
            vec![("main.py", PathKind::File), ("lib", PathKind::Directory)]
        );
        assert_eq!(entries[0].content_id.as_deref(), Some("b1"));
    }

    #[test]
    fn parse_tree_drops_entries_with_parent_segments() {
        let body = br#"{"tree":[
            {"path":"../escaped.py","type":"blob","sha":"b1"},
            {"path":"device/../../etc","type":"tree","sha":"t1"},
            {"path":"device/..\\..\\x.py","type":"blob","sha":"b2"},
            {"path":"device/ok.py","type":"blob","sha":"b3"}
        ]}"#;
        let entries = parse_tree(body, &rp("device")).unwrap();
        let got: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(got, vec!["ok.py"]);

        let entries = parse_tree(body, &RelativePath::root()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path.as_str(), "device/ok.py");
    }

    #[test]
    fn parse_tree_rejects_missing_or_truncated_tree() {
        assert!(matches!(
            parse_tree(br#"{"message":"Not Found"}"#, &RelativePath::root()),
            Err(SyncError::TreeFormat(_))
        ));
        assert!(matches!(
            parse_tree(br#"{"tree":[],"truncated":true}"#, &RelativePath::root()),
            Err(SyncError::TreeFormat(_))
        ));
        assert!(matches!(
            parse_tree(b"<html>", &RelativePath::root()),
            Err(SyncError::Json(_))
        ));
    }
}
