//! Updater configuration, persisted as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.ota/
//!   config.yaml     (mode 0600, written by `ota init`)
//! ```
//!
//! # API pattern
//!
//! Every function touching the default location has two forms:
//! - `fn_at(path: &Path, …)`: explicit path; used in tests with `TempDir`
//! - `fn(…)`: derives the path from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::RelativePath;

/// Sent when no `User-Agent` header is configured; the GitHub API rejects
/// requests without one.
pub const DEFAULT_USER_AGENT: &str = concat!("ota-updater/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Repository identity on the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSpec {
    pub owner: String,
    pub name: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

/// URL presets for the supported hosts. `raw_url` / `api_url` override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    #[default]
    Github,
    /// GitHub tree API with raw content served from a mirror.
    GithubMirror,
    Gitee,
}

impl Provider {
    pub fn api_template(self) -> &'static str {
        match self {
            Provider::Github | Provider::GithubMirror => {
                "https://api.github.com/repos/{owner}/{repo}/git/trees/{branch}?recursive=1"
            }
            Provider::Gitee => {
                "https://gitee.com/api/v5/repos/{owner}/{repo}/git/trees/{branch}?recursive=1"
            }
        }
    }

    pub fn raw_template(self) -> &'static str {
        match self {
            Provider::Github => "https://raw.githubusercontent.com/{owner}/{repo}/{branch}/{path}",
            Provider::GithubMirror => "https://raw.fastgit.org/{owner}/{repo}/{branch}/{path}",
            Provider::Gitee => "https://gitee.com/{owner}/{repo}/raw/{branch}/{path}",
        }
    }
}

/// How fetched content is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyStrategy {
    /// Download into staging while checking; apply only moves files.
    #[default]
    CacheThenVerify,
    /// Hash only while checking; download again and re-verify on apply.
    VerifyThenFetch,
}

/// Retry bounds for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts for the tree listing.
    pub api_attempts: u32,
    /// Fixed delay between tree-listing attempts.
    pub api_backoff_ms: u64,
    /// Extra attempts for each raw download.
    pub download_retries: u32,
    /// Extra download+verify rounds on hash mismatch (verify-then-fetch).
    pub verify_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            api_attempts: 2,
            api_backoff_ms: 1000,
            download_retries: 3,
            verify_retries: 2,
        }
    }
}

/// Full updater configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaConfig {
    pub repo: RepoSpec,
    #[serde(default)]
    pub provider: Provider,
    /// Raw content URL template: `{owner}`, `{repo}`, `{branch}`, `{path}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_url: Option<String>,
    /// Tree listing URL template: `{owner}`, `{repo}`, `{branch}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Directory inside the repository mirrored onto `local_root`.
    #[serde(default)]
    pub remote_root: String,
    /// Staging directory. Relative paths resolve against `local_root`.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Explicit scope. Empty means "everything under the roots".
    #[serde(default)]
    pub files: Vec<String>,
    /// Ignored path prefixes, relative to the roots.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default)]
    pub strategy: VerifyStrategy,
    #[serde(default = "default_recheck_window")]
    pub recheck_window_secs: u64,
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Maximum directory nesting followed by the local walk.
    #[serde(default = "default_walk_depth")]
    pub walk_depth: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("_ota_cache")
}

fn default_recheck_window() -> u64 {
    180
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string())])
}

fn default_walk_depth() -> usize {
    100
}

fn default_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// 2. Derived values
// ---------------------------------------------------------------------------

impl OtaConfig {
    /// Minimal config for a repository with every other field defaulted.
    pub fn new(owner: &str, name: &str, branch: &str) -> Self {
        Self {
            repo: RepoSpec {
                owner: owner.to_string(),
                name: name.to_string(),
                branch: branch.to_string(),
            },
            provider: Provider::default(),
            raw_url: None,
            api_url: None,
            local_root: default_local_root(),
            remote_root: String::new(),
            cache_path: default_cache_path(),
            files: Vec::new(),
            ignore: Vec::new(),
            strategy: VerifyStrategy::default(),
            recheck_window_secs: default_recheck_window(),
            headers: default_headers(),
            retry: RetryConfig::default(),
            walk_depth: default_walk_depth(),
            timeout_secs: default_timeout(),
        }
    }

    /// Tree listing URL with the repository identity filled in.
    pub fn api_url(&self) -> String {
        let template = self
            .api_url
            .as_deref()
            .unwrap_or_else(|| self.provider.api_template());
        self.expand(template, "")
    }

    /// Raw content URL for the remote root, without a trailing `/`.
    /// A file's URL is `<raw_root>/<relative path>`.
    pub fn raw_root(&self) -> String {
        let template = self
            .raw_url
            .as_deref()
            .unwrap_or_else(|| self.provider.raw_template());
        let root = self.remote_root_path();
        self.expand(template, root.as_str())
            .trim_end_matches('/')
            .to_string()
    }

    fn expand(&self, template: &str, path: &str) -> String {
        template
            .replace("{owner}", &self.repo.owner)
            .replace("{user}", &self.repo.owner)
            .replace("{repo}", &self.repo.name)
            .replace("{branch}", &self.repo.branch)
            .replace("{path}", path)
    }

    pub fn remote_root_path(&self) -> RelativePath {
        RelativePath::new(&self.remote_root)
    }

    /// Resolved staging directory.
    pub fn cache_dir(&self) -> PathBuf {
        if self.cache_path.is_absolute() {
            self.cache_path.clone()
        } else {
            self.local_root.join(&self.cache_path)
        }
    }

    /// The staging directory as a path relative to `local_root`, when it
    /// lives inside the local tree (the local walk must skip it).
    pub fn cache_relative(&self) -> Option<RelativePath> {
        let rel = self.cache_dir();
        let rel = rel.strip_prefix(&self.local_root).ok()?;
        let rel = RelativePath::new(&rel.to_string_lossy());
        (!rel.is_root()).then_some(rel)
    }

    /// Explicit scope entries, normalized. Root entries are dropped.
    pub fn scope(&self) -> Vec<RelativePath> {
        normalized(&self.files)
    }

    /// Ignore prefixes, normalized. Root entries are dropped.
    pub fn ignore_paths(&self) -> Vec<RelativePath> {
        normalized(&self.ignore)
    }

    pub fn recheck_window(&self) -> Duration {
        Duration::from_secs(self.recheck_window_secs)
    }

    pub fn api_backoff(&self) -> Duration {
        Duration::from_millis(self.retry.api_backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo.owner.trim().is_empty() {
            return Err(ConfigError::Missing { field: "repo.owner" });
        }
        if self.repo.name.trim().is_empty() {
            return Err(ConfigError::Missing { field: "repo.name" });
        }
        if self.repo.branch.trim().is_empty() {
            return Err(ConfigError::Missing { field: "repo.branch" });
        }
        if self.local_root.as_os_str().is_empty() {
            return Err(ConfigError::Missing { field: "local_root" });
        }
        if self.cache_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing { field: "cache_path" });
        }
        // Staging is wiped on every check; it must never contain the tree.
        if self.cache_encloses_root() {
            return Err(ConfigError::Invalid {
                field: "cache_path",
                reason: format!(
                    "staging directory '{}' must not be the local root or one of its parents",
                    self.cache_dir().display()
                ),
            });
        }
        let relative_fields = [
            ("remote_root", std::slice::from_ref(&self.remote_root)),
            ("files", self.files.as_slice()),
            ("ignore", self.ignore.as_slice()),
        ];
        for (field, entries) in relative_fields {
            if let Some(bad) = entries.iter().find(|e| RelativePath::has_parent_ref(e)) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("'{bad}' must not contain '..'"),
                });
            }
        }
        for (field, template) in [("raw_url", &self.raw_url), ("api_url", &self.api_url)] {
            if let Some(t) = template {
                if !(t.starts_with("http://") || t.starts_with("https://")) {
                    return Err(ConfigError::Invalid {
                        field,
                        reason: format!("'{t}' is not an http(s) URL template"),
                    });
                }
            }
        }
        if self.raw_url.as_deref().is_some_and(|t| !t.contains("{path}")) {
            return Err(ConfigError::Invalid {
                field: "raw_url",
                reason: "template must contain {path}".to_string(),
            });
        }
        if self.retry.api_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.api_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.walk_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "walk_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.headers.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "headers",
                reason: "header names must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl OtaConfig {
    /// Whether the staging directory is `local_root` or an ancestor of it,
    /// compared lexically and, when both exist, after resolving symlinks.
    fn cache_encloses_root(&self) -> bool {
        let cache = self.cache_dir();
        if lexical_absolute(&self.local_root).starts_with(lexical_absolute(&cache)) {
            return true;
        }
        match (std::fs::canonicalize(&self.local_root), std::fs::canonicalize(&cache)) {
            (Ok(root), Ok(cache)) => root.starts_with(cache),
            _ => false,
        }
    }
}

/// Absolute form of `path` with `.` and `..` resolved without touching the
/// filesystem.
fn lexical_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn normalized(raw: &[String]) -> Vec<RelativePath> {
    raw.iter()
        .map(|s| RelativePath::new(s))
        .filter(|p| !p.is_root())
        .collect()
}

// ---------------------------------------------------------------------------
// 3. Load / save
// ---------------------------------------------------------------------------

/// `<home>/.ota/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".ota").join("config.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

/// Parse and validate a YAML document. `origin` only labels errors.
pub fn from_yaml_str(contents: &str, origin: &Path) -> Result<OtaConfig, ConfigError> {
    let config: OtaConfig = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: origin.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path
/// + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<OtaConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    from_yaml_str(&contents, path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<OtaConfig, ConfigError> {
    load_at(&config_path()?)
}

/// Atomically save a config to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(path: &Path, config: &OtaConfig) -> Result<(), ConfigError> {
    let io = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(io)?;
    }
    let tmp_path = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml).map_err(io)?;
    set_file_permissions(&tmp_path).map_err(io)?;
    std::fs::rename(&tmp_path, path).map_err(io)?;
    Ok(())
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
