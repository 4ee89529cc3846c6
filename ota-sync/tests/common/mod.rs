//! In-memory repository served through the `Transport` seam.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use ota_core::{OtaConfig, VerifyStrategy};
use ota_sync::{Response, SyncError, Transport};

pub const API_URL: &str = "http://api.test/acme/firmware/main";
pub const RAW_ROOT: &str = "http://raw.test/acme/firmware/main";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A branch of a remote repository: files with content plus directories.
#[derive(Default)]
pub struct FakeRepo {
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    dirs: RefCell<BTreeSet<String>>,
    /// Number of upcoming listing requests answered with 503.
    listing_failures: Cell<usize>,
    listing_calls: Cell<usize>,
    raw_calls: Cell<usize>,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; every ancestor directory is added too.
    pub fn put(&self, path: &str, body: &[u8]) {
        let mut parent = Path::new(path).parent();
        while let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
            self.dirs.borrow_mut().insert(dir.to_string_lossy().into_owned());
            parent = dir.parent();
        }
        self.files.borrow_mut().insert(path.to_string(), body.to_vec());
    }

    pub fn mkdir(&self, path: &str) {
        self.dirs.borrow_mut().insert(path.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files.borrow_mut().remove(path);
        self.dirs.borrow_mut().remove(path);
    }

    pub fn fail_listing(&self, times: usize) {
        self.listing_failures.set(times);
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.get()
    }

    pub fn raw_calls(&self) -> usize {
        self.raw_calls.get()
    }

    fn listing(&self) -> Vec<u8> {
        let mut items = Vec::new();
        for dir in self.dirs.borrow().iter() {
            items.push(serde_json::json!({"path": dir, "type": "tree", "sha": "0"}));
        }
        for path in self.files.borrow().keys() {
            items.push(serde_json::json!({"path": path, "type": "blob", "sha": "0"}));
        }
        serde_json::to_vec(&serde_json::json!({"sha": "head", "tree": items, "truncated": false}))
            .unwrap()
    }
}

impl Transport for FakeRepo {
    fn get(&self, url: &str, _: &BTreeMap<String, String>) -> Result<Response, SyncError> {
        if url == API_URL {
            self.listing_calls.set(self.listing_calls.get() + 1);
            if self.listing_failures.get() > 0 {
                self.listing_failures.set(self.listing_failures.get() - 1);
                return Ok(Response::new(503, std::io::empty()));
            }
            return Ok(Response::new(200, Cursor::new(self.listing())));
        }
        if let Some(path) = url.strip_prefix(RAW_ROOT).and_then(|p| p.strip_prefix('/')) {
            self.raw_calls.set(self.raw_calls.get() + 1);
            return Ok(match self.files.borrow().get(path) {
                Some(body) => Response::new(200, Cursor::new(body.clone())),
                None => Response::new(404, std::io::empty()),
            });
        }
        Ok(Response::new(404, std::io::empty()))
    }
}

/// Config pointing at [`FakeRepo`]'s URLs with no backoff delay.
pub fn config(local_root: &Path, strategy: VerifyStrategy) -> OtaConfig {
    let mut config = OtaConfig::new("acme", "firmware", "main");
    config.api_url = Some("http://api.test/{owner}/{repo}/{branch}".into());
    config.raw_url = Some("http://raw.test/{owner}/{repo}/{branch}/{path}".into());
    config.local_root = local_root.to_path_buf();
    config.strategy = strategy;
    config.retry.api_backoff_ms = 0;
    config
}

pub fn write(root: &Path, path: &str, body: &str) {
    let p = root.join(path);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, body).unwrap();
}
