//! Raw content retrieval with hashing and bounded retry.
//!
//! Every request's response body is dropped before the next attempt starts,
//! so a failing download never holds more than one connection open.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use ota_core::RelativePath;

use crate::error::{io_err, transport_err, SyncError};
use crate::hash;
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{Response, Transport};

/// Downloads files below a raw-content root.
pub struct ContentFetcher<'a, T: Transport> {
    transport: &'a T,
    raw_root: &'a str,
    headers: &'a BTreeMap<String, String>,
    policy: RetryPolicy,
}

impl<'a, T: Transport> ContentFetcher<'a, T> {
    /// `download_retries` extra attempts are made for each request that fails
    /// with a transport error or a non-200 status.
    pub fn new(
        transport: &'a T,
        raw_root: &'a str,
        headers: &'a BTreeMap<String, String>,
        download_retries: u32,
    ) -> Self {
        Self {
            transport,
            raw_root,
            headers,
            policy: RetryPolicy::with_retries(download_retries),
        }
    }

    /// `<raw_root>/<path>`
    pub fn url_for(&self, path: &RelativePath) -> String {
        format!("{}/{}", self.raw_root, path)
    }

    fn open(&self, url: &str) -> Result<Response, SyncError> {
        let response = self.transport.get(url, self.headers)?;
        if !response.is_ok() {
            return Err(transport_err(url, format!("status code {}", response.status)));
        }
        Ok(response)
    }

    /// Stream the remote file through SHA-1 without keeping the bytes.
    pub fn remote_hash(&self, path: &RelativePath) -> Result<String, SyncError> {
        let url = self.url_for(path);
        with_retry(self.policy, &format!("hash of {path}"), |_| {
            let response = self.open(&url)?;
            hash::hash_reader(response.body).map_err(|e| transport_err(&url, e))
        })
    }

    /// Download the remote file to `dest`, hashing while streaming. Parent
    /// directories are created; a partially written file is removed before
    /// any retry or error return. Returns the hex SHA-1 of the bytes written.
    pub fn download(&self, path: &RelativePath, dest: &Path) -> Result<String, SyncError> {
        let url = self.url_for(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        with_retry(self.policy, &format!("download of {path}"), |_| {
            let result = self.download_once(&url, dest);
            if result.is_err() {
                let _ = fs::remove_file(dest);
            }
            result
        })
    }

    fn download_once(&self, url: &str, dest: &Path) -> Result<String, SyncError> {
        let response = self.open(url)?;
        let file = File::create(dest).map_err(|e| io_err(dest, e))?;
        let mut writer = BufWriter::with_capacity(hash::CHUNK_SIZE, file);
        let mut body = NetReader {
            inner: response.body,
            failed: false,
        };
        let digest = match hash::copy_hashed(&mut body, &mut writer) {
            Ok(digest) => digest,
            Err(e) if body.failed => return Err(transport_err(url, e)),
            Err(e) => return Err(io_err(dest, e)),
        };
        drop(body);
        // Staged bytes must be durable before the commit moves them.
        let file = writer.into_inner().map_err(|e| io_err(dest, e.into_error()))?;
        file.sync_all().map_err(|e| io_err(dest, e))?;
        Ok(digest)
    }

    /// Download into `dest` and require the bytes to hash to `expected`.
    /// A mismatch is retried `extra_attempts` more times before failing
    /// with [`SyncError::Verification`].
    pub fn fetch_verified(
        &self,
        path: &RelativePath,
        dest: &Path,
        expected: &str,
        extra_attempts: u32,
    ) -> Result<(), SyncError> {
        let rounds = extra_attempts.saturating_add(1);
        let mut actual = String::new();
        for round in 1..=rounds {
            actual = self.download(path, dest)?;
            if actual == expected {
                return Ok(());
            }
            tracing::warn!(
                "verification of {path} failed (round {round}/{rounds}): expected {expected}, got {actual}"
            );
            let _ = fs::remove_file(dest);
        }
        Err(SyncError::Verification {
            path: path.clone(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Response body wrapper that records whether a read failed, so network
/// errors can be told apart from disk errors after a copy.
struct NetReader<R> {
    inner: R,
    failed: bool,
}

impl<R: std::io::Read> std::io::Read for NetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let result = self.inner.read(buf);
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}
