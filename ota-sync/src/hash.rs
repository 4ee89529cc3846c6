//! Chunked SHA-1 hashing.
//!
//! SHA-1 keeps digests comparable with the remote host's own blob identities.
//! Input is consumed in [`CHUNK_SIZE`] pieces so peak memory stays bounded
//! regardless of file size.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::{io_err, SyncError};

/// Read/write granularity for hashing and streaming downloads.
pub const CHUNK_SIZE: usize = 2048;

/// Hex SHA-1 of an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut h = Sha1::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Hex SHA-1 of everything `reader` yields, read in [`CHUNK_SIZE`] chunks.
pub fn hash_reader<R: Read>(reader: R) -> std::io::Result<String> {
    let mut sink = std::io::sink();
    copy_hashed(reader, &mut sink)
}

/// Hex SHA-1 of a local file, or `None` when the file does not exist.
///
/// `None` never equals a real digest, so a remote file without a local
/// counterpart always compares as changed.
pub fn hash_file(path: &Path) -> Result<Option<String>, SyncError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    hash_reader(file).map(Some).map_err(|e| io_err(path, e))
}

/// Copy `reader` into `writer` chunk by chunk, returning the hex SHA-1 of
/// the copied bytes.
pub fn copy_hashed<R: Read, W: Write>(mut reader: R, writer: &mut W) -> std::io::Result<String> {
    let mut h = Sha1::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        h.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
    }
    writer.flush()?;
    Ok(hex::encode(h.finalize()))
}
