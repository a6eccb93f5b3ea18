//! Per-file hashing with SHA-256, BLAKE2b-256 and BLAKE3
//!
//! A file's digest covers its content followed by its path relative to the
//! scanned root, so equal content under different names never collides.

use crate::config::HashAlgorithm;
use crate::error::{DigestError, IoResultExt, Result};
use crate::tree::FileRef;
use blake2::digest::consts::U32;
use blake2::Blake2b;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

type Blake2b256 = Blake2b<U32>;

/// Outcome of hashing one file: exactly one of hash or error
#[derive(Debug)]
pub struct HashResult {
    /// The file that was hashed
    pub file: FileRef,
    /// Lowercase hex digest, or the error that stopped this file
    pub hash: Result<String>,
}

impl HashResult {
    /// Whether this file contributes to the aggregate
    pub fn is_ok(&self) -> bool {
        self.hash.is_ok()
    }
}

/// Unified hasher that supports all algorithms
pub enum Hasher {
    /// SHA-256
    Sha256(sha2::Sha256),
    /// BLAKE2b, 256-bit output
    Blake2b256(Box<Blake2b256>),
    /// BLAKE3
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    /// Create a new hasher for the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        use sha2::Digest;
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Blake2b256 => Self::Blake2b256(Box::new(Blake2b256::new())),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    /// Update the hasher with more data
    pub fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Blake2b256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Finalize and get the hash as hex string
    pub fn finalize(self) -> String {
        use sha2::Digest;
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Blake2b256(h) => hex::encode((*h).finalize()),
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Compute hash of data in memory
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

/// Hash one file in `chunk_size` reads, then bind its root-relative path.
///
/// Returns `None` when `cancelled` is observed before opening the file or
/// between chunks; the file handle is closed on every return path.
pub fn hash_file(
    file: &FileRef,
    root: &Path,
    algorithm: HashAlgorithm,
    chunk_size: usize,
    cancelled: &AtomicBool,
) -> Option<Result<String>> {
    if cancelled.load(Ordering::SeqCst) {
        return None;
    }

    let path = file.path();
    let mut handle = match File::open(&path).with_path(&path) {
        Ok(handle) => handle,
        Err(e) => return Some(Err(e)),
    };

    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; chunk_size.max(1)];

    loop {
        if cancelled.load(Ordering::SeqCst) {
            trace!(path = %path.display(), "Hashing interrupted by cancellation");
            return None;
        }

        let bytes_read = match handle.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Some(Err(DigestError::io(&path, e))),
        };

        hasher.update(&buffer[..bytes_read]);
    }

    let relative = file.relative_to(root);
    hasher.update(relative.as_os_str().as_encoded_bytes());

    let digest = hasher.finalize();
    trace!(path = %path.display(), hash = %digest, "File hashed");
    Some(Ok(digest))
}
