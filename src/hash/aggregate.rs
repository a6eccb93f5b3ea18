//! Fold per-file hashes into one order-independent digest

use crate::config::HashAlgorithm;
use crate::hash::{HashResult, Hasher};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::error;

/// A file left out of the aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// Path of the file
    pub path: PathBuf,
    /// Why it could not be hashed
    pub error: String,
}

/// Final digest plus what went into it
#[derive(Debug, Clone)]
pub struct Aggregate {
    /// Lowercase hex digest of the whole tree
    pub digest: String,
    /// Files folded into the digest
    pub files_hashed: u64,
    /// Files skipped because hashing failed
    pub failures: Vec<FileFailure>,
}

/// Sort results by (directory, name) and hash the per-file hex digests in
/// that order. Failed files are logged and skipped.
pub fn aggregate(mut results: Vec<HashResult>, algorithm: HashAlgorithm) -> Aggregate {
    results.sort_by(|a, b| a.file.sort_key().cmp(&b.file.sort_key()));

    let mut hasher = Hasher::new(algorithm);
    let mut files_hashed = 0u64;
    let mut failures = Vec::new();

    for result in &results {
        match &result.hash {
            Ok(hash) => {
                hasher.update(hash.as_bytes());
                files_hashed += 1;
            }
            Err(e) => {
                let path = result.file.path();
                error!(path = %path.display(), error = %e, "Failed to hash file, excluded from digest");
                failures.push(FileFailure {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    Aggregate {
        digest: hasher.finalize(),
        files_hashed,
        failures,
    }
}
