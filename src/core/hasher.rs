//! Bounded-concurrency file hashing
//!
//! A semaphore acts as the admission gate: a permit is taken before a worker
//! is spawned and released when the worker finishes, so no more than
//! `concurrency` files are ever open at once regardless of tree size.

use crate::config::{HashAlgorithm, MAX_CHUNK_SIZE};
use crate::error::{DigestError, Result};
use crate::hash::{hash_file, HashResult};
use crate::tree::FileRef;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Hashes a work list of files on a bounded worker pool
#[derive(Clone)]
pub struct ConcurrentHasher {
    root: Arc<PathBuf>,
    algorithm: HashAlgorithm,
    chunk_size: usize,
    limit: usize,
    gate: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
}

impl ConcurrentHasher {
    /// Create a hasher for files below `root`
    pub fn new(
        root: impl Into<PathBuf>,
        algorithm: HashAlgorithm,
        concurrency: usize,
        chunk_size: usize,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let limit = concurrency.max(1);
        Self {
            root: Arc::new(root.into()),
            algorithm,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
            limit,
            gate: Arc::new(Semaphore::new(limit)),
            cancelled,
        }
    }

    /// Maximum number of files hashed at the same time
    pub fn concurrency(&self) -> usize {
        self.limit
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Hash every file, returning one result per input in completion order.
    ///
    /// `completed` is incremented once per produced result and is only
    /// written here, never read. On cancellation no new work is admitted,
    /// in-flight workers are joined and `DigestError::Cancelled` is returned.
    pub async fn hash_all(
        &self,
        files: Vec<FileRef>,
        completed: Arc<AtomicU64>,
    ) -> Result<Vec<HashResult>> {
        let total = files.len();
        let mut workers = JoinSet::new();
        let mut results = Vec::with_capacity(total);

        for file in files {
            if self.is_cancelled() {
                warn!("Cancellation requested, no further files will be hashed");
                break;
            }

            let permit = Arc::clone(&self.gate)
                .acquire_owned()
                .await
                .map_err(|e| DigestError::TaskJoin(format!("Admission gate closed: {}", e)))?;

            let root = Arc::clone(&self.root);
            let cancelled = Arc::clone(&self.cancelled);
            let completed = Arc::clone(&completed);
            let algorithm = self.algorithm;
            let chunk_size = self.chunk_size;

            workers.spawn_blocking(move || {
                let _permit = permit;
                let outcome = hash_file(&file, &root, algorithm, chunk_size, &cancelled)?;
                completed.fetch_add(1, Ordering::Relaxed);
                Some(HashResult { file, hash: outcome })
            });

            // Collect finished workers as we go so results don't pile up in the set
            while let Some(joined) = workers.try_join_next() {
                Self::collect(joined, &mut results)?;
            }
        }

        while let Some(joined) = workers.join_next().await {
            Self::collect(joined, &mut results)?;
        }

        if self.is_cancelled() {
            warn!(
                hashed = results.len(),
                total,
                "Hashing cancelled, partial results discarded"
            );
            return Err(DigestError::Cancelled);
        }

        debug!(files = results.len(), "All hashing workers finished");
        Ok(results)
    }

    fn collect(
        joined: std::result::Result<Option<HashResult>, tokio::task::JoinError>,
        results: &mut Vec<HashResult>,
    ) -> Result<()> {
        match joined {
            Ok(Some(result)) => {
                results.push(result);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(DigestError::TaskJoin(e.to_string())),
        }
    }
}
