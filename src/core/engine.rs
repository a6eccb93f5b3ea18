//! Main digest engine
//!
//! Orchestrates the run: sequential tree scan, enumeration, bounded parallel
//! hashing, then the deterministic fold into one digest.

use crate::config::{DigestConfig, HashAlgorithm};
use crate::core::ConcurrentHasher;
use crate::error::{DigestError, Result};
use crate::hash::{aggregate, FileFailure};
use crate::progress::ProgressReporter;
use crate::tree::{TreeBuilder, TreeStats};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Result of a completed digest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestReport {
    /// Lowercase hex digest of the tree
    pub digest: String,
    /// Algorithm used throughout the run
    pub algorithm: HashAlgorithm,
    /// Scanned root
    pub root: PathBuf,
    /// Scan counters
    pub stats: TreeStats,
    /// Files folded into the digest
    pub files_hashed: u64,
    /// Files that could not be hashed
    pub failures: Vec<FileFailure>,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl DigestReport {
    /// Whether every discovered file made it into the digest
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Digest Summary ===");
        println!("Root:            {}", self.root.display());
        println!("Algorithm:       {}", self.algorithm.name());
        println!("Directories:     {}", self.stats.directories);
        println!("Files hashed:    {}/{}", self.files_hashed, self.stats.files);
        println!("Data:            {}", humansize::format_size(self.stats.bytes, humansize::BINARY));
        println!("Duration:        {:.2?}", self.duration);

        if self.stats.unreadable_dirs > 0 {
            println!("Unreadable dirs: {}", self.stats.unreadable_dirs);
        }

        if !self.failures.is_empty() {
            println!("\nFailures: {}", self.failures.len());
            for failure in &self.failures {
                println!("  {} - {}", failure.path.display(), failure.error);
            }
        }
    }
}

/// Main digest engine
pub struct DigestEngine {
    /// Configuration
    config: DigestConfig,
    /// Progress reporter
    progress: Option<Arc<ProgressReporter>>,
    /// Cancellation flag
    cancelled: Arc<AtomicBool>,
    /// Files finished so far
    completed: Arc<AtomicU64>,
}

impl DigestEngine {
    /// Create a new digest engine
    pub fn new(config: DigestConfig) -> Self {
        Self {
            config,
            progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Set progress reporter
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Get cancellation flag for external control
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Cancel the operation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Number of files hashed so far
    pub fn files_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Raise the cancellation flag on SIGINT or SIGTERM.
    ///
    /// The handlers are registered before this returns; workers see the flag
    /// at their next check.
    pub fn cancel_on_signals(&self) -> Result<JoinHandle<()>> {
        spawn_signal_listener(Arc::clone(&self.cancelled))
    }

    /// Execute the digest run
    pub async fn execute(&self) -> Result<DigestReport> {
        let start_time = Instant::now();
        let root = self.config.root.clone();

        let builder = TreeBuilder::new(root.clone()).with_policy(self.config.unreadable_dirs);
        let (tree, stats) = tokio::task::spawn_blocking(move || builder.build())
            .await
            .map_err(|e| DigestError::TaskJoin(e.to_string()))??;

        info!("{}", stats.summary());
        if self.config.print_tree {
            print!("{}", tree.render());
        }
        trace!(tree = %tree.render(), "Scanned tree");

        if self.is_cancelled() {
            warn!("Cancelled after scan, nothing hashed");
            return Err(DigestError::Cancelled);
        }

        let files = tree.files();
        drop(tree);

        let hasher = ConcurrentHasher::new(
            root.clone(),
            self.config.algorithm,
            self.config.concurrency_limit(),
            self.config.chunk_size,
            Arc::clone(&self.cancelled),
        );
        info!(
            files = files.len(),
            concurrency = hasher.concurrency(),
            algorithm = %self.config.algorithm,
            "Hashing files"
        );

        let observer = self.progress.as_ref().map(|progress| {
            progress.set_total_files(files.len() as u64);
            Arc::clone(progress).observe(Arc::clone(&self.completed), Arc::clone(&self.cancelled))
        });

        let results = match hasher.hash_all(files, Arc::clone(&self.completed)).await {
            Ok(results) => results,
            Err(e) => {
                if let Some(handle) = observer {
                    handle.abort();
                }
                if let Some(progress) = &self.progress {
                    progress.finish_error(&e.to_string());
                }
                return Err(e);
            }
        };

        if let Some(handle) = observer {
            // The observer exits on its next tick now that the counter is full
            let _ = handle.await;
        }
        if let Some(progress) = &self.progress {
            let summary = progress.summary();
            debug!(
                files = summary.files_hashed,
                total = summary.total_files,
                percent = summary.percentage(),
                elapsed = ?summary.elapsed,
                "Progress finished"
            );
        }

        let aggregate = aggregate(results, self.config.algorithm);
        let duration = start_time.elapsed();

        info!(
            digest = %aggregate.digest,
            files_hashed = aggregate.files_hashed,
            failures = aggregate.failures.len(),
            elapsed_secs = duration.as_secs_f64(),
            "Digest computed"
        );

        Ok(DigestReport {
            digest: aggregate.digest,
            algorithm: self.config.algorithm,
            root,
            stats,
            files_hashed: aggregate.files_hashed,
            failures: aggregate.failures,
            duration,
        })
    }
}

#[cfg(unix)]
fn spawn_signal_listener(flag: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt()).map_err(DigestError::SignalHandler)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(DigestError::SignalHandler)?;

    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => warn!("Received SIGINT, cancelling"),
            _ = terminate.recv() => warn!("Received SIGTERM, cancelling"),
        }
        flag.store(true, Ordering::SeqCst);
    }))
}

#[cfg(not(unix))]
fn spawn_signal_listener(flag: Arc<AtomicBool>) -> Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling");
            flag.store(true, Ordering::SeqCst);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn config_for(root: &std::path::Path, algorithm: HashAlgorithm, concurrency: usize) -> DigestConfig {
        DigestConfig {
            root: root.to_path_buf(),
            algorithm,
            concurrency,
            chunk_size: 7,
            ..Default::default()
        }
    }

    async fn digest(root: &std::path::Path, algorithm: HashAlgorithm, concurrency: usize) -> DigestReport {
        DigestEngine::new(config_for(root, algorithm, concurrency))
            .execute()
            .await
            .unwrap()
    }

    fn populate(root: &std::path::Path, files: &[(&str, &[u8])]) {
        for (rel, content) in files {
            let path = root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
    }

    const TREE: &[(&str, &[u8])] = &[
        ("a.txt", b"hello"),
        ("sub/b.txt", b"world"),
        ("sub/deeper/c.bin", &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]),
        ("other/a.txt", b"hello"),
        ("other/empty", b""),
    ];

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scenario_reproducible() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), &[("a.txt", b"hello"), ("sub/b.txt", b"world")]);

        let first = digest(dir.path(), HashAlgorithm::Sha256, 0).await;
        let second = digest(dir.path(), HashAlgorithm::Sha256, 0).await;

        assert_eq!(first.stats.directories, 1);
        assert_eq!(first.stats.files, 2);
        assert_eq!(first.stats.bytes, 10);
        assert_eq!(first.files_hashed, 2);
        assert!(first.is_complete());
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.digest.len(), 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_deterministic_across_concurrency() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), TREE);

        for algorithm in HashAlgorithm::ALL {
            let baseline = digest(dir.path(), algorithm, 1).await.digest;
            for concurrency in [2, 3, 16] {
                assert_eq!(digest(dir.path(), algorithm, concurrency).await.digest, baseline);
            }
        }
    }

    #[tokio::test]
    async fn test_same_tree_different_location() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        populate(first.path(), TREE);
        // Create in reverse order so directory listings differ
        let reversed: Vec<_> = TREE.iter().rev().copied().collect();
        populate(second.path(), &reversed);

        assert_eq!(
            digest(first.path(), HashAlgorithm::Blake2b256, 4).await.digest,
            digest(second.path(), HashAlgorithm::Blake2b256, 4).await.digest
        );
    }

    #[tokio::test]
    async fn test_content_sensitivity() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), TREE);
        let before = digest(dir.path(), HashAlgorithm::Sha256, 4).await.digest;

        std::fs::write(dir.path().join("sub/deeper/c.bin"), [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 11]).unwrap();
        let after = digest(dir.path(), HashAlgorithm::Sha256, 4).await.digest;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_name_sensitivity() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        populate(first.path(), &[("x/data.txt", b"same")]);
        populate(second.path(), &[("y/data.txt", b"same")]);

        assert_ne!(
            digest(first.path(), HashAlgorithm::Sha256, 2).await.digest,
            digest(second.path(), HashAlgorithm::Sha256, 2).await.digest
        );
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let report = digest(dir.path(), HashAlgorithm::Blake3, 2).await;
        assert_eq!(report.files_hashed, 0);
        assert_eq!(report.digest, crate::hash::hash_bytes(b"", HashAlgorithm::Blake3));
    }

    #[tokio::test]
    async fn test_cancelled_run_fails() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), TREE);

        let engine = DigestEngine::new(config_for(dir.path(), HashAlgorithm::Sha256, 2))
            .with_progress(ProgressReporter::disabled());
        engine.cancel();

        let err = engine.execute().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(engine.files_completed(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_mid_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        for i in 0..32 {
            std::fs::write(dir.path().join(format!("big_{i}.bin")), vec![0x5Au8; 2 * 1024 * 1024]).unwrap();
        }
        let out = TempDir::new().unwrap();
        let session = Session::create(out.path()).unwrap();

        let mut config = config_for(dir.path(), HashAlgorithm::Sha256, 2);
        config.chunk_size = 8;
        let engine = Arc::new(DigestEngine::new(config).with_progress(ProgressReporter::disabled()));

        let run = tokio::spawn({
            let engine = Arc::clone(&engine);
            let session = session.clone();
            async move {
                let report = engine.execute().await?;
                session.write_digest(report.algorithm, &report.digest)
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(engine.files_completed() < 32);
        assert!(!session.digest_path(HashAlgorithm::Sha256).exists());
        assert_eq!(std::fs::read_dir(session.dir()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_raises_cancellation() {
        let dir = TempDir::new().unwrap();
        let engine = DigestEngine::new(config_for(dir.path(), HashAlgorithm::Sha256, 1));
        let listener = engine.cancel_on_signals().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), listener).await.unwrap().unwrap();
        assert!(engine.cancellation_flag().load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_progress_counter_reaches_total() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), TREE);

        let engine = DigestEngine::new(config_for(dir.path(), HashAlgorithm::Sha256, 3))
            .with_progress(ProgressReporter::disabled());
        let report = engine.execute().await.unwrap();

        assert_eq!(engine.files_completed(), report.stats.files);
    }

    async fn hash_and_fold(root: &std::path::Path, files: Vec<crate::tree::FileRef>, concurrency: usize) -> crate::hash::Aggregate {
        let hasher = ConcurrentHasher::new(
            root,
            HashAlgorithm::Sha256,
            concurrency,
            5,
            Arc::new(AtomicBool::new(false)),
        );
        let results = hasher.hash_all(files, Arc::new(AtomicU64::new(0))).await.unwrap();
        aggregate(results, HashAlgorithm::Sha256)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_partial_failure_contained() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), TREE);

        let (tree, stats) = TreeBuilder::new(dir.path()).build().unwrap();
        let files = tree.files();
        assert_eq!(files.len(), 5);

        // The file disappears between the scan and the hashing phase
        std::fs::remove_file(dir.path().join("sub/b.txt")).unwrap();
        let partial = hash_and_fold(dir.path(), files, 3).await;

        assert_eq!(stats.files, 5);
        assert_eq!(partial.files_hashed, 4);
        assert_eq!(partial.failures.len(), 1);
        assert_eq!(partial.failures[0].path, dir.path().join("sub/b.txt"));

        let without = digest(dir.path(), HashAlgorithm::Sha256, 3).await;
        assert_eq!(without.stats.files, 4);
        assert_eq!(partial.digest, without.digest);
    }

    #[tokio::test]
    async fn test_enumeration_order_irrelevant() {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), TREE);
        let (tree, _) = TreeBuilder::new(dir.path()).build().unwrap();

        let files = tree.files();
        let mut reversed = files.clone();
        reversed.reverse();
        let mut rotated = files.clone();
        rotated.rotate_left(2);

        let baseline = hash_and_fold(dir.path(), files, 2).await.digest;
        assert_eq!(hash_and_fold(dir.path(), reversed, 2).await.digest, baseline);
        assert_eq!(hash_and_fold(dir.path(), rotated, 5).await.digest, baseline);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_digest_independent_of_schedule(
            contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..12),
            concurrency in 1usize..8,
            shuffle_seed in any::<prop::sample::Index>(),
        ) {
            let dir = TempDir::new().unwrap();
            for (i, content) in contents.iter().enumerate() {
                let sub = dir.path().join(format!("d{}", i % 3));
                std::fs::create_dir_all(&sub).unwrap();
                std::fs::write(sub.join(format!("f{i}")), content).unwrap();
            }

            let (tree, _) = TreeBuilder::new(dir.path()).build().unwrap();
            let files = tree.files();
            let mut shuffled = files.clone();
            shuffled.rotate_left(shuffle_seed.index(files.len()));
            shuffled.reverse();

            let sequential = tokio_test::block_on(hash_and_fold(dir.path(), files, 1));
            let parallel = tokio_test::block_on(hash_and_fold(dir.path(), shuffled, concurrency));
            prop_assert_eq!(sequential.digest, parallel.digest);
            prop_assert_eq!(parallel.files_hashed as usize, contents.len());
        }
    }
}
