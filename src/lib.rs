//! # dirsum - Order-Independent Directory Digests
//!
//! dirsum computes one content digest for an entire directory tree. Every
//! regular file's bytes and root-relative path contribute, and the result is
//! the same regardless of filesystem enumeration order or how the parallel
//! hashing workers happen to be scheduled.
//!
//! ## Pipeline
//!
//! - **Scan**: [`tree::TreeBuilder`] walks the tree sequentially into a
//!   [`tree::DirectoryTree`], counting directories, files and bytes
//! - **Enumerate**: [`tree::DirectoryTree::files`] flattens it into a work list
//! - **Hash**: [`core::ConcurrentHasher`] hashes files behind a bounded
//!   admission gate, honoring cooperative cancellation
//! - **Aggregate**: [`hash::aggregate`] sorts per-file results and folds them
//!   into the final digest
//!
//! ## Quick Start
//!
//! ```no_run
//! use dirsum::config::{DigestConfig, HashAlgorithm};
//! use dirsum::core::DigestEngine;
//! use std::path::PathBuf;
//!
//! # async fn run() -> dirsum::Result<()> {
//! let config = DigestConfig {
//!     root: PathBuf::from("/data/archive"),
//!     algorithm: HashAlgorithm::Blake2b256,
//!     ..Default::default()
//! };
//!
//! let report = DigestEngine::new(config).execute().await?;
//! println!("{}", report.digest);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod hash;
pub mod progress;
pub mod session;
pub mod tree;

// Re-export commonly used types
pub use config::{DigestConfig, HashAlgorithm};
pub use core::{DigestEngine, DigestReport};
pub use error::{DigestError, Result};
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
