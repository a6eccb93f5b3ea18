//! Configuration settings for dirsum
//!
//! Defines the CLI arguments, the runtime configuration derived from them,
//! and the defaults for a digest run.

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default read chunk for per-file hashing
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest accepted read chunk; every worker holds one buffer of this size
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Admission gate size per available CPU when no explicit limit is given
pub const CONCURRENCY_PER_CPU: usize = 4;

/// dirsum - order-independent content digest for directory trees
#[derive(Parser, Debug, Clone)]
#[command(name = "dirsum")]
#[command(author = "dirsum Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compute one deterministic digest for an entire directory tree")]
#[command(long_about = r#"
dirsum hashes every regular file under a directory in parallel and folds the
per-file hashes into one digest. The result does not depend on enumeration
order or scheduling, so two copies of the same tree produce the same digest.

Examples:
  dirsum /data/archive                       # SHA-256, auto concurrency
  dirsum /data/archive -a blake2b-256 -j 8   # BLAKE2b-256, 8 files at once
  dirsum /data/archive --output-format json  # Machine-readable report
"#)]
pub struct CliArgs {
    /// Directory to digest
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Hash algorithm
    #[arg(short = 'a', long, value_enum, default_value = "sha256", env = "DIRSUM_ALGORITHM")]
    pub algorithm: HashAlgorithm,

    /// Files hashed concurrently (0 = 4 x CPU count)
    #[arg(short = 'j', long, default_value = "0", value_name = "NUM", env = "DIRSUM_CONCURRENCY")]
    pub concurrency: usize,

    /// Read chunk size for hashing (e.g., 64K, 1M)
    #[arg(short = 'b', long, default_value = "64K", value_name = "SIZE")]
    pub chunk_size: String,

    /// Abort when a directory cannot be listed instead of skipping it
    #[arg(long)]
    pub strict_dirs: bool,

    /// Base directory for the session folder (digest file and log)
    #[arg(short = 'o', long, value_name = "DIR", env = "DIRSUM_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Log file path (defaults to <session>/main.log)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Compute and print the digest without writing the digest file
    #[arg(long)]
    pub no_write: bool,

    /// Print the scanned directory tree before hashing
    #[arg(long)]
    pub print_tree: bool,

    /// Output format for the final report
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Verbose logging (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (no progress bar, digest only)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Hash algorithm used for per-file hashes and the aggregate
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HashAlgorithm {
    /// SHA-256 - Standard cryptographic hash
    #[default]
    #[value(name = "sha256")]
    #[serde(rename = "sha256")]
    Sha256,
    /// BLAKE2b with 256-bit output
    #[value(name = "blake2b-256", alias = "blake2b")]
    #[serde(rename = "blake2b-256", alias = "blake2b")]
    Blake2b256,
    /// BLAKE3 - Fast and cryptographically secure
    #[value(name = "blake3")]
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashAlgorithm {
    /// All supported algorithms
    pub const ALL: [HashAlgorithm; 3] = [Self::Sha256, Self::Blake2b256, Self::Blake3];

    /// Get the output size in bytes
    pub fn output_size(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake2b256 | Self::Blake3 => 32,
        }
    }

    /// Stable identifier, also used as the digest file name
    pub fn id(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake2b256 => "blake2b-256",
            Self::Blake3 => "blake3",
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Blake2b256 => "BLAKE2b-256",
            Self::Blake3 => "BLAKE3",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// What to do when a directory cannot be listed during the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnreadableDirPolicy {
    /// Log it, count it and treat it as having no entries
    #[default]
    Skip,
    /// Abort the scan with an error
    Fail,
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Directory to digest
    pub root: PathBuf,
    /// Hash algorithm for the whole run
    pub algorithm: HashAlgorithm,
    /// Maximum files hashed at once (0 = auto)
    pub concurrency: usize,
    /// Read chunk size in bytes
    pub chunk_size: usize,
    /// Directory listing failure policy
    pub unreadable_dirs: UnreadableDirPolicy,
    /// Base directory for session output
    pub output_dir: Option<PathBuf>,
    /// Explicit log file
    pub log_file: Option<PathBuf>,
    /// Persist the digest file
    pub write_digest: bool,
    /// Dump the tree before hashing
    pub print_tree: bool,
    /// Show a progress bar
    pub progress: bool,
    /// Report format
    pub output_format: OutputFormat,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            algorithm: HashAlgorithm::Sha256,
            concurrency: 0, // Auto-detect
            chunk_size: DEFAULT_CHUNK_SIZE,
            unreadable_dirs: UnreadableDirPolicy::Skip,
            output_dir: None,
            log_file: None,
            write_digest: true,
            print_tree: false,
            progress: true,
            output_format: OutputFormat::Text,
        }
    }
}

impl DigestConfig {
    /// Create config from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        let chunk_size = parse_size(&args.chunk_size)
            .map_err(|e| format!("Invalid chunk size: {}", e))?;
        if chunk_size == 0 {
            return Err("Chunk size must be greater than zero".to_string());
        }
        if chunk_size > MAX_CHUNK_SIZE as u64 {
            return Err(format!(
                "Chunk size {} exceeds the maximum of {}",
                args.chunk_size,
                humansize::format_size(MAX_CHUNK_SIZE as u64, humansize::BINARY)
            ));
        }
        let chunk_size = chunk_size as usize;

        Ok(Self {
            root: args.path.clone(),
            algorithm: args.algorithm,
            concurrency: args.concurrency,
            chunk_size,
            unreadable_dirs: if args.strict_dirs {
                UnreadableDirPolicy::Fail
            } else {
                UnreadableDirPolicy::Skip
            },
            output_dir: args.output_dir.clone(),
            log_file: args.log_file.clone(),
            write_digest: !args.no_write,
            print_tree: args.print_tree,
            progress: !args.quiet && args.output_format == OutputFormat::Text,
            output_format: args.output_format,
        })
    }

    /// Effective size of the admission gate
    pub fn concurrency_limit(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get() * CONCURRENCY_PER_CPU
        } else {
            self.concurrency
        }
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(|c| c == 'G' || c == 'B'), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(|c| c == 'M' || c == 'B'), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(|c| c == 'K' || c == 'B'), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Invalid number: {}", num_str));
    }

    Ok((num * multiplier as f64) as u64)
}
