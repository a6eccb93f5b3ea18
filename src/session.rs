//! Run-scoped session folder
//!
//! Each run gets a UUIDv7 identifier and a folder `<base>/<uuid>/` holding its
//! log file and, on success, the digest file named after the algorithm.

use crate::config::HashAlgorithm;
use crate::error::{DigestError, IoResultExt, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// File name of the session log
pub const LOG_FILE_NAME: &str = "main.log";

/// A single digest run's identity and output location
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    dir: PathBuf,
}

impl Session {
    /// Create a session with a fresh id and make its folder under `base`
    pub fn create(base: &Path) -> Result<Self> {
        Self::with_id(base, Uuid::now_v7())
    }

    /// Create a session with a known id
    pub fn with_id(base: &Path, id: Uuid) -> Result<Self> {
        let dir = base.join(id.to_string());
        std::fs::create_dir_all(&dir).with_path(&dir)?;
        Ok(Self { id, dir })
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session folder
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Default log file location
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Where the digest for `algorithm` is written
    pub fn digest_path(&self, algorithm: HashAlgorithm) -> PathBuf {
        self.dir.join(algorithm.id())
    }

    /// Creation time embedded in the UUIDv7, if the id carries one
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        let (secs, nanos) = self.id.get_timestamp()?.to_unix();
        DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos)
    }

    /// Persist the digest; failures are reported as `OutputWrite`
    pub fn write_digest(&self, algorithm: HashAlgorithm, digest: &str) -> Result<PathBuf> {
        let path = self.digest_path(algorithm);
        std::fs::write(&path, digest).map_err(|source| DigestError::OutputWrite {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Digest written");
        Ok(path)
    }
}
