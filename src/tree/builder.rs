//! Sequential filesystem scan into a [`DirectoryTree`]
//!
//! The scan is single-threaded and completes before any file is read for
//! hashing, so the work list handed to the hasher is final. `walkdir` keeps
//! the number of open directory handles bounded however deep the tree is.

use crate::config::UnreadableDirPolicy;
use crate::error::{DigestError, Result};
use crate::tree::{DirectoryTree, NodeId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Counters collected while scanning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Directory edges traversed (subdirectories below the root)
    pub directories: u64,
    /// Regular files found
    pub files: u64,
    /// Sum of regular file sizes; under-reported when metadata is unavailable
    pub bytes: u64,
    /// Directories whose listing failed and were treated as empty
    pub unreadable_dirs: u64,
    /// Files whose size could not be read
    pub metadata_errors: u64,
}

impl TreeStats {
    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} directories, {} files found. {} will be processed.",
            self.directories,
            self.files,
            humansize::format_size(self.bytes, humansize::BINARY)
        )
    }
}

/// Builds a [`DirectoryTree`] by depth-first descent from a root directory
pub struct TreeBuilder {
    root: PathBuf,
    policy: UnreadableDirPolicy,
}

impl TreeBuilder {
    /// Create a builder for the given root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: UnreadableDirPolicy::default(),
        }
    }

    /// Set how directory listing failures are handled
    pub fn with_policy(mut self, policy: UnreadableDirPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scan the filesystem and return the tree with its counters
    pub fn build(&self) -> Result<(DirectoryTree, TreeStats)> {
        let mut tree = DirectoryTree::new(self.root.clone());
        let mut stats = TreeStats::default();

        // open[d] is the directory currently being listed at depth d
        let mut open = vec![OpenDir::new(tree.root())];

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    self.walk_error(err, &tree, &mut open, &mut stats)?;
                    continue;
                }
            };

            let depth = entry.depth();
            if depth == 0 {
                if !entry.file_type().is_dir() {
                    let source = std::io::Error::new(std::io::ErrorKind::Other, "not a directory");
                    self.unreadable(entry.path(), source, &mut stats)?;
                    open[0].unreadable = true;
                }
                continue;
            }

            for finished in open.drain(depth..) {
                finished.close(&tree);
            }
            let parent = &mut open[depth - 1];
            parent.entries += 1;
            let parent = parent.id;

            let file_type = entry.file_type();
            if file_type.is_dir() {
                stats.directories += 1;
                let child = tree.insert(parent, entry.path());
                open.push(OpenDir::new(child));
            } else if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "Skipping symbolic link");
            } else {
                tree.add_file(parent, entry.file_name());
                stats.files += 1;

                match entry.metadata() {
                    Ok(meta) => stats.bytes += meta.len(),
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Failed to read file metadata");
                        stats.metadata_errors += 1;
                    }
                }
            }
        }

        for finished in open {
            finished.close(&tree);
        }

        info!(
            root = %self.root.display(),
            directories = stats.directories,
            files = stats.files,
            bytes = stats.bytes,
            unreadable_dirs = stats.unreadable_dirs,
            "Directory tree built"
        );
        Ok((tree, stats))
    }

    /// A failed listing of an open directory goes through the policy; any
    /// other walk error concerns a single entry and is skipped.
    fn walk_error(
        &self,
        err: walkdir::Error,
        tree: &DirectoryTree,
        open: &mut [OpenDir],
        stats: &mut TreeStats,
    ) -> Result<()> {
        let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());
        let listing = open
            .iter_mut()
            .rev()
            .find(|dir| tree.node(dir.id).path() == path);

        match listing {
            Some(dir) => {
                dir.unreadable = true;
                let message = err.to_string();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message));
                self.unreadable(&path, source, stats)
            }
            None => {
                warn!(path = %path.display(), error = %err, "Failed to read directory entry");
                Ok(())
            }
        }
    }

    fn unreadable(&self, dir: &Path, source: std::io::Error, stats: &mut TreeStats) -> Result<()> {
        match self.policy {
            UnreadableDirPolicy::Skip => {
                warn!(
                    path = %dir.display(),
                    error = %source,
                    "Directory could not be listed, treating it as empty"
                );
                stats.unreadable_dirs += 1;
                Ok(())
            }
            UnreadableDirPolicy::Fail => Err(DigestError::UnreadableDirectory {
                path: dir.to_path_buf(),
                source,
            }),
        }
    }
}

/// A directory whose listing is in progress during the walk
struct OpenDir {
    id: NodeId,
    entries: usize,
    unreadable: bool,
}

impl OpenDir {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            entries: 0,
            unreadable: false,
        }
    }

    fn close(self, tree: &DirectoryTree) {
        if self.entries == 0 && !self.unreadable {
            debug!(path = %tree.node(self.id).path().display(), "Empty directory");
        }
    }
}

/// Check that `path` is an existing, listable directory
pub fn validate_root(path: &Path) -> Result<PathBuf> {
    let metadata = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DigestError::NotFound(path.to_path_buf()));
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DigestError::PermissionDenied(path.to_path_buf()));
        }
        Err(e) => return Err(DigestError::io(path, e)),
    };

    if !metadata.is_dir() {
        return Err(DigestError::NotADirectory(path.to_path_buf()));
    }

    fs::read_dir(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            DigestError::PermissionDenied(path.to_path_buf())
        } else {
            DigestError::io(path, e)
        }
    })?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileRef;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn scenario_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"world").unwrap();
        dir
    }

    #[test]
    fn test_scenario_counts() {
        let dir = scenario_dir();
        let (tree, stats) = TreeBuilder::new(dir.path()).build().unwrap();

        assert_eq!(stats.directories, 1);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.bytes, 10);
        assert_eq!(stats.unreadable_dirs, 0);
        assert_eq!(tree.file_count(), 2);

        let files: HashSet<_> = tree.files().into_iter().collect();
        let expected: HashSet<_> = [
            FileRef::new(dir.path(), "a.txt"),
            FileRef::new(dir.path().join("sub"), "b.txt"),
        ]
        .into_iter()
        .collect();
        assert_eq!(files, expected);
    }

    #[test]
    fn test_nested_weights() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("x/y/z")).unwrap();
        std::fs::create_dir(dir.path().join("w")).unwrap();
        for p in ["x/1", "x/y/2", "x/y/z/3", "x/y/z/4", "w/5"] {
            std::fs::write(dir.path().join(p), p).unwrap();
        }

        let (tree, stats) = TreeBuilder::new(dir.path()).build().unwrap();
        assert_eq!(stats.directories, 4);
        assert_eq!(tree.node(tree.root()).weight(), 5);

        for id in tree.node(tree.root()).children() {
            let node = tree.node(*id);
            let expected = if node.path().ends_with("x") { 4 } else { 1 };
            assert_eq!(node.weight(), expected);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_skipped() {
        let dir = scenario_dir();
        std::os::unix::fs::symlink(dir.path().join("a.txt"), dir.path().join("link.txt")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("link_dir")).unwrap();

        let (tree, stats) = TreeBuilder::new(dir.path()).build().unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.directories, 1);
        assert_eq!(tree.files().len(), 2);
    }

    #[test]
    fn test_unlistable_root_policy() {
        let dir = scenario_dir();
        // Listing a regular file fails the same way an unreadable directory does
        let not_a_dir = dir.path().join("a.txt");

        let (tree, stats) = TreeBuilder::new(&not_a_dir).build().unwrap();
        assert_eq!(stats.unreadable_dirs, 1);
        assert_eq!(tree.file_count(), 0);

        let err = TreeBuilder::new(&not_a_dir)
            .with_policy(UnreadableDirPolicy::Fail)
            .build()
            .unwrap_err();
        assert!(matches!(err, DigestError::UnreadableDirectory { .. }));
    }

    #[test]
    fn test_deep_tree_keeps_every_file() {
        let dir = TempDir::new().unwrap();
        let mut leaf = dir.path().to_path_buf();
        for _ in 0..300 {
            leaf.push("d");
        }
        std::fs::create_dir_all(&leaf).unwrap();
        std::fs::write(leaf.join("leaf.txt"), b"bottom").unwrap();

        let (tree, stats) = TreeBuilder::new(dir.path())
            .with_policy(UnreadableDirPolicy::Fail)
            .build()
            .unwrap();

        assert_eq!(stats.directories, 300);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.unreadable_dirs, 0);
        assert_eq!(tree.node(tree.root()).weight(), 1);
        assert_eq!(tree.files(), vec![FileRef::new(leaf, "leaf.txt")]);
    }

    #[test]
    fn test_missing_root_policy() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        let (_, stats) = TreeBuilder::new(&missing).build().unwrap();
        assert_eq!(stats.unreadable_dirs, 1);

        let err = TreeBuilder::new(&missing)
            .with_policy(UnreadableDirPolicy::Fail)
            .build()
            .unwrap_err();
        assert!(matches!(err, DigestError::UnreadableDirectory { .. }));
    }

    #[test]
    fn test_validate_root() {
        let dir = scenario_dir();
        assert_eq!(validate_root(dir.path()).unwrap(), dir.path());
        assert!(matches!(
            validate_root(&dir.path().join("missing")),
            Err(DigestError::NotFound(_))
        ));
        assert!(matches!(
            validate_root(&dir.path().join("a.txt")),
            Err(DigestError::NotADirectory(_))
        ));
    }
}
