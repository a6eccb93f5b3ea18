//! Arena-backed directory tree
//!
//! Every directory becomes a [`Node`] stored in one contiguous `Vec`; parent
//! and child links are [`NodeId`] indices into it, so a node's back-reference
//! to its parent never owns anything.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Index of a node inside a [`DirectoryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One regular file, identified by its directory and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRef {
    /// Directory containing the file, as walked from the root
    pub dir: PathBuf,
    /// File name within `dir`
    pub name: OsString,
}

impl FileRef {
    /// Create a new file reference
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<OsString>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Full path to open
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// Path of the file below `root`; falls back to the full path when the
    /// file does not live under `root`.
    pub fn relative_to(&self, root: &Path) -> PathBuf {
        match self.dir.strip_prefix(root) {
            Ok(rel) => rel.join(&self.name),
            Err(_) => self.path(),
        }
    }

    /// Canonical ordering key: directory bytes first, then name bytes.
    pub fn sort_key(&self) -> (&OsStr, &OsStr) {
        (self.dir.as_os_str(), self.name.as_os_str())
    }
}

/// A directory in the tree
#[derive(Debug, Clone)]
pub struct Node {
    path: PathBuf,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    files: Vec<OsString>,
    weight: usize,
}

impl Node {
    /// Directory path of this node
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parent directory, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Direct subdirectories
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Names of the files directly inside this directory
    pub fn files(&self) -> &[OsString] {
        &self.files
    }

    /// Number of files in this subtree
    pub fn weight(&self) -> usize {
        self.weight
    }
}

/// In-memory mirror of a scanned directory hierarchy
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    nodes: Vec<Node>,
}

impl DirectoryTree {
    /// Create a tree holding only the root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            nodes: vec![Node {
                path: root.into(),
                parent: None,
                children: Vec::new(),
                files: Vec::new(),
                weight: 0,
            }],
        }
    }

    /// Id of the root node
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Root directory path
    pub fn root_path(&self) -> &Path {
        &self.nodes[0].path
    }

    /// Look up a node.
    ///
    /// Ids are only handed out by this tree, so indexing cannot go out of
    /// bounds for ids obtained from it.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Number of directories, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of files in the tree
    pub fn file_count(&self) -> usize {
        self.nodes[0].weight
    }

    /// Insert a subdirectory under `parent` and return its id
    pub fn insert(&mut self, parent: NodeId, path: impl Into<PathBuf>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            path: path.into(),
            parent: Some(parent),
            children: Vec::new(),
            files: Vec::new(),
            weight: 0,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Record a file in `dir` and bump the weight of every ancestor
    pub fn add_file(&mut self, dir: NodeId, name: impl Into<OsString>) {
        self.nodes[dir.0].files.push(name.into());

        let mut current = Some(dir);
        while let Some(id) = current {
            let node = &mut self.nodes[id.0];
            node.weight += 1;
            current = node.parent;
        }
    }

    /// Flatten the tree into one `FileRef` per file.
    ///
    /// Breadth-first from the root; the order carries no meaning downstream.
    pub fn files(&self) -> Vec<FileRef> {
        let mut result = Vec::with_capacity(self.file_count());
        let mut queue = VecDeque::from([self.root()]);

        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            result.extend(
                node.files
                    .iter()
                    .map(|name| FileRef::new(node.path.clone(), name.clone())),
            );
            queue.extend(node.children.iter().copied());
        }

        result
    }

    /// Indented text dump of the hierarchy with weights and file names
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root(), 0usize)];

        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            let names: Vec<_> = node.files.iter().map(|n| n.to_string_lossy()).collect();
            let _ = writeln!(
                out,
                "{}{} (files: {}) [{}]",
                "  ".repeat(depth),
                node.path.display(),
                node.weight,
                names.join(", ")
            );
            // Reverse so children print in insertion order
            for child in node.children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }

        out
    }
}
