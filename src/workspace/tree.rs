//! In-memory tree of the relative file paths captured by a snapshot.

use serde::Serialize;
use std::collections::BTreeMap;

/// A node is either a file (holding its root-relative path) or a directory.
///
/// Serializes untagged so a tree renders as nested JSON objects with string
/// leaves, the shape the planner prompt and `snapshot --json` show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TreeNode {
    File(String),
    Directory(WorkspaceTree),
}

/// Directory listing keyed by path segment.
///
/// Children are kept sorted, so enumeration order is stable regardless of the
/// order files were discovered in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WorkspaceTree {
    entries: BTreeMap<String, TreeNode>,
}

impl WorkspaceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from root-relative paths using `/` separators.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path.as_ref());
        }
        tree
    }

    /// Insert a file. Returns false for empty paths or when a segment
    /// collides with an existing file of the same name.
    pub(super) fn insert(&mut self, relative_path: &str) -> bool {
        let segments: Vec<&str> = relative_path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file_name, folders)) = segments.split_last() else {
            return false;
        };

        let mut folder = self;
        for part in folders {
            let node = folder
                .entries
                .entry((*part).to_string())
                .or_insert_with(|| TreeNode::Directory(WorkspaceTree::new()));
            folder = match node {
                TreeNode::Directory(child) => child,
                TreeNode::File(_) => return false,
            };
        }

        folder
            .entries
            .insert((*file_name).to_string(), TreeNode::File(segments.join("/")));
        true
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.entries.get(name)
    }

    /// Flattened file list, depth-first in sorted segment order.
    pub fn file_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_file_names(&mut names);
        names
    }

    fn collect_file_names(&self, out: &mut Vec<String>) {
        for node in self.entries.values() {
            match node {
                TreeNode::File(path) => out.push(path.clone()),
                TreeNode::Directory(child) => child.collect_file_names(out),
            }
        }
    }

    pub fn contains_file(&self, relative_path: &str) -> bool {
        let mut folder = self;
        let mut segments = relative_path.split('/').peekable();
        while let Some(segment) = segments.next() {
            match (folder.entries.get(segment), segments.peek()) {
                (Some(TreeNode::File(_)), None) => return true,
                (Some(TreeNode::Directory(child)), Some(_)) => folder = child,
                _ => return false,
            }
        }
        false
    }
}
