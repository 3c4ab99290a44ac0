//! Workspace access for the mutation pipeline.
//!
//! This module builds file-tree snapshots of a root directory, writes edited
//! files back, and talks to git for diffs and remote checkouts. Every path
//! that crosses this boundary is relative to the workspace root.

mod apply;
mod scanner;
mod tree;
mod vcs;

// Re-exports
pub use apply::{apply_output_files, resolve_in_root, FileChange, OutputFile};
pub use scanner::{build_snapshot, Snapshot, SnapshotOptions};
pub use tree::WorkspaceTree;
pub use vcs::{git_available, prepare_remote_workspace, staged_diff};
