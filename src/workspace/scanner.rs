//! Snapshot construction: walk a root directory and keep the files matching
//! the include globs and none of the exclude globs.
//!
//! Glob matching uses `ignore::overrides`, so patterns follow gitignore
//! syntax (a pattern without `/` matches a file name at any depth).

use ignore::overrides::{Override, OverrideBuilder};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::tree::WorkspaceTree;
use crate::error::MutationError;

/// Include pattern used when none is given: every file at any depth.
pub const DEFAULT_INCLUDE_PATTERN: &str = "**/*";

/// Glob filters for a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Immutable view of a workspace's relative file paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tree: WorkspaceTree,
    pub file_count: usize,
}

fn build_override(root: &Path, patterns: &[String], negate: bool) -> Result<Override, MutationError> {
    let mut builder = OverrideBuilder::new(root);
    for pattern in patterns {
        let glob = if negate {
            format!("!{}", pattern)
        } else {
            pattern.clone()
        };
        builder
            .add(&glob)
            .map_err(|e| MutationError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }
    builder.build().map_err(|e| MutationError::InvalidGlob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

fn is_hidden_segment(segment: &str) -> bool {
    segment.starts_with('.')
}

/// Collect every non-hidden file under `root` as a `/`-separated relative path.
fn walk_relative_files(root: &Path) -> Vec<String> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        // Depth 0 is the root itself, which may legitimately be a dot-directory.
        .filter_entry(|entry| {
            entry.depth() == 0 || !is_hidden_segment(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.path().strip_prefix(root) {
            Ok(relative) => files.push(relative.to_string_lossy().replace('\\', "/")),
            Err(_) => warn!("Failed to get relative path for {}", entry.path().display()),
        }
    }
    files
}

/// Build a snapshot of `root`.
///
/// Each include glob is matched on its own and the results are unioned
/// through a dedup set, so the glob order never changes the outcome.
pub fn build_snapshot(root: &Path, options: &SnapshotOptions) -> Result<Snapshot, MutationError> {
    std::fs::read_dir(root).map_err(|source| MutationError::Access {
        path: root.to_path_buf(),
        source,
    })?;

    let include: Vec<String> = if options.include.is_empty() {
        vec![DEFAULT_INCLUDE_PATTERN.to_string()]
    } else {
        options.include.clone()
    };

    let excludes = build_override(root, &options.exclude, true)?;
    let candidates: Vec<String> = walk_relative_files(root)
        .into_iter()
        .filter(|path| !excludes.matched(path, false).is_ignore())
        .collect();

    let mut unique_file_names = BTreeSet::new();
    for pattern in &include {
        let matcher = build_override(root, std::slice::from_ref(pattern), false)?;
        let matched: Vec<&String> = candidates
            .iter()
            .filter(|path| matcher.matched(path.as_str(), false).is_whitelist())
            .collect();
        debug!("Pattern {} matched {} file(s)", pattern, matched.len());
        unique_file_names.extend(matched.into_iter().cloned());
    }

    let tree = WorkspaceTree::from_paths(&unique_file_names);
    debug!(
        "Snapshot of {} has {} file(s)",
        root.display(),
        unique_file_names.len()
    );

    Ok(Snapshot {
        tree,
        file_count: unique_file_names.len(),
    })
}
