use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Find the git root directory by searching upward from `start`.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut path = start;

    loop {
        if path.join(".git").exists() {
            return Some(path.to_path_buf());
        }
        path = path.parent()?;
    }
}

/// Resolve the workspace root: the given path, else the enclosing git root,
/// else the current directory.
pub fn resolve_workspace_root(workspace_root: Option<String>) -> Result<PathBuf> {
    if let Some(path) = workspace_root {
        return PathBuf::from(&path)
            .canonicalize()
            .with_context(|| format!("Failed to canonicalize provided workspace root: {}", path));
    }

    let current = std::env::current_dir().context("Failed to get current directory")?;
    Ok(find_git_root(&current).unwrap_or(current))
}
