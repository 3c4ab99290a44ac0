//! Git subprocess helpers: diff capture and remote checkout preparation.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::MutationError;

/// Folder a remote repository is cloned into inside its working directory.
pub const DEFAULT_CLONE_FOLDER_NAME: &str = "project";

async fn run_git(args: &[&str], cwd: &Path) -> Result<String, MutationError> {
    let command = args.join(" ");
    debug!("Running git {} in {}", command, cwd.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| MutationError::Vcs {
            command: command.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MutationError::Vcs {
            command,
            message: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Stage every working-tree change and return the staged diff with one line
/// of context.
pub async fn staged_diff(root: &Path) -> Result<String, MutationError> {
    run_git(&["add", "."], root).await?;
    run_git(&["diff", "-U1", "--staged"], root).await
}

/// Clone `git_url` into a fresh directory under the system temp dir and
/// check out a branch named after the operation.
///
/// Returns the path of the cloned project.
pub async fn prepare_remote_workspace(git_url: &str) -> Result<PathBuf, MutationError> {
    let operation_id = format!("codemorph-{}", Uuid::new_v4());
    let working_directory = std::env::temp_dir().join(&operation_id);

    tokio::fs::create_dir_all(&working_directory)
        .await
        .map_err(|source| MutationError::Access {
            path: working_directory.clone(),
            source,
        })?;
    info!("Created working directory {}", working_directory.display());

    info!("Cloning {}...", git_url);
    run_git(
        &["clone", git_url, DEFAULT_CLONE_FOLDER_NAME],
        &working_directory,
    )
    .await?;

    let project = working_directory.join(DEFAULT_CLONE_FOLDER_NAME);
    run_git(&["checkout", "-b", &operation_id], &project).await?;
    debug!("Checked out branch {}", operation_id);

    Ok(project)
}

/// Whether a usable `git` binary is on PATH.
pub async fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
