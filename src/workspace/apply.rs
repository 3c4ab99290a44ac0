//! Writing edited files back to the workspace.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::MutationError;

/// Multiple of the input file limit an output list may reach.
const OUTPUT_FILES_PER_INPUT_FILE: usize = 2;

/// What happens to an output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// Write `text`; when renamed, `renamed_from` is removed afterwards.
    Write {
        text: String,
        renamed_from: Option<String>,
    },
    Delete,
}

/// One file produced by the edit executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub file_name: String,
    pub change: FileChange,
}

impl OutputFile {
    pub fn write(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            change: FileChange::Write {
                text: text.into(),
                renamed_from: None,
            },
        }
    }

    /// A write that replaces `old_file_name`. Collapses to a plain write when
    /// the names are equal, since a rename onto itself must not delete the file.
    pub fn renamed(
        old_file_name: impl Into<String>,
        file_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let file_name = file_name.into();
        let old_file_name = old_file_name.into();
        let renamed_from = (old_file_name != file_name).then_some(old_file_name);
        Self {
            file_name,
            change: FileChange::Write {
                text: text.into(),
                renamed_from,
            },
        }
    }

    pub fn deleted(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            change: FileChange::Delete,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.change, FileChange::Delete)
    }

    pub fn is_renamed(&self) -> bool {
        self.old_file_name().is_some()
    }

    pub fn text(&self) -> Option<&str> {
        match &self.change {
            FileChange::Write { text, .. } => Some(text),
            FileChange::Delete => None,
        }
    }

    pub fn old_file_name(&self) -> Option<&str> {
        match &self.change {
            FileChange::Write { renamed_from, .. } => renamed_from.as_deref(),
            FileChange::Delete => None,
        }
    }
}

/// Join a root-relative path onto `root`, refusing absolute paths and `..`.
pub fn resolve_in_root(root: &Path, relative: &str) -> Result<PathBuf, MutationError> {
    let candidate = Path::new(relative);
    let escapes = relative.is_empty()
        || candidate.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(MutationError::PathEscapesRoot {
            file: relative.to_string(),
        });
    }
    Ok(root.join(candidate))
}

/// Remove a file if it is there; failures are logged and swallowed.
pub async fn remove_best_effort(path: &Path) {
    match tokio::fs::try_exists(path).await {
        Ok(true) => {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!("Could not remove {}: {}", path.display(), e);
            }
        }
        Ok(false) => debug!("Nothing to remove at {}", path.display()),
        Err(e) => debug!("Could not check {}: {}", path.display(), e),
    }
}

/// Apply output files to disk in order.
///
/// Nothing is rolled back if a later file fails; files already written stay
/// written.
pub async fn apply_output_files(
    root: &Path,
    output_files: &[OutputFile],
    max_input_files: usize,
) -> Result<(), MutationError> {
    let max = max_input_files.saturating_mul(OUTPUT_FILES_PER_INPUT_FILE);
    if output_files.len() > max {
        return Err(MutationError::TooManyOutputFiles {
            count: output_files.len(),
            max,
        });
    }

    // Validate every path before touching the disk.
    for output_file in output_files {
        resolve_in_root(root, &output_file.file_name)?;
        if let Some(old) = output_file.old_file_name() {
            resolve_in_root(root, old)?;
        }
    }

    info!("Applying {} output file(s)", output_files.len());

    for output_file in output_files {
        let full_path = resolve_in_root(root, &output_file.file_name)?;

        match &output_file.change {
            FileChange::Delete => {
                debug!("Deleting {}", output_file.file_name);
                remove_best_effort(&full_path).await;
            }
            FileChange::Write { text, renamed_from } => {
                debug!("Writing {}", output_file.file_name);
                if let Some(parent) = full_path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|source| MutationError::WriteFile {
                            file: output_file.file_name.clone(),
                            source,
                        })?;
                }
                tokio::fs::write(&full_path, text)
                    .await
                    .map_err(|source| MutationError::WriteFile {
                        file: output_file.file_name.clone(),
                        source,
                    })?;

                if let Some(old) = renamed_from {
                    debug!("Removing rename source {}", old);
                    remove_best_effort(&resolve_in_root(root, old)?).await;
                }
            }
        }
    }

    Ok(())
}
