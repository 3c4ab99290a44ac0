//! Error taxonomy for the mutation pipeline.
//!
//! Every stage reports failures through [`MutationError`] so callers can render
//! a message naming the stage, and where relevant the file, without digging
//! through the underlying cause. Being superseded by a newer operation is not
//! an error; see [`crate::coordinator::Outcome`].

use std::path::PathBuf;

use thiserror::Error;

use crate::executor::EditMode;

/// Boxed cause attached to per-file edit failures.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Cannot access folder \"{}\": {source}", path.display())]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid glob pattern \"{pattern}\": {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Too many input files passed, current max is {max} files, {count} found.")]
    TooManyInputFiles { count: usize, max: usize },

    #[error("No files found in the workspace to plan changes for")]
    EmptyWorkspace,

    #[error("Unable to request a file mapping plan for instructions \"{instruction}\": {source}")]
    PlanRequest {
        instruction: String,
        #[source]
        source: BoxedCause,
    },

    #[error("Unable to parse file mapping response ({reason}). Response was: {response}")]
    PlanParse { response: String, reason: String },

    #[error("Operation \"{operation}\" planned for \"{file}\" is not supported by the editor")]
    UnsupportedOperation { file: String, operation: String },

    #[error(
        "Too large of an input file passed, current max is {max} characters. \"{file}\" was \"{length}\"."
    )]
    FileTooLarge {
        file: String,
        length: usize,
        max: usize,
    },

    #[error("Unable to read \"{file}\": {source}")]
    ReadFile {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to perform {mode} edit request using contents from file \"{file}\": {source}")]
    EditFailed {
        file: String,
        mode: EditMode,
        #[source]
        source: BoxedCause,
    },

    #[error("Unable to get a description of the changes: {source}")]
    DescriptionFailed {
        #[source]
        source: BoxedCause,
    },

    #[error("Too many output files: {count} (max {max})")]
    TooManyOutputFiles { count: usize, max: usize },

    #[error("Output path \"{file}\" escapes the workspace root")]
    PathEscapesRoot { file: String },

    #[error("Unable to write \"{file}\": {source}")]
    WriteFile {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {command}` failed: {message}")]
    Vcs { command: String, message: String },

    #[error("Unable to get an answer to the question: {source}")]
    QuestionFailed {
        #[source]
        source: BoxedCause,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl MutationError {
    /// Pipeline stage the error belongs to, for log fields and CLI output.
    pub fn stage(&self) -> &'static str {
        match self {
            MutationError::Access { .. }
            | MutationError::InvalidGlob { .. }
            | MutationError::TooManyInputFiles { .. } => "snapshot",
            MutationError::EmptyWorkspace
            | MutationError::PlanRequest { .. }
            | MutationError::PlanParse { .. } => "plan",
            MutationError::UnsupportedOperation { .. }
            | MutationError::FileTooLarge { .. }
            | MutationError::ReadFile { .. }
            | MutationError::EditFailed { .. }
            | MutationError::DescriptionFailed { .. } => "edit",
            MutationError::TooManyOutputFiles { .. }
            | MutationError::PathEscapesRoot { .. }
            | MutationError::WriteFile { .. } => "apply",
            MutationError::Vcs { .. } => "vcs",
            MutationError::QuestionFailed { .. } => "question",
            MutationError::Task(_) => "runtime",
        }
    }

    /// File the error is about, when there is one.
    pub fn file(&self) -> Option<&str> {
        match self {
            MutationError::UnsupportedOperation { file, .. }
            | MutationError::FileTooLarge { file, .. }
            | MutationError::ReadFile { file, .. }
            | MutationError::EditFailed { file, .. }
            | MutationError::PathEscapesRoot { file }
            | MutationError::WriteFile { file, .. } => Some(file),
            _ => None,
        }
    }
}
