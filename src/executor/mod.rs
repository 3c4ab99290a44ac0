//! Edit executor: walks a plan file by file and collects the edited output.
//!
//! Files are processed in the snapshot's enumeration order, one at a time.
//! The first failing file aborts the whole batch; nothing touches the disk
//! here, so an aborted batch leaves the workspace as it was.

mod prompt;

use prompt::{
    create_chat_edit_prompt, create_edit_prompt, extract_file_contents, Extracted,
    DESCRIPTION_PROMPT,
};

use clap::ValueEnum;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api::{EditRequest, LanguageModel};
use crate::config::Settings;
use crate::conversation::Conversation;
use crate::coordinator::{OperationToken, Outcome};
use crate::error::MutationError;
use crate::planner::{FileMapPlan, OperationOnFile};
use crate::workspace::{resolve_in_root, OutputFile, WorkspaceTree};

/// How file edits are requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditMode {
    /// One stateless edit request per file.
    #[value(name = "edit")]
    Individual,
    /// One chat turn per file, continuing the planning conversation.
    #[value(name = "chat")]
    Conversational,
}

impl std::fmt::Display for EditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditMode::Individual => f.write_str("independent"),
            EditMode::Conversational => f.write_str("chat"),
        }
    }
}

/// Where edit requests go.
#[derive(Clone, Copy)]
pub enum EditSession<'a> {
    Individual,
    Conversational(&'a Conversation),
}

impl EditSession<'_> {
    pub fn mode(&self) -> EditMode {
        match self {
            EditSession::Individual => EditMode::Individual,
            EditSession::Conversational(_) => EditMode::Conversational,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditOptions {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_file_length_chars: usize,
}

impl From<&Settings> for EditOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.edit_model.clone(),
            temperature: settings.edit_temperature,
            max_file_length_chars: settings.max_file_length_chars,
        }
    }
}

/// Output of a finished batch, in plan enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBatch {
    pub output_files: Vec<OutputFile>,
    pub description: String,
    /// Files whose chat reply had no `@@@` markers and was taken verbatim.
    pub unmarked_replies: Vec<String>,
}

pub struct EditExecutor<'a> {
    model: &'a dyn LanguageModel,
    options: EditOptions,
}

/// Refuse plans the executor cannot carry out before any request is made.
fn ensure_supported(plan: &FileMapPlan) -> Result<(), MutationError> {
    for (file_name, operation) in plan.iter() {
        if matches!(
            operation,
            OperationOnFile::Add { .. } | OperationOnFile::Expand { .. }
        ) {
            return Err(MutationError::UnsupportedOperation {
                file: file_name.clone(),
                operation: operation.name().to_string(),
            });
        }
    }
    Ok(())
}

fn output_file_name<'p>(file_name: &'p str, operation: &'p OperationOnFile) -> &'p str {
    match operation {
        OperationOnFile::Rename { name } if !name.trim().is_empty() => name,
        _ => file_name,
    }
}

/// Summary for batches that have no conversation to ask.
pub fn describe_locally(instruction: &str, output_files: &[OutputFile]) -> String {
    let mut lines = Vec::with_capacity(output_files.len() + 1);
    lines.push(format!(
        "Applied \"{}\" to {} file(s).",
        instruction,
        output_files.len()
    ));
    for output_file in output_files {
        let line = if output_file.is_deleted() {
            format!("- deleted {}", output_file.file_name)
        } else if let Some(old) = output_file.old_file_name() {
            format!("- renamed {} to {}", old, output_file.file_name)
        } else {
            format!("- edited {}", output_file.file_name)
        };
        lines.push(line);
    }
    lines.join("\n")
}

impl<'a> EditExecutor<'a> {
    pub fn new(model: &'a dyn LanguageModel, options: EditOptions) -> Self {
        Self { model, options }
    }

    /// Produce the output files for `plan`.
    ///
    /// Returns [`Outcome::Superseded`] as soon as `token` goes stale, checked
    /// after every file.
    pub async fn apply_plan(
        &self,
        instruction: &str,
        tree: &WorkspaceTree,
        plan: &FileMapPlan,
        root: &Path,
        session: EditSession<'_>,
        token: &OperationToken,
    ) -> Result<Outcome<EditBatch>, MutationError> {
        ensure_supported(plan)?;

        let file_names = tree.file_names();
        info!(
            "Editing {} file(s) with {} requests",
            file_names.len(),
            session.mode()
        );

        let mut output_files = Vec::with_capacity(file_names.len());
        let mut unmarked_replies = Vec::new();
        for file_name in &file_names {
            if let Some(superseded) = token.check() {
                return Ok(superseded);
            }

            let operation = plan.operation_for(file_name);
            debug!("Operate on file {} operation: {}", file_name, operation.name());

            if matches!(operation, OperationOnFile::Delete) {
                output_files.push(OutputFile::deleted(file_name.as_str()));
                continue;
            }

            let contents = self.read_input(root, file_name).await?;
            let target = output_file_name(file_name, operation);

            let text = match session {
                EditSession::Individual => {
                    self.edit_individually(instruction, file_name, contents)
                        .await?
                }
                EditSession::Conversational(conversation) => {
                    let extracted =
                        Self::edit_in_conversation(conversation, file_name, target, &contents)
                            .await?;
                    if extracted.used_fallback {
                        unmarked_replies.push(file_name.clone());
                    }
                    extracted.text
                }
            };

            output_files.push(OutputFile::renamed(file_name.as_str(), target, text));
        }

        if let Some(superseded) = token.check() {
            return Ok(superseded);
        }

        let description = match session {
            EditSession::Individual => describe_locally(instruction, &output_files),
            EditSession::Conversational(conversation) => {
                let reply = conversation
                    .continue_turn(DESCRIPTION_PROMPT)
                    .await
                    .map_err(|e| MutationError::DescriptionFailed {
                        source: Box::new(e),
                    })?;
                reply.content
            }
        };

        if let Some(superseded) = token.check() {
            return Ok(superseded);
        }

        info!("Produced {} output file(s)", output_files.len());
        Ok(Outcome::Completed(EditBatch {
            output_files,
            description,
            unmarked_replies,
        }))
    }

    async fn read_input(&self, root: &Path, file_name: &str) -> Result<String, MutationError> {
        let path = resolve_in_root(root, file_name)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| MutationError::ReadFile {
                file: file_name.to_string(),
                source,
            })?;
        let contents = match String::from_utf8(bytes) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("{} is not valid UTF-8, decoding lossily", file_name);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        let length = contents.chars().count();
        if length > self.options.max_file_length_chars {
            return Err(MutationError::FileTooLarge {
                file: file_name.to_string(),
                length,
                max: self.options.max_file_length_chars,
            });
        }
        Ok(contents)
    }

    async fn edit_individually(
        &self,
        instruction: &str,
        file_name: &str,
        contents: String,
    ) -> Result<String, MutationError> {
        let candidates = self
            .model
            .edit(EditRequest {
                model: self.options.model.clone(),
                input: contents,
                instruction: create_edit_prompt(instruction),
                temperature: self.options.temperature,
            })
            .await
            .map_err(|e| MutationError::EditFailed {
                file: file_name.to_string(),
                mode: EditMode::Individual,
                source: Box::new(e),
            })?;

        Ok(candidates.into_iter().next().unwrap_or_default())
    }

    async fn edit_in_conversation(
        conversation: &Conversation,
        file_name: &str,
        output_file_name: &str,
        contents: &str,
    ) -> Result<Extracted, MutationError> {
        let prompt = create_chat_edit_prompt(file_name, output_file_name, contents);
        let reply = conversation
            .continue_turn(&prompt)
            .await
            .map_err(|e| MutationError::EditFailed {
                file: file_name.to_string(),
                mode: EditMode::Conversational,
                source: Box::new(e),
            })?;

        Ok(extract_file_contents(file_name, &reply.content))
    }
}
