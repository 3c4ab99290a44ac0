//! Mapping planner: turns an instruction and a snapshot into a per-file
//! operation plan.

mod prompt;

pub use prompt::create_mapping_prompt;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::api::{CompletionRequest, LanguageModel};
use crate::config::Settings;
use crate::conversation::Conversation;
use crate::error::MutationError;
use crate::workspace::WorkspaceTree;

/// Structural change planned for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum OperationOnFile {
    None,
    Delete,
    Rename {
        name: String,
    },
    Add {
        #[serde(default)]
        names: Vec<String>,
    },
    Expand {
        #[serde(default)]
        names: Vec<String>,
    },
}

impl OperationOnFile {
    pub fn name(&self) -> &'static str {
        match self {
            OperationOnFile::None => "none",
            OperationOnFile::Delete => "delete",
            OperationOnFile::Rename { .. } => "rename",
            OperationOnFile::Add { .. } => "add",
            OperationOnFile::Expand { .. } => "expand",
        }
    }
}

static NO_OPERATION: OperationOnFile = OperationOnFile::None;

/// Relative path to planned operation. Keys are always files of the
/// snapshot the plan was made for, except `add` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FileMapPlan {
    entries: BTreeMap<String, OperationOnFile>,
}

impl FileMapPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Planned operation for `file_name`; files the plan leaves out get `none`.
    pub fn operation_for(&self, file_name: &str) -> &OperationOnFile {
        self.entries.get(file_name).unwrap_or(&NO_OPERATION)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OperationOnFile)> {
        self.entries.iter()
    }
}

/// Parse a service response into a plan, validated against `tree`.
///
/// Malformed JSON, unknown operations and keys naming files the snapshot
/// does not contain all fail with [`MutationError::PlanParse`]. There is no
/// fallback plan.
pub fn parse_plan(response: &str, tree: &WorkspaceTree) -> Result<FileMapPlan, MutationError> {
    let entries: BTreeMap<String, OperationOnFile> = serde_json::from_str(response.trim())
        .map_err(|e| MutationError::PlanParse {
            response: response.to_string(),
            reason: e.to_string(),
        })?;

    for (file_name, operation) in &entries {
        if matches!(operation, OperationOnFile::Add { .. }) {
            continue;
        }
        if !tree.contains_file(file_name) {
            return Err(MutationError::PlanParse {
                response: response.to_string(),
                reason: format!("\"{}\" is not a file in the workspace", file_name),
            });
        }
    }

    debug!("Parsed plan with {} entries", entries.len());
    Ok(FileMapPlan { entries })
}

/// Model parameters for one-shot planning.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&Settings> for PlanOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            model: settings.completion_model.clone(),
            max_tokens: settings.plan_max_tokens,
            temperature: settings.plan_temperature,
        }
    }
}

pub struct MappingPlanner<'a> {
    model: &'a dyn LanguageModel,
    options: PlanOptions,
}

impl<'a> MappingPlanner<'a> {
    pub fn new(model: &'a dyn LanguageModel, options: PlanOptions) -> Self {
        Self { model, options }
    }

    /// One-shot planning through the text completion capability.
    pub async fn plan(
        &self,
        instruction: &str,
        tree: &WorkspaceTree,
    ) -> Result<FileMapPlan, MutationError> {
        let prompt = create_mapping_prompt(instruction, &tree.file_names())?;
        info!("Requesting file mapping plan from {}", self.options.model);

        let candidates = self
            .model
            .complete(CompletionRequest {
                model: self.options.model.clone(),
                prompt,
                max_tokens: self.options.max_tokens,
                temperature: self.options.temperature,
            })
            .await
            .map_err(|e| MutationError::PlanRequest {
                instruction: instruction.to_string(),
                source: Box::new(e),
            })?;

        let response = candidates.into_iter().next().unwrap_or_default();
        debug!("Mapping response: {}", response);
        parse_plan(&response, tree)
    }

    /// Planning as the first turn of `conversation`, which the editor then
    /// continues so later turns see the plan.
    pub async fn plan_in_conversation(
        conversation: &Conversation,
        instruction: &str,
        tree: &WorkspaceTree,
    ) -> Result<FileMapPlan, MutationError> {
        let prompt = create_mapping_prompt(instruction, &tree.file_names())?;
        info!("Requesting file mapping plan in conversation");

        let reply = conversation
            .start_turn(&prompt)
            .await
            .map_err(|e| MutationError::PlanRequest {
                instruction: instruction.to_string(),
                source: Box::new(e),
            })?;

        debug!("Mapping response: {}", reply.content);
        parse_plan(&reply.content, tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::test_support::ScriptedModel;
    use std::sync::Arc;

    fn tree() -> WorkspaceTree {
        WorkspaceTree::from_paths(["src/a.js", "src/b.js"])
    }

    #[test]
    fn test_parse_all_operations() {
        let response = r#"
            {
                "src/a.js": { "operation": "rename", "name": "src/a.ts" },
                "src/b.js": { "operation": "delete" },
                "src/new.js": { "operation": "add" }
            }"#;
        let plan = parse_plan(response, &tree()).unwrap();

        assert_eq!(
            plan.operation_for("src/a.js"),
            &OperationOnFile::Rename {
                name: "src/a.ts".to_string()
            }
        );
        assert_eq!(plan.operation_for("src/b.js"), &OperationOnFile::Delete);
        assert_eq!(
            plan.operation_for("src/new.js"),
            &OperationOnFile::Add { names: vec![] }
        );
    }

    #[test]
    fn test_files_missing_from_plan_default_to_none() {
        let plan = parse_plan(r#"{"src/a.js": {"operation": "delete"}}"#, &tree()).unwrap();
        assert_eq!(plan.operation_for("src/b.js"), &OperationOnFile::None);
    }

    #[test]
    fn test_parse_rejects_malformed_response() {
        let err = parse_plan("Sure! Here is your mapping.", &tree()).unwrap_err();
        match err {
            MutationError::PlanParse { response, .. } => {
                assert_eq!(response, "Sure! Here is your mapping.")
            }
            other => panic!("expected PlanParse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_operation() {
        let err = parse_plan(r#"{"src/a.js": {"operation": "explode"}}"#, &tree()).unwrap_err();
        assert!(matches!(err, MutationError::PlanParse { .. }));
    }

    #[test]
    fn test_parse_rejects_keys_outside_tree() {
        let err = parse_plan(r#"{"lib/z.js": {"operation": "none"}}"#, &tree()).unwrap_err();
        match err {
            MutationError::PlanParse { reason, .. } => assert!(reason.contains("lib/z.js")),
            other => panic!("expected PlanParse, got {:?}", other),
        }
        // Directories are not files.
        assert!(parse_plan(r#"{"src": {"operation": "none"}}"#, &tree()).is_err());
    }

    #[tokio::test]
    async fn test_one_shot_plan_uses_completion_options() {
        let model = ScriptedModel::new();
        model.push_completion("\n\n{\"src/a.js\": {\"operation\": \"none\"}}");
        let options = PlanOptions {
            model: "planner".to_string(),
            max_tokens: 200,
            temperature: 0.0,
        };

        let plan = MappingPlanner::new(&model, options)
            .plan("tidy up", &tree())
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);

        let requests = model.completion_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "planner");
        assert_eq!(requests[0].max_tokens, 200);
        assert_eq!(requests[0].temperature, 0.0);
        assert!(requests[0].prompt.contains("\"src/a.js\", \"src/b.js\""));
    }

    #[tokio::test]
    async fn test_service_failure_is_plan_request_error() {
        let model = ScriptedModel::new();
        model.push_completion_error(ApiError::from_http_response(401, "bad key".to_string(), None));

        let err = MappingPlanner::new(&model, PlanOptions::from(&Settings::default()))
            .plan("tidy up", &tree())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::PlanRequest { .. }));
    }

    #[tokio::test]
    async fn test_empty_tree_makes_no_request() {
        let model = ScriptedModel::new();
        let err = MappingPlanner::new(&model, PlanOptions::from(&Settings::default()))
            .plan("tidy up", &WorkspaceTree::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::EmptyWorkspace));
        assert_eq!(model.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_conversational_plan_starts_conversation() {
        let model = Arc::new(ScriptedModel::new());
        model.push_chat_reply(r#"{"src/b.js": {"operation": "delete"}}"#);
        let conversation = Conversation::new(model.clone(), "chat");

        let plan = MappingPlanner::plan_in_conversation(&conversation, "drop b", &tree())
            .await
            .unwrap();
        assert_eq!(plan.operation_for("src/b.js"), &OperationOnFile::Delete);
        assert_eq!(conversation.history().len(), 2);
        assert_eq!(model.chat_requests()[0].messages.len(), 1);
    }
}
