//! The mutation pipeline: snapshot, plan, edit, apply and diff.
//!
//! Every entry point begins an operation of its family on the shared
//! [`OperationCoordinator`] and re-checks the token after each await that
//! crosses a stage boundary. A superseded run returns
//! [`Outcome::Superseded`] at its next check and its partial results are
//! dropped.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::LanguageModel;
use crate::config::Settings;
use crate::conversation::Conversation;
use crate::coordinator::{OperationCoordinator, OperationFamily, OperationToken, Outcome};
use crate::error::MutationError;
use crate::executor::{EditBatch, EditExecutor, EditMode, EditOptions, EditSession};
use crate::planner::{FileMapPlan, MappingPlanner, PlanOptions};
use crate::question;
use crate::workspace::{
    apply_output_files, build_snapshot, prepare_remote_workspace, staged_diff, Snapshot,
    SnapshotOptions,
};

/// Return early with `Superseded` when the token has gone stale, otherwise
/// unwrap the stage result with `?`.
macro_rules! resume {
    ($token:expr, $result:expr) => {{
        let result = $result;
        if let Some(superseded) = $token.check() {
            return Ok(superseded);
        }
        result?
    }};
}

/// Plan and edited files, before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedEdit {
    pub plan: FileMapPlan,
    pub batch: EditBatch,
}

/// What a completed run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub diff: String,
    pub description: String,
    pub prepared: PreparedEdit,
}

#[derive(Clone)]
pub struct MutationPipeline {
    model: Arc<dyn LanguageModel>,
    settings: Arc<Settings>,
    coordinator: OperationCoordinator,
}

impl MutationPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, settings: Settings) -> Self {
        Self {
            model,
            settings: Arc::new(settings),
            coordinator: OperationCoordinator::new(),
        }
    }

    pub fn coordinator(&self) -> &OperationCoordinator {
        &self.coordinator
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Snapshot `root`, refusing workspaces over the input file limit.
    pub async fn load_snapshot(
        &self,
        root: &Path,
        options: SnapshotOptions,
    ) -> Result<Outcome<Snapshot>, MutationError> {
        let token = self.coordinator.begin(OperationFamily::SnapshotLoad);
        let result = self.snapshot_with_token(root, options, &token).await;
        self.coordinator.complete(&token);
        result
    }

    /// Clone `git_url` into a scratch directory and snapshot the checkout.
    pub async fn load_remote_snapshot(
        &self,
        git_url: &str,
        options: SnapshotOptions,
    ) -> Result<Outcome<(PathBuf, Snapshot)>, MutationError> {
        let token = self.coordinator.begin(OperationFamily::SnapshotLoad);
        let result = self.remote_snapshot_with_token(git_url, options, &token).await;
        self.coordinator.complete(&token);
        result
    }

    async fn remote_snapshot_with_token(
        &self,
        git_url: &str,
        options: SnapshotOptions,
        token: &OperationToken,
    ) -> Result<Outcome<(PathBuf, Snapshot)>, MutationError> {
        let root = resume!(token, prepare_remote_workspace(git_url).await);
        match self.snapshot_with_token(&root, options, token).await? {
            Outcome::Completed(snapshot) => Ok(Outcome::Completed((root, snapshot))),
            Outcome::Superseded => Ok(Outcome::Superseded),
        }
    }

    async fn snapshot_with_token(
        &self,
        root: &Path,
        options: SnapshotOptions,
        token: &OperationToken,
    ) -> Result<Outcome<Snapshot>, MutationError> {
        info!("Loading snapshot of {}", root.display());
        let walk_root = root.to_path_buf();
        let walked = tokio::task::spawn_blocking(move || build_snapshot(&walk_root, &options))
            .await
            .map_err(|e| MutationError::Task(e.to_string()))
            .and_then(|result| result);
        let snapshot = resume!(token, walked);

        let max = self.settings.max_input_files;
        if snapshot.file_count > max {
            return Err(MutationError::TooManyInputFiles {
                count: snapshot.file_count,
                max,
            });
        }

        info!("Snapshot has {} file(s)", snapshot.file_count);
        Ok(Outcome::Completed(snapshot))
    }

    /// Plan and edit without touching the disk.
    pub async fn prepare(
        &self,
        instruction: &str,
        snapshot: &Snapshot,
        root: &Path,
        mode: EditMode,
    ) -> Result<Outcome<PreparedEdit>, MutationError> {
        let token = self.coordinator.begin(OperationFamily::PlanAndEdit);
        let result = self
            .prepare_with_token(instruction, snapshot, root, mode, &token)
            .await;
        self.coordinator.complete(&token);
        result
    }

    async fn prepare_with_token(
        &self,
        instruction: &str,
        snapshot: &Snapshot,
        root: &Path,
        mode: EditMode,
        token: &OperationToken,
    ) -> Result<Outcome<PreparedEdit>, MutationError> {
        let executor = EditExecutor::new(
            self.model.as_ref(),
            EditOptions::from(self.settings.as_ref()),
        );

        let (plan, edited) = match mode {
            EditMode::Individual => {
                let planner = MappingPlanner::new(
                    self.model.as_ref(),
                    PlanOptions::from(self.settings.as_ref()),
                );
                let plan = resume!(token, planner.plan(instruction, &snapshot.tree).await);
                let edited = executor
                    .apply_plan(
                        instruction,
                        &snapshot.tree,
                        &plan,
                        root,
                        EditSession::Individual,
                        token,
                    )
                    .await;
                (plan, edited)
            }
            EditMode::Conversational => {
                let conversation =
                    Conversation::new(self.model.clone(), self.settings.chat_model.as_str());
                let plan = resume!(
                    token,
                    MappingPlanner::plan_in_conversation(&conversation, instruction, &snapshot.tree)
                        .await
                );
                let edited = executor
                    .apply_plan(
                        instruction,
                        &snapshot.tree,
                        &plan,
                        root,
                        EditSession::Conversational(&conversation),
                        token,
                    )
                    .await;
                (plan, edited)
            }
        };

        let batch = match resume!(token, edited) {
            Outcome::Completed(batch) => batch,
            Outcome::Superseded => return Ok(Outcome::Superseded),
        };
        Ok(Outcome::Completed(PreparedEdit { plan, batch }))
    }

    /// Run the whole pipeline for `instruction` against `root`.
    ///
    /// Files written before a failure stay written; there is no rollback.
    pub async fn run(
        &self,
        instruction: &str,
        snapshot: &Snapshot,
        root: &Path,
        mode: EditMode,
    ) -> Result<Outcome<MutationResult>, MutationError> {
        let token = self.coordinator.begin(OperationFamily::PlanAndEdit);
        info!("Running {} pipeline for \"{}\"", mode, instruction);

        let result = self
            .run_with_token(instruction, snapshot, root, mode, &token)
            .await;
        if let Err(e) = &result {
            warn!(stage = e.stage(), "Pipeline failed: {}", e);
        }
        self.coordinator.complete(&token);
        result
    }

    async fn run_with_token(
        &self,
        instruction: &str,
        snapshot: &Snapshot,
        root: &Path,
        mode: EditMode,
        token: &OperationToken,
    ) -> Result<Outcome<MutationResult>, MutationError> {
        let prepared = match self
            .prepare_with_token(instruction, snapshot, root, mode, token)
            .await?
        {
            Outcome::Completed(prepared) => prepared,
            Outcome::Superseded => return Ok(Outcome::Superseded),
        };

        resume!(
            token,
            apply_output_files(
                root,
                &prepared.batch.output_files,
                self.settings.max_input_files
            )
            .await
        );

        let diff = resume!(token, staged_diff(root).await);
        info!("Captured diff ({} bytes)", diff.len());

        Ok(Outcome::Completed(MutationResult {
            diff,
            description: prepared.batch.description.clone(),
            prepared,
        }))
    }

    /// Answer a free-form question, superseding any question still pending.
    pub async fn ask_question(
        &self,
        text: &str,
        code_selection: Option<&str>,
    ) -> Result<Outcome<String>, MutationError> {
        let token = self.coordinator.begin(OperationFamily::AskQuestion);
        let answer = question::ask_question(
            self.model.clone(),
            &self.settings.chat_model,
            text,
            code_selection,
        )
        .await;
        if let Some(superseded) = token.check() {
            return Ok(superseded);
        }
        self.coordinator.complete(&token);
        answer.map(Outcome::Completed)
    }
}
