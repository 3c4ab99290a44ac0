//! End-to-end scenarios for the mutation pipeline against a scripted model.

#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::coordinator::{OperationFamily, Outcome};
    use crate::error::MutationError;
    use crate::executor::EditMode;
    use crate::pipeline::{MutationPipeline, PreparedEdit};
    use crate::planner::OperationOnFile;
    use crate::test_support::{Capability, ScriptedModel};
    use crate::workspace::{apply_output_files, git_available, Snapshot, SnapshotOptions};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn workspace(files: &[(&str, &str)]) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp_dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp_dir
    }

    fn git_init(root: &Path) {
        let status = std::process::Command::new("git")
            .args(["init", "-q"])
            .current_dir(root)
            .status()
            .unwrap();
        assert!(status.success());
    }

    fn pipeline(model: &Arc<ScriptedModel>) -> MutationPipeline {
        MutationPipeline::new(model.clone(), Settings::default())
    }

    async fn snapshot(pipeline: &MutationPipeline, root: &Path) -> Snapshot {
        pipeline
            .load_snapshot(root, SnapshotOptions::default())
            .await
            .unwrap()
            .completed()
            .unwrap()
    }

    const RENAME_PLAN: &str = r#"{
        "src/a.js": {"operation": "rename", "name": "src/a.ts"},
        "src/b.js": {"operation": "rename", "name": "src/b.ts"}
    }"#;

    #[tokio::test]
    async fn test_scenario_rename_to_typescript() {
        let dir = workspace(&[("src/a.js", "var a = 1;"), ("src/b.js", "var b = 2;")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(RENAME_PLAN);
        model.push_edit("const a: number = 1;");
        model.push_edit("const b: number = 2;");
        let pipeline = pipeline(&model);
        let snapshot = snapshot(&pipeline, dir.path()).await;

        let prepared = pipeline
            .prepare(
                "convert javascript files to typescript",
                &snapshot,
                dir.path(),
                EditMode::Individual,
            )
            .await
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(
            prepared.plan.operation_for("src/a.js"),
            &OperationOnFile::Rename {
                name: "src/a.ts".to_string()
            }
        );
        let output_files = &prepared.batch.output_files;
        assert_eq!(output_files.len(), 2);
        assert!(output_files.iter().all(|f| f.is_renamed()));

        apply_output_files(dir.path(), output_files, 100).await.unwrap();
        let after = snapshot_files(&pipeline, dir.path()).await;
        assert_eq!(after, vec!["src/a.ts", "src/b.ts"]);
    }

    async fn snapshot_files(pipeline: &MutationPipeline, root: &Path) -> Vec<String> {
        snapshot(pipeline, root).await.tree.file_names()
    }

    #[tokio::test]
    async fn test_scenario_full_run_produces_diff() {
        if !git_available().await {
            return;
        }
        let dir = workspace(&[("src/a.js", "var a = 1;"), ("src/b.js", "var b = 2;")]);
        git_init(dir.path());
        let model = Arc::new(ScriptedModel::new());
        model.push_completion(RENAME_PLAN);
        model.push_edit("const a: number = 1;\n");
        model.push_edit("const b: number = 2;\n");
        let pipeline = pipeline(&model);
        let snapshot = snapshot(&pipeline, dir.path()).await;

        let result = pipeline
            .run("convert to typescript", &snapshot, dir.path(), EditMode::Individual)
            .await
            .unwrap()
            .completed()
            .unwrap();

        assert!(result.diff.contains("src/a.ts"));
        assert!(result.diff.contains("+const b: number = 2;"));
        assert!(result.description.contains("renamed src/b.js to src/b.ts"));
        assert!(!dir.path().join("src/a.js").exists());
        assert_eq!(pipeline.coordinator().current(OperationFamily::PlanAndEdit), None);
    }

    #[tokio::test]
    async fn test_scenario_logic_only_change_still_edits() {
        let dir = workspace(&[("src/a.js", "getData(function (err, d) {});")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_chat_reply(r#"{"src/a.js": {"operation": "none"}}"#);
        model.push_chat_reply("@@@const d = await getData();@@@");
        model.push_chat_reply("Replaced callbacks with async/await.");
        let pipeline = pipeline(&model);
        let snapshot = snapshot(&pipeline, dir.path()).await;

        let PreparedEdit { plan, batch } = pipeline
            .prepare("use async/await", &snapshot, dir.path(), EditMode::Conversational)
            .await
            .unwrap()
            .completed()
            .unwrap();

        assert_eq!(plan.operation_for("src/a.js"), &OperationOnFile::None);
        assert_eq!(batch.output_files.len(), 1);
        assert_eq!(batch.output_files[0].text(), Some("const d = await getData();"));
        assert_eq!(batch.description, "Replaced callbacks with async/await.");

        // Planning turn, edit turn with full history, description turn.
        let requests = model.chat_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].messages.len(), 3);
        assert!(requests[1].messages[2].content.contains("named: \"src/a.js\""));
        assert_eq!(requests[2].messages.len(), 5);
    }

    #[tokio::test]
    async fn test_scenario_file_too_large_writes_nothing() {
        let dir = workspace(&[("src/a.js", "small"), ("src/b.js", "this one is far too long")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_completion("{}");
        model.push_edit("edited small");
        let settings = Settings {
            max_file_length_chars: 10,
            ..Settings::default()
        };
        let pipeline = MutationPipeline::new(model.clone(), settings);
        let snapshot = snapshot(&pipeline, dir.path()).await;

        let err = pipeline
            .run("edit", &snapshot, dir.path(), EditMode::Individual)
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::FileTooLarge { .. }));
        assert_eq!(err.stage(), "edit");
        assert_eq!(err.file(), Some("src/b.js"));
        assert_eq!(
            fs::read_to_string(dir.path().join("src/a.js")).unwrap(),
            "small"
        );
    }

    #[tokio::test]
    async fn test_scenario_unparseable_plan_stops_before_edits() {
        let dir = workspace(&[("src/a.js", "x")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_completion("I would rename a.js to a.ts.");
        let pipeline = pipeline(&model);
        let snapshot = snapshot(&pipeline, dir.path()).await;

        let err = pipeline
            .run("to ts", &snapshot, dir.path(), EditMode::Individual)
            .await
            .unwrap_err();

        match err {
            MutationError::PlanParse { response, .. } => {
                assert_eq!(response, "I would rename a.js to a.ts.")
            }
            other => panic!("expected PlanParse, got {:?}", other),
        }
        assert!(model.edit_requests().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_newer_plan_discards_older_result() {
        let first = workspace(&[("a.js", "first")]);
        let second = workspace(&[("b.js", "second")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_completion("{}");
        model.push_completion("{}");
        let release = model.gate_next(Capability::Edit);
        model.push_edit("first edited");
        model.push_edit("second edited");
        let pipeline = pipeline(&model);
        let first_snapshot = snapshot(&pipeline, first.path()).await;
        let second_snapshot = snapshot(&pipeline, second.path()).await;

        let older = {
            let pipeline = pipeline.clone();
            let root = first.path().to_path_buf();
            tokio::spawn(async move {
                pipeline
                    .prepare("edit", &first_snapshot, &root, EditMode::Individual)
                    .await
            })
        };
        model.wait_for_gated_call().await;

        let newer = pipeline
            .prepare("edit", &second_snapshot, second.path(), EditMode::Individual)
            .await
            .unwrap();
        release.send(()).unwrap();
        let older = older.await.unwrap().unwrap();

        assert_eq!(older, Outcome::Superseded);
        let newer = newer.completed().unwrap();
        assert_eq!(newer.batch.output_files[0].file_name, "b.js");
        assert_eq!(newer.batch.output_files[0].text(), Some("second edited"));
    }

    #[tokio::test]
    async fn test_superseded_run_never_writes() {
        let first = workspace(&[("a.js", "first")]);
        let second = workspace(&[("b.js", "second")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_completion("{}");
        model.push_completion("{}");
        let release = model.gate_next(Capability::Edit);
        model.push_edit("first edited");
        model.push_edit("second edited");
        let pipeline = pipeline(&model);
        let first_snapshot = snapshot(&pipeline, first.path()).await;

        let older = {
            let pipeline = pipeline.clone();
            let root = first.path().to_path_buf();
            tokio::spawn(async move {
                pipeline
                    .run("edit", &first_snapshot, &root, EditMode::Individual)
                    .await
            })
        };
        model.wait_for_gated_call().await;

        // Starting a newer plan is enough; it does not need to finish.
        let _newer = pipeline.coordinator().begin(OperationFamily::PlanAndEdit);
        release.send(()).unwrap();

        assert!(older.await.unwrap().unwrap().is_superseded());
        assert_eq!(fs::read_to_string(first.path().join("a.js")).unwrap(), "first");
    }

    #[tokio::test]
    async fn test_superseded_run_stays_stale_after_newer_finishes() {
        let first = workspace(&[("a.js", "first")]);
        let second = workspace(&[("b.js", "second")]);
        let model = Arc::new(ScriptedModel::new());
        model.push_completion("{}");
        model.push_completion("{}");
        let release = model.gate_next(Capability::Edit);
        model.push_edit("stale write");
        model.push_edit("second edited");
        let pipeline = pipeline(&model);
        let first_snapshot = snapshot(&pipeline, first.path()).await;
        let second_snapshot = snapshot(&pipeline, second.path()).await;

        let older = {
            let pipeline = pipeline.clone();
            let root = first.path().to_path_buf();
            tokio::spawn(async move {
                pipeline
                    .run("edit", &first_snapshot, &root, EditMode::Individual)
                    .await
            })
        };
        model.wait_for_gated_call().await;

        let newer = pipeline
            .prepare("edit", &second_snapshot, second.path(), EditMode::Individual)
            .await
            .unwrap();
        assert!(!newer.is_superseded());
        assert_eq!(pipeline.coordinator().current(OperationFamily::PlanAndEdit), None);
        release.send(()).unwrap();

        assert!(older.await.unwrap().unwrap().is_superseded());
        assert_eq!(fs::read_to_string(first.path().join("a.js")).unwrap(), "first");
    }

    #[tokio::test]
    async fn test_snapshot_over_limit_is_rejected() {
        let dir = workspace(&[("a.txt", "1"), ("b.txt", "2"), ("c.txt", "3")]);
        let model = Arc::new(ScriptedModel::new());
        let settings = Settings {
            max_input_files: 2,
            ..Settings::default()
        };
        let pipeline = MutationPipeline::new(model, settings);

        let err = pipeline
            .load_snapshot(dir.path(), SnapshotOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::TooManyInputFiles { count: 3, max: 2 }
        ));
    }

    #[tokio::test]
    async fn test_ask_question_through_pipeline() {
        let model = Arc::new(ScriptedModel::new());
        model.push_chat_reply("Create an index on the queried field.");
        let pipeline = pipeline(&model);

        let answer = pipeline
            .ask_question("How do I speed up find()?", Some("db.users.find({ age: 30 })"))
            .await
            .unwrap();
        assert_eq!(
            answer,
            Outcome::Completed("Create an index on the queried field.".to_string())
        );
        assert!(model.chat_requests()[0].messages[0]
            .content
            .contains("Code snippet below:"));
    }
}
