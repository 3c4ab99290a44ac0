use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::cli::{self, FileFilters};
use crate::config::Settings;
use crate::coordinator::Outcome;
use crate::executor::EditMode;
use crate::pipeline::MutationPipeline;
use crate::workspace::{FileChange, SnapshotOptions};

pub struct RunOptions {
    pub instruction: String,
    pub workspace_root: Option<String>,
    pub git_url: Option<String>,
    pub mode: EditMode,
    pub filters: FileFilters,
    pub dry_run: bool,
}

fn report_unmarked_replies(file_names: &[String]) {
    if file_names.is_empty() {
        return;
    }
    println!("\n⚠️  Replies without @@@ markers were used verbatim for:");
    for file_name in file_names {
        println!("  {}", file_name);
    }
}

fn completed<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome {
        Outcome::Completed(value) => Ok(value),
        Outcome::Superseded => anyhow::bail!("Operation was superseded by a newer one"),
    }
}

pub async fn run_mutation(settings: Settings, options: RunOptions) -> Result<()> {
    let client = ApiClient::new(&settings).context("Failed to create API client")?;
    let pipeline = MutationPipeline::new(Arc::new(client), settings);
    let snapshot_options = SnapshotOptions::from(options.filters);

    let (root, snapshot) = match options.git_url {
        Some(url) => completed(pipeline.load_remote_snapshot(&url, snapshot_options).await?)?,
        None => {
            let root = cli::resolve_workspace_root(options.workspace_root)?;
            let snapshot = completed(pipeline.load_snapshot(&root, snapshot_options).await?)?;
            (root, snapshot)
        }
    };
    info!("Workspace: {}", root.display());

    if options.dry_run {
        let prepared = completed(
            pipeline
                .prepare(&options.instruction, &snapshot, &root, options.mode)
                .await?,
        )?;

        println!("Plan:");
        println!("{}", serde_json::to_string_pretty(&prepared.plan)?);
        println!("\nOutput files:");
        for output_file in &prepared.batch.output_files {
            match &output_file.change {
                FileChange::Delete => println!("  delete  {}", output_file.file_name),
                FileChange::Write {
                    renamed_from: Some(old),
                    ..
                } => println!("  rename  {} -> {}", old, output_file.file_name),
                FileChange::Write { text, .. } => println!(
                    "  write   {} ({} chars)",
                    output_file.file_name,
                    text.chars().count()
                ),
            }
        }
        println!("\nDescription:\n{}", prepared.batch.description);
        report_unmarked_replies(&prepared.batch.unmarked_replies);
        return Ok(());
    }

    let result = completed(
        pipeline
            .run(&options.instruction, &snapshot, &root, options.mode)
            .await?,
    )?;

    println!("Description:\n{}\n", result.description);
    if result.diff.is_empty() {
        println!("No changes.");
    } else {
        println!("{}", result.diff);
    }
    report_unmarked_replies(&result.prepared.batch.unmarked_replies);

    Ok(())
}
