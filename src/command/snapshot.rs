use anyhow::Result;

use crate::cli::{self, FileFilters};
use crate::config::Settings;
use crate::workspace::{build_snapshot, SnapshotOptions};

pub async fn run_snapshot(
    settings: &Settings,
    workspace_root: Option<String>,
    filters: FileFilters,
    verbose: bool,
) -> Result<()> {
    let root_path = cli::resolve_workspace_root(workspace_root)?;

    println!("Scanning workspace: {}\n", root_path.display());

    let options = SnapshotOptions::from(filters);
    let walk_root = root_path.clone();
    let snapshot =
        tokio::task::spawn_blocking(move || build_snapshot(&walk_root, &options)).await??;

    println!("Summary:");
    println!("  Files the planner would see: {}", snapshot.file_count);
    println!("  Input file limit: {}", settings.max_input_files);

    if snapshot.file_count > settings.max_input_files {
        println!(
            "\n⚠️  Warning: {} file(s) is over the limit; narrow it with --include/--exclude",
            snapshot.file_count
        );
    }

    if verbose {
        println!("\nTree:");
        println!("{}", serde_json::to_string_pretty(&snapshot.tree)?);
    } else if snapshot.file_count > 0 {
        println!("\nFiles:");
        for file_name in snapshot.tree.file_names() {
            println!("  {}", file_name);
        }
        println!("\n  Use --verbose to see the tree");
    }

    Ok(())
}
