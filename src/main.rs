use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod cli;
mod command;
mod config;
mod conversation;
mod coordinator;
mod error;
mod executor;
mod pipeline;
mod planner;
mod question;
#[cfg(test)]
mod test_support;
mod workspace;

use cli::{Cli, Commands};
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(cli.config_dir.clone())?;

    match cli.command {
        Some(Commands::Run {
            instruction,
            workspace_root,
            git_url,
            mode,
            filters,
            dry_run,
        }) => {
            command::run_mutation(
                settings,
                command::RunOptions {
                    instruction,
                    workspace_root,
                    git_url,
                    mode,
                    filters,
                    dry_run,
                },
            )
            .await?;
        }
        Some(Commands::Snapshot {
            workspace_root,
            filters,
        }) => {
            command::run_snapshot(&settings, workspace_root, filters, cli.verbose).await?;
        }
        Some(Commands::Ask {
            question,
            selection,
        }) => {
            command::run_ask(settings, question, selection).await?;
        }
        None => {
            // No command specified, show help
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'codemorph run \"<instruction>\"' to change the current workspace.");
        }
    }

    Ok(())
}
