use clap::{Args, Parser, Subcommand};

use crate::executor::EditMode;
use crate::workspace::SnapshotOptions;

/// codemorph - plan and apply codebase changes with a language model
#[derive(Parser)]
#[command(name = "codemorph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding config.json. Defaults to ~/.codemorph
    #[arg(long, global = true, env = "CODEMORPH_CONFIG_DIR")]
    pub config_dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Which files the planner gets to see.
#[derive(Args, Debug, Clone, Default)]
pub struct FileFilters {
    /// Glob of files to include; repeatable. Defaults to every file
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob of files to exclude; repeatable
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
}

impl From<FileFilters> for SnapshotOptions {
    fn from(filters: FileFilters) -> Self {
        Self {
            include: filters.include,
            exclude: filters.exclude,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and apply a change described in natural language
    Run {
        /// What to change, e.g. "convert javascript files to typescript"
        instruction: String,

        /// Workspace root (auto-detects git root if absent)
        #[arg(short = 'w', long, conflicts_with = "git_url")]
        workspace_root: Option<String>,

        /// Clone this repository into a scratch directory and work there
        #[arg(long)]
        git_url: Option<String>,

        /// How edits are requested from the model
        #[arg(long, value_enum, default_value_t = EditMode::Conversational)]
        mode: EditMode,

        #[command(flatten)]
        filters: FileFilters,

        /// Print the plan and edited files without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Preview the files the planner would see
    Snapshot {
        /// Workspace root (defaults to current directory or git root)
        #[arg(short = 'w', long)]
        workspace_root: Option<String>,

        #[command(flatten)]
        filters: FileFilters,
    },
    /// Ask a question, optionally about a code file
    Ask {
        question: String,

        /// File whose contents are sent along with the question
        #[arg(long, value_name = "FILE")]
        selection: Option<String>,
    },
}
