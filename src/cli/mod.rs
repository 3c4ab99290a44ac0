mod args;
mod paths;

pub use args::{Cli, Commands, FileFilters};
pub use paths::resolve_workspace_root;
