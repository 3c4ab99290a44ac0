mod ask;
mod run;
mod snapshot;

pub use ask::run_ask;
pub use run::{run_mutation, RunOptions};
pub use snapshot::run_snapshot;
