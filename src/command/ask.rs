use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::Settings;
use crate::coordinator::Outcome;
use crate::pipeline::MutationPipeline;

pub async fn run_ask(settings: Settings, question: String, selection: Option<String>) -> Result<()> {
    let code_selection = match selection {
        Some(path) => Some(
            tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read selection file: {}", path))?,
        ),
        None => None,
    };

    let client = ApiClient::new(&settings).context("Failed to create API client")?;
    let pipeline = MutationPipeline::new(Arc::new(client), settings);

    match pipeline
        .ask_question(&question, code_selection.as_deref())
        .await?
    {
        Outcome::Completed(answer) => println!("{}", answer),
        Outcome::Superseded => anyhow::bail!("Question was superseded by a newer one"),
    }

    Ok(())
}
