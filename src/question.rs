//! One-off question answering over a fresh conversation.

use std::sync::Arc;
use tracing::info;

use crate::api::LanguageModel;
use crate::conversation::Conversation;
use crate::error::MutationError;

/// Prompt for `text`, with the code selection appended when there is one.
pub fn create_question_prompt(text: &str, code_selection: Option<&str>) -> String {
    match code_selection.filter(|selection| !selection.trim().is_empty()) {
        Some(selection) => format!("{}\n\nCode snippet below:\n{}", text, selection),
        None => text.to_string(),
    }
}

/// Ask a question as the first turn of a new conversation and return the
/// assistant's answer.
pub async fn ask_question(
    model: Arc<dyn LanguageModel>,
    chat_model: &str,
    text: &str,
    code_selection: Option<&str>,
) -> Result<String, MutationError> {
    let conversation = Conversation::new(model, chat_model);
    info!("Asking question ({} chars)", text.chars().count());

    let reply = conversation
        .start_turn(&create_question_prompt(text, code_selection))
        .await
        .map_err(|e| MutationError::QuestionFailed {
            source: Box::new(e),
        })?;
    Ok(reply.content)
}
