//! Single-flight chat session over the language model's chat capability.
//!
//! A [`Conversation`] owns an append-only history. Only one turn may be in
//! flight at a time; a second turn started while the first is outstanding
//! fails immediately with [`ConversationError::OperationInProgress`] instead
//! of queueing. Failed turns leave the history untouched.

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, LanguageModel, ServiceError};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Message already in progress")]
    OperationInProgress,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    TurnInProgress,
}

#[derive(Debug)]
struct SessionState {
    turn: TurnState,
    history: Vec<ChatMessage>,
}

/// Chat session shared by the planner and the editor.
pub struct Conversation {
    model: Arc<dyn LanguageModel>,
    chat_model: String,
    state: Mutex<SessionState>,
}

/// Returns the session to `Idle` when dropped, so the flag is released on
/// success, on error, and when the turn's future is dropped mid-flight.
struct TurnGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).turn = TurnState::Idle;
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // Nothing panics while holding the lock, but never propagate poison.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Conversation {
    pub fn new(model: Arc<dyn LanguageModel>, chat_model: impl Into<String>) -> Self {
        Self {
            model,
            chat_model: chat_model.into(),
            state: Mutex::new(SessionState {
                turn: TurnState::Idle,
                history: Vec::new(),
            }),
        }
    }

    /// Send `message` on its own, without prior history, and record the turn.
    pub async fn start_turn(&self, message: &str) -> Result<ChatMessage, ConversationError> {
        self.run_turn(message, false).await
    }

    /// Send the accumulated history followed by `message`, and record the turn.
    pub async fn continue_turn(&self, message: &str) -> Result<ChatMessage, ConversationError> {
        self.run_turn(message, true).await
    }

    async fn run_turn(
        &self,
        message: &str,
        with_history: bool,
    ) -> Result<ChatMessage, ConversationError> {
        let user_message = ChatMessage::user(message);

        let (messages, _guard) = {
            let mut state = lock(&self.state);
            if state.turn == TurnState::TurnInProgress {
                return Err(ConversationError::OperationInProgress);
            }
            state.turn = TurnState::TurnInProgress;

            let mut messages = if with_history {
                state.history.clone()
            } else {
                Vec::new()
            };
            messages.push(user_message.clone());
            (messages, TurnGuard { state: &self.state })
        };

        debug!(
            "Sending chat turn with {} message(s) to {}",
            messages.len(),
            self.chat_model
        );

        let reply = self
            .model
            .chat(ChatRequest {
                model: self.chat_model.clone(),
                messages,
            })
            .await
            .map_err(|e| {
                warn!("Chat turn failed: {}", e);
                e
            })?;

        {
            let mut state = lock(&self.state);
            state.history.push(user_message);
            state.history.push(reply.clone());
        }

        Ok(reply)
    }

    pub fn turn_state(&self) -> TurnState {
        lock(&self.state).turn
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        lock(&self.state).history.clone()
    }

    /// Drop all recorded messages.
    pub fn clear(&self) {
        lock(&self.state).history.clear();
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Conversation")
            .field("chat_model", &self.chat_model)
            .field("turn", &state.turn)
            .field("history_len", &state.history.len())
            .finish()
    }
}
