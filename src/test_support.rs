//! Scripted language model double for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::{oneshot, Notify};

use crate::api::{
    ChatMessage, ChatRequest, CompletionRequest, EditRequest, LanguageModel, ServiceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Complete,
    Edit,
    Chat,
}

#[derive(Default)]
struct Script {
    completions: VecDeque<Result<Vec<String>, ServiceError>>,
    edits: VecDeque<Result<Vec<String>, ServiceError>>,
    chats: VecDeque<Result<ChatMessage, ServiceError>>,
    completion_requests: Vec<CompletionRequest>,
    edit_requests: Vec<EditRequest>,
    chat_requests: Vec<ChatRequest>,
    gates: Vec<(Capability, oneshot::Receiver<()>)>,
}

/// Replays queued responses in order and records every request.
///
/// A call with nothing queued fails with `ServiceError::NoChoices`. A gated
/// call records its request, signals [`ScriptedModel::wait_for_gated_call`]
/// and then blocks until the returned sender fires (or is dropped).
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<Script>,
    gated_call: Notify,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn push_completion(&self, text: impl Into<String>) {
        self.script().completions.push_back(Ok(vec![text.into()]));
    }

    pub fn push_completion_error(&self, error: impl Into<ServiceError>) {
        self.script().completions.push_back(Err(error.into()));
    }

    pub fn push_edit(&self, text: impl Into<String>) {
        self.script().edits.push_back(Ok(vec![text.into()]));
    }

    pub fn push_edit_error(&self, error: impl Into<ServiceError>) {
        self.script().edits.push_back(Err(error.into()));
    }

    pub fn push_chat_reply(&self, text: impl Into<String>) {
        self.script()
            .chats
            .push_back(Ok(ChatMessage::assistant(text)));
    }

    pub fn push_chat_error(&self, error: impl Into<ServiceError>) {
        self.script().chats.push_back(Err(error.into()));
    }

    /// Block the next call of `capability` until the returned sender fires.
    pub fn gate_next(&self, capability: Capability) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().gates.push((capability, rx));
        tx
    }

    pub fn gate_next_chat(&self) -> oneshot::Sender<()> {
        self.gate_next(Capability::Chat)
    }

    /// Resolves once a gated call has started.
    pub async fn wait_for_gated_call(&self) {
        self.gated_call.notified().await;
    }

    pub fn completion_requests(&self) -> Vec<CompletionRequest> {
        self.script().completion_requests.clone()
    }

    pub fn edit_requests(&self) -> Vec<EditRequest> {
        self.script().edit_requests.clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.script().chat_requests.clone()
    }

    pub fn total_requests(&self) -> usize {
        let script = self.script();
        script.completion_requests.len() + script.edit_requests.len() + script.chat_requests.len()
    }

    fn take_gate(&self, capability: Capability) -> Option<oneshot::Receiver<()>> {
        let mut script = self.script();
        let position = script.gates.iter().position(|(c, _)| *c == capability)?;
        Some(script.gates.remove(position).1)
    }

    async fn pass_gate(&self, capability: Capability) {
        if let Some(gate) = self.take_gate(capability) {
            self.gated_call.notify_one();
            let _ = gate.await;
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Vec<String>, ServiceError> {
        let response = {
            let mut script = self.script();
            script.completion_requests.push(request);
            script.completions.pop_front()
        };
        self.pass_gate(Capability::Complete).await;
        response.unwrap_or(Err(ServiceError::NoChoices {
            endpoint: "completions".to_string(),
        }))
    }

    async fn edit(&self, request: EditRequest) -> Result<Vec<String>, ServiceError> {
        let response = {
            let mut script = self.script();
            script.edit_requests.push(request);
            script.edits.pop_front()
        };
        self.pass_gate(Capability::Edit).await;
        response.unwrap_or(Err(ServiceError::NoChoices {
            endpoint: "edits".to_string(),
        }))
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatMessage, ServiceError> {
        let response = {
            let mut script = self.script();
            script.chat_requests.push(request);
            script.chats.pop_front()
        };
        self.pass_gate(Capability::Chat).await;
        response.unwrap_or(Err(ServiceError::NoChoices {
            endpoint: "chat/completions".to_string(),
        }))
    }
}
