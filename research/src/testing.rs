use agent::llm::{CompletionRequest, CompletionResponse, LLM, Message};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Replays canned responses in order and records the last message of every request.
pub struct ScriptedLLM {
    responses: Mutex<Vec<CompletionResponse>>,
    pub seen: Mutex<Vec<Message>>,
}

impl ScriptedLLM {
    pub fn new(mut responses: Vec<CompletionResponse>) -> Arc<Self> {
        responses.reverse();
        Arc::new(Self {
            responses: Mutex::new(responses),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LLM for ScriptedLLM {
    async fn completion<'a>(
        &self,
        request: CompletionRequest<'a>,
    ) -> agent::Result<CompletionResponse> {
        if let Some(last) = request.messages.last() {
            self.seen.lock().unwrap().push(last.clone());
        }
        Ok(self.responses.lock().unwrap().pop().expect("script exhausted"))
    }
}

type Responder = dyn Fn(&CompletionRequest<'_>) -> agent::Result<CompletionResponse> + Send + Sync;

/// Answers every request through a closure, for tests where call order is not fixed.
pub struct FnLLM(Box<Responder>);

impl FnLLM {
    pub fn new<F>(f: F) -> Arc<Self>
    where
        F: Fn(&CompletionRequest<'_>) -> agent::Result<CompletionResponse> + Send + Sync + 'static,
    {
        Arc::new(Self(Box::new(f)))
    }
}

#[async_trait]
impl LLM for FnLLM {
    async fn completion<'a>(
        &self,
        request: CompletionRequest<'a>,
    ) -> agent::Result<CompletionResponse> {
        (self.0)(&request)
    }
}

pub fn text(content: &str) -> CompletionResponse {
    CompletionResponse {
        content: content.to_string(),
        ..Default::default()
    }
}

/// Text of the last user message in a request.
pub fn last_user(request: &CompletionRequest<'_>) -> String {
    request
        .messages
        .iter()
        .rev()
        .find_map(|m| match m {
            Message::User(text) => Some(text.clone()),
            _ => None,
        })
        .unwrap_or_default()
}
