#![allow(dead_code)]

use async_trait::async_trait;
use councilchat::client_wrapper::{ClientError, ClientWrapper, Message, ResponseFormat, Role};
use councilchat::event::{ChatEvent, EventHandler};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock LLM that answers from a fixed script and records every request.
///
/// Once the script is exhausted it answers with an empty string.
pub struct ScriptedClient {
    name: String,
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<(Vec<Message>, ResponseFormat)>>,
}

impl ScriptedClient {
    pub fn new<S: AsRef<str>>(name: &str, responses: &[S]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            responses: Mutex::new(responses.iter().map(|r| r.as_ref().to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Client whose every answer is empty.
    pub fn silent(name: &str) -> Arc<Self> {
        Self::new::<&str>(name, &[])
    }

    pub fn requests(&self) -> Vec<(Vec<Message>, ResponseFormat)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ClientWrapper for ScriptedClient {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn send_message(
        &self,
        messages: &[Message],
        format: ResponseFormat,
    ) -> Result<Message, ClientError> {
        self.requests
            .lock()
            .unwrap()
            .push((messages.to_vec(), format));
        let next = self.responses.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Message::new(Role::Assistant, next))
    }
}

/// JSON answer of a selection call naming `actor`.
pub fn pick(actor: &str) -> String {
    format!(
        "{{\"analysis\": \"{} is best placed to act next.\", \"next_actor\": \"{}\"}}",
        actor, actor
    )
}

/// Event handler that keeps every event it receives.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_chat_event(&self, event: &ChatEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
