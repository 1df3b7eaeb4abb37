//! Runtime side of a persona.
//!
//! A [`Participant`] pairs a [`Persona`] with the LLM client that speaks for it,
//! the handlers that execute its capabilities, and its private view of the
//! conversation. The view is only ever extended by the turn runner, in log
//! order.

use crate::client_wrapper::{ClientError, ClientWrapper, Message, ResponseFormat, Role};
use crate::councilchat::message::{ChatMessage, FunctionCall};
use crate::councilchat::persona::{Capability, Persona};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Executes one capability.
///
/// The returned string is appended to the log as a `function_result` entry.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ClientError>;
}

/// Adapter turning a synchronous closure into a [`CapabilityHandler`].
///
/// ```
/// use councilchat::participant::FnCapability;
///
/// let handler = FnCapability::new(|args| {
///     Ok(format!("read {}", args["path"].as_str().unwrap_or("?")))
/// });
/// # let _ = handler;
/// ```
pub struct FnCapability<F> {
    func: F,
}

impl<F> FnCapability<F>
where
    F: Fn(serde_json::Value) -> Result<String, ClientError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> CapabilityHandler for FnCapability<F>
where
    F: Fn(serde_json::Value) -> Result<String, ClientError> + Send + Sync,
{
    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ClientError> {
        (self.func)(arguments)
    }
}

/// Outcome of executing a function call.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityOutput {
    pub output: String,
    pub success: bool,
}

/// A persona taking part in a group chat.
pub struct Participant {
    persona: Persona,
    client: Arc<dyn ClientWrapper>,
    handlers: HashMap<String, Arc<dyn CapabilityHandler>>,
    view: Vec<Message>,
}

impl Participant {
    pub fn new(persona: Persona, client: Arc<dyn ClientWrapper>) -> Self {
        Self {
            persona,
            client,
            handlers: HashMap::new(),
            view: Vec::new(),
        }
    }

    /// Declare a capability on the persona and register its handler.
    pub fn with_capability(
        mut self,
        capability: Capability,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        self.handlers.insert(capability.name.clone(), handler);
        if !self.persona.can_execute(&capability.name) {
            self.persona.capabilities.push(capability);
        }
        self
    }

    /// Register a handler for a capability the persona already declares.
    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn CapabilityHandler>) -> Self {
        self.handlers.insert(name.into(), handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Private conversation view, system prompt excluded.
    pub fn view(&self) -> &[Message] {
        &self.view
    }

    /// Declared capabilities without a registered handler.
    pub fn unhandled_capabilities(&self) -> Vec<&str> {
        self.persona
            .capabilities
            .iter()
            .filter(|c| !self.handlers.contains_key(&c.name))
            .map(|c| c.name.as_str())
            .collect()
    }

    pub(crate) fn set_persona(&mut self, persona: Persona) {
        self.persona = persona;
    }

    /// Append a log entry to the private view, without asking for a reply.
    pub fn receive(&mut self, message: &ChatMessage) {
        let view = message.view_for(&self.persona.name);
        self.view.push(view);
    }

    /// Replace the private view with `messages`.
    pub fn rehydrate(&mut self, messages: &[ChatMessage]) {
        self.view = messages
            .iter()
            .map(|m| m.view_for(&self.persona.name))
            .collect();
    }

    /// Ask the LLM for this persona's next reply.
    ///
    /// `pending` is appended after the private view for this call only.
    /// Returns `None` for an empty reply.
    pub async fn generate(&self, pending: &[Message]) -> Result<Option<String>, ClientError> {
        let mut request = Vec::with_capacity(self.view.len() + pending.len() + 1);
        request.push(Message::new(Role::System, self.persona.instructions.clone()));
        request.extend(self.view.iter().cloned());
        request.extend(pending.iter().cloned());

        debug!(
            "{} generating with {} ({} messages)",
            self.persona.name,
            self.client.model_name(),
            request.len()
        );
        let reply = self.client.send_message(&request, ResponseFormat::Text).await?;
        if let Some(usage) = self.client.get_last_usage() {
            debug!(
                "{} used {} tokens ({} in / {} out)",
                self.persona.name, usage.total_tokens, usage.input_tokens, usage.output_tokens
            );
        }
        if reply.content.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(reply.content))
        }
    }

    /// Execute `call` with the matching handler.
    ///
    /// Unknown capabilities and handler failures are reported in the output
    /// text rather than as errors, so the team can react to them.
    pub async fn execute(&self, call: &FunctionCall) -> CapabilityOutput {
        match self.handlers.get(&call.name) {
            Some(handler) => match handler.invoke(call.arguments.clone()).await {
                Ok(output) => CapabilityOutput {
                    output,
                    success: true,
                },
                Err(err) => {
                    warn!("{} failed to execute '{}': {}", self.persona.name, call.name, err);
                    CapabilityOutput {
                        output: format!("Error: {}", err),
                        success: false,
                    }
                }
            },
            None => CapabilityOutput {
                output: format!("Error: capability '{}' not found.", call.name),
                success: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::councilchat::message::ChatRole;
    use crate::councilchat::persona::PersonaKind;

    struct Echo;

    #[async_trait]
    impl ClientWrapper for Echo {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn send_message(
            &self,
            messages: &[Message],
            _format: ResponseFormat,
        ) -> Result<Message, ClientError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(Message::new(Role::Assistant, last))
        }
    }

    fn executor() -> Participant {
        Participant::new(
            Persona::new("FunctionCallingAgent", "Calls functions.").with_kind(PersonaKind::Executor),
            Arc::new(Echo),
        )
        .with_capability(
            Capability::new("shout", "Upper-case the text"),
            Arc::new(FnCapability::new(|args: serde_json::Value| {
                Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
            })),
        )
    }

    #[tokio::test]
    async fn executes_registered_capability() {
        let agent = executor();
        let call = FunctionCall {
            name: "shout".into(),
            arguments: serde_json::json!({"text": "hi"}),
        };
        let out = agent.execute(&call).await;
        assert!(out.success);
        assert_eq!(out.output, "HI");
    }

    #[tokio::test]
    async fn unknown_capability_reports_error_text() {
        let agent = executor();
        let call = FunctionCall {
            name: "missing".into(),
            arguments: serde_json::Value::Null,
        };
        let out = agent.execute(&call).await;
        assert!(!out.success);
        assert_eq!(out.output, "Error: capability 'missing' not found.");
    }

    #[tokio::test]
    async fn view_feeds_generation() {
        let mut agent = executor();
        agent.receive(&ChatMessage::tagged("UserProxy", ChatRole::User, "hello"));
        assert_eq!(agent.view().len(), 1);
        let reply = agent.generate(&[]).await.unwrap();
        assert!(reply.unwrap().ends_with("hello"));

        let empty = agent
            .generate(&[Message::new(Role::User, "   ")])
            .await
            .unwrap();
        assert_eq!(empty, None);
    }

    #[test]
    fn capability_declared_once_with_handler() {
        let agent = executor();
        assert_eq!(agent.persona().capabilities.len(), 1);
        assert!(agent.unhandled_capabilities().is_empty());
    }
}
