//! Message log entries.
//!
//! Every turn of a group chat is recorded as a [`ChatMessage`]. The log is
//! append-only; the turn runner is the only writer. Content written by a
//! persona carries a `SOURCE_AGENT` header so that every other persona can tell
//! who produced it:
//!
//! ```text
//! ####
//! SOURCE_AGENT: PythonExpert
//! ####
//!
//! def add(a, b):
//!     return a + b
//! ```

use crate::client_wrapper::{Message, Role};
use serde::{Deserialize, Serialize};

const HEADER_FENCE: &str = "####";
const HEADER_KEY: &str = "SOURCE_AGENT:";

/// Role of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    FunctionResult,
}

/// A capability invocation requested by a persona.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One entry of the message log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Name of the persona (or system component) that produced the entry.
    pub speaker: String,
    pub role: ChatRole,
    pub content: String,
    /// Present when the entry asks for a capability to be executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Capability name for `function_result` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Build an entry and tag its content with the speaker's source header.
    pub fn tagged(speaker: impl Into<String>, role: ChatRole, content: &str) -> Self {
        let speaker = speaker.into();
        let content = tag_with_source(&speaker, content);
        Self {
            speaker,
            role,
            content,
            function_call: None,
            name: None,
        }
    }

    /// Result of executing `capability`, attributed to the executing persona.
    pub fn function_result(speaker: impl Into<String>, capability: &str, output: &str) -> Self {
        let body = format!("Result of capability '{}':\n{}", capability, output);
        let mut message = Self::tagged(speaker, ChatRole::FunctionResult, &body);
        message.name = Some(capability.to_string());
        message
    }

    pub fn with_function_call(mut self, call: Option<FunctionCall>) -> Self {
        self.function_call = call;
        self
    }

    /// Content without the source header.
    pub fn body(&self) -> &str {
        strip_source_header(&self.content)
    }

    /// How `viewer` sees this entry in its private conversation view.
    ///
    /// A persona's own replies are assistant turns; everything written by
    /// someone else reaches it as a user turn, except system entries.
    pub fn view_for(&self, viewer: &str) -> Message {
        let role = match self.role {
            ChatRole::System => Role::System,
            ChatRole::Assistant if self.speaker == viewer => Role::Assistant,
            _ => Role::User,
        };
        Message::new(role, self.content.clone())
    }
}

/// Prefix `content` with a `SOURCE_AGENT` header naming `speaker`.
///
/// Any header already present is removed first, so tagging is idempotent.
///
/// ```
/// use councilchat::message::tag_with_source;
///
/// let once = tag_with_source("CodeReviewer", "Looks good.");
/// let twice = tag_with_source("CodeReviewer", &once);
/// assert_eq!(once, twice);
/// ```
pub fn tag_with_source(speaker: &str, content: &str) -> String {
    format!(
        "{fence}\n{key} {speaker}\n{fence}\n\n{body}",
        fence = HEADER_FENCE,
        key = HEADER_KEY,
        speaker = speaker,
        body = strip_source_header(content)
    )
}

/// Remove every leading `SOURCE_AGENT` header from `content`.
pub fn strip_source_header(content: &str) -> &str {
    let mut rest = content;
    while let Some(after) = split_header(rest) {
        rest = after;
    }
    rest
}

/// Name carried by the leading source header, if any.
pub fn source_of(content: &str) -> Option<&str> {
    let text = content.trim_start();
    let text = text.strip_prefix(HEADER_FENCE)?;
    let text = skip_line_break(text)?;
    let text = text.strip_prefix(HEADER_KEY)?;
    let end = text.find('\n').unwrap_or(text.len());
    Some(text[..end].trim())
}

fn split_header(content: &str) -> Option<&str> {
    let text = content.trim_start();
    let text = text.strip_prefix(HEADER_FENCE)?;
    let text = skip_line_break(text)?;
    let text = text.strip_prefix(HEADER_KEY)?;
    let text = &text[text.find('\n')? + 1..];
    let text = text.strip_prefix(HEADER_FENCE)?;
    Some(text.trim_start_matches(|c| c == '\r' || c == '\n'))
}

fn skip_line_break(text: &str) -> Option<&str> {
    let text = text.trim_start_matches(|c| c == ' ' || c == '\t');
    text.strip_prefix("\r\n").or_else(|| text.strip_prefix('\n'))
}

/// Extract a function call request from an LLM reply.
///
/// Looks for a JSON fragment of the form
/// `{"function_call": {"name": "...", "arguments": {...}}}` anywhere in the
/// text. Only the first one is returned. `arguments` may also be a JSON
/// encoded string, as OpenAI style function calls produce.
pub fn parse_function_call(text: &str) -> Option<FunctionCall> {
    let start = text.find("{\"function_call\"")?;
    let end = matching_brace(&text[start..])? + start;
    let parsed: serde_json::Value = serde_json::from_str(&text[start..end]).ok()?;
    let call = parsed.get("function_call")?;
    let name = call.get("name")?.as_str()?.to_string();
    let arguments = match call.get("arguments") {
        Some(serde_json::Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone()))
        }
        Some(value) => value.clone(),
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    Some(FunctionCall { name, arguments })
}

/// Byte offset one past the brace closing the object that opens `text`.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
