//! Decoding of JSON answers returned by an LLM.
//!
//! Selection and termination calls ask the model for a small JSON object. The
//! answer is cleaned up with [`format_json_str`] and decoded strictly; when that
//! fails, [`parse_with_repair`] asks a repair model to fix the syntax, up to a
//! fixed number of attempts.

use crate::client_wrapper::{ClientWrapper, Message, ResponseFormat, Role};
use crate::councilchat::error::{ChatError, ChatResult};
use crate::councilchat::event::{ChatEvent, EventHandler};
use crate::councilchat::prompts;
use log::{debug, warn};
use serde::de::DeserializeOwned;

/// Normalise an LLM answer before decoding it as JSON.
///
/// Removes a surrounding markdown code fence, cuts the text down to the
/// outermost `{ ... }` and escapes raw line breaks that appear inside string
/// literals.
///
/// ```
/// use councilchat::json_repair::format_json_str;
///
/// let raw = "Sure:\n```json\n{\"analysis\": \"line one\nline two\", \"next_actor\": \"UserProxy\"}\n```";
/// assert_eq!(
///     format_json_str(raw),
///     "{\"analysis\": \"line one\\nline two\", \"next_actor\": \"UserProxy\"}"
/// );
/// ```
pub fn format_json_str(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        // Skip the info string (e.g. `json`) on the opening fence line.
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            text = &text[start..=end];
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.trim().chars() {
        if in_string {
            match ch {
                _ if escaped => {
                    escaped = false;
                    out.push(ch);
                }
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

/// Decode `raw` as `T`, repairing it through `repair_client` if needed.
///
/// Makes at most `max_attempts` repair calls. Each failed attempt is logged
/// and, when `events` is set, reported as [`ChatEvent::JsonRepairAttempt`].
/// Exhausting the attempts yields [`ChatError::MalformedJson`].
pub async fn parse_with_repair<T: DeserializeOwned>(
    raw: &str,
    repair_client: &dyn ClientWrapper,
    max_attempts: usize,
    events: Option<&dyn EventHandler>,
) -> ChatResult<T> {
    let formatted = format_json_str(raw);
    let mut last_error = match serde_json::from_str::<T>(&formatted) {
        Ok(value) => return Ok(value),
        Err(err) => err.to_string(),
    };
    debug!("JSON decode failed ({}), starting repair: {}", last_error, formatted);

    let request = [Message::new(Role::User, prompts::fix_json(&formatted))];
    for attempt in 1..=max_attempts {
        warn!(
            "Repairing malformed JSON, attempt {}/{}: {}",
            attempt, max_attempts, last_error
        );
        if let Some(handler) = events {
            handler
                .on_chat_event(&ChatEvent::JsonRepairAttempt {
                    attempt,
                    max_attempts,
                    error: last_error.clone(),
                })
                .await;
        }

        let answer = match repair_client
            .send_message(&request, ResponseFormat::JsonObject)
            .await
        {
            Ok(answer) => answer,
            Err(err) => {
                last_error = err.to_string();
                continue;
            }
        };
        match serde_json::from_str::<T>(&format_json_str(&answer.content)) {
            Ok(value) => return Ok(value),
            Err(err) => last_error = err.to_string(),
        }
    }

    Err(ChatError::MalformedJson {
        attempts: max_attempts,
        last_error,
    })
}
