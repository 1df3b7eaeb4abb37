//! Error type shared by every group chat component.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while configuring or running a [`GroupChat`](crate::GroupChat).
///
/// Only structural failures surface here. Unresolvable speaker names and
/// malformed JSON that the repair loop manages to fix are handled inside the
/// turn and never reach the caller.
///
/// # Examples
///
/// ```
/// use councilchat::ChatError;
///
/// let err = ChatError::NoCapableAgent("execute_code_block".into());
/// assert_eq!(
///     err.to_string(),
///     "No agent can execute the capability 'execute_code_block'. Check the capabilities registered on the personas."
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// The LLM kept returning text that does not decode as the expected JSON
    /// object, even after every repair attempt.
    MalformedJson {
        /// Number of repair calls that were made.
        attempts: usize,
        /// Decoder error from the last attempt.
        last_error: String,
    },

    /// A function call names a capability that no persona can execute.
    NoCapableAgent(String),

    /// An explicitly named history file does not exist.
    HistoryNotFound(PathBuf),

    /// No history file exists for the conversation when resuming the latest one.
    NoHistory(PathBuf),

    /// The roster or the conversation settings are inconsistent.
    InvalidConfiguration(String),

    /// The completion interface returned an error.
    Llm(String),

    /// The run was interrupted and no admin persona could take a final turn.
    Interrupted,

    /// Reading or writing the chat history failed.
    Io(String),

    /// Encoding or decoding the chat history failed.
    Serialization(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::MalformedJson {
                attempts,
                last_error,
            } => write!(
                f,
                "LLM response is not valid JSON after {} repair attempts: {}",
                attempts, last_error
            ),
            ChatError::NoCapableAgent(name) => write!(
                f,
                "No agent can execute the capability '{}'. Check the capabilities registered on the personas.",
                name
            ),
            ChatError::HistoryNotFound(path) => {
                write!(f, "Chat history file not found: {}", path.display())
            }
            ChatError::NoHistory(dir) => write!(
                f,
                "No chat history found for this conversation in {}",
                dir.display()
            ),
            ChatError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
            ChatError::Llm(msg) => write!(f, "LLM call failed: {}", msg),
            ChatError::Interrupted => write!(f, "Conversation interrupted"),
            ChatError::Io(msg) => write!(f, "I/O error: {}", msg),
            ChatError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Serialization(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type ChatResult<T> = Result<T, ChatError>;
