//! Human-in-the-loop client.
//!
//! `ConsoleClient` lets a person answer for a persona, usually the
//! `HumanProxy` admin. It prints the newest message of the request and reads
//! one line from stdin. An empty line is an empty reply, which the turn runner
//! treats as "nothing to add" and ends the run.

use crate::client_wrapper::{ClientError, ClientWrapper, Message, ResponseFormat, Role};
use crate::councilchat::message::{source_of, strip_source_header};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Reads replies from the terminal.
pub struct ConsoleClient {
    prompt: String,
}

impl ConsoleClient {
    /// `prompt` is printed before reading, e.g. `"UserProxy> "`.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl ClientWrapper for ConsoleClient {
    fn model_name(&self) -> &str {
        "console"
    }

    async fn send_message(
        &self,
        messages: &[Message],
        _format: ResponseFormat,
    ) -> Result<Message, ClientError> {
        let mut stdout = tokio::io::stdout();
        if let Some(last) = messages.iter().rev().find(|m| m.role != Role::System) {
            let speaker = source_of(&last.content).unwrap_or("?");
            let shown = format!(
                "\n[{}]\n{}\n\n",
                speaker,
                strip_source_header(&last.content)
            );
            stdout.write_all(shown.as_bytes()).await?;
        }
        stdout.write_all(self.prompt.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(Message::new(Role::Assistant, line.trim_end().to_string()))
    }
}
