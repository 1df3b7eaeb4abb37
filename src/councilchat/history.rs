//! Chat history persistence.
//!
//! Each session writes one pretty-printed JSON file holding the full ordered
//! log:
//!
//! ```text
//! <history_dir>/<slug>/<slug>_chat_history_<YYYY-MM-DD_HH-MM-SS>.json
//! ```
//!
//! The file is rewritten after every turn. Resuming picks a named file or the
//! lexicographically latest one, which given the timestamp format is also the
//! most recent session.

use crate::councilchat::config::slugify;
use crate::councilchat::error::{ChatError, ChatResult};
use crate::councilchat::message::ChatMessage;
use chrono::{DateTime, Local};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Location of one conversation's history files.
#[derive(Debug, Clone)]
pub struct ChatHistoryStore {
    dir: PathBuf,
    slug: String,
    session_file: PathBuf,
}

impl ChatHistoryStore {
    /// Store for the conversation `name` under `root`, writing the session
    /// started at `started`.
    pub fn new(root: impl AsRef<Path>, name: &str, started: DateTime<Local>) -> Self {
        let slug = slugify(name);
        let dir = root.as_ref().join(&slug);
        let session_file = dir.join(format!(
            "{}_chat_history_{}.json",
            slug,
            started.format(TIMESTAMP_FORMAT)
        ));
        Self {
            dir,
            slug,
            session_file,
        }
    }

    /// Directory holding every session file of the conversation.
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// File written by this session.
    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    /// Write `messages` to the session file, creating the directory if needed.
    pub fn save(&self, messages: &[ChatMessage]) -> ChatResult<&Path> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(messages)?;
        fs::write(&self.session_file, json)?;
        debug!(
            "Saved {} messages to {}",
            messages.len(),
            self.session_file.display()
        );
        Ok(&self.session_file)
    }

    /// Read a history file.
    pub fn load(path: impl AsRef<Path>) -> ChatResult<Vec<ChatMessage>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ChatError::HistoryNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Most recent history file of the conversation.
    pub fn latest(&self) -> ChatResult<PathBuf> {
        let prefix = format!("{}_chat_history_", self.slug);
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Err(ChatError::NoHistory(self.dir.clone())),
        };

        let mut latest: Option<(String, PathBuf)> = None;
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.starts_with(&prefix) || !file_name.ends_with(".json") {
                continue;
            }
            if latest.as_ref().map_or(true, |(best, _)| file_name > *best) {
                latest = Some((file_name, entry.path()));
            }
        }
        latest
            .map(|(_, path)| path)
            .ok_or_else(|| ChatError::NoHistory(self.dir.clone()))
    }

    /// Read `path`, or the most recent history file when `path` is `None`.
    pub fn load_from(&self, path: Option<&Path>) -> ChatResult<(PathBuf, Vec<ChatMessage>)> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.latest()?,
        };
        let messages = Self::load(&path)?;
        Ok((path, messages))
    }
}
