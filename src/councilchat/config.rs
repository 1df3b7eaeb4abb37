//! Conversation settings.
//!
//! [`ConversationConfig`] is built in code with `with_*` methods; no config
//! file format is involved. Everything a run needs besides the roster and the
//! selector client lives here.
//!
//! # Example
//!
//! ```rust
//! use councilchat::config::{ConversationConfig, SelectionMode, TerminationPolicy};
//!
//! let config = ConversationConfig::new("Code Review Team")
//!     .with_max_rounds(6)
//!     .with_admin("UserProxy")
//!     .with_selection_mode(SelectionMode::Council { inject_discussion: true })
//!     .with_termination(TerminationPolicy::Keyword("TERMINATE".into()));
//!
//! assert_eq!(config.slug(), "code_review_team");
//! assert_eq!(config.json_repair_attempts, 5);
//! ```

use chrono::{DateTime, Local};
use std::path::PathBuf;

/// Strategy used to pick the next speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// One classification call returning `{analysis, next_actor}`.
    Direct,
    /// A free-text council discussion followed by an extraction call.
    Council {
        /// Append the discussion transcript to the shared log as a system
        /// message so every persona sees it.
        inject_discussion: bool,
    },
}

/// When a reply ends the conversation early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Only the round budget or an empty reply ends the run.
    Never,
    /// The newest message contains the keyword.
    Keyword(String),
    /// The selector client classifies the newest message as `end` or `continue`.
    IntentAnalysis,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        TerminationPolicy::Keyword("TERMINATE".to_string())
    }
}

/// Settings of one group chat.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Display name; its slug keys the history directory.
    pub name: String,
    /// Broadcast iterations per run. The last one never selects a speaker.
    pub max_rounds: usize,
    /// Persona that takes over on an interrupt and wins unresolvable selections.
    pub admin: Option<String>,
    pub selection_mode: SelectionMode,
    /// Restrict selection to capability owners after a function call.
    pub func_call_filter: bool,
    /// Root directory of persisted chat histories.
    pub history_dir: PathBuf,
    /// Write the log after every turn.
    pub persist: bool,
    /// Repair calls allowed per malformed JSON answer.
    pub json_repair_attempts: usize,
    pub termination: TerminationPolicy,
    /// Timestamp embedded in the history file name.
    pub session_started: DateTime<Local>,
}

impl ConversationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_rounds: 10,
            admin: None,
            selection_mode: SelectionMode::Direct,
            func_call_filter: true,
            history_dir: PathBuf::from("chat_history"),
            persist: true,
            json_repair_attempts: 5,
            termination: TerminationPolicy::default(),
            session_started: Local::now(),
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_admin(mut self, admin: impl Into<String>) -> Self {
        self.admin = Some(admin.into());
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    pub fn with_func_call_filter(mut self, enabled: bool) -> Self {
        self.func_call_filter = enabled;
        self
    }

    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = dir.into();
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist = enabled;
        self
    }

    pub fn with_json_repair_attempts(mut self, attempts: usize) -> Self {
        self.json_repair_attempts = attempts;
        self
    }

    pub fn with_termination(mut self, policy: TerminationPolicy) -> Self {
        self.termination = policy;
        self
    }

    pub fn with_session_started(mut self, started: DateTime<Local>) -> Self {
        self.session_started = started;
        self
    }

    /// Lower-case, underscore separated form of the name, safe for paths.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// `"Code Review Team!"` becomes `"code_review_team"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        "conversation".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConversationConfig::new("team");
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.selection_mode, SelectionMode::Direct);
        assert!(config.func_call_filter);
        assert!(config.persist);
        assert_eq!(config.history_dir, PathBuf::from("chat_history"));
        assert_eq!(config.termination, TerminationPolicy::Keyword("TERMINATE".into()));
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Code Review Team!"), "code_review_team");
        assert_eq!(slugify("  a--b  "), "a_b");
        assert_eq!(slugify("???"), "conversation");
    }
}
