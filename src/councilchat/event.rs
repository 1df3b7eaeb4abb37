//! Group chat event system.
//!
//! Provides a callback-based observability layer for a [`GroupChat`](crate::GroupChat) run.
//! Implement [`EventHandler`] to receive real-time notifications about:
//!
//! - **Run lifecycle**: start, round boundaries, termination
//! - **Speaker selection**: the chosen persona, the selector's analysis, council transcripts
//! - **JSON repair**: every repair call made on a malformed LLM answer
//! - **Turns**: persona replies, capability executions, history snapshots
//!
//! The only method has a default no-op implementation, so a handler overrides
//! it only when it cares about events.
//!
//! # Example
//!
//! ```rust,no_run
//! use councilchat::event::{ChatEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct PrintSelections;
//!
//! #[async_trait]
//! impl EventHandler for PrintSelections {
//!     async fn on_chat_event(&self, event: &ChatEvent) {
//!         if let ChatEvent::SpeakerSelected { round, speaker, analysis, .. } = event {
//!             println!("round {}: {} ({})", round, speaker, analysis);
//!         }
//!     }
//! }
//! ```

use crate::councilchat::group_chat::TerminationReason;
use async_trait::async_trait;

/// How the selector arrived at a speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Exactly one persona was eligible; no LLM call was made.
    SingleEligible,
    /// The name returned by the LLM matched an eligible persona.
    Resolved,
    /// The returned name was not eligible; the admin persona was used.
    AdminFallback,
    /// The returned name was not eligible; the next persona in roster order was used.
    RoundRobinFallback,
}

/// Events emitted by a [`GroupChat`](crate::GroupChat) during a run.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Emitted once at the top of [`GroupChat::run`](crate::GroupChat::run).
    RunStarted {
        conversation: String,
        personas: usize,
        max_rounds: usize,
        /// Entries already in the log, non-zero when resuming.
        existing_messages: usize,
    },

    /// A new round begins.
    RoundStarted { round: usize },

    /// Undelivered messages were pushed into the private views of the roster.
    Broadcast {
        round: usize,
        /// Number of log entries delivered this round.
        messages: usize,
    },

    /// A council discussion was produced.
    CouncilDiscussion {
        round: usize,
        transcript: String,
        /// Whether the transcript was also appended to the shared log.
        injected: bool,
    },

    /// The selector settled on the next speaker.
    SpeakerSelected {
        round: usize,
        speaker: String,
        analysis: String,
        reason: SelectionReason,
    },

    /// One call of the JSON repair loop.
    JsonRepairAttempt {
        attempt: usize,
        max_attempts: usize,
        error: String,
    },

    /// A persona executed one of its capabilities.
    CapabilityExecuted {
        persona: String,
        capability: String,
        success: bool,
    },

    /// A persona's reply was appended to the log.
    PersonaReplied {
        round: usize,
        persona: String,
        response_length: usize,
    },

    /// The log was written to disk.
    HistorySaved { path: String, messages: usize },

    /// An interrupt arrived while a persona was speaking.
    Interrupted {
        round: usize,
        /// Persona that was speaking when the interrupt arrived.
        speaker: String,
    },

    /// The run ended.
    RunCompleted {
        rounds: usize,
        messages: usize,
        reason: TerminationReason,
    },
}

/// Receives [`ChatEvent`]s from a group chat.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every event. The default implementation is a no-op.
    async fn on_chat_event(&self, _event: &ChatEvent) {}
}
