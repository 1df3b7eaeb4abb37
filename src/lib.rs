//! # councilchat
//!
//! councilchat runs group conversations between several LLM-backed personas. After every
//! message it decides who should act next, lets that persona speak, and keeps a resumable
//! on-disk history of the whole conversation.
//!
//! The crate provides layered abstractions for:
//!
//! * **Personas**: [`persona::Persona`] records with instructions and typed
//!   [`persona::Capability`] descriptors, paired at runtime with an LLM client and capability
//!   handlers in a [`Participant`]
//! * **Message Log**: an append-only sequence of [`ChatMessage`]s, each tagged with a
//!   `SOURCE_AGENT` header so every persona knows who said what
//! * **Speaker Selection**: [`selector::SpeakerSelector`] with a direct classification strategy
//!   and a two-phase "council discussion" strategy, an eligibility filter for function calls,
//!   and a deterministic fallback policy
//! * **Turn Runner**: [`GroupChat`] broadcasts, selects, lets the speaker talk, and stops on
//!   the round budget, an empty reply, a terminal message, or a user interrupt
//! * **Persistence**: [`history::ChatHistoryStore`] writes the log after every turn and
//!   resumes from the latest (or a named) history file
//! * **Provider Flexibility**: the [`ClientWrapper`] trait, implemented for OpenAI compatible
//!   endpoints and for a human on the console
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use councilchat::clients::console::ConsoleClient;
//! use councilchat::clients::openai::OpenAIClient;
//! use councilchat::config::{ConversationConfig, SelectionMode};
//! use councilchat::persona::{Persona, PersonaKind};
//! use councilchat::{GroupChat, Participant};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     councilchat::init_logger();
//!     let llm = Arc::new(OpenAIClient::new(&std::env::var("OPENAI_API_KEY")?, "gpt-4o"));
//!
//!     let participants = vec![
//!         Participant::new(
//!             Persona::new("UserProxy", "A proxy for the human user.").with_kind(PersonaKind::HumanProxy),
//!             Arc::new(ConsoleClient::new("UserProxy> ")),
//!         ),
//!         Participant::new(Persona::new("PythonExpert", "Writes clean python code."), llm.clone()),
//!         Participant::new(Persona::new("CodeReviewer", "Reviews code for bugs."), llm.clone()),
//!     ];
//!
//!     let config = ConversationConfig::new("Code Review Team")
//!         .with_admin("UserProxy")
//!         .with_selection_mode(SelectionMode::Council { inject_discussion: false })
//!         .with_max_rounds(8);
//!
//!     let mut chat = GroupChat::new(config, participants, llm)?;
//!     chat.interrupt_handle().listen_for_ctrl_c();
//!     let outcome = chat.run(Some("Write a function that adds two numbers.")).await?;
//!     println!("Finished after {} rounds: {:?}", outcome.rounds, outcome.reason);
//!     Ok(())
//! }
//! ```
//!
//! ## Resuming
//!
//! Every session writes `<history_dir>/<slug>/<slug>_chat_history_<timestamp>.json`.
//! [`GroupChat::resume`] loads the latest of these (or a given path), rebuilds each persona's
//! view of the conversation, and [`GroupChat::run`] continues from there without replaying
//! anything.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Selection analysis, council transcripts and JSON repair attempts are logged at `info` and
/// `warn`; set `RUST_LOG=councilchat=info` to follow a conversation's decisions.
///
/// ```rust
/// councilchat::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `councilchat` module.
pub mod councilchat;

// Re-exporting key items for easier external access.
pub use councilchat::client_wrapper;
pub use councilchat::client_wrapper::{ClientWrapper, Message, ResponseFormat, Role, TokenUsage};
pub use councilchat::clients;
pub use councilchat::config;
pub use councilchat::config::{ConversationConfig, SelectionMode, TerminationPolicy};
pub use councilchat::error::{ChatError, ChatResult};
pub use councilchat::event;
pub use councilchat::event::{ChatEvent, EventHandler};
pub use councilchat::group_chat::{ChatOutcome, GroupChat, TerminationReason, TurnState};
pub use councilchat::history;
pub use councilchat::interrupt::InterruptHandle;
pub use councilchat::json_repair;
pub use councilchat::message;
pub use councilchat::message::{ChatMessage, ChatRole, FunctionCall};
pub use councilchat::participant;
pub use councilchat::participant::{CapabilityHandler, FnCapability, Participant};
pub use councilchat::persona;
pub use councilchat::selector;
