//! Turn runner.
//!
//! [`GroupChat`] drives a conversation between [`Participant`]s. Each round it
//! delivers the undelivered part of the log to every persona except the
//! author, asks the [`SpeakerSelector`] who acts next, and lets that persona
//! speak:
//!
//! ```text
//!            seed / resume
//!                  │
//!                  ▼
//!   ┌──────► BROADCASTING ──(last round / terminal reply)──► TERMINATED
//!   │              │                                              ▲
//!   │              ▼                                              │
//!   │       AWAITING_SPEAKER                                      │
//!   │              │                                              │
//!   │              ▼                                              │
//!   └──────── SPEAKING ──────────(no reply / interrupt)───────────┘
//! ```
//!
//! With `max_rounds = N` the runner broadcasts N times and selects at most
//! N - 1 speakers; the last round only broadcasts. The log is append-only and
//! is written to disk after every turn when persistence is enabled.
//!
//! # Example
//!
//! ```rust,no_run
//! use councilchat::clients::openai::OpenAIClient;
//! use councilchat::config::ConversationConfig;
//! use councilchat::persona::Persona;
//! use councilchat::{GroupChat, Participant};
//! use std::sync::Arc;
//!
//! # async fn demo() -> councilchat::ChatResult<()> {
//! let llm = Arc::new(OpenAIClient::new("sk-...", "gpt-4o"));
//! let participants = vec![
//!     Participant::new(Persona::new("UserProxy", "Relays the user's requests."), llm.clone()),
//!     Participant::new(Persona::new("PythonExpert", "Writes python code."), llm.clone()),
//!     Participant::new(Persona::new("CodeReviewer", "Reviews code."), llm.clone()),
//! ];
//! let config = ConversationConfig::new("Code Review Team")
//!     .with_admin("UserProxy")
//!     .with_max_rounds(4);
//!
//! let mut chat = GroupChat::new(config, participants, llm)?;
//! let outcome = chat.run(Some("write a function that adds two numbers.")).await?;
//! println!("{} messages, ended by {:?}", outcome.messages.len(), outcome.reason);
//! # Ok(())
//! # }
//! ```

use crate::client_wrapper::{ClientWrapper, Message, ResponseFormat, Role};
use crate::councilchat::config::{ConversationConfig, SelectionMode, TerminationPolicy};
use crate::councilchat::error::{ChatError, ChatResult};
use crate::councilchat::event::{ChatEvent, EventHandler};
use crate::councilchat::history::ChatHistoryStore;
use crate::councilchat::interrupt::InterruptHandle;
use crate::councilchat::json_repair::parse_with_repair;
use crate::councilchat::message::{parse_function_call, ChatMessage, ChatRole, FunctionCall};
use crate::councilchat::participant::Participant;
use crate::councilchat::persona::{augment_instructions, team_description, Persona};
use crate::councilchat::prompts;
use crate::councilchat::selector::SpeakerSelector;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Speaker name of injected council transcripts.
pub const COUNCIL_SPEAKER: &str = "AGENT_COUNCIL";

/// Speaker name of the seed message when no admin persona is configured.
pub const DEFAULT_SEED_SPEAKER: &str = "User";

/// Where the runner currently is in its control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingSpeaker,
    Speaking,
    Broadcasting,
    Terminated,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The round budget was used up.
    MaxRounds,
    /// The selected persona produced an empty reply.
    NoReply,
    /// The newest reply was judged terminal by the termination policy.
    TerminationMessage,
    /// An interrupt arrived and the admin took the final turn.
    Interrupted,
}

/// Result of [`GroupChat::run`].
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The full log at the end of the run.
    pub messages: Vec<ChatMessage>,
    /// Broadcast iterations performed.
    pub rounds: usize,
    /// Speaker selections performed.
    pub selections: usize,
    pub reason: TerminationReason,
}

#[derive(Debug, Deserialize)]
struct EndIntent {
    #[serde(default)]
    analysis: String,
    intent: String,
}

enum TurnResult {
    Finished(ChatResult<Option<Vec<ChatMessage>>>),
    Interrupted,
}

/// A multi-persona conversation.
pub struct GroupChat {
    config: ConversationConfig,
    participants: Vec<Participant>,
    /// Personas as declared, before instruction augmentation.
    roster: Vec<Persona>,
    selector: SpeakerSelector,
    selector_client: Arc<dyn ClientWrapper>,
    messages: Vec<ChatMessage>,
    /// Log entries before this index have been broadcast.
    delivered: usize,
    state: TurnState,
    last_speaker: Option<String>,
    store: ChatHistoryStore,
    interrupt: InterruptHandle,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl GroupChat {
    /// Validate the roster and prepare every persona for the conversation.
    ///
    /// Fails with [`ChatError::InvalidConfiguration`] when the roster is empty,
    /// names repeat, the admin is not on the roster, or a declared capability
    /// has no handler. Each persona's instructions are augmented with the team
    /// roster here, once.
    pub fn new(
        config: ConversationConfig,
        participants: Vec<Participant>,
        selector_client: Arc<dyn ClientWrapper>,
    ) -> ChatResult<Self> {
        if participants.is_empty() {
            return Err(ChatError::InvalidConfiguration(
                "a group chat needs at least one persona".into(),
            ));
        }

        let mut seen = HashSet::new();
        for participant in &participants {
            if !seen.insert(participant.name().to_string()) {
                return Err(ChatError::InvalidConfiguration(format!(
                    "persona name '{}' is used more than once",
                    participant.name()
                )));
            }
            let unhandled = participant.unhandled_capabilities();
            if !unhandled.is_empty() {
                return Err(ChatError::InvalidConfiguration(format!(
                    "persona '{}' declares capabilities without a handler: {}",
                    participant.name(),
                    unhandled.join(", ")
                )));
            }
        }
        if let Some(admin) = &config.admin {
            if !seen.contains(admin) {
                return Err(ChatError::InvalidConfiguration(format!(
                    "admin persona '{}' is not part of the roster",
                    admin
                )));
            }
        }
        if participants.len() < 3 {
            warn!(
                "Group chat '{}' has only {} persona(s); speaker selection works best with at least 3",
                config.name,
                participants.len()
            );
        }

        let roster: Vec<Persona> = participants.iter().map(|p| p.persona().clone()).collect();
        let mut participants = participants;
        for participant in &mut participants {
            let team = team_description(&roster, Some(participant.name()));
            let augmented = augment_instructions(participant.persona(), &team);
            participant.set_persona(augmented);
        }

        let selector = SpeakerSelector::new(Arc::clone(&selector_client), config.selection_mode)
            .with_admin(config.admin.clone())
            .with_func_call_filter(config.func_call_filter)
            .with_json_repair_attempts(config.json_repair_attempts);
        let store = ChatHistoryStore::new(&config.history_dir, &config.name, config.session_started);

        Ok(Self {
            config,
            participants,
            roster,
            selector,
            selector_client,
            messages: Vec::new(),
            delivered: 0,
            state: TurnState::Broadcasting,
            last_speaker: None,
            store,
            interrupt: InterruptHandle::new(),
            event_handler: None,
        })
    }

    /// Attach an [`EventHandler`] (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Share an existing interrupt handle instead of the built-in one.
    pub fn with_interrupt_handle(mut self, handle: InterruptHandle) -> Self {
        self.interrupt = handle;
        self
    }

    /// Handle that interrupts the current speaker.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name() == name)
    }

    /// Personas as declared, without the team preface.
    pub fn roster(&self) -> &[Persona] {
        &self.roster
    }

    /// File this session writes its history to.
    pub fn history_file(&self) -> &Path {
        self.store.session_file()
    }

    async fn emit(&self, event: ChatEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_chat_event(&event).await;
        }
    }

    /// Replace the log with a stored history.
    ///
    /// Loads `path`, or the latest history of this conversation when `None`.
    /// Every persona's private view is rebuilt from the loaded log and the
    /// whole log counts as delivered, so nothing is broadcast twice.
    pub fn resume(&mut self, path: Option<&Path>) -> ChatResult<PathBuf> {
        let (path, messages) = self.store.load_from(path)?;
        info!(
            "Resuming '{}' with {} messages from {}",
            self.config.name,
            messages.len(),
            path.display()
        );
        for participant in &mut self.participants {
            participant.rehydrate(&messages);
        }
        self.last_speaker = messages
            .iter()
            .rev()
            .map(|m| m.speaker.as_str())
            .find(|speaker| self.roster.iter().any(|p| p.name == *speaker))
            .map(str::to_string);
        self.delivered = messages.len();
        self.messages = messages;
        self.state = TurnState::Broadcasting;
        Ok(path)
    }

    /// Run the conversation.
    ///
    /// `seed` is appended as a user message from the admin persona (or
    /// [`DEFAULT_SEED_SPEAKER`]). With `None` the run continues from the
    /// current log, typically after [`resume`](Self::resume).
    ///
    /// An interrupt raised before the run starts stops its first turn. Any
    /// interrupt still pending when the run ends is discarded.
    pub async fn run(&mut self, seed: Option<&str>) -> ChatResult<ChatOutcome> {
        let result = self.run_rounds(seed).await;
        if self.interrupt.is_pending() {
            info!("Discarding an interrupt raised after the last turn");
            self.interrupt.reset();
        }
        result
    }

    async fn run_rounds(&mut self, seed: Option<&str>) -> ChatResult<ChatOutcome> {
        self.emit(ChatEvent::RunStarted {
            conversation: self.config.name.clone(),
            personas: self.participants.len(),
            max_rounds: self.config.max_rounds,
            existing_messages: self.messages.len(),
        })
        .await;

        match seed {
            Some(text) => {
                let speaker = self
                    .config
                    .admin
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SEED_SPEAKER.to_string());
                self.append(ChatMessage::tagged(speaker, ChatRole::User, text));
                self.persist().await?;
            }
            None if self.messages.is_empty() => {
                return Err(ChatError::InvalidConfiguration(
                    "no seed message and no history to continue from".into(),
                ));
            }
            None => {}
        }

        let run_start = self.messages.len();
        self.state = TurnState::Broadcasting;
        let mut rounds = 0;
        let mut selections = 0;

        let reason = loop {
            if rounds == self.config.max_rounds {
                break TerminationReason::MaxRounds;
            }
            rounds += 1;
            self.emit(ChatEvent::RoundStarted { round: rounds }).await;

            self.state = TurnState::Broadcasting;
            self.broadcast(rounds).await;
            if rounds == self.config.max_rounds {
                break TerminationReason::MaxRounds;
            }
            if self.messages.len() > run_start && self.is_terminal().await? {
                break TerminationReason::TerminationMessage;
            }

            self.state = TurnState::AwaitingSpeaker;
            // Captured before a council transcript can land on top of it.
            let pending_call = self.pending_function_call();
            let events = self.event_handler.clone();
            let outcome = self
                .selector
                .select(
                    &self.messages,
                    &self.roster,
                    self.last_speaker.as_deref(),
                    events.as_deref(),
                )
                .await?;
            selections += 1;

            if let Some(transcript) = &outcome.discussion {
                let inject = matches!(
                    self.selector.mode(),
                    SelectionMode::Council {
                        inject_discussion: true
                    }
                );
                self.emit(ChatEvent::CouncilDiscussion {
                    round: rounds,
                    transcript: transcript.clone(),
                    injected: inject,
                })
                .await;
                if inject {
                    self.append(ChatMessage::tagged(
                        COUNCIL_SPEAKER,
                        ChatRole::System,
                        transcript,
                    ));
                    self.broadcast(rounds).await;
                }
            }

            let speaker = outcome.decision.next_speaker.clone();
            info!("Round {}: {} speaks next", rounds, speaker);
            self.emit(ChatEvent::SpeakerSelected {
                round: rounds,
                speaker: speaker.clone(),
                analysis: outcome.decision.analysis.clone(),
                reason: outcome.reason,
            })
            .await;

            let index = self.index_of(&speaker)?;
            self.state = TurnState::Speaking;
            let interrupt = self.interrupt.clone();
            let turn = tokio::select! {
                biased;
                _ = interrupt.interrupted() => TurnResult::Interrupted,
                result = self.take_turn(index, pending_call.as_ref()) => TurnResult::Finished(result),
            };

            match turn {
                TurnResult::Interrupted => {
                    warn!("{} was interrupted in round {}", speaker, rounds);
                    self.emit(ChatEvent::Interrupted {
                        round: rounds,
                        speaker: speaker.clone(),
                    })
                    .await;
                    self.admin_final_turn(rounds).await?;
                    break TerminationReason::Interrupted;
                }
                TurnResult::Finished(result) => match result? {
                    None => {
                        info!("{} has nothing to add; ending the conversation", speaker);
                        break TerminationReason::NoReply;
                    }
                    Some(produced) => {
                        self.commit_turn(rounds, &speaker, produced).await?;
                    }
                },
            }
        };

        self.state = TurnState::Terminated;
        self.emit(ChatEvent::RunCompleted {
            rounds,
            messages: self.messages.len(),
            reason,
        })
        .await;
        Ok(ChatOutcome {
            messages: self.messages.clone(),
            rounds,
            selections,
            reason,
        })
    }

    /// Append to the log; the author sees its own entry immediately.
    fn append(&mut self, message: ChatMessage) {
        if let Some(author) = self
            .participants
            .iter_mut()
            .find(|p| p.name() == message.speaker)
        {
            author.receive(&message);
        }
        self.messages.push(message);
    }

    /// Deliver every undelivered entry to everyone but its author.
    async fn broadcast(&mut self, round: usize) {
        let pending = self.messages.len() - self.delivered;
        if pending == 0 {
            return;
        }
        for message in &self.messages[self.delivered..] {
            for participant in &mut self.participants {
                if participant.name() != message.speaker {
                    participant.receive(message);
                }
            }
        }
        self.delivered = self.messages.len();
        self.emit(ChatEvent::Broadcast {
            round,
            messages: pending,
        })
        .await;
    }

    async fn persist(&self) -> ChatResult<()> {
        if !self.config.persist {
            return Ok(());
        }
        let path = self.store.save(&self.messages)?;
        self.emit(ChatEvent::HistorySaved {
            path: path.display().to_string(),
            messages: self.messages.len(),
        })
        .await;
        Ok(())
    }

    fn index_of(&self, name: &str) -> ChatResult<usize> {
        self.participants
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| {
                ChatError::InvalidConfiguration(format!("'{}' is not part of the roster", name))
            })
    }

    async fn commit_turn(
        &mut self,
        round: usize,
        speaker: &str,
        produced: Vec<ChatMessage>,
    ) -> ChatResult<()> {
        let response_length = produced.iter().map(|m| m.body().len()).sum();
        for message in produced {
            self.append(message);
        }
        self.last_speaker = Some(speaker.to_string());
        self.persist().await?;
        self.emit(ChatEvent::PersonaReplied {
            round,
            persona: speaker.to_string(),
            response_length,
        })
        .await;
        Ok(())
    }

    /// Give the admin one last, uninterruptible turn.
    async fn admin_final_turn(&mut self, round: usize) -> ChatResult<()> {
        let admin = match self.config.admin.clone() {
            Some(admin) => admin,
            None => {
                self.state = TurnState::Terminated;
                return Err(ChatError::Interrupted);
            }
        };
        self.state = TurnState::Broadcasting;
        self.broadcast(round).await;
        let index = self.index_of(&admin)?;
        let pending_call = self.pending_function_call();
        self.state = TurnState::Speaking;
        if let Some(produced) = self.take_turn(index, pending_call.as_ref()).await? {
            self.commit_turn(round, &admin, produced).await?;
        }
        Ok(())
    }

    /// Function call requested by the newest persona entry, if any.
    ///
    /// Injected council transcripts are skipped.
    fn pending_function_call(&self) -> Option<FunctionCall> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.speaker != COUNCIL_SPEAKER)
            .and_then(|m| m.function_call.clone())
    }

    /// Produce the entries of one speaking turn without touching the log.
    ///
    /// A persona with capabilities that is selected while `pending_call` is
    /// outstanding executes it. Otherwise the persona generates a reply; when
    /// the reply requests one of its own capabilities, the capability runs
    /// once and a follow-up reply is generated with the result in view.
    async fn take_turn(
        &self,
        index: usize,
        pending_call: Option<&FunctionCall>,
    ) -> ChatResult<Option<Vec<ChatMessage>>> {
        let participant = &self.participants[index];
        let name = participant.name();

        if let Some(call) = pending_call {
            if participant.persona().can_invoke() {
                let result = self.execute_capability(participant, call).await;
                return Ok(Some(vec![result]));
            }
        }

        let reply = match participant
            .generate(&[])
            .await
            .map_err(|e| ChatError::Llm(e.to_string()))?
        {
            Some(reply) => reply,
            None => return Ok(None),
        };
        let call = parse_function_call(&reply);
        let request = ChatMessage::tagged(name, ChatRole::Assistant, &reply)
            .with_function_call(call.clone());

        let own_call = call.filter(|c| participant.persona().can_execute(&c.name));
        let call = match own_call {
            Some(call) => call,
            None => return Ok(Some(vec![request])),
        };

        let result = self.execute_capability(participant, &call).await;
        let pending: Vec<Message> = [&request, &result]
            .iter()
            .map(|m| m.view_for(name))
            .collect();
        let follow_up = participant
            .generate(&pending)
            .await
            .map_err(|e| ChatError::Llm(e.to_string()))?;

        let mut produced = vec![request, result];
        if let Some(text) = follow_up {
            let next_call = parse_function_call(&text);
            produced.push(
                ChatMessage::tagged(name, ChatRole::Assistant, &text).with_function_call(next_call),
            );
        }
        Ok(Some(produced))
    }

    async fn execute_capability(&self, participant: &Participant, call: &FunctionCall) -> ChatMessage {
        info!("{} executes '{}'", participant.name(), call.name);
        let outcome = participant.execute(call).await;
        self.emit(ChatEvent::CapabilityExecuted {
            persona: participant.name().to_string(),
            capability: call.name.clone(),
            success: outcome.success,
        })
        .await;
        ChatMessage::function_result(participant.name(), &call.name, &outcome.output)
    }

    /// Whether the newest entry ends the conversation under the configured policy.
    async fn is_terminal(&self) -> ChatResult<bool> {
        let newest = match self.messages.last() {
            Some(message) => message,
            None => return Ok(false),
        };
        match &self.config.termination {
            TerminationPolicy::Never => Ok(false),
            TerminationPolicy::Keyword(keyword) => Ok(newest.body().contains(keyword.as_str())),
            TerminationPolicy::IntentAnalysis => {
                let request = [
                    Message::new(Role::System, prompts::END_INTENT_SYSTEM),
                    Message::new(Role::User, newest.body()),
                ];
                let answer = self
                    .selector_client
                    .send_message(&request, ResponseFormat::JsonObject)
                    .await
                    .map_err(|e| ChatError::Llm(e.to_string()))?;
                let intent: EndIntent = parse_with_repair(
                    &answer.content,
                    self.selector_client.as_ref(),
                    self.config.json_repair_attempts,
                    self.event_handler.as_deref(),
                )
                .await?;
                info!("Termination analysis: {}", intent.analysis);
                info!("Termination intent: {}", intent.intent);
                Ok(intent.intent.trim().eq_ignore_ascii_case("end"))
            }
        }
    }
}
