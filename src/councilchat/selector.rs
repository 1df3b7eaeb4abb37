//! Speaker selection.
//!
//! Given the message log and the roster, [`SpeakerSelector::select`] decides
//! which persona acts next. Selection runs in three steps:
//!
//! 1. [`eligible_personas`] narrows the roster. After a function call only the
//!    owners of that capability may answer.
//! 2. The LLM is asked for a name, either directly or through a council
//!    discussion followed by an extraction call. A single eligible persona is
//!    chosen without asking.
//! 3. [`resolve_speaker`] maps the returned name onto an eligible persona,
//!    falling back to the admin and then to roster order.
//!
//! The selector never writes to the log.

use crate::client_wrapper::{ClientWrapper, Message, ResponseFormat, Role};
use crate::councilchat::config::SelectionMode;
use crate::councilchat::error::{ChatError, ChatResult};
use crate::councilchat::event::{EventHandler, SelectionReason};
use crate::councilchat::json_repair::parse_with_repair;
use crate::councilchat::message::ChatMessage;
use crate::councilchat::persona::{capability_catalog, team_description, Persona};
use crate::councilchat::prompts;
use log::{debug, info, warn};
use serde::Deserialize;
use std::sync::Arc;

/// Speaker name the selector uses when rendering the log for itself.
const SELECTOR_NAME: &str = "chat_manager";

/// Answer of a selection call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectionDecision {
    #[serde(default)]
    pub analysis: String,
    #[serde(rename = "next_actor")]
    pub next_speaker: String,
}

/// Result of one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    /// The resolved decision; `next_speaker` is always an eligible persona.
    pub decision: SelectionDecision,
    /// Name the LLM actually returned, before resolution.
    pub requested: Option<String>,
    pub reason: SelectionReason,
    /// Council transcript, in council mode.
    pub discussion: Option<String>,
}

/// Personas allowed to act after the newest message.
///
/// When the newest message requests a function call (and `func_call_filter`
/// is on), only personas declaring that capability qualify. If nobody
/// declares it, every persona with at least one capability qualifies; if
/// there is none, [`ChatError::NoCapableAgent`] is returned.
pub fn eligible_personas<'a>(
    log: &[ChatMessage],
    roster: &'a [Persona],
    func_call_filter: bool,
) -> ChatResult<Vec<&'a Persona>> {
    let call = match log.last().and_then(|m| m.function_call.as_ref()) {
        Some(call) if func_call_filter => call,
        _ => return Ok(roster.iter().collect()),
    };

    let owners: Vec<&Persona> = roster.iter().filter(|p| p.can_execute(&call.name)).collect();
    if !owners.is_empty() {
        return Ok(owners);
    }

    warn!(
        "No persona declares capability '{}'; falling back to every persona with capabilities",
        call.name
    );
    let invokers: Vec<&Persona> = roster.iter().filter(|p| p.can_invoke()).collect();
    if invokers.is_empty() {
        return Err(ChatError::NoCapableAgent(call.name.clone()));
    }
    Ok(invokers)
}

/// Map a name returned by the LLM onto an eligible persona.
///
/// Exact matches win. Otherwise the admin is used when eligible, and then
/// the first eligible persona following `last_speaker` in roster order.
/// `eligible` must not be empty.
pub fn resolve_speaker(
    requested: &str,
    eligible: &[&Persona],
    roster: &[Persona],
    admin: Option<&str>,
    last_speaker: Option<&str>,
) -> (String, SelectionReason) {
    let requested = requested.trim();
    if eligible.iter().any(|p| p.name == requested) {
        return (requested.to_string(), SelectionReason::Resolved);
    }

    if let Some(admin) = admin {
        if eligible.iter().any(|p| p.name == admin) {
            return (admin.to_string(), SelectionReason::AdminFallback);
        }
    }

    let start = last_speaker
        .and_then(|name| roster.iter().position(|p| p.name == name))
        .map(|i| i + 1)
        .unwrap_or(0);
    let next = (0..roster.len())
        .map(|offset| &roster[(start + offset) % roster.len()])
        .find(|candidate| eligible.iter().any(|p| p.name == candidate.name))
        .or_else(|| eligible.first().copied());
    let name = next.map(|p| p.name.clone()).unwrap_or_default();
    (name, SelectionReason::RoundRobinFallback)
}

/// Picks the next speaker with an LLM.
pub struct SpeakerSelector {
    client: Arc<dyn ClientWrapper>,
    mode: SelectionMode,
    admin: Option<String>,
    func_call_filter: bool,
    json_repair_attempts: usize,
}

impl SpeakerSelector {
    pub fn new(client: Arc<dyn ClientWrapper>, mode: SelectionMode) -> Self {
        Self {
            client,
            mode,
            admin: None,
            func_call_filter: true,
            json_repair_attempts: 5,
        }
    }

    pub fn with_admin(mut self, admin: Option<String>) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_func_call_filter(mut self, enabled: bool) -> Self {
        self.func_call_filter = enabled;
        self
    }

    pub fn with_json_repair_attempts(mut self, attempts: usize) -> Self {
        self.json_repair_attempts = attempts;
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Choose who acts after the newest entry of `log`.
    pub async fn select(
        &self,
        log: &[ChatMessage],
        roster: &[Persona],
        last_speaker: Option<&str>,
        events: Option<&dyn EventHandler>,
    ) -> ChatResult<SelectionOutcome> {
        let eligible = eligible_personas(log, roster, self.func_call_filter)?;
        if eligible.len() == 1 {
            let only = eligible[0].name.clone();
            debug!("{} is the only eligible speaker", only);
            return Ok(SelectionOutcome {
                decision: SelectionDecision {
                    analysis: format!("{} is the only eligible speaker.", only),
                    next_speaker: only,
                },
                requested: None,
                reason: SelectionReason::SingleEligible,
                discussion: None,
            });
        }

        let names: Vec<String> = eligible.iter().map(|p| p.name.clone()).collect();
        let candidates: Vec<Persona> = eligible.iter().map(|p| (*p).clone()).collect();

        let (decision, discussion) = match self.mode {
            SelectionMode::Direct => {
                let team = team_description(roster, None);
                (self.ask_direct(log, &team, &names, events).await?, None)
            }
            SelectionMode::Council { .. } => {
                let discussion = self.hold_council(log, &candidates).await?;
                let decision = self.extract_from_discussion(&discussion, &names, events).await?;
                (decision, Some(discussion))
            }
        };
        info!("Selection analysis: {}", decision.analysis);

        let (speaker, reason) = resolve_speaker(
            &decision.next_speaker,
            &eligible,
            roster,
            self.admin.as_deref(),
            last_speaker,
        );
        if reason != SelectionReason::Resolved {
            warn!(
                "Selector returned '{}', which is not an eligible speaker; using {}",
                decision.next_speaker, speaker
            );
        }

        Ok(SelectionOutcome {
            requested: Some(decision.next_speaker),
            decision: SelectionDecision {
                analysis: decision.analysis,
                next_speaker: speaker,
            },
            reason,
            discussion,
        })
    }

    async fn ask_direct(
        &self,
        log: &[ChatMessage],
        team: &str,
        names: &[String],
        events: Option<&dyn EventHandler>,
    ) -> ChatResult<SelectionDecision> {
        let mut request = Vec::with_capacity(log.len() + 2);
        request.push(Message::new(
            Role::System,
            prompts::direct_selection_system(team, names),
        ));
        request.extend(log.iter().map(|m| m.view_for(SELECTOR_NAME)));
        request.push(Message::new(
            Role::User,
            prompts::direct_selection_request(names),
        ));

        let answer = self
            .client
            .send_message(&request, ResponseFormat::JsonObject)
            .await
            .map_err(|e| ChatError::Llm(e.to_string()))?;
        parse_with_repair(
            &answer.content,
            self.client.as_ref(),
            self.json_repair_attempts,
            events,
        )
        .await
    }

    /// Free-text council discussion over the eligible `candidates`.
    async fn hold_council(&self, log: &[ChatMessage], candidates: &[Persona]) -> ChatResult<String> {
        let task_goal = log.first().map(|m| m.body()).unwrap_or_default();
        let history = log
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let request = [
            Message::new(
                Role::System,
                prompts::council_system(&capability_catalog(candidates)),
            ),
            Message::new(
                Role::User,
                prompts::council_discussion(task_goal, &team_description(candidates, None), &history),
            ),
        ];

        let answer = self
            .client
            .send_message(&request, ResponseFormat::Text)
            .await
            .map_err(|e| ChatError::Llm(e.to_string()))?;
        info!("AGENT_COUNCIL discussion:\n{}", answer.content);
        Ok(answer.content)
    }

    async fn extract_from_discussion(
        &self,
        discussion: &str,
        names: &[String],
        events: Option<&dyn EventHandler>,
    ) -> ChatResult<SelectionDecision> {
        let fallback = self
            .admin
            .as_deref()
            .filter(|admin| names.iter().any(|n| n == admin))
            .or_else(|| names.first().map(String::as_str))
            .unwrap_or_default();
        let request = [Message::new(
            Role::User,
            prompts::extract_next_actor(discussion, names, fallback),
        )];

        let answer = self
            .client
            .send_message(&request, ResponseFormat::JsonObject)
            .await
            .map_err(|e| ChatError::Llm(e.to_string()))?;
        parse_with_repair(
            &answer.content,
            self.client.as_ref(),
            self.json_repair_attempts,
            events,
        )
        .await
    }
}
