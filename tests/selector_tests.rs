mod common;

use common::{pick, ScriptedClient};
use councilchat::client_wrapper::{ResponseFormat, Role};
use councilchat::config::SelectionMode;
use councilchat::event::SelectionReason;
use councilchat::persona::{Capability, Persona, PersonaKind};
use councilchat::selector::SpeakerSelector;
use councilchat::{ChatMessage, ChatRole, FunctionCall};

fn roster() -> Vec<Persona> {
    vec![
        Persona::new("UserProxy", "A proxy for the human user.").with_kind(PersonaKind::HumanProxy),
        Persona::new("CodeReviewer", "Reviews code."),
        Persona::new("PythonExpert", "Writes python code."),
        Persona::new("FunctionCallingAgent", "Executes code.")
            .with_kind(PersonaKind::Executor)
            .with_capability(Capability::new("execute_code_block", "Run python")),
    ]
}

fn seed() -> Vec<ChatMessage> {
    vec![ChatMessage::tagged(
        "UserProxy",
        ChatRole::User,
        "write a function that adds two numbers.",
    )]
}

#[tokio::test]
async fn test_direct_selection_request_shape() {
    let client = ScriptedClient::new("selector", &[pick("PythonExpert")]);
    let selector = SpeakerSelector::new(client.clone(), SelectionMode::Direct)
        .with_admin(Some("UserProxy".into()));

    let outcome = selector.select(&seed(), &roster(), None, None).await.unwrap();
    assert_eq!(outcome.decision.next_speaker, "PythonExpert");
    assert_eq!(outcome.requested.as_deref(), Some("PythonExpert"));
    assert_eq!(outcome.reason, SelectionReason::Resolved);
    assert!(outcome.discussion.is_none());

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    let (messages, format) = &requests[0];
    assert_eq!(*format, ResponseFormat::JsonObject);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.contains("AGENT_NAME: FunctionCallingAgent"));
    assert!(messages[0].content.contains("\"PythonExpert\""));
    assert_eq!(messages[1].role, Role::User);
    assert!(messages[1].content.contains("SOURCE_AGENT: UserProxy"));
    assert!(messages[2].content.contains("next_actor"));
}

#[tokio::test]
async fn test_function_call_with_single_owner_skips_the_llm() {
    let client = ScriptedClient::silent("selector");
    let selector = SpeakerSelector::new(client.clone(), SelectionMode::Council {
        inject_discussion: true,
    });

    let mut log = seed();
    log.push(
        ChatMessage::tagged("PythonExpert", ChatRole::Assistant, "run it").with_function_call(
            Some(FunctionCall {
                name: "execute_code_block".into(),
                arguments: serde_json::json!({"code": "print(1)"}),
            }),
        ),
    );

    let outcome = selector
        .select(&log, &roster(), Some("PythonExpert"), None)
        .await
        .unwrap();
    assert_eq!(outcome.decision.next_speaker, "FunctionCallingAgent");
    assert_eq!(outcome.reason, SelectionReason::SingleEligible);
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_unresolvable_name_without_admin_follows_roster_order() {
    let client = ScriptedClient::new("selector", &[pick("ProjectManager")]);
    let selector = SpeakerSelector::new(client, SelectionMode::Direct);

    let outcome = selector
        .select(&seed(), &roster(), Some("CodeReviewer"), None)
        .await
        .unwrap();
    assert_eq!(outcome.decision.next_speaker, "PythonExpert");
    assert_eq!(outcome.requested.as_deref(), Some("ProjectManager"));
    assert_eq!(outcome.reason, SelectionReason::RoundRobinFallback);
}

#[tokio::test]
async fn test_council_extraction_defaults_to_admin() {
    let client = ScriptedClient::new(
        "selector",
        &[
            "WiseCouncilMember: the reviewer should look at this.".to_string(),
            pick("CodeReviewer"),
        ],
    );
    let selector = SpeakerSelector::new(client.clone(), SelectionMode::Council {
        inject_discussion: false,
    })
    .with_admin(Some("UserProxy".into()));

    let outcome = selector.select(&seed(), &roster(), None, None).await.unwrap();
    assert_eq!(outcome.decision.next_speaker, "CodeReviewer");
    assert_eq!(
        outcome.discussion.as_deref(),
        Some("WiseCouncilMember: the reviewer should look at this.")
    );

    let requests = client.requests();
    assert!(requests[0].0[0].content.contains("FUNCTION_NAME: execute_code_block"));
    assert!(requests[1].0[0]
        .content
        .contains("If you are unsure, return UserProxy as the next_actor."));
}

fn two_executor_roster() -> Vec<Persona> {
    let mut personas = roster();
    personas.push(
        Persona::new("SandboxRunner", "Executes code in a sandbox.")
            .with_kind(PersonaKind::Executor)
            .with_capability(Capability::new("execute_code_block", "Run python"))
            .with_capability(Capability::new("install_package", "pip install a package")),
    );
    personas
}

fn pending_code_call() -> Vec<ChatMessage> {
    let mut log = seed();
    log.push(
        ChatMessage::tagged("PythonExpert", ChatRole::Assistant, "run it").with_function_call(
            Some(FunctionCall {
                name: "execute_code_block".into(),
                arguments: serde_json::json!({"code": "print(1)"}),
            }),
        ),
    );
    log
}

#[tokio::test]
async fn test_direct_selection_shows_the_whole_team_after_a_call() {
    let client = ScriptedClient::new("selector", &[pick("SandboxRunner")]);
    let selector = SpeakerSelector::new(client.clone(), SelectionMode::Direct)
        .with_admin(Some("UserProxy".into()));

    let outcome = selector
        .select(&pending_code_call(), &two_executor_roster(), Some("PythonExpert"), None)
        .await
        .unwrap();
    assert_eq!(outcome.decision.next_speaker, "SandboxRunner");

    let (messages, _) = &client.requests()[0];
    let system = &messages[0].content;
    // Only the owners may be chosen...
    assert!(system.contains("[\"FunctionCallingAgent\", \"SandboxRunner\"]"));
    // ...but the selector still sees the rest of the team.
    assert!(system.contains("AGENT_NAME: CodeReviewer"));
    assert!(system.contains("AGENT_NAME: UserProxy"));
}

#[tokio::test]
async fn test_council_catalog_lists_only_eligible_capabilities() {
    let client = ScriptedClient::new(
        "selector",
        &["Advisor: FunctionCallingAgent.".to_string(), pick("FunctionCallingAgent")],
    );
    let selector = SpeakerSelector::new(client.clone(), SelectionMode::Council {
        inject_discussion: false,
    });

    let mut personas = two_executor_roster();
    personas[1] = Persona::new("CodeReviewer", "Reviews code.")
        .with_capability(Capability::new("post_review", "Post a review comment"));

    let outcome = selector
        .select(&pending_code_call(), &personas, Some("PythonExpert"), None)
        .await
        .unwrap();
    assert_eq!(outcome.decision.next_speaker, "FunctionCallingAgent");

    let requests = client.requests();
    let council_system = &requests[0].0[0].content;
    assert!(council_system.contains("AGENT: SandboxRunner"));
    assert!(council_system.contains("FUNCTION_NAME: install_package"));
    assert!(!council_system.contains("post_review"));
    assert!(!requests[0].0[1].content.contains("AGENT_NAME: CodeReviewer"));
}
