// A small software team chatting through councilchat: a human (UserProxy), a
// python expert, a code reviewer, and an executor that can run python code.
// The next speaker is picked by an AGENT_COUNCIL discussion.
//
// To run this example you need an OpenAI key and `python3` on the PATH:
// ```
// export OPEN_AI_SECRET="your-openai-key"
// cargo run --example code_review_team
// ```
//
// Pass `--resume` to continue the latest saved conversation instead of
// starting a new one. Press Ctrl-C at any time to hand the final word to
// UserProxy.

use async_trait::async_trait;
use councilchat::clients::console::ConsoleClient;
use councilchat::clients::openai::OpenAIClient;
use councilchat::config::{ConversationConfig, SelectionMode, TerminationPolicy};
use councilchat::event::{ChatEvent, EventHandler};
use councilchat::persona::{Capability, CapabilityParameter, ParameterType, Persona, PersonaKind};
use councilchat::{FnCapability, GroupChat, Participant};
use std::process::Command;
use std::sync::Arc;

const ADMIN: &str = "UserProxy";

struct ConsoleEvents;

#[async_trait]
impl EventHandler for ConsoleEvents {
    async fn on_chat_event(&self, event: &ChatEvent) {
        match event {
            ChatEvent::SpeakerSelected {
                round,
                speaker,
                analysis,
                ..
            } => {
                println!("\n--- round {}: {} ---", round, speaker);
                println!("    why: {}", analysis);
            }
            ChatEvent::PersonaReplied {
                persona,
                response_length,
                ..
            } => println!("    {} replied ({} chars)", persona, response_length),
            ChatEvent::CapabilityExecuted {
                persona,
                capability,
                success,
            } => println!("    {} ran {} (success: {})", persona, capability, success),
            ChatEvent::Interrupted { speaker, .. } => println!(
                "\n*** {} was interrupted, {} has the final word ***",
                speaker, ADMIN
            ),
            ChatEvent::RunCompleted {
                rounds,
                messages,
                reason,
            } => println!(
                "\n=== Finished after {} rounds, {} messages ({:?}) ===",
                rounds, messages, reason
            ),
            _ => {}
        }
    }
}

fn run_python(arguments: serde_json::Value) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let code = arguments["code"]
        .as_str()
        .ok_or("missing 'code' argument")?;
    let output = Command::new("python3").arg("-c").arg(code).output()?;
    Ok(format!(
        "exit status: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    councilchat::init_logger();

    let resume = std::env::args().any(|arg| arg == "--resume");
    let secret_key = std::env::var("OPEN_AI_SECRET")
        .unwrap_or_else(|_| "demo-key-please-set-OPEN_AI_SECRET".to_string());
    let llm = Arc::new(OpenAIClient::new(&secret_key, "gpt-4o").with_temperature(0.3));

    let execute_code_block = Capability::new(
        "execute_code_block",
        "Execute a python code block and return its output.",
    )
    .with_parameter(
        CapabilityParameter::new("code", ParameterType::String)
            .with_description("The python source to run.")
            .required(),
    );

    let participants = vec![
        Participant::new(
            Persona::new(
                ADMIN,
                "A proxy for the human user. Gives the task, answers questions and approves the final result.",
            )
            .with_kind(PersonaKind::HumanProxy),
            Arc::new(ConsoleClient::new("UserProxy> ")),
        ),
        Participant::new(
            Persona::new(
                "PythonExpert",
                "An expert python developer. Writes complete, working python code and asks the FunctionCallingAgent to run it.",
            ),
            llm.clone(),
        ),
        Participant::new(
            Persona::new(
                "CodeReviewer",
                "A meticulous code reviewer. Points out bugs, missing edge cases and style problems in the code the team writes.",
            ),
            llm.clone(),
        ),
        Participant::new(
            Persona::new(
                "FunctionCallingAgent",
                "Executes the python code other agents ask for and reports the output.",
            )
            .with_kind(PersonaKind::Executor),
            llm.clone(),
        )
        .with_capability(execute_code_block, Arc::new(FnCapability::new(run_python))),
    ];

    let config = ConversationConfig::new("Code Review Team")
        .with_admin(ADMIN)
        .with_selection_mode(SelectionMode::Council {
            inject_discussion: false,
        })
        .with_termination(TerminationPolicy::IntentAnalysis)
        .with_max_rounds(12);

    let mut chat = GroupChat::new(config, participants, llm)?
        .with_event_handler(Arc::new(ConsoleEvents));
    chat.interrupt_handle().listen_for_ctrl_c();

    let outcome = if resume {
        let path = chat.resume(None)?;
        println!("Resuming {}", path.display());
        chat.run(None).await?
    } else {
        chat.run(Some(
            "Write a python function that returns the n-th Fibonacci number, test it, and get it reviewed.",
        ))
        .await?
    };

    println!("History written to {}", chat.history_file().display());
    if let Some(message) = outcome.messages.last() {
        println!("\nLast message from {}:\n{}", message.speaker, message.body());
    }
    Ok(())
}
