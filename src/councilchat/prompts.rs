//! Prompt text used by the orchestrator.
//!
//! Every builder returns a plain `String`; none of them touch the message log.

const RULE: &str = "-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~";
const SHORT_RULE: &str = "--------------------";

/// First section of every augmented persona prompt.
pub const AGENT_PREFACE: &str = "You are an agent described by the YOUR_ROLE section below.
You are one of several agents working together in an AGENT_TEAM to solve a task. The team effort is managed by the AGENT_COUNCIL. Every message in the group conversation starts with a SOURCE_AGENT header naming the agent that wrote it:

####
SOURCE_AGENT: <Agent Name>
####

Do not write this header yourself; it is added to your reply automatically.

When a task calls for one of the registered functions, request it by including a JSON object of the form
{\"function_call\": {\"name\": \"<function name>\", \"arguments\": {<arguments>}}}
in your reply. The agent that owns the function will execute it and the result will be shared with the team.

IMPORTANT: Shape your reply so it builds on the skills and expertise of your AGENT_TEAM.

IMPORTANT: Do not confuse yourself with another teammate. Follow YOUR_ROLE when generating your reply.";

/// Short description of the council shown to every persona.
pub const AGENT_COUNCIL_SUMMARY: &str = "A council of dynamic advisory personas that manifest to discuss and decide which agent should act next and why.";

/// System prompt of the direct selection call.
pub fn direct_selection_system(team: &str, agent_names: &[String]) -> String {
    format!(
        "You are an expert at managing group conversations. You follow a conversation closely and determine who is best suited to act next. You are managing a conversation between the following AGENTS:

AGENTS:
{rule}
{team}
{rule}

Analyze the entire conversation and decide who should speak next. Weigh the initial task from the user heavily and always choose the actor that moves the team closest to accomplishing the next step of that task.

Select the next agent from {names:?}. Respond ONLY with a JSON object of the form:

{{
    \"analysis\": <your analysis of the conversation and your reasoning for choosing the next actor>,
    \"next_actor\": <the name of the next actor>
}}",
        rule = SHORT_RULE,
        team = team,
        names = agent_names,
    )
}

/// Final instruction appended after the log in the direct selection call.
pub fn direct_selection_request(agent_names: &[String]) -> String {
    format!(
        "Read the conversation above. Then select the next agent from {:?} to act. Only return the JSON object with \"analysis\" and \"next_actor\".",
        agent_names
    )
}

/// System prompt of the council discussion call.
pub fn council_system(agent_functions: &str) -> String {
    format!(
        "You represent a collective of expert personas, the AGENT_COUNCIL, that manifest as needed. Each persona is an avatar reflecting the capabilities and perspectives of various agents, but not the agents themselves. The personas review the TASK_GOAL and CONVERSATION_HISTORY of an AGENT_TEAM and decide which agent should act next. They take turns in a town-hall style discussion: first they restate and analyze the TASK_GOAL, then they raise points and counterpoints about which agent is best suited to take the next action. Once they agree, they state the next agent (not persona) to act.

The agents have the following functions registered to them:

AGENT_FUNCTIONS:
{rule}
{functions}
{rule}

An agent that has not acted recently, or at all, should be considered more readily for the next action when its input is relevant.

Always include at least 2 personas that are not part of the AGENT_TEAM, such as a \"FirstPrinciplesThinker\" or an \"InnovativeStrategist\". Personas outside the AGENT_TEAM can only advise; they never act.

If it is unclear which agent should act next, defer to the User or UserProxy agent when one is part of the AGENT_TEAM.

IMPORTANT: Never choose a persona that is not in the AGENT_TEAM as the next actor.

IMPORTANT: The personas do not solve the TASK_GOAL. They only discuss and decide which agent should act next.

IMPORTANT: If an agent needs to continue its work, for example while writing code, make it clear that it should act next.",
        rule = SHORT_RULE,
        functions = agent_functions,
    )
}

/// User prompt of the council discussion call.
pub fn council_discussion(task_goal: &str, team: &str, history: &str) -> String {
    format!(
        "Based on the TASK_GOAL, AGENT_TEAM and CONVERSATION_HISTORY below, manifest the best expert personas to discuss which agent should act next and why.

IMPORTANT: ONLY return the DISCUSSION and nothing more.

TASK_GOAL:
{rule}
{task_goal}
{rule}

AGENT_TEAM:
{rule}
{team}
{rule}

CONVERSATION_HISTORY:
{rule}
{history}
{rule}

DISCUSSION:
",
        rule = RULE,
        task_goal = task_goal,
        team = team,
        history = history,
    )
}

/// Prompt of the extraction call that follows a council discussion.
pub fn extract_next_actor(discussion: &str, actor_options: &[String], fallback: &str) -> String {
    format!(
        "Based on the DISCUSSION below, extract the NEXT_ACTOR out of the ACTOR_OPTIONS. Return a JSON object of the form:

{{
    \"analysis\": <your analysis of the discussion and your reasoning for choosing the next actor>,
    \"next_actor\": <the name of the next actor>
}}

NOTE: If you are unsure, return {fallback} as the next_actor.
NOTE: The discussion may mention steps beyond the next one. Only extract the actor for the next step, which is sometimes described as the current step.

DISCUSSION:
---------------
{discussion}
---------------

ACTOR_OPTIONS:
---------------
{options}
---------------

JSON_RESPONSE:
",
        fallback = fallback,
        discussion = discussion,
        options = actor_options.join("\n"),
    )
}

/// Prompt of one JSON repair call.
pub fn fix_json(potential_json: &str) -> String {
    format!(
        "You are a helpful assistant. ONLY return the answer, and nothing more.

Given the following potential JSON text, fix any broken JSON syntax. Do NOT change the text itself. ONLY respond with the fixed JSON.

Potential JSON:
---
{}
---

Response:
",
        potential_json
    )
}

/// System prompt of the termination intent call.
pub const END_INTENT_SYSTEM: &str = "You are an expert in text and sentiment analysis. Based on the provided text, respond with whether the intent is to end or pause the conversation, or to continue it. All-caps statements such as \"TERMINATE\" or \"CONTINUE\" take priority when assessing intent. Your response MUST be a JSON object of the form:
{
    \"analysis\": <your analysis of the text>,
    \"intent\": \"end\" or \"continue\"
}

NOTE: If the intent is to get feedback from the User or UserProxy, the intent is \"end\".

IMPORTANT: ONLY respond with the JSON object and nothing else.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_prompt_lists_candidates() {
        let names = vec!["UserProxy".to_string(), "PythonExpert".to_string()];
        let prompt = direct_selection_system("team roster", &names);
        assert!(prompt.contains("team roster"));
        assert!(prompt.contains("[\"UserProxy\", \"PythonExpert\"]"));
        assert!(prompt.contains("\"next_actor\""));
    }

    #[test]
    fn extraction_prompt_names_the_fallback() {
        let names = vec!["CodeReviewer".to_string()];
        let prompt = extract_next_actor("CodeReviewer should review.", &names, "UserProxy");
        assert!(prompt.contains("return UserProxy as the next_actor"));
        assert!(prompt.contains("CodeReviewer should review."));
    }
}
