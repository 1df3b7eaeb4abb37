//! Persona registry.
//!
//! A [`Persona`] is the static description of a group chat participant: a
//! unique name, its instructions, and the ordered list of [`Capability`]
//! descriptors it can execute. This module also renders the human/LLM
//! readable roster that is injected into prompts.
//!
//! # Example
//!
//! ```
//! use councilchat::persona::{Capability, CapabilityParameter, ParameterType, Persona, PersonaKind};
//!
//! let executor = Persona::new("FunctionCallingAgent", "You only call registered functions.")
//!     .with_kind(PersonaKind::Executor)
//!     .with_capability(
//!         Capability::new("execute_code_block", "Execute a block of code")
//!             .with_parameter(
//!                 CapabilityParameter::new("code", ParameterType::String)
//!                     .with_description("The code to execute")
//!                     .required(),
//!             ),
//!     );
//!
//! assert!(executor.can_execute("execute_code_block"));
//! assert!(executor.describe().contains("execute_code_block"));
//! ```

use serde::{Deserialize, Serialize};

const SECTION_RULE: &str =
    "-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~-~";
const ENTRY_RULE: &str = "--------------------------------------------------";

/// JSON type of a capability parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParameterType {
    fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Array => "array",
            ParameterType::Object => "object",
        }
    }
}

/// One parameter of a capability's schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    pub description: Option<String>,
    pub required: bool,
}

impl CapabilityParameter {
    pub fn new(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A named, schema-described action a persona can execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capability {
    pub name: String,
    pub description: String,
    pub parameters: Vec<CapabilityParameter>,
}

impl Capability {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: CapabilityParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// JSON schema of the parameters, in the shape function-calling APIs expect.
    pub fn parameter_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut property = serde_json::Map::new();
            property.insert("type".into(), param.param_type.as_str().into());
            if let Some(description) = &param.description {
                property.insert("description".into(), description.as_str().into());
            }
            properties.insert(param.name.clone(), serde_json::Value::Object(property));
            if param.required {
                required.push(serde_json::Value::String(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// One block per capability: name, description and parameter schema.
    pub fn describe(&self) -> String {
        format!(
            "FUNCTION_NAME: {}\nFUNCTION_DESCRIPTION: {}\nFUNCTION_PARAMETERS: {}",
            self.name,
            self.description,
            self.parameter_schema()
        )
    }
}

/// What kind of participant a persona is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PersonaKind {
    /// A regular LLM-backed teammate.
    #[default]
    Assistant,
    /// Stands in for the human user; the usual admin persona.
    HumanProxy,
    /// Exists to execute capabilities requested by teammates.
    Executor,
}

/// Static description of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub instructions: String,
    pub kind: PersonaKind,
    pub capabilities: Vec<Capability>,
}

impl Persona {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            kind: PersonaKind::Assistant,
            capabilities: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: PersonaKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Whether this persona declares the capability called `name`.
    pub fn can_execute(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }

    /// Whether this persona executes capabilities at all.
    pub fn can_invoke(&self) -> bool {
        !self.capabilities.is_empty()
    }

    /// Rendered capability list, or `None` when the persona has none.
    pub fn describe_capabilities(&self) -> Option<String> {
        if self.capabilities.is_empty() {
            return None;
        }
        let blocks = self
            .capabilities
            .iter()
            .map(Capability::describe)
            .collect::<Vec<_>>()
            .join("\n\n");
        Some(format!("AGENT_FUNCTIONS:\n{}", blocks))
    }

    /// Name, instructions and capabilities, as shown to other personas and to
    /// the speaker selector.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "AGENT_NAME: {}\nAGENT_DESCRIPTION: {}",
            self.name,
            self.instructions.trim()
        );
        if let Some(functions) = self.describe_capabilities() {
            out.push('\n');
            out.push_str(&functions);
        }
        out
    }
}

/// Roster description of `personas`, one ruled block per persona.
///
/// When `viewer` is given its own entry is marked `(this is you)`.
pub fn team_description(personas: &[Persona], viewer: Option<&str>) -> String {
    personas
        .iter()
        .map(|persona| {
            let mut entry = persona.describe();
            if viewer == Some(persona.name.as_str()) {
                entry = entry.replacen(
                    &format!("AGENT_NAME: {}", persona.name),
                    &format!("AGENT_NAME: {} (this is you)", persona.name),
                    1,
                );
            }
            format!("{rule}\n{entry}\n{rule}", rule = ENTRY_RULE, entry = entry)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every declared capability across the roster, grouped by owner.
pub fn capability_catalog(personas: &[Persona]) -> String {
    let sections: Vec<String> = personas
        .iter()
        .filter_map(|persona| {
            persona
                .describe_capabilities()
                .map(|functions| format!("AGENT: {}\n{}", persona.name, functions))
        })
        .collect();
    if sections.is_empty() {
        "No agent has registered functions.".to_string()
    } else {
        sections.join(&format!("\n{}\n", ENTRY_RULE))
    }
}

/// Prepend the team preface and roster to the persona's instructions.
///
/// `team_description` is the roster as rendered by [`team_description`] for
/// this persona. The result is a new persona; the original instructions end up
/// in the `YOUR_ROLE` section. Call it once per persona at setup time.
pub fn augment_instructions(persona: &Persona, team_description: &str) -> Persona {
    let functions = persona.describe_capabilities().unwrap_or_default();
    let instructions = format!(
        "PREFACE:\n{rule}\n{preface}\n{rule}\n\n\
         AGENT_TEAM:\n{rule}\nBelow is a description of the agent team and their skills/expertise:\n{team}\n{rule}\n\n\
         AGENT_COUNCIL:\n{rule}\n{council}\n{rule}\n\n\
         YOUR_ROLE:\n{rule}\nAGENT_NAME: {name}\nAGENT_DESCRIPTION: {description}\n{functions}\n{rule}\n",
        rule = SECTION_RULE,
        preface = crate::councilchat::prompts::AGENT_PREFACE,
        team = team_description,
        council = crate::councilchat::prompts::AGENT_COUNCIL_SUMMARY,
        name = persona.name,
        description = persona.instructions.trim(),
        functions = functions,
    );
    Persona {
        instructions,
        ..persona.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Persona> {
        vec![
            Persona::new("UserProxy", "A proxy for the user.").with_kind(PersonaKind::HumanProxy),
            Persona::new("PythonExpert", "Writes python code."),
            Persona::new("FunctionCallingAgent", "Calls functions.")
                .with_kind(PersonaKind::Executor)
                .with_capability(
                    Capability::new("read_file", "Read a file").with_parameter(
                        CapabilityParameter::new("path", ParameterType::String).required(),
                    ),
                ),
        ]
    }

    #[test]
    fn describe_lists_capabilities_with_schema() {
        let personas = roster();
        let text = personas[2].describe();
        assert!(text.contains("AGENT_NAME: FunctionCallingAgent"));
        assert!(text.contains("FUNCTION_NAME: read_file"));
        assert!(text.contains("\"required\":[\"path\"]"));
        assert!(!personas[1].describe().contains("AGENT_FUNCTIONS"));
    }

    #[test]
    fn team_description_marks_the_viewer() {
        let personas = roster();
        let text = team_description(&personas, Some("PythonExpert"));
        assert!(text.contains("AGENT_NAME: PythonExpert (this is you)"));
        assert!(!text.contains("UserProxy (this is you)"));
        assert_eq!(text.matches("AGENT_NAME:").count(), 3);
    }

    #[test]
    fn augment_keeps_identity_and_embeds_roster() {
        let personas = roster();
        let team = team_description(&personas, Some("PythonExpert"));
        let augmented = augment_instructions(&personas[1], &team);
        assert_eq!(augmented.name, "PythonExpert");
        assert!(augmented.instructions.starts_with("PREFACE:"));
        assert!(augmented.instructions.contains("AGENT_NAME: UserProxy"));
        assert!(augmented.instructions.contains("AGENT_DESCRIPTION: Writes python code."));
        assert_eq!(augmented.instructions.matches("PREFACE:").count(), 1);
    }

    #[test]
    fn catalog_skips_personas_without_capabilities() {
        let catalog = capability_catalog(&roster());
        assert!(catalog.contains("AGENT: FunctionCallingAgent"));
        assert!(!catalog.contains("AGENT: PythonExpert"));
        assert_eq!(
            capability_catalog(&roster()[..2]),
            "No agent has registered functions."
        );
    }
}
