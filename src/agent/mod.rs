use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::context::RunContext;
use crate::error::{RunError, ToolError};
use crate::guardrail::{InputGuardrail, OutputGuardrail};
use crate::hooks::AgentHooks;
use crate::llm::{ChatModel, ModelSettings};
use crate::output::OutputSchema;
use crate::runner::{RunInput, Runner};
use crate::tools::{ToolOutcome, ToolSpec};

/// Agent instructions: a static system prompt, or a function computed
/// from the run context and the agent itself at each model call.
#[derive(Clone)]
pub enum Instructions {
    Static(String),
    Dynamic(Arc<dyn Fn(&RunContext, &Agent) -> String + Send + Sync>),
}

impl std::fmt::Debug for Instructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instructions::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Instructions::Dynamic(_) => f.debug_tuple("Dynamic").field(&"<fn>").finish(),
        }
    }
}

/// A named configuration bundle: instructions, model binding, tools,
/// guardrails, handoff targets, hooks and an optional output schema.
/// Interpreted by [`Runner`] to drive one conversational run.
#[derive(Clone)]
pub struct Agent {
    pub(crate) name: String,
    pub(crate) instructions: Option<Instructions>,
    pub(crate) handoff_description: Option<String>,
    pub(crate) model: Option<Arc<dyn ChatModel>>,
    pub(crate) model_settings: ModelSettings,
    pub(crate) tools: Vec<ToolSpec>,
    pub(crate) handoffs: Vec<Arc<Agent>>,
    pub(crate) input_guardrails: Vec<InputGuardrail>,
    pub(crate) output_guardrails: Vec<OutputGuardrail>,
    pub(crate) output_schema: Option<OutputSchema>,
    pub(crate) hooks: Option<Arc<dyn AgentHooks>>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .field(
                "handoffs",
                &self
                    .handoffs
                    .iter()
                    .map(|agent| agent.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handoff_description(&self) -> Option<&str> {
        self.handoff_description.as_deref()
    }

    pub fn output_schema(&self) -> Option<&OutputSchema> {
        self.output_schema.as_ref()
    }

    /// Resolves the system prompt for one model call.
    pub(crate) fn resolve_instructions(&self, context: &RunContext) -> Option<String> {
        match &self.instructions {
            Some(Instructions::Static(text)) => Some(text.clone()),
            Some(Instructions::Dynamic(compute)) => Some(compute(context, self)),
            None => None,
        }
    }

    /// Name of the synthesized handoff tool for this agent.
    pub(crate) fn transfer_tool_name(&self) -> String {
        let slug = self
            .name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        format!("transfer_to_{slug}")
    }

    /// Wraps this agent as a tool: the handler runs the agent on the
    /// tool-call `input` string, propagating the caller's context, and
    /// returns its final text output.
    pub fn as_tool(
        self: &Arc<Self>,
        tool_name: impl Into<String>,
        tool_description: impl Into<String>,
    ) -> ToolSpec {
        let agent = Arc::clone(self);

        ToolSpec::new(tool_name, tool_description)
            .with_object_schema(json!({
                "type": "object",
                "properties": {
                    "input": {"type": "string"}
                },
                "required": ["input"],
                "additionalProperties": false
            }))
            .with_handler(move |args, context| {
                let agent = Arc::clone(&agent);
                async move {
                    let input = args
                        .get("input")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();

                    let result = Runner::default()
                        .run(&agent, RunInput::Text(input), &context)
                        .await
                        .map_err(|err| ToolError::Execution(err.to_string()))?;

                    Ok(ToolOutcome::Text(result.final_output().to_string()))
                }
            })
    }
}

pub struct AgentBuilder {
    name: String,
    instructions: Option<Instructions>,
    handoff_description: Option<String>,
    model: Option<Arc<dyn ChatModel>>,
    model_settings: ModelSettings,
    tools: Vec<ToolSpec>,
    handoffs: Vec<Arc<Agent>>,
    input_guardrails: Vec<InputGuardrail>,
    output_guardrails: Vec<OutputGuardrail>,
    output_schema: Option<OutputSchema>,
    hooks: Option<Arc<dyn AgentHooks>>,
}

impl AgentBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: None,
            handoff_description: None,
            model: None,
            model_settings: ModelSettings::default(),
            tools: Vec::new(),
            handoffs: Vec::new(),
            input_guardrails: Vec::new(),
            output_guardrails: Vec::new(),
            output_schema: None,
            hooks: None,
        }
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(Instructions::Static(instructions.into()));
        self
    }

    /// Instructions computed per model call from the run context.
    pub fn instructions_fn<F>(mut self, compute: F) -> Self
    where
        F: Fn(&RunContext, &Agent) -> String + Send + Sync + 'static,
    {
        self.instructions = Some(Instructions::Dynamic(Arc::new(compute)));
        self
    }

    pub fn handoff_description(mut self, description: impl Into<String>) -> Self {
        self.handoff_description = Some(description.into());
        self
    }

    pub fn model<M>(mut self, model: M) -> Self
    where
        M: ChatModel + 'static,
    {
        self.model = Some(Arc::new(model));
        self
    }

    /// Binds an already-shared model, letting several agents reuse one
    /// adapter.
    pub fn shared_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn model_settings(mut self, model_settings: ModelSettings) -> Self {
        self.model_settings = model_settings;
        self
    }

    pub fn tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn handoff(mut self, agent: Arc<Agent>) -> Self {
        self.handoffs.push(agent);
        self
    }

    pub fn handoffs(mut self, agents: Vec<Arc<Agent>>) -> Self {
        self.handoffs.extend(agents);
        self
    }

    pub fn input_guardrail(mut self, guardrail: InputGuardrail) -> Self {
        self.input_guardrails.push(guardrail);
        self
    }

    pub fn output_guardrail(mut self, guardrail: OutputGuardrail) -> Self {
        self.output_guardrails.push(guardrail);
        self
    }

    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn hooks<H>(mut self, hooks: H) -> Self
    where
        H: AgentHooks + 'static,
    {
        self.hooks = Some(Arc::new(hooks));
        self
    }

    pub fn build(self) -> Result<Agent, RunError> {
        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name().to_string()) {
                return Err(RunError::Config(format!(
                    "duplicate tool registered: {}",
                    tool.name()
                )));
            }
        }

        let mut handoff_names = HashSet::new();
        for target in &self.handoffs {
            if !handoff_names.insert(target.name.clone()) {
                return Err(RunError::Config(format!(
                    "duplicate handoff target: {}",
                    target.name
                )));
            }
        }

        Ok(Agent {
            name: self.name,
            instructions: self.instructions,
            handoff_description: self.handoff_description,
            model: self.model,
            model_settings: self.model_settings,
            tools: self.tools,
            handoffs: self.handoffs,
            input_guardrails: self.input_guardrails,
            output_guardrails: self.output_guardrails,
            output_schema: self.output_schema,
            hooks: self.hooks,
        })
    }
}
