use std::sync::Arc;

use async_stream::try_stream;
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::agent::Agent;
use crate::context::{RunContext, RunUsage};
use crate::error::RunError;
use crate::llm::{
    ChatModel, ModelMessage, ModelRequest, ModelToolCall, ModelToolChoice, ModelToolDefinition,
};

const DEFAULT_MAX_TURNS: u32 = 10;

/// Run-wide settings applied on top of per-agent configuration.
#[derive(Clone)]
pub struct RunConfig {
    /// When set, overrides the model bound on every agent in the run.
    pub model: Option<Arc<dyn ChatModel>>,
    pub max_turns: u32,
    pub tracing_disabled: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_turns: DEFAULT_MAX_TURNS,
            tracing_disabled: false,
        }
    }
}

/// What a run starts from: a fresh user message, or the message list of
/// a previous turn (see [`RunResult::to_input_list`]).
#[derive(Clone, Debug)]
pub enum RunInput {
    Text(String),
    Messages(Vec<ModelMessage>),
}

impl From<&str> for RunInput {
    fn from(text: &str) -> Self {
        RunInput::Text(text.to_string())
    }
}

impl From<String> for RunInput {
    fn from(text: String) -> Self {
        RunInput::Text(text)
    }
}

impl From<Vec<ModelMessage>> for RunInput {
    fn from(messages: Vec<ModelMessage>) -> Self {
        RunInput::Messages(messages)
    }
}

impl RunInput {
    fn into_messages(self) -> Vec<ModelMessage> {
        match self {
            RunInput::Text(text) => vec![ModelMessage::User(text)],
            RunInput::Messages(messages) => messages,
        }
    }

    /// The text input guardrails classify: the user message, or the most
    /// recent user message of a carried-over conversation.
    fn guardrail_text(&self) -> String {
        match self {
            RunInput::Text(text) => text.clone(),
            RunInput::Messages(messages) => messages
                .iter()
                .rev()
                .find_map(|message| match message {
                    ModelMessage::User(content) => Some(content.clone()),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }
}

/// Intermediate items produced during a run, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum RunItem {
    MessageOutput {
        agent: String,
        text: String,
    },
    ToolCall {
        agent: String,
        tool: String,
        arguments: Value,
    },
    ToolOutput {
        agent: String,
        tool: String,
        output: String,
        is_error: bool,
    },
    Handoff {
        from: String,
        to: String,
    },
}

/// Events yielded by [`Runner::run_stream`] as the run progresses. The
/// terminal event carries the [`RunResult`].
#[derive(Clone, Debug)]
pub enum RunEvent {
    Thinking {
        agent: String,
        text: String,
    },
    Message {
        agent: String,
        text: String,
    },
    ToolCall {
        agent: String,
        tool: String,
        arguments: Value,
        call_id: String,
    },
    ToolResult {
        agent: String,
        tool: String,
        output: String,
        call_id: String,
        is_error: bool,
    },
    Handoff {
        from: String,
        to: String,
    },
    Completed {
        result: RunResult,
    },
}

/// Outcome of one end-to-end run.
#[derive(Clone, Debug)]
pub struct RunResult {
    final_text: String,
    final_value: Option<Value>,
    new_items: Vec<RunItem>,
    last_agent: Arc<Agent>,
    usage: RunUsage,
    history: Vec<ModelMessage>,
}

impl RunResult {
    /// The final output as text. For agents with an output schema this
    /// is the raw JSON text; use [`RunResult::final_output_as`] for the
    /// typed form.
    pub fn final_output(&self) -> &str {
        &self.final_text
    }

    /// The parsed final output when the agent declared an output schema.
    pub fn final_value(&self) -> Option<&Value> {
        self.final_value.as_ref()
    }

    pub fn final_output_as<T>(&self) -> Result<T, RunError>
    where
        T: DeserializeOwned,
    {
        let value = match &self.final_value {
            Some(value) => value.clone(),
            None => serde_json::from_str(&self.final_text)
                .map_err(|err| RunError::OutputParse(err.to_string()))?,
        };
        serde_json::from_value(value).map_err(|err| RunError::OutputParse(err.to_string()))
    }

    pub fn new_items(&self) -> &[RunItem] {
        &self.new_items
    }

    /// The agent that produced the final output (after any handoffs).
    pub fn last_agent(&self) -> &Arc<Agent> {
        &self.last_agent
    }

    pub fn usage(&self) -> RunUsage {
        self.usage
    }

    /// The conversation so far, ready to extend with the next user
    /// message and feed into another run.
    pub fn to_input_list(&self) -> Vec<ModelMessage> {
        self.history.clone()
    }
}

/// Stateless run engine: interprets an [`Agent`] against an input,
/// iterating turns, executing tool calls, switching agents on handoffs
/// and evaluating guardrails.
#[derive(Clone, Default)]
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Runs to completion and returns the terminal result (drains
    /// [`Runner::run_stream`]).
    pub async fn run(
        &self,
        agent: &Arc<Agent>,
        input: impl Into<RunInput>,
        context: &RunContext,
    ) -> Result<RunResult, RunError> {
        let stream = self.run_stream(agent, input, context);
        futures_util::pin_mut!(stream);

        let mut result = None;
        while let Some(event) = stream.next().await {
            if let RunEvent::Completed { result: completed } = event? {
                result = Some(completed);
            }
        }

        result.ok_or(RunError::MissingFinalOutput)
    }

    pub fn run_stream(
        &self,
        agent: &Arc<Agent>,
        input: impl Into<RunInput>,
        context: &RunContext,
    ) -> impl Stream<Item = Result<RunEvent, RunError>> + Send + 'static {
        let config = self.config.clone();
        let starting_agent = Arc::clone(agent);
        let context = context.clone();
        let input = input.into();

        try_stream! {
            let tracing_enabled = !config.tracing_disabled;
            let mut current = starting_agent;
            let mut history = input.clone().into_messages();
            let guardrail_input = input.guardrail_text();

            if tracing_enabled {
                tracing::info!(agent = %current.name(), "run started");
            }

            // Input guardrails belong to the starting agent and run
            // before its first model call.
            for guardrail in current.input_guardrails.clone() {
                let verdict = guardrail.check(&context, &guardrail_input).await?;
                if verdict.tripwire_triggered {
                    if tracing_enabled {
                        tracing::warn!(guardrail = guardrail.name(), "input guardrail tripwire");
                    }
                    Err::<(), RunError>(RunError::InputGuardrailTripped {
                        guardrail: guardrail.name().to_string(),
                        output_info: verdict.output_info,
                    })?;
                }
            }

            let mut items: Vec<RunItem> = Vec::new();
            let mut agent_started = false;

            for turn in 0..config.max_turns {
                let model = config
                    .model
                    .clone()
                    .or_else(|| current.model.clone())
                    .ok_or_else(|| RunError::Config(format!(
                        "agent '{}' has no model and the run config provides no override",
                        current.name()
                    )))?;

                if !agent_started {
                    if let Some(hooks) = current.hooks.clone() {
                        hooks.on_start(&context, &current).await;
                    }
                    agent_started = true;
                }

                let mut messages = Vec::with_capacity(history.len() + 1);
                if let Some(system) = current.resolve_instructions(&context) {
                    messages.push(ModelMessage::System(system));
                }
                messages.extend(history.iter().cloned());

                let mut tool_definitions = current
                    .tools
                    .iter()
                    .map(|tool| ModelToolDefinition {
                        name: tool.name().to_string(),
                        description: tool.description().to_string(),
                        parameters: tool.json_schema().clone(),
                    })
                    .collect::<Vec<_>>();
                for target in &current.handoffs {
                    tool_definitions.push(ModelToolDefinition {
                        name: target.transfer_tool_name(),
                        description: transfer_tool_description(target),
                        parameters: json!({
                            "type": "object",
                            "properties": {},
                            "required": [],
                            "additionalProperties": false,
                        }),
                    });
                }

                let tool_choice = match (&current.model_settings.tool_choice, tool_definitions.is_empty()) {
                    (Some(choice), _) => choice.clone(),
                    (None, true) => ModelToolChoice::None,
                    (None, false) => ModelToolChoice::Auto,
                };

                let response_format = current
                    .output_schema
                    .as_ref()
                    .map(|schema| schema.response_format());

                if tracing_enabled {
                    tracing::debug!(
                        agent = %current.name(),
                        turn,
                        tools = tool_definitions.len(),
                        "model call"
                    );
                }

                let completion = model
                    .invoke(ModelRequest {
                        messages: &messages,
                        tools: &tool_definitions,
                        tool_choice,
                        settings: &current.model_settings,
                        response_format: response_format.as_ref(),
                    })
                    .await?;

                context.record_usage(completion.usage.as_ref());

                if let Some(thinking) = completion.thinking.clone() {
                    yield RunEvent::Thinking {
                        agent: current.name().to_string(),
                        text: thinking,
                    };
                }

                history.push(ModelMessage::Assistant {
                    content: completion.text.clone(),
                    tool_calls: completion.tool_calls.clone(),
                });

                if let Some(text) = completion.text.clone()
                    && !text.is_empty()
                {
                    items.push(RunItem::MessageOutput {
                        agent: current.name().to_string(),
                        text: text.clone(),
                    });
                    yield RunEvent::Message {
                        agent: current.name().to_string(),
                        text,
                    };
                }

                if completion.tool_calls.is_empty() {
                    let final_text = completion.text.unwrap_or_default();

                    let final_value = match &current.output_schema {
                        Some(schema) => Some(schema.parse(&final_text)?),
                        None => None,
                    };

                    for guardrail in current.output_guardrails.clone() {
                        let verdict = guardrail.check(&context, &final_text).await?;
                        if verdict.tripwire_triggered {
                            if tracing_enabled {
                                tracing::warn!(
                                    guardrail = guardrail.name(),
                                    "output guardrail tripwire"
                                );
                            }
                            Err::<(), RunError>(RunError::OutputGuardrailTripped {
                                guardrail: guardrail.name().to_string(),
                                output_info: verdict.output_info,
                            })?;
                        }
                    }

                    if let Some(hooks) = current.hooks.clone() {
                        hooks.on_end(&context, &current, &final_text).await;
                    }

                    if tracing_enabled {
                        tracing::info!(agent = %current.name(), turns = turn + 1, "run completed");
                    }

                    yield RunEvent::Completed {
                        result: RunResult {
                            final_text,
                            final_value,
                            new_items: items,
                            last_agent: Arc::clone(&current),
                            usage: context.usage(),
                            history,
                        },
                    };
                    return;
                }

                let mut pending_handoff: Option<Arc<Agent>> = None;

                for tool_call in completion.tool_calls {
                    if let Some(target) = find_handoff_target(&current, &tool_call.name) {
                        // First transfer wins; extra transfer calls in the
                        // same completion are acknowledged but ignored.
                        history.push(ModelMessage::ToolResult {
                            tool_call_id: tool_call.id.clone(),
                            tool_name: tool_call.name.clone(),
                            content: json!({"assistant": target.name()}).to_string(),
                            is_error: false,
                        });
                        if pending_handoff.is_none() {
                            pending_handoff = Some(target);
                        }
                        continue;
                    }

                    yield RunEvent::ToolCall {
                        agent: current.name().to_string(),
                        tool: tool_call.name.clone(),
                        arguments: tool_call.arguments.clone(),
                        call_id: tool_call.id.clone(),
                    };
                    items.push(RunItem::ToolCall {
                        agent: current.name().to_string(),
                        tool: tool_call.name.clone(),
                        arguments: tool_call.arguments.clone(),
                    });

                    if let Some(hooks) = current.hooks.clone() {
                        hooks.on_tool_start(&context, &current, &tool_call.name).await;
                    }

                    let execution = execute_tool_call(&current, &tool_call, &context).await;

                    if tracing_enabled {
                        tracing::debug!(
                            agent = %current.name(),
                            tool = %tool_call.name,
                            is_error = execution.is_error,
                            "tool executed"
                        );
                    }

                    history.push(ModelMessage::ToolResult {
                        tool_call_id: tool_call.id.clone(),
                        tool_name: tool_call.name.clone(),
                        content: execution.result_text.clone(),
                        is_error: execution.is_error,
                    });

                    if let Some(hooks) = current.hooks.clone() {
                        hooks
                            .on_tool_end(&context, &current, &tool_call.name, &execution.result_text)
                            .await;
                    }

                    items.push(RunItem::ToolOutput {
                        agent: current.name().to_string(),
                        tool: tool_call.name.clone(),
                        output: execution.result_text.clone(),
                        is_error: execution.is_error,
                    });
                    yield RunEvent::ToolResult {
                        agent: current.name().to_string(),
                        tool: tool_call.name,
                        output: execution.result_text,
                        call_id: tool_call.id,
                        is_error: execution.is_error,
                    };
                }

                if let Some(target) = pending_handoff {
                    if let Some(hooks) = target.hooks.clone() {
                        hooks.on_handoff(&context, &current, &target).await;
                    }
                    items.push(RunItem::Handoff {
                        from: current.name().to_string(),
                        to: target.name().to_string(),
                    });
                    yield RunEvent::Handoff {
                        from: current.name().to_string(),
                        to: target.name().to_string(),
                    };
                    if tracing_enabled {
                        tracing::info!(from = %current.name(), to = %target.name(), "handoff");
                    }
                    current = target;
                    agent_started = false;
                }
            }

            Err::<(), RunError>(RunError::MaxTurnsExceeded {
                max_turns: config.max_turns,
            })?;
        }
    }
}

fn transfer_tool_description(target: &Agent) -> String {
    match target.handoff_description() {
        Some(description) => format!(
            "Handoff to the {} agent to handle the request. {description}",
            target.name()
        ),
        None => format!("Handoff to the {} agent to handle the request.", target.name()),
    }
}

fn find_handoff_target(current: &Agent, tool_name: &str) -> Option<Arc<Agent>> {
    current
        .handoffs
        .iter()
        .find(|target| target.transfer_tool_name() == tool_name)
        .map(Arc::clone)
}

struct ToolExecution {
    result_text: String,
    is_error: bool,
}

async fn execute_tool_call(
    agent: &Agent,
    tool_call: &ModelToolCall,
    context: &RunContext,
) -> ToolExecution {
    let Some(tool) = agent
        .tools
        .iter()
        .find(|tool| tool.name() == tool_call.name)
    else {
        return ToolExecution {
            result_text: format!("Unknown tool '{}'.", tool_call.name),
            is_error: true,
        };
    };

    match tool.execute(tool_call.arguments.clone(), context).await {
        Ok(outcome) => ToolExecution {
            result_text: outcome.into_result_text(),
            is_error: false,
        },
        Err(err) => ToolExecution {
            result_text: err.to_string(),
            is_error: true,
        },
    }
}
