mod chat_completions;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;

pub use chat_completions::{ChatCompletionsConfig, ChatCompletionsModel, GEMINI_API_BASE_URL};

/// One entry in the conversation history sent to a model.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ModelToolCall>,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug)]
pub struct ModelToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelToolChoice {
    Auto,
    Required,
    None,
    Tool(String),
}

/// Per-agent sampling and tool-use knobs, all optional.
///
/// The runner resolves the effective tool choice: an explicit
/// `tool_choice` wins, otherwise `Auto` when the agent has tools and
/// `None` when it does not.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelSettings {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub parallel_tool_calls: Option<bool>,
    pub tool_choice: Option<ModelToolChoice>,
}

/// Everything a provider adapter needs for one completion call.
#[derive(Clone, Debug)]
pub struct ModelRequest<'a> {
    pub messages: &'a [ModelMessage],
    pub tools: &'a [ModelToolDefinition],
    pub tool_choice: ModelToolChoice,
    pub settings: &'a ModelSettings,
    /// Pre-built `response_format` payload when the agent declares an
    /// output schema.
    pub response_format: Option<&'a Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelCompletion {
    pub text: Option<String>,
    pub thinking: Option<String>,
    pub tool_calls: Vec<ModelToolCall>,
    pub usage: Option<ModelUsage>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModelUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelCompletion, ProviderError>;
}
