//! Minimal multi-agent run loop for chat-completions providers.
//!
//! v0 surface:
//! - `Agent` configuration bundles: instructions (static or computed),
//!   model binding, `ModelSettings`, tools, handoffs, guardrails, hooks
//! - `Runner` with `run` and `run_stream` entry points
//! - Input/output guardrails signalling through distinguished
//!   `RunError` tripwire variants
//! - Tool registry + JSON schema validation + typed run context
//! - Structured output via `OutputSchema` and `final_output_as`
//! - OpenAI-compatible adapter via `ChatCompletionsModel` (base-URL
//!   override for providers such as Gemini)

pub mod agent;
pub mod context;
pub mod error;
pub mod guardrail;
pub mod hooks;
pub mod llm;
pub mod output;
pub mod review;
pub mod runner;
pub mod tools;

pub use agent::{Agent, AgentBuilder, Instructions};
pub use context::{RunContext, RunUsage};
pub use error::{ProviderError, RunError, SchemaError, ToolError};
pub use guardrail::{GuardrailVerdict, InputGuardrail, OutputGuardrail};
pub use hooks::AgentHooks;
pub use llm::{
    ChatCompletionsConfig, ChatCompletionsModel, ChatModel, GEMINI_API_BASE_URL, ModelCompletion,
    ModelMessage, ModelRequest, ModelSettings, ModelToolCall, ModelToolChoice, ModelToolDefinition,
    ModelUsage,
};
pub use output::OutputSchema;
pub use review::{ReviewFeedback, ReviewOutcome, ReviewPolicy, ReviewVerdict, run_review_loop};
pub use runner::{RunConfig, RunEvent, RunInput, RunItem, RunResult, Runner};
pub use tools::{ToolOutcome, ToolSpec};
