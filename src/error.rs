use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema must be a JSON object")]
    SchemaNotObject,
    #[error("schema must declare type=object")]
    RootTypeMustBeObject,
    #[error("required must be an array of strings")]
    InvalidRequired,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid tool arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("run context value missing: {0}")]
    MissingContext(&'static str),
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider response invalid: {0}")]
    Response(String),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("run configuration error: {0}")]
    Config(String),
    #[error("max turns reached ({max_turns})")]
    MaxTurnsExceeded { max_turns: u32 },
    #[error("run ended without a final output")]
    MissingFinalOutput,
    #[error("final output did not match the output schema: {0}")]
    OutputParse(String),
    #[error("input guardrail '{guardrail}' tripwire triggered")]
    InputGuardrailTripped { guardrail: String, output_info: Value },
    #[error("output guardrail '{guardrail}' tripwire triggered")]
    OutputGuardrailTripped { guardrail: String, output_info: Value },
}
