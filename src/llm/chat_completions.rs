use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ProviderError;
use crate::llm::{
    ChatModel, ModelCompletion, ModelMessage, ModelRequest, ModelToolCall, ModelToolChoice,
    ModelUsage,
};

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible endpoint exposed by Google for Gemini models.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

const EMPTY_USER_CONTENT_FALLBACK: &str = " ";

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub api_key: String,
    pub model: String,
    /// Base-URL override for non-default providers exposing the
    /// chat-completions wire format.
    pub api_base_url: Option<String>,
}

impl ChatCompletionsConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base_url: None,
        }
    }

    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = Some(api_base_url.into());
        self
    }
}

/// Adapter for any `/chat/completions`-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsModel {
    client: Client,
    config: ChatCompletionsConfig,
}

impl ChatCompletionsModel {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    /// Creates an adapter using `OPENAI_API_KEY` from the environment.
    pub fn from_env(model: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Request("OPENAI_API_KEY is not set".to_string()))?;

        Self::new(ChatCompletionsConfig::new(api_key, model))
    }

    /// Creates an adapter for Gemini through its OpenAI-compatible
    /// endpoint, using `GEMINI_API_KEY` from the environment.
    pub fn gemini_from_env(model: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                ProviderError::Request("GEMINI_API_KEY (or GOOGLE_API_KEY) is not set".to_string())
            })?;

        Self::new(
            ChatCompletionsConfig::new(api_key, model).with_api_base_url(GEMINI_API_BASE_URL),
        )
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl ChatModel for ChatCompletionsModel {
    async fn invoke(&self, request: ModelRequest<'_>) -> Result<ModelCompletion, ProviderError> {
        let payload = build_request(&request, &self.config);

        let response = self
            .client
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Request(extract_api_error(response).await));
        }

        let payload = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|err| ProviderError::Response(err.to_string()))?;

        normalize_response(payload)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinitionPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoicePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum RequestMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCallPayload>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize)]
struct ToolDefinitionPayload {
    #[serde(rename = "type")]
    type_: String,
    function: ToolFunctionDefinition,
}

#[derive(Debug, Serialize)]
struct ToolFunctionDefinition {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ToolChoicePayload {
    Mode(String),
    Specific {
        #[serde(rename = "type")]
        type_: String,
        function: ToolChoiceFunction,
    },
}

#[derive(Debug, Serialize)]
struct ToolChoiceFunction {
    name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ToolCallPayload {
    id: String,
    #[serde(rename = "type")]
    type_: String,
    function: ToolCallFunction,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ToolCallFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallPayload>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    completion_tokens_details: Option<CompletionTokenDetails>,
}

#[derive(Debug, Deserialize)]
struct CompletionTokenDetails {
    reasoning_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<Value>,
}

fn build_request(
    request: &ModelRequest<'_>,
    config: &ChatCompletionsConfig,
) -> ChatCompletionRequest {
    let request_messages = ensure_non_empty_messages(to_request_messages(request.messages));

    let tools_payload = if request.tools.is_empty() {
        None
    } else {
        Some(
            request
                .tools
                .iter()
                .map(|tool| ToolDefinitionPayload {
                    type_: "function".to_string(),
                    function: ToolFunctionDefinition {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect::<Vec<_>>(),
        )
    };

    let tool_choice_payload = if request.tools.is_empty() {
        None
    } else {
        Some(match request.tool_choice.clone() {
            ModelToolChoice::Auto => ToolChoicePayload::Mode("auto".to_string()),
            ModelToolChoice::Required => ToolChoicePayload::Mode("required".to_string()),
            ModelToolChoice::None => ToolChoicePayload::Mode("none".to_string()),
            ModelToolChoice::Tool(name) => ToolChoicePayload::Specific {
                type_: "function".to_string(),
                function: ToolChoiceFunction { name },
            },
        })
    };

    let settings = request.settings;

    ChatCompletionRequest {
        model: config.model.clone(),
        messages: request_messages,
        tools: tools_payload,
        tool_choice: tool_choice_payload,
        parallel_tool_calls: if request.tools.is_empty() {
            None
        } else {
            settings.parallel_tool_calls
        },
        temperature: settings.temperature,
        top_p: settings.top_p,
        max_tokens: settings.max_tokens,
        frequency_penalty: settings.frequency_penalty,
        presence_penalty: settings.presence_penalty,
        response_format: request.response_format.cloned(),
    }
}

fn to_request_messages(messages: &[ModelMessage]) -> Vec<RequestMessage> {
    let mut request_messages = Vec::new();

    for message in messages {
        match message {
            ModelMessage::System(content) => {
                if content.is_empty() {
                    continue;
                }
                request_messages.push(RequestMessage::System {
                    content: content.clone(),
                });
            }
            ModelMessage::User(content) => {
                if content.is_empty() {
                    continue;
                }
                request_messages.push(RequestMessage::User {
                    content: content.clone(),
                });
            }
            ModelMessage::Assistant {
                content,
                tool_calls,
            } => {
                let serialized_tool_calls = tool_calls
                    .iter()
                    .map(|tool_call| ToolCallPayload {
                        id: tool_call.id.clone(),
                        type_: "function".to_string(),
                        function: ToolCallFunction {
                            name: tool_call.name.clone(),
                            arguments: tool_call.arguments.to_string(),
                        },
                    })
                    .collect::<Vec<_>>();

                let assistant_content = content.as_ref().filter(|text| !text.is_empty()).cloned();
                if assistant_content.is_none() && serialized_tool_calls.is_empty() {
                    continue;
                }

                request_messages.push(RequestMessage::Assistant {
                    content: assistant_content,
                    tool_calls: if serialized_tool_calls.is_empty() {
                        None
                    } else {
                        Some(serialized_tool_calls)
                    },
                });
            }
            ModelMessage::ToolResult {
                tool_call_id,
                tool_name: _,
                content,
                is_error,
            } => {
                let rendered = if *is_error {
                    format!("Error: {content}")
                } else {
                    content.clone()
                };

                request_messages.push(RequestMessage::Tool {
                    tool_call_id: tool_call_id.clone(),
                    content: rendered,
                });
            }
        }
    }

    request_messages
}

fn ensure_non_empty_messages(mut messages: Vec<RequestMessage>) -> Vec<RequestMessage> {
    if messages.is_empty() {
        messages.push(RequestMessage::User {
            content: EMPTY_USER_CONTENT_FALLBACK.to_string(),
        });
    }

    messages
}

fn normalize_response(response: ChatCompletionResponse) -> Result<ModelCompletion, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Response("completion missing choices".to_string()))?;

    let message = choice
        .message
        .ok_or_else(|| ProviderError::Response("completion missing choice message".to_string()))?;

    let mut tool_calls = Vec::new();
    for tool_call in message.tool_calls {
        let arguments = if tool_call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str::<Value>(&tool_call.function.arguments).map_err(|err| {
                ProviderError::Response(format!(
                    "tool call arguments for '{}' are not valid JSON: {err}",
                    tool_call.function.name
                ))
            })?
        };

        tool_calls.push(ModelToolCall {
            id: tool_call.id,
            name: tool_call.function.name,
            arguments,
        });
    }

    let usage = response.usage.map(|usage| ModelUsage {
        input_tokens: usage.prompt_tokens.unwrap_or(0),
        output_tokens: usage.completion_tokens.unwrap_or(0).saturating_add(
            usage
                .completion_tokens_details
                .and_then(|details| details.reasoning_tokens)
                .unwrap_or(0),
        ),
    });

    Ok(ModelCompletion {
        text: message.content.filter(|text| !text.is_empty()),
        thinking: message.reasoning_content.filter(|text| !text.is_empty()),
        tool_calls,
        usage,
    })
}

async fn extract_api_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = parsed
            .error
            .code
            .map(|value| match value {
                Value::String(value) => value,
                other => other.to_string(),
            })
            .unwrap_or_else(|| status.as_u16().to_string());
        let error_type = parsed
            .error
            .type_
            .unwrap_or_else(|| status.to_string().to_uppercase());
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown provider error".to_string());

        return format!("chat completions error {code} {error_type}: {message}");
    }

    if body.is_empty() {
        format!("chat completions request failed ({status})")
    } else {
        format!("chat completions request failed ({status}): {body}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::llm::{ModelSettings, ModelToolDefinition};

    fn tool_definition() -> ModelToolDefinition {
        ModelToolDefinition {
            name: "lookup".to_string(),
            description: "Look up something".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"}
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    #[test]
    fn build_request_serializes_messages_tools_and_settings() {
        let messages = vec![
            ModelMessage::System("You are helpful".to_string()),
            ModelMessage::User("Find docs".to_string()),
            ModelMessage::Assistant {
                content: Some("Calling tool".to_string()),
                tool_calls: vec![ModelToolCall {
                    id: "call_1".to_string(),
                    name: "lookup".to_string(),
                    arguments: json!({"query": "rust"}),
                }],
            },
            ModelMessage::ToolResult {
                tool_call_id: "call_1".to_string(),
                tool_name: "lookup".to_string(),
                content: "{\"result\":\"ok\"}".to_string(),
                is_error: false,
            },
        ];

        let settings = ModelSettings {
            temperature: Some(0.2),
            top_p: Some(0.3),
            max_tokens: Some(512),
            frequency_penalty: Some(0.5),
            presence_penalty: Some(0.3),
            parallel_tool_calls: Some(false),
            tool_choice: None,
        };

        let tools = [tool_definition()];
        let request = ModelRequest {
            messages: &messages,
            tools: &tools,
            tool_choice: ModelToolChoice::Tool("lookup".to_string()),
            settings: &settings,
            response_format: None,
        };

        let config = ChatCompletionsConfig::new("key", "gemini-2.0-flash");
        let value = serde_json::to_value(build_request(&request, &config)).expect("serializes");

        assert_eq!(value["model"], "gemini-2.0-flash");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "You are helpful");
        assert_eq!(value["messages"][2]["role"], "assistant");
        assert_eq!(
            value["messages"][2]["tool_calls"][0]["function"]["name"],
            "lookup"
        );
        assert_eq!(
            value["messages"][2]["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"rust\"}"
        );
        assert_eq!(value["messages"][3]["role"], "tool");
        assert_eq!(value["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(value["tools"][0]["function"]["name"], "lookup");
        assert_eq!(value["tool_choice"]["type"], "function");
        assert_eq!(value["tool_choice"]["function"]["name"], "lookup");
        assert_eq!(value["parallel_tool_calls"], false);
        assert!((value["temperature"].as_f64().unwrap_or_default() - 0.2).abs() < 1e-6);
        assert!((value["frequency_penalty"].as_f64().unwrap_or_default() - 0.5).abs() < 1e-6);
        assert!((value["presence_penalty"].as_f64().unwrap_or_default() - 0.3).abs() < 1e-6);
        assert_eq!(value["max_tokens"], 512);
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn build_request_carries_response_format_and_fallback_user_content() {
        let messages = vec![ModelMessage::User(String::new())];
        let settings = ModelSettings::default();
        let response_format = json!({
            "type": "json_schema",
            "json_schema": {"name": "verdict", "schema": {"type": "object"}, "strict": true}
        });

        let request = ModelRequest {
            messages: &messages,
            tools: &[],
            tool_choice: ModelToolChoice::None,
            settings: &settings,
            response_format: Some(&response_format),
        };

        let config = ChatCompletionsConfig::new("key", "gemini-2.0-flash");
        let value = serde_json::to_value(build_request(&request, &config)).expect("serializes");

        assert_eq!(
            value["messages"].as_array().map(|values| values.len()),
            Some(1)
        );
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], " ");
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
        assert!(value.get("parallel_tool_calls").is_none());
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "verdict");
    }

    #[test]
    fn normalize_response_extracts_text_thinking_tool_calls_and_usage() {
        let response = ChatCompletionResponse {
            choices: vec![Choice {
                message: Some(AssistantMessage {
                    content: Some("answer".to_string()),
                    tool_calls: vec![ToolCallPayload {
                        id: "call_x".to_string(),
                        type_: "function".to_string(),
                        function: ToolCallFunction {
                            name: "lookup".to_string(),
                            arguments: "{\"q\":\"rust\"}".to_string(),
                        },
                    }],
                    reasoning_content: Some("reasoning".to_string()),
                }),
            }],
            usage: Some(UsagePayload {
                prompt_tokens: Some(11),
                completion_tokens: Some(7),
                completion_tokens_details: Some(CompletionTokenDetails {
                    reasoning_tokens: Some(3),
                }),
            }),
        };

        let completion = normalize_response(response).expect("response normalizes");

        assert_eq!(completion.text.as_deref(), Some("answer"));
        assert_eq!(completion.thinking.as_deref(), Some("reasoning"));
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "lookup");
        assert_eq!(completion.tool_calls[0].id, "call_x");
        assert_eq!(
            completion.usage,
            Some(ModelUsage {
                input_tokens: 11,
                output_tokens: 10,
            })
        );
    }

    #[test]
    fn normalize_response_requires_choices() {
        let err = normalize_response(ChatCompletionResponse {
            choices: Vec::new(),
            usage: None,
        })
        .expect_err("should fail");

        match err {
            ProviderError::Response(message) => {
                assert!(message.contains("missing choices"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn normalize_response_fails_on_invalid_tool_arguments() {
        let err = normalize_response(ChatCompletionResponse {
            choices: vec![Choice {
                message: Some(AssistantMessage {
                    content: None,
                    tool_calls: vec![ToolCallPayload {
                        id: "call_x".to_string(),
                        type_: "function".to_string(),
                        function: ToolCallFunction {
                            name: "lookup".to_string(),
                            arguments: "{not json}".to_string(),
                        },
                    }],
                    reasoning_content: None,
                }),
            }],
            usage: None,
        })
        .expect_err("should fail");

        match err {
            ProviderError::Response(message) => {
                assert!(message.contains("not valid JSON"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_env_key_is_a_config_error() {
        // The variable is cleared for this process only.
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        let err = ChatCompletionsModel::from_env("gpt-4o-mini").expect_err("should fail");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn invoke_posts_bearer_auth_and_parses_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "hello there"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2}
            })))
            .mount(&server)
            .await;

        let model = ChatCompletionsModel::new(
            ChatCompletionsConfig::new("test-key", "gemini-2.0-flash")
                .with_api_base_url(format!("{}/v1", server.uri())),
        )
        .expect("model builds");

        let messages = vec![ModelMessage::User("hi".to_string())];
        let settings = ModelSettings::default();
        let completion = model
            .invoke(ModelRequest {
                messages: &messages,
                tools: &[],
                tool_choice: ModelToolChoice::None,
                settings: &settings,
                response_format: None,
            })
            .await
            .expect("invoke succeeds");

        assert_eq!(completion.text.as_deref(), Some("hello there"));
        assert_eq!(
            completion.usage,
            Some(ModelUsage {
                input_tokens: 5,
                output_tokens: 2,
            })
        );
    }

    #[tokio::test]
    async fn invoke_surfaces_provider_error_envelope() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "bad key", "type": "invalid_request_error", "code": "invalid_api_key"}
            })))
            .mount(&server)
            .await;

        let model = ChatCompletionsModel::new(
            ChatCompletionsConfig::new("bad-key", "gemini-2.0-flash")
                .with_api_base_url(format!("{}/v1", server.uri())),
        )
        .expect("model builds");

        let messages = vec![ModelMessage::User("hi".to_string())];
        let settings = ModelSettings::default();
        let err = model
            .invoke(ModelRequest {
                messages: &messages,
                tools: &[],
                tool_choice: ModelToolChoice::None,
                settings: &settings,
                response_format: None,
            })
            .await
            .expect_err("should fail");

        match err {
            ProviderError::Request(message) => {
                assert!(message.contains("invalid_api_key"));
                assert!(message.contains("bad key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
