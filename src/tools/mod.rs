use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{SchemaError, ToolError};

/// What a tool handler produced. JSON outcomes are serialized into the
/// tool-result message so the model sees a structured payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Text(String),
    Json(Value),
}

impl ToolOutcome {
    pub fn into_result_text(self) -> String {
        match self {
            ToolOutcome::Text(text) => text,
            ToolOutcome::Json(value) => value.to_string(),
        }
    }
}

type ToolHandler =
    dyn Fn(Value, RunContext) -> BoxFuture<'static, Result<ToolOutcome, ToolError>> + Send + Sync;

/// A caller-supplied function exposed to the model for structured
/// invocation: name, description, JSON schema and async handler.
#[derive(Clone)]
pub struct ToolSpec {
    name: String,
    description: String,
    json_schema: Value,
    handler: Arc<ToolHandler>,
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("json_schema", &self.json_schema)
            .finish()
    }
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            json_schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": true,
            }),
            handler: Arc::new(|_args, _context| {
                Box::pin(async {
                    Err(ToolError::Execution(
                        "tool handler not configured".to_string(),
                    ))
                })
            }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Result<Self, SchemaError> {
        validate_schema(&schema)?;
        self.json_schema = schema;
        Ok(self)
    }

    /// For schemas the crate itself constructs and therefore knows to be
    /// valid object schemas.
    pub(crate) fn with_object_schema(mut self, schema: Value) -> Self {
        debug_assert!(validate_schema(&schema).is_ok());
        self.json_schema = schema;
        self
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutcome, ToolError>> + Send + 'static,
    {
        self.handler = Arc::new(move |args, context| Box::pin(handler(args, context)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn json_schema(&self) -> &Value {
        &self.json_schema
    }

    /// Validates `args` against the schema, then runs the handler with a
    /// handle on the run's context.
    pub async fn execute(
        &self,
        args: Value,
        context: &RunContext,
    ) -> Result<ToolOutcome, ToolError> {
        validate_arguments(self.name(), &self.json_schema, &args)?;
        (self.handler)(args, context.clone()).await
    }
}

fn validate_schema(schema: &Value) -> Result<(), SchemaError> {
    let schema_obj = schema.as_object().ok_or(SchemaError::SchemaNotObject)?;

    let root_type = schema_obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(SchemaError::RootTypeMustBeObject)?;

    if root_type != "object" {
        return Err(SchemaError::RootTypeMustBeObject);
    }

    if let Some(required) = schema_obj.get("required") {
        let required_arr = required.as_array().ok_or(SchemaError::InvalidRequired)?;
        for item in required_arr {
            if !item.is_string() {
                return Err(SchemaError::InvalidRequired);
            }
        }
    }

    Ok(())
}

fn validate_arguments(tool_name: &str, schema: &Value, args: &Value) -> Result<(), ToolError> {
    let args_obj = args
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool_name.to_string(),
            message: "arguments must be a JSON object".to_string(),
        })?;

    let schema_obj = schema
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool_name.to_string(),
            message: "tool schema must be a JSON object".to_string(),
        })?;

    if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
        for field in required {
            let Some(field_name) = field.as_str() else {
                continue;
            };
            if !args_obj.contains_key(field_name) {
                return Err(ToolError::InvalidArguments {
                    tool: tool_name.to_string(),
                    message: format!("missing required field: {field_name}"),
                });
            }
        }
    }

    let properties = schema_obj
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if schema_obj
        .get("additionalProperties")
        .and_then(Value::as_bool)
        == Some(false)
    {
        for key in args_obj.keys() {
            if !properties.contains_key(key) {
                return Err(ToolError::InvalidArguments {
                    tool: tool_name.to_string(),
                    message: format!("unknown field: {key}"),
                });
            }
        }
    }

    for (key, value) in args_obj {
        if let Some(field_schema) = properties.get(key)
            && let Some(type_name) = field_schema.get("type").and_then(Value::as_str)
            && !value_matches_type(value, type_name)
        {
            return Err(ToolError::InvalidArguments {
                tool: tool_name.to_string(),
                message: format!("field '{key}' must be of type {type_name}"),
            });
        }
    }

    Ok(())
}

fn value_matches_type(value: &Value, type_name: &str) -> bool {
    match type_name {
        "string" => value.is_string(),
        "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
        "number" => value.as_f64().is_some(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn schema_validation_rejects_non_object_root() {
        let result = ToolSpec::new("bad", "bad").with_schema(json!({"type": "string"}));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handler_reads_run_context_values() {
        let context = RunContext::new().with_value(41_u32);

        let tool = ToolSpec::new("read_value", "read a context value")
            .with_schema(json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }))
            .expect("schema should be valid")
            .with_handler(|_args, context| async move {
                let value = context
                    .get::<u32>()
                    .ok_or(ToolError::MissingContext("u32"))?;
                Ok(ToolOutcome::Text(value.to_string()))
            });

        let outcome = tool.execute(json!({}), &context).await.expect("executes");
        assert_eq!(outcome, ToolOutcome::Text("41".to_string()));
    }

    #[tokio::test]
    async fn argument_validation_reports_missing_required() {
        let tool = ToolSpec::new("req", "required")
            .with_schema(json!({
                "type": "object",
                "properties": {"value": {"type": "string"}},
                "required": ["value"],
                "additionalProperties": false
            }))
            .expect("schema valid")
            .with_handler(|_args, _context| async move { Ok(ToolOutcome::Text("ok".into())) });

        let err = tool
            .execute(json!({}), &RunContext::new())
            .await
            .expect_err("should fail");

        let message = err.to_string();
        assert!(message.contains("missing required field"));
    }

    #[tokio::test]
    async fn argument_validation_rejects_unknown_fields_and_bad_types() {
        let tool = ToolSpec::new("calc", "calculate")
            .with_schema(json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}},
                "required": ["a"],
                "additionalProperties": false
            }))
            .expect("schema valid")
            .with_handler(|_args, _context| async move { Ok(ToolOutcome::Text("ok".into())) });

        let unknown = tool
            .execute(json!({"a": 1, "b": 2}), &RunContext::new())
            .await
            .expect_err("unknown field rejected");
        assert!(unknown.to_string().contains("unknown field"));

        let bad_type = tool
            .execute(json!({"a": "one"}), &RunContext::new())
            .await
            .expect_err("type mismatch rejected");
        assert!(bad_type.to_string().contains("must be of type integer"));
    }

    #[tokio::test]
    async fn json_outcome_serializes_into_result_text() {
        let outcome = ToolOutcome::Json(json!({"error": "Unsupported operation: mod"}));
        assert_eq!(
            outcome.into_result_text(),
            "{\"error\":\"Unsupported operation: mod\"}"
        );
    }
}
