//! Structured output schemas.
//!
//! An agent may declare the shape its final answer must take. The schema
//! rides along on the model request as a `response_format` payload, and
//! the final text is parsed back into a JSON value — tolerating the code
//! fences some models wrap around JSON despite the format hint.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Value, json};

use crate::error::{RunError, SchemaError};

#[derive(Clone, Debug)]
pub struct OutputSchema {
    name: String,
    schema: Value,
}

impl OutputSchema {
    /// Declares a schema. The root must be `type: object`, mirroring the
    /// tool-parameter rules.
    pub fn new(name: impl Into<String>, schema: Value) -> Result<Self, SchemaError> {
        let root = schema.as_object().ok_or(SchemaError::SchemaNotObject)?;
        let root_type = root
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SchemaError::RootTypeMustBeObject)?;
        if root_type != "object" {
            return Err(SchemaError::RootTypeMustBeObject);
        }

        Ok(Self {
            name: name.into(),
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// The `response_format` payload for a chat-completions request.
    pub fn response_format(&self) -> Value {
        json!({
            "type": "json_schema",
            "json_schema": {
                "name": self.name,
                "schema": self.schema,
                "strict": true,
            }
        })
    }

    /// Parses the model's final text into a JSON value.
    pub fn parse(&self, text: &str) -> Result<Value, RunError> {
        let candidate = extract_json(text);
        serde_json::from_str(candidate).map_err(|err| RunError::OutputParse(err.to_string()))
    }
}

fn fence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence pattern compiles")
    })
}

/// Returns the fenced body when the text wraps JSON in a code fence,
/// otherwise the trimmed text itself.
fn extract_json(text: &str) -> &str {
    if let Some(captures) = fence_pattern().captures(text)
        && let Some(body) = captures.get(1)
    {
        return body.as_str();
    }
    text.trim()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn verdict_schema() -> OutputSchema {
        OutputSchema::new(
            "homework_check",
            json!({
                "type": "object",
                "properties": {
                    "is_math_homework": {"type": "boolean"},
                    "reasoning": {"type": "string"}
                },
                "required": ["is_math_homework", "reasoning"],
                "additionalProperties": false
            }),
        )
        .expect("schema valid")
    }

    #[test]
    fn rejects_non_object_root() {
        let err = OutputSchema::new("bad", json!({"type": "string"})).expect_err("should fail");
        assert!(matches!(err, SchemaError::RootTypeMustBeObject));
    }

    #[test]
    fn response_format_wraps_schema() {
        let format = verdict_schema().response_format();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], "homework_check");
        assert_eq!(format["json_schema"]["strict"], true);
        assert_eq!(format["json_schema"]["schema"]["type"], "object");
    }

    #[test]
    fn parses_plain_json() {
        let parsed = verdict_schema()
            .parse("{\"is_math_homework\": true, \"reasoning\": \"algebra\"}")
            .expect("parses");
        assert_eq!(parsed["is_math_homework"], true);
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"is_math_homework\": false, \"reasoning\": \"geography\"}\n```";
        let parsed = verdict_schema().parse(text).expect("parses");
        assert_eq!(parsed["reasoning"], "geography");
    }

    #[test]
    fn parse_failure_is_an_output_parse_error() {
        let err = verdict_schema()
            .parse("definitely not json")
            .expect_err("should fail");
        assert!(matches!(err, RunError::OutputParse(_)));
    }
}
