//! Model settings: sampling knobs and the tool-choice switch.
//!
//! The same model behind agents with different temperature, top_p,
//! penalty and max-token settings, plus the three tool-choice modes
//! (auto, required, none) over a calculator and a weather tool.

use std::error::Error;
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, ModelSettings, ModelToolChoice, RunContext, Runner,
    ToolError, ToolOutcome, ToolSpec,
};
use serde_json::{Value, json};

fn calculate(a: i64, b: i64, op: &str) -> ToolOutcome {
    match op {
        "add" | "plus" | "sum" | "+" => ToolOutcome::Text((a + b).to_string()),
        "subtract" | "minus" | "difference" | "-" => ToolOutcome::Text((a - b).to_string()),
        "multiply" | "times" | "product" | "*" => ToolOutcome::Text((a * b).to_string()),
        "divide" | "division" | "quotient" | "/" => {
            if b == 0 {
                ToolOutcome::Json(json!({"error": "cannot divide by zero"}))
            } else {
                ToolOutcome::Text((a as f64 / b as f64).to_string())
            }
        }
        other => ToolOutcome::Json(json!({"error": format!("Unsupported operation: {other}")})),
    }
}

fn calculator_tool() -> Result<ToolSpec, Box<dyn Error>> {
    let tool = ToolSpec::new("calculator", "Perform basic arithmetic on two integers")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"},
                "op": {"type": "string"}
            },
            "required": ["a", "b", "op"],
            "additionalProperties": false
        }))?
        .with_handler(|args, _context| async move {
            let a = args
                .get("a")
                .and_then(Value::as_i64)
                .ok_or_else(|| ToolError::Execution("a missing".to_string()))?;
            let b = args
                .get("b")
                .and_then(Value::as_i64)
                .ok_or_else(|| ToolError::Execution("b missing".to_string()))?;
            let op = args
                .get("op")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::Execution("op missing".to_string()))?
                .to_string();
            Ok(calculate(a, b, &op))
        });
    Ok(tool)
}

fn weather_tool() -> Result<ToolSpec, Box<dyn Error>> {
    let tool = ToolSpec::new("weather", "Report the weather for a city")
        .with_schema(json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"}
            },
            "required": ["city"],
            "additionalProperties": false
        }))?
        .with_handler(|args, _context| async move {
            let city = args
                .get("city")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::Execution("city missing".to_string()))?;
            Ok(ToolOutcome::Text(format!("weather of {city} is cloudy")))
        });
    Ok(tool)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("info")
        .init();

    let model: Arc<dyn ChatModel> =
        Arc::new(ChatCompletionsModel::gemini_from_env("gemini-2.0-flash")?);

    // Narrow vocabulary, discouraged repetition.
    let focused_agent = Arc::new(
        Agent::builder("focused_math_tutor")
            .instructions("you give answers in a focused and consistent way")
            .shared_model(model.clone())
            .model_settings(ModelSettings {
                top_p: Some(0.3),
                frequency_penalty: Some(0.5),
                presence_penalty: Some(0.3),
                ..ModelSettings::default()
            })
            .build()?,
    );

    let creative_agent = Arc::new(
        Agent::builder("creative_story_writer")
            .instructions("You are a creative storyteller")
            .shared_model(model.clone())
            .model_settings(ModelSettings {
                temperature: Some(0.9),
                ..ModelSettings::default()
            })
            .build()?,
    );

    let brief_agent = Arc::new(
        Agent::builder("brief_assistant")
            .shared_model(model.clone())
            .model_settings(ModelSettings {
                max_tokens: Some(100),
                ..ModelSettings::default()
            })
            .build()?,
    );

    // The "can I use tools" switch.
    let agent_required = Arc::new(
        Agent::builder("tool_user")
            .tool(calculator_tool()?)
            .tool(weather_tool()?)
            .shared_model(model.clone())
            .model_settings(ModelSettings {
                tool_choice: Some(ModelToolChoice::Required),
                ..ModelSettings::default()
            })
            .build()?,
    );

    let agent_no_tools = Arc::new(
        Agent::builder("chat_only")
            .tool(calculator_tool()?)
            .tool(weather_tool()?)
            .shared_model(model.clone())
            .model_settings(ModelSettings {
                tool_choice: Some(ModelToolChoice::None),
                max_tokens: Some(100),
                ..ModelSettings::default()
            })
            .build()?,
    );

    let runner = Runner::default();
    let context = RunContext::new();

    let focused = runner
        .run(&focused_agent, "write about wisdom", &context)
        .await?;
    println!("focused:\n{}\n", focused.final_output());

    let creative = runner
        .run(&creative_agent, "write about wisdom", &RunContext::new())
        .await?;
    println!("creative:\n{}\n", creative.final_output());

    let brief = runner
        .run(&brief_agent, "explain borrowing in Rust", &RunContext::new())
        .await?;
    println!("brief:\n{}\n", brief.final_output());

    let required = runner
        .run(
            &agent_required,
            "what is 12 multiplied by 15?",
            &RunContext::new(),
        )
        .await?;
    println!("required tools:\n{}\n", required.final_output());

    let chat_only = runner
        .run(
            &agent_no_tools,
            "what is 12 multiplied by 15?",
            &RunContext::new(),
        )
        .await?;
    println!("no tools:\n{}", chat_only.final_output());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculator_addition_is_deterministic() {
        assert_eq!(calculate(2, 3, "add"), ToolOutcome::Text("5".to_string()));
        assert_eq!(calculate(2, 3, "+"), ToolOutcome::Text("5".to_string()));
        assert_eq!(
            calculate(12, 15, "multiply"),
            ToolOutcome::Text("180".to_string())
        );
    }

    #[test]
    fn unsupported_operation_returns_structured_error_payload() {
        let ToolOutcome::Json(payload) = calculate(2, 3, "mod") else {
            panic!("expected a structured payload");
        };
        assert_eq!(payload["error"], "Unsupported operation: mod");
    }

    #[test]
    fn division_by_zero_degrades_to_structured_error() {
        let ToolOutcome::Json(payload) = calculate(2, 0, "divide") else {
            panic!("expected a structured payload");
        };
        assert_eq!(payload["error"], "cannot divide by zero");
    }

    #[tokio::test]
    async fn calculator_tool_validates_arguments() {
        let tool = calculator_tool().expect("tool builds");
        let err = tool
            .execute(json!({"a": 1, "b": 2}), &RunContext::new())
            .await
            .expect_err("missing op rejected");
        assert!(err.to_string().contains("missing required field: op"));
    }
}
