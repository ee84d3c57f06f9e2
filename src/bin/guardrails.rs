//! Input and output guardrails around a primary agent.
//!
//! A classifier agent flags math-homework requests before the customer
//! agent answers, and another classifier rejects answers that are not
//! Pakistan-related after the Pakistan agent responds. Tripwires surface
//! as distinguished `RunError` variants the caller matches on.

use std::error::Error;
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, GuardrailVerdict, InputGuardrail, OutputGuardrail,
    OutputSchema, RunContext, RunError, Runner,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize, Serialize)]
struct HomeworkCheck {
    is_math_homework: bool,
    reasoning: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RelevanceCheck {
    is_relevant: bool,
    reasoning: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct MessageOutput {
    response: String,
}

fn homework_check_schema() -> Result<OutputSchema, Box<dyn Error>> {
    Ok(OutputSchema::new(
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
    )?)
}

fn relevance_check_schema() -> Result<OutputSchema, Box<dyn Error>> {
    Ok(OutputSchema::new(
        "relevance_check",
        json!({
            "type": "object",
            "properties": {
                "is_relevant": {"type": "boolean"},
                "reasoning": {"type": "string"}
            },
            "required": ["is_relevant", "reasoning"],
            "additionalProperties": false
        }),
    )?)
}

fn message_output_schema() -> Result<OutputSchema, Box<dyn Error>> {
    Ok(OutputSchema::new(
        "message_output",
        json!({
            "type": "object",
            "properties": {
                "response": {"type": "string"}
            },
            "required": ["response"],
            "additionalProperties": false
        }),
    )?)
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

    let police = Arc::new(
        Agent::builder("police")
            .instructions("check if the user is asking for math homework")
            .shared_model(model.clone())
            .output_schema(homework_check_schema()?)
            .build()?,
    );

    let guard = Arc::new(
        Agent::builder("guard")
            .instructions("check if the text is about a Pakistan related query")
            .shared_model(model.clone())
            .output_schema(relevance_check_schema()?)
            .build()?,
    );

    let math_guardrail = InputGuardrail::new("math_homework", {
        let police = Arc::clone(&police);
        move |context, input| {
            let police = Arc::clone(&police);
            async move {
                let result = Runner::default().run(&police, input, &context).await?;
                let check: HomeworkCheck = result.final_output_as()?;
                Ok(GuardrailVerdict::new(
                    serde_json::to_value(&check).unwrap_or_default(),
                    check.is_math_homework,
                ))
            }
        }
    });

    let pakistan_guardrail = OutputGuardrail::new("pakistan_relevance", {
        let guard = Arc::clone(&guard);
        move |context, output| {
            let guard = Arc::clone(&guard);
            async move {
                let message: MessageOutput = serde_json::from_str(&output)
                    .map_err(|err| RunError::OutputParse(err.to_string()))?;
                let result = Runner::default()
                    .run(&guard, message.response, &context)
                    .await?;
                let check: RelevanceCheck = result.final_output_as()?;
                Ok(GuardrailVerdict::new(
                    serde_json::to_value(&check).unwrap_or_default(),
                    !check.is_relevant,
                ))
            }
        }
    });

    let customer_agent = Arc::new(
        Agent::builder("customer_support_agent")
            .instructions("you are a customer support agent, you help customers with their queries")
            .shared_model(model.clone())
            .input_guardrail(math_guardrail)
            .build()?,
    );

    let pakistan_agent = Arc::new(
        Agent::builder("pakistan_agent")
            .instructions("you are a Pakistan agent, you answer Pakistan related queries")
            .shared_model(model.clone())
            .output_schema(message_output_schema()?)
            .output_guardrail(pakistan_guardrail)
            .build()?,
    );

    let runner = Runner::default();

    match runner
        .run(
            &customer_agent,
            "Can you solve 2x + 5 = 11 for my homework?",
            &RunContext::new(),
        )
        .await
    {
        Ok(_) => println!("Guardrail didn't trip - this is unexpected"),
        Err(RunError::InputGuardrailTripped { .. }) => {
            println!("Math homework guardrail tripped");
        }
        Err(err) => return Err(err.into()),
    }

    match runner
        .run(
            &pakistan_agent,
            "Hello, who is the prime minister of India?",
            &RunContext::new(),
        )
        .await
    {
        Ok(_) => println!("Guardrail didn't trip - this is unexpected"),
        Err(RunError::OutputGuardrailTripped { .. }) => {
            println!("Query is not relevant to Pakistan (output guardrail tripped)");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
