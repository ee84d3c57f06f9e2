//! Run context: a caller-supplied record travels with the run, readable
//! by tools and by dynamic instructions, and is gone once the run ends.

use std::error::Error;
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, RunContext, Runner, ToolError, ToolOutcome, ToolSpec,
};
use serde_json::json;

#[derive(Debug, Clone)]
struct UserInfo {
    name: String,
    uid: u64,
}

fn fetch_user_age_tool() -> Result<ToolSpec, Box<dyn Error>> {
    let tool = ToolSpec::new("fetch_user_age", "Fetch the current user's age")
        .with_schema(json!({
            "type": "object",
            "properties": {},
            "required": [],
            "additionalProperties": false
        }))?
        .with_handler(|_args, context| async move {
            let user = context
                .get::<UserInfo>()
                .ok_or(ToolError::MissingContext("UserInfo"))?;
            Ok(ToolOutcome::Text(format!(
                "User {} (uid {}) is 30 years old.",
                user.name, user.uid
            )))
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
        Arc::new(ChatCompletionsModel::gemini_from_env("gemini-2.5-flash")?);

    // Instructions are computed per model call from the run context, so
    // the same agent greets whoever the caller put in the context.
    let agent = Arc::new(
        Agent::builder("user_info_agent")
            .instructions_fn(|context, agent| {
                let username = context
                    .get::<UserInfo>()
                    .map(|user| user.name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                format!(
                    "You are a helpful assistant talking to {username}. \
                     Agent: {}. Use the fetch_user_age tool to answer age questions.",
                    agent.name()
                )
            })
            .tool(fetch_user_age_tool()?)
            .shared_model(model.clone())
            .build()?,
    );

    let context = RunContext::new().with_value(UserInfo {
        name: "Alice".to_string(),
        uid: 101,
    });

    let result = Runner::default()
        .run(&agent, "what is the age of the user?", &context)
        .await?;

    println!("{}", result.final_output());
    println!("usage: {}", result.usage());

    Ok(())
}
