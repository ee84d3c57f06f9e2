//! Streamed run: events are printed as the run produces them, inside a
//! tracing span covering the whole conversation turn.

use std::error::Error;
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, RunContext, RunEvent, Runner,
};
use futures_util::{StreamExt, pin_mut};
use tracing::Instrument;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter("info")
        .init();

    let model: Arc<dyn ChatModel> =
        Arc::new(ChatCompletionsModel::gemini_from_env("gemini-2.0-flash")?);

    let assistant_agent = Arc::new(
        Agent::builder("assistant_agent")
            .instructions("You are a helpful assistant.")
            .shared_model(model.clone())
            .build()?,
    );

    let runner = Runner::default();
    let context = RunContext::new();

    async {
        let stream = runner.run_stream(
            &assistant_agent,
            "Hello, can you tell me a fun fact?",
            &context,
        );
        pin_mut!(stream);

        while let Some(event) = stream.next().await {
            match event? {
                RunEvent::Thinking { text, .. } => println!("thinking: {text}"),
                RunEvent::Message { text, .. } => println!("{text}"),
                RunEvent::Completed { result } => {
                    println!("\nusage: {}", result.usage());
                }
                _ => {}
            }
        }

        Ok::<(), Box<dyn Error>>(())
    }
    .instrument(tracing::info_span!("assistant_turn"))
    .await?;

    Ok(())
}
