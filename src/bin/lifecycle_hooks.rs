//! Lifecycle hooks: counting callbacks print when the agent starts and
//! ends, with the usage accumulated on the run context.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use agent_runner_rs::{
    Agent, AgentHooks, ChatCompletionsModel, ChatModel, RunContext, Runner,
};
use async_trait::async_trait;

struct CountingHooks {
    display_name: String,
    event_counter: AtomicU32,
}

impl CountingHooks {
    fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            event_counter: AtomicU32::new(0),
        }
    }

    fn next_event(&self) -> u32 {
        self.event_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl AgentHooks for CountingHooks {
    async fn on_start(&self, context: &RunContext, agent: &Agent) {
        println!(
            "### {} {}: Agent {} started. Usage: {}",
            self.display_name,
            self.next_event(),
            agent.name(),
            context.usage()
        );
    }

    async fn on_end(&self, context: &RunContext, agent: &Agent, output: &str) {
        println!(
            "### {} {}: Agent {} ended. Usage: {}, Output: {output}",
            self.display_name,
            self.next_event(),
            agent.name(),
            context.usage()
        );
    }
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

    let start_agent = Arc::new(
        Agent::builder("content_moderator_agent")
            .instructions(
                "You are a content moderation agent. Watch social media content received and \
                 flag queries that need help or answer. We will answer anything about AI.",
            )
            .hooks(CountingHooks::new("content_moderator"))
            .shared_model(model.clone())
            .build()?,
    );

    let result = Runner::default()
        .run(
            &start_agent,
            "Will Agentic AI die at the end of 2025?",
            &RunContext::new(),
        )
        .await?;

    println!("{}", result.final_output());
    println!("--end--");

    Ok(())
}
