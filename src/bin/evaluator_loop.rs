//! LLM-as-a-judge: a generator drafts a story outline, an evaluator
//! scores it, and the draft is regenerated with the evaluator's
//! feedback until it passes. The attempt ceiling is stated explicitly
//! through `ReviewPolicy` instead of being left to the evaluator's
//! judgment.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, ReviewFeedback, ReviewPolicy, RunContext, Runner,
    run_review_loop,
};

fn read_line(prompt: &str) -> Result<String, Box<dyn Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
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

    let story_outline_generator = Arc::new(
        Agent::builder("story_outline_generator")
            .instructions(
                "you generate a very short story outline based on the user's input; \
                 if there is any feedback provided, use it to improve the outline",
            )
            .shared_model(model.clone())
            .build()?,
    );

    let evaluator = Arc::new(
        Agent::builder("evaluator")
            .instructions(
                "you evaluate a story outline and decide if it is good enough; \
                 if it is not good enough you provide feedback on what needs to be improved; \
                 never give it a pass on its first try, and do not go for perfection",
            )
            .shared_model(model.clone())
            .output_schema(ReviewFeedback::output_schema())
            .build()?,
    );

    let msg = read_line("What kind of story would you like to hear? ")?;

    let outcome = run_review_loop(
        &Runner::default(),
        &story_outline_generator,
        &evaluator,
        msg,
        &RunContext::new(),
        ReviewPolicy {
            max_attempts: Some(5),
        },
    )
    .await?;

    println!(
        "Evaluator verdict after {} attempt(s): {:?}",
        outcome.attempts, outcome.verdict
    );
    println!("Final story outline: {}", outcome.draft);

    Ok(())
}
