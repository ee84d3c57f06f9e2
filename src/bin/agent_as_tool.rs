//! Agents as tools: a frontline orchestrator receives the user message
//! and picks which translation agents to call, as tools, then a
//! synthesizer inspects the collected translations and produces the
//! final response.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, RunContext, RunItem, Runner,
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
        Arc::new(ChatCompletionsModel::gemini_from_env("gemini-2.0-flash")?);

    let spanish_agent = Arc::new(
        Agent::builder("spanish_agent")
            .instructions("You translate the user's message to Spanish")
            .handoff_description("An english to spanish translator")
            .shared_model(model.clone())
            .build()?,
    );

    let french_agent = Arc::new(
        Agent::builder("french_agent")
            .instructions("You translate the user's message to French")
            .handoff_description("An english to french translator")
            .shared_model(model.clone())
            .build()?,
    );

    let italian_agent = Arc::new(
        Agent::builder("italian_agent")
            .instructions("You translate the user's message to Italian")
            .handoff_description("An english to italian translator")
            .shared_model(model.clone())
            .build()?,
    );

    let orchestrator_agent = Arc::new(
        Agent::builder("orchestrator_agent")
            .instructions(
                "You are a translation agent. You use the tools given to you to translate. \
                 If asked for multiple translations, you call the relevant tools in order. \
                 You never translate on your own, you always use the provided tools.",
            )
            .shared_model(model.clone())
            .tool(spanish_agent.as_tool(
                "translate_to_spanish",
                "Translate the user's message to Spanish",
            ))
            .tool(french_agent.as_tool(
                "translate_to_french",
                "Translate the user's message to French",
            ))
            .tool(italian_agent.as_tool(
                "translate_to_italian",
                "Translate the user's message to Italian",
            ))
            .build()?,
    );

    let synthesizer_agent = Arc::new(
        Agent::builder("synthesizer_agent")
            .instructions(
                "You inspect translations, correct them if needed, and produce a final \
                 concatenated response.",
            )
            .shared_model(model.clone())
            .build()?,
    );

    let msg = read_line("Hi! What would you like translated, and to which languages? ")?;

    let runner = Runner::default();
    let context = RunContext::new();

    let orchestrator_result = runner.run(&orchestrator_agent, msg, &context).await?;

    let mut translations = Vec::new();
    for item in orchestrator_result.new_items() {
        if let RunItem::ToolOutput {
            output,
            is_error: false,
            ..
        } = item
        {
            println!("  - Translation step: {output}");
            translations.push(output.clone());
        }
    }

    let synthesizer_result = runner
        .run(&synthesizer_agent, translations.join("\n"), &context)
        .await?;

    println!("\n\nFinal response:\n{}", synthesizer_result.final_output());

    Ok(())
}
