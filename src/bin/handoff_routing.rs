//! Handoff routing: a triage agent hands the conversation to a
//! language agent based on the language of the request, and the
//! conversation continues with whichever agent answered last.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use agent_runner_rs::{
    Agent, ChatCompletionsModel, ChatModel, ModelMessage, RunContext, RunEvent, RunInput, Runner,
};
use futures_util::{StreamExt, pin_mut};

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

    let french_agent = Arc::new(
        Agent::builder("french_agent")
            .instructions("You only speak French")
            .handoff_description("A French speaking agent")
            .shared_model(model.clone())
            .build()?,
    );

    let spanish_agent = Arc::new(
        Agent::builder("spanish_agent")
            .instructions("You only speak Spanish")
            .handoff_description("A Spanish speaking agent")
            .shared_model(model.clone())
            .build()?,
    );

    let english_agent = Arc::new(
        Agent::builder("english_agent")
            .instructions("You only speak English")
            .handoff_description("An English speaking agent")
            .shared_model(model.clone())
            .build()?,
    );

    let triage_agent = Arc::new(
        Agent::builder("triage_agent")
            .instructions("Handoff to the appropriate agent based on the language of the request.")
            .shared_model(model.clone())
            .handoffs(vec![
                french_agent.clone(),
                spanish_agent.clone(),
                english_agent.clone(),
            ])
            .build()?,
    );

    let runner = Runner::default();
    let context = RunContext::new();

    let msg = read_line("Hi! We speak French, Spanish and English. How can I help? ")?;
    let mut agent = triage_agent;
    let mut inputs = vec![ModelMessage::User(msg)];

    loop {
        let stream = runner.run_stream(&agent, RunInput::Messages(inputs.clone()), &context);
        pin_mut!(stream);

        let mut completed = None;
        while let Some(event) = stream.next().await {
            match event? {
                RunEvent::Message { text, .. } => {
                    println!("{text}");
                }
                RunEvent::Handoff { from, to } => {
                    println!("[{from} -> {to}]");
                }
                RunEvent::Completed { result } => completed = Some(result),
                _ => {}
            }
        }

        let result = completed.ok_or("run ended without a result")?;
        inputs = result.to_input_list();
        agent = Arc::clone(result.last_agent());
        println!();

        let user_msg = read_line("Enter a message: ")?;
        if ["exit", "quit", "bye"].contains(&user_msg.as_str()) {
            println!("Goodbye!");
            break;
        }
        inputs.push(ModelMessage::User(user_msg));
    }

    Ok(())
}
