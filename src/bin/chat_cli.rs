//! Command-line deployment: a prompt loop against the hosted agent.
//!
//! Type a question in any supported language; `quit` ends the session and
//! prints the conversation log.

use std::sync::Arc;

use anyhow::Result;
use channel_intel::agent::{HostedAgent, Role};
use channel_intel::{logging, AppConfig, Pipeline};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = AppConfig::load_default()?;
    let pipeline = Arc::new(Pipeline::from_config(&cfg)?);
    let agent = HostedAgent::from_config(&cfg, pipeline)?;
    println!("Agent ready: {}", agent.name());

    let mut conv = agent.start_conversation();
    println!("Conversation started.");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout
            .write_all(b"Enter a prompt (or type 'quit' to exit): ")
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.eq_ignore_ascii_case("quit") {
            break;
        }
        if input.is_empty() {
            println!("Please enter a prompt.");
            continue;
        }

        match agent.run_turn(&mut conv, input).await {
            Ok(Some(reply)) => println!("\nAgent: {reply}\n"),
            Ok(None) => println!("No response from the agent."),
            Err(e) => println!("Run failed: {e}"),
        }
    }

    println!("\nConversation Log:\n");
    for (role, text) in conv.transcript() {
        let who = match role {
            Role::User => "user",
            _ => "assistant",
        };
        println!("{who}: {text}\n");
    }
    Ok(())
}
