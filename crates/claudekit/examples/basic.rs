//! Basic usage: a single completion and a short multi-turn conversation.
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-... cargo run --example basic
//! ```

use claudekit::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("claudekit=info"))
        .init();

    let client = Client::from_config(
        ClientConfig::from_env().with_model("claude-3-sonnet-20240229"),
    )?;

    // ── Simple completion ──────────────────────────────────────────
    let request = client
        .request(vec![Message::user("What is the capital of France?")])
        .with_temperature(0.0);
    let response = client.complete(request).await?;
    println!("{}", response.content);
    println!("Tokens: {}", response.usage.total_tokens());

    // ── Multi-turn conversation ────────────────────────────────────
    let mut conv = Conversation::new().with_system("You are a helpful assistant.");
    conv.add_user("What is 2 + 2?");

    let response = client.complete_conversation(&conv, None).await?;
    conv.add_assistant(response.content.clone());
    println!("{}", response.content);

    // Try a follow-up, then undo it.
    conv.save();
    conv.add_user("Multiply that by 10.");
    let response = client.complete_conversation(&conv, None).await?;
    conv.add_assistant(response.content.clone());
    println!("{}", response.content);
    println!("Conversation length: {}", conv.len());

    conv.rollback();
    println!("After rollback: {}", conv.len());
    Ok(())
}
