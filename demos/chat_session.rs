//! # Chat Session Demo
//!
//! Runs one paid tutoring turn against the OpenAI API, printing the
//! balance before and after and the date of the next weekly reset.
//!
//! # Usage
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --example chat_session
//! RUST_LOG=info OPENAI_API_KEY=sk-... cargo run --example chat_session
//! ```

use std::sync::Arc;

use tutorledger::builder::ChatServiceBuilder;
use tutorledger::chat::Instruction;
use tutorledger::client::{OpenAiCompletionClient, RetryingCompletionClient};
use tutorledger::types::ChatMessage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging; set RUST_LOG=debug|info|warn
    tracing_subscriber::fmt::init();

    println!("=== tutorledger Chat Session Demo ===\n");

    // Build the completion client (reads OPENAI_API_KEY from environment)
    let client = OpenAiCompletionClient::new().map_err(anyhow::Error::msg)?;
    let client = Arc::new(RetryingCompletionClient::new(Arc::new(client), 3));

    let service = ChatServiceBuilder::new()
        .sqlite("tutor.db")?
        .client(client)
        .build()?;

    let user_id = 1;
    let balance = service.ledger().get_balance(user_id).await?;
    println!("balance before: {balance:.4} credits");

    let history = [ChatMessage::user(
        "If x^2 - 5x + 6 = 0, what are the possible values of x?",
    )];
    let turn = service.send(user_id, Instruction::SimpleExplain, &history).await?;

    println!("\n{}\n", turn.content);
    println!(
        "tokens: {} prompt / {} completion ({} cached)",
        turn.usage.prompt_tokens, turn.usage.completion_tokens, turn.usage.cached_tokens
    );
    println!("cost: ${:.6}", turn.cost);
    println!("balance after: {:.4} credits", turn.balance);
    println!("next reset: {}", service.ledger().next_reset_time());

    Ok(())
}
