//! Interactive chat against a running backend.
//!
//! Reads one message per line from stdin and prints the assistant reply as it
//! streams in. Requires `TRIPMATE_BACKEND_URL` and `TRIPMATE_ACCESS_TOKEN`;
//! `TRIPMATE_PUBLISHABLE_KEY` is sent when set.
//!
//! Run with: `RUST_LOG=tripmate_stream=debug cargo run --example chat -p tripmate-stream`

use std::io::{BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tripmate_auth::EnvCredentialProvider;
use tripmate_stream::{
    CancellationToken, Callbacks, ChatStreamClient, ChatStreamConfig, Conversation,
    ConversationError, InMemoryTurnStore, TurnOutcome,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = ChatStreamConfig::from_env()?;
    let client = ChatStreamClient::new(config, Arc::new(EnvCredentialProvider::default()));
    let store = Arc::new(InMemoryTurnStore::new());
    let mut conversation = Conversation::new(uuid::Uuid::new_v4().to_string(), client, store.clone());

    println!("conversation {}", conversation.id());
    print!("> ");
    std::io::stdout().flush()?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            print!("> ");
            std::io::stdout().flush()?;
            continue;
        }

        let mut observer = Callbacks::new(
            |text: &str| {
                print!("{text}");
                let _ = std::io::stdout().flush();
            },
            || println!(),
            |error| eprintln!("\nerror: {error}"),
        );

        match conversation
            .send(line, &mut observer, CancellationToken::new())
            .await
        {
            Ok(TurnOutcome::Replied { persisted: false, .. }) => {
                eprintln!("(reply not saved)");
            }
            Ok(_) => {}
            Err(ConversationError::Cooldown { retry_in }) => {
                eprintln!("slow down, retry in {:.1}s", retry_in.as_secs_f32());
            }
            Err(e) => eprintln!("not sent: {e}"),
        }

        print!("> ");
        std::io::stdout().flush()?;
    }

    let saved = store.messages(conversation.id()).await;
    println!("\n{} messages saved", saved.len());
    Ok(())
}
