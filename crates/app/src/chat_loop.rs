//! Interactive chat: a terminal turn loop over the persistent transcript.

use anyhow::Result;
use std::io::{BufRead, Write};

use services::chat::{self, ChatMessage, ChatStore};
use services::config as config_builder;
use services::history::HistoryStore;
use shared::commands::CMD_CHAT;
use shared::config::Invocation;
use shared::models::CustomPricing;
use shared::settings::Preferences;

use crate::controller;

/// Run a single chat turn: fold the windowed transcript into the outbound
/// query, stream the reply, persist both sides.
pub async fn chat_turn(
    prefs: &Preferences,
    store: &ChatStore,
    history: &HistoryStore,
    custom: CustomPricing,
    message: &str,
) -> Result<()> {
    let invocation = Invocation {
        query: Some(message.to_string()),
        fallback_text: None,
        attachment_file: None,
    };
    let mut config = config_builder::build(CMD_CHAT, &invocation, prefs)?;
    config_builder::apply_command_overrides(&mut config);

    let window = config.chat.map(|c| c.history_window).unwrap_or(10);
    let transcript = store.load();
    config.request.query = chat::build_turn(&transcript, window, message);

    let outcome = controller::run(&config, custom, Some(history)).await?;
    if let Some(error) = &outcome.error {
        eprintln!("\nError: {}", error);
        return Ok(());
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    store.append(ChatMessage::new("user", message, now_ms))?;
    store.append(ChatMessage::new("assistant", &outcome.response, now_ms))?;
    eprintln!("\n{}", outcome.stats_line);
    Ok(())
}

/// The REPL: read a line, run a turn, repeat. Empty line or /quit ends it.
pub async fn run_interactive(
    prefs: &Preferences,
    store: &ChatStore,
    history: &HistoryStore,
    custom: CustomPricing,
) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    eprintln!("Chat started. Empty line or /quit to leave, /clear to reset.");
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let Some(line) = lines.next() else { break };
        let line = line?;
        let message = line.trim();

        match message {
            "" | "/quit" | "/exit" => break,
            "/clear" => {
                store.clear()?;
                eprintln!("Transcript cleared.");
                continue;
            }
            _ => {}
        }
        chat_turn(prefs, store, history, custom, message).await?;
    }
    Ok(())
}
