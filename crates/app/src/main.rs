//! PromptDock CLI: one subcommand per action, streaming responses to
//! stdout, with local history and usage stats.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use providers::ProviderAdapter;
use services::chat::ChatStore;
use services::config as config_builder;
use services::history::HistoryStore;
use services::screenshot;
use shared::commands::{self, *};
use shared::config::Invocation;
use shared::settings::{self, Preferences};

mod chat_loop;
mod controller;
mod report;

#[derive(Parser)]
#[command(name = "promptdock", version, about = "Launcher-style AI command deck")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Ask any question, optionally with a file attachment
    Ask {
        query: Vec<String>,
        /// Attach a file (image, document) to the question
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Translate between your primary and secondary languages
    Translate { query: Vec<String> },
    /// Summarize text concisely
    Summarize { query: Vec<String> },
    /// Explain a word, sentence, or concept
    Explain { query: Vec<String> },
    /// Fix grammar, spelling, and punctuation
    Grammar { query: Vec<String> },
    /// Rephrase with different wording
    Rephrase { query: Vec<String> },
    /// Make text shorter
    Shorter { query: Vec<String> },
    /// Expand text with details
    Longer { query: Vec<String> },
    /// Rewrite in a professional tone
    Professional { query: Vec<String> },
    /// Rewrite in a warmer tone
    Friendly { query: Vec<String> },
    /// Create or improve an LLM prompt
    PromptBuilder { query: Vec<String> },
    /// Chat with context memory; no message starts an interactive session
    Chat {
        message: Vec<String>,
        /// Wipe the stored transcript and exit
        #[arg(long)]
        clear: bool,
    },
    /// Screenshot a region and analyze it
    ScreenshotExplain { query: Vec<String> },
    /// Screenshot a region and convert its text to Markdown
    ScreenshotMarkdown { query: Vec<String> },
    /// Screenshot a region and translate its text
    ScreenshotTranslate { query: Vec<String> },
    /// Count tokens in text or a file
    CountTokens {
        text: Vec<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show past requests
    History {
        /// Delete the entry with this timestamp (ms)
        #[arg(long)]
        delete: Option<i64>,
        /// Delete all entries
        #[arg(long)]
        clear: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Usage statistics and costs
    Stats,
}

fn join_words(words: &[String]) -> Option<String> {
    let joined = words.join(" ");
    let trimmed = joined.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Piped stdin plays the role the host's "selected text" played: implicit
/// input for commands that accept it.
fn read_piped_input() -> Option<String> {
    use std::io::{IsTerminal, Read};
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return None;
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer).ok()?;
    let trimmed = buffer.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

async fn run_action(
    action_id: &str,
    query: Vec<String>,
    attachment: Option<PathBuf>,
    prefs: &Preferences,
) -> Result<()> {
    let invocation = Invocation {
        query: join_words(&query),
        fallback_text: None,
        attachment_file: attachment,
    };
    let mut config = config_builder::build(action_id, &invocation, prefs)?;
    config_builder::apply_command_overrides(&mut config);

    // Combine explicit argument and piped input the way the host combined
    // typed input with selected text.
    let piped = if config.ui.use_selected_text {
        read_piped_input()
    } else {
        None
    };
    config.request.query = match (join_words(&query), piped) {
        (Some(typed), Some(piped)) => format!("{}\n\n{}", typed, piped),
        (Some(typed), None) => typed,
        (None, Some(piped)) => piped,
        (None, None) if config.request.attachment_path.is_some() => String::new(),
        (None, None) => {
            let placeholder = commands::get(action_id)
                .map(|c| c.placeholder)
                .unwrap_or("enter some text");
            return Err(anyhow!("nothing to process ({})", placeholder));
        }
    };

    let history = HistoryStore::open_default()?;
    let custom = config_builder::custom_pricing(prefs);
    let outcome = controller::run(&config, custom, Some(&history)).await?;

    if let Some(error) = outcome.error {
        if !outcome.response.is_empty() {
            eprintln!();
        }
        return Err(anyhow!("request failed: {}", error));
    }
    eprintln!("\n{}", outcome.stats_line);
    Ok(())
}

/// Capture a screenshot, then run the matching analysis action with the
/// image as attachment.
async fn run_screenshot_action(
    action_id: &str,
    query: Vec<String>,
    prefs: &Preferences,
) -> Result<()> {
    let path = screenshot::capture_interactive().await?;
    run_action(action_id, query, Some(path), prefs).await
}

async fn run_count_tokens(
    text: Vec<String>,
    file: Option<PathBuf>,
    prefs: &Preferences,
) -> Result<()> {
    let query = join_words(&text).or_else(read_piped_input).unwrap_or_default();
    let invocation = Invocation {
        query: Some(query.clone()),
        fallback_text: None,
        attachment_file: file.clone(),
    };
    let config = config_builder::build(CMD_COUNT_TOKENS, &invocation, prefs)?;
    let adapter = providers::create_adapter(&config)?;

    let count = match &file {
        Some(path) => match std::fs::read_to_string(path) {
            // Text files are counted as plain content, no upload needed.
            Ok(contents) => {
                let combined = if query.is_empty() {
                    contents
                } else {
                    format!("{}\n\n--- File Content ---\n{}", query, contents)
                };
                adapter.count_tokens(&config, &combined, None).await?
            }
            // Binary files (images) go through the attachment channel.
            Err(_) => {
                let attachment = adapter.prepare_attachment(Some(path.as_path())).await?;
                adapter
                    .count_tokens(&config, &query, attachment.as_ref())
                    .await?
            }
        },
        None => {
            if query.is_empty() {
                return Err(anyhow!("nothing to count; pass text or --file"));
            }
            adapter.count_tokens(&config, &query, None).await?
        }
    };

    println!("Token count: {}", count);
    println!("Model: {}", config.model.display_name);
    println!("Provider: {}", config.provider.as_str());
    Ok(())
}

async fn run_chat(message: Vec<String>, clear: bool, prefs: &Preferences) -> Result<()> {
    let store = ChatStore::open_default()?;
    if clear {
        store.clear()?;
        eprintln!("Transcript cleared.");
        return Ok(());
    }

    let history = HistoryStore::open_default()?;
    let custom = config_builder::custom_pricing(prefs);
    match join_words(&message) {
        Some(message) => chat_loop::chat_turn(prefs, &store, &history, custom, &message).await,
        None => chat_loop::run_interactive(prefs, &store, &history, custom).await,
    }
}

fn run_history(delete: Option<i64>, clear: bool, limit: usize, prefs: &Preferences) -> Result<()> {
    let store = HistoryStore::open_default()?;
    if clear {
        store.clear()?;
        eprintln!("History cleared.");
        return Ok(());
    }
    if let Some(timestamp_ms) = delete {
        store.remove(timestamp_ms)?;
        eprintln!("Entry removed.");
        return Ok(());
    }
    let custom = config_builder::custom_pricing(prefs);
    print!("{}", report::render_history(&store.load(), limit, custom));
    Ok(())
}

fn run_stats(prefs: &Preferences) -> Result<()> {
    let store = HistoryStore::open_default()?;
    let custom = config_builder::custom_pricing(prefs);
    print!("{}", report::render_stats(&store.load(), custom));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // First run: materialize the settings file so users have something to
    // put their keys into.
    if let Some(path) = settings::settings_path() {
        if !path.exists() {
            settings::save(&Preferences::default());
            eprintln!("Created {}; add your API keys there.", path.display());
        }
    }
    let prefs = settings::load_or_default();

    let cli = Cli::parse();
    match cli.command {
        CliCommand::Ask { query, file } => run_action(CMD_ASK, query, file, &prefs).await,
        CliCommand::Translate { query } => run_action(CMD_TRANSLATE, query, None, &prefs).await,
        CliCommand::Summarize { query } => run_action(CMD_SUMMARIZE, query, None, &prefs).await,
        CliCommand::Explain { query } => run_action(CMD_EXPLAIN, query, None, &prefs).await,
        CliCommand::Grammar { query } => run_action(CMD_GRAMMAR, query, None, &prefs).await,
        CliCommand::Rephrase { query } => run_action(CMD_REPHRASE, query, None, &prefs).await,
        CliCommand::Shorter { query } => run_action(CMD_SHORTER, query, None, &prefs).await,
        CliCommand::Longer { query } => run_action(CMD_LONGER, query, None, &prefs).await,
        CliCommand::Professional { query } => {
            run_action(CMD_PROFESSIONAL, query, None, &prefs).await
        }
        CliCommand::Friendly { query } => run_action(CMD_FRIENDLY, query, None, &prefs).await,
        CliCommand::PromptBuilder { query } => {
            run_action(CMD_PROMPT_BUILDER, query, None, &prefs).await
        }
        CliCommand::Chat { message, clear } => run_chat(message, clear, &prefs).await,
        CliCommand::ScreenshotExplain { query } => {
            run_screenshot_action(CMD_SCR_EXPLAIN, query, &prefs).await
        }
        CliCommand::ScreenshotMarkdown { query } => {
            run_screenshot_action(CMD_SCR_MARKDOWN, query, &prefs).await
        }
        CliCommand::ScreenshotTranslate { query } => {
            run_screenshot_action(CMD_SCR_TRANSLATE, query, &prefs).await
        }
        CliCommand::CountTokens { text, file } => run_count_tokens(text, file, &prefs).await,
        CliCommand::History { delete, clear, limit } => run_history(delete, clear, limit, &prefs),
        CliCommand::Stats => run_stats(&prefs),
    }
}
