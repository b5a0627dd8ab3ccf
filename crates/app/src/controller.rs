//! Streaming response controller.
//!
//! Drives one provider request from config to finalized history record:
//! `Idle -> Sending -> Streaming -> {Finalized | Failed}`. Text is printed
//! as it arrives; latency, usage, cost, and the stats footer are settled on
//! completion. Errors preserve any partial output and still produce a
//! best-effort history entry. No retries; re-running the command is the
//! only recovery path.

use anyhow::Result;
use std::io::Write;
use std::time::Instant;
use tokio::sync::mpsc;

use providers::{create_adapter, ProviderAdapter};
use services::history::HistoryStore;
use shared::config::RequestConfig;
use shared::models::{self, CustomPricing};
use shared::stats::{render_stats_line, HistoryItem, RequestStats};
use shared::stream::StreamChunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Sending,
    Streaming,
    Finalized,
    Failed,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub response: String,
    pub stats: RequestStats,
    pub cost: f64,
    pub stats_line: String,
    /// Display name of the vision sibling when the adapter substituted one.
    pub substituted_model: Option<String>,
    /// Set when the request failed; partial response text is still present.
    pub error: Option<String>,
}

/// Execute one request described by `config`, echoing response text to
/// stdout as it streams. When `history` is given, the completed (or failed)
/// request is appended to it.
pub async fn run(
    config: &RequestConfig,
    custom: CustomPricing,
    history: Option<&HistoryStore>,
) -> Result<RunOutcome> {
    let adapter = create_adapter(config)?;
    let mut phase = Phase::Sending;
    tracing::debug!(
        ?phase,
        action = %config.request.action_id,
        model = %config.model.model_id,
        "sending request"
    );

    let start = Instant::now();

    // Attachment failures degrade to "no attachment" rather than aborting.
    let attachment = match adapter
        .prepare_attachment(config.request.attachment_path.as_deref())
        .await
    {
        Ok(attachment) => attachment,
        Err(e) => {
            tracing::warn!("attachment processing failed, continuing without it: {}", e);
            None
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<StreamChunk>();
    let query = config.request.query.clone();
    let send = adapter.send_request(config, &query, attachment.as_ref(), tx);

    let drain = async {
        let mut response = String::new();
        let mut first_response: Option<f64> = None;
        let mut switched: Option<String> = None;
        let mut stream_error: Option<String> = None;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::Text(text) => {
                    if first_response.is_none() && !text.is_empty() {
                        first_response = Some(start.elapsed().as_secs_f64());
                    }
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                    response.push_str(&text);
                }
                StreamChunk::ModelSwitched { display_name, .. } => {
                    eprintln!("[model switched to {} for image input]", display_name);
                    switched = Some(display_name);
                }
                StreamChunk::Done { .. } => {}
                StreamChunk::Error(message) => stream_error = Some(message),
            }
        }
        (response, first_response, switched, stream_error)
    };

    phase = Phase::Streaming;
    tracing::trace!(?phase, "draining response stream");
    let (send_result, (response, first_response, switched, stream_error)) =
        tokio::join!(send, drain);
    if !response.is_empty() {
        println!();
    }

    let (outcome, error) = match send_result {
        Ok(outcome) => (outcome, stream_error),
        Err(e) => (Default::default(), Some(e.to_string())),
    };
    phase = if error.is_some() { Phase::Failed } else { Phase::Finalized };

    // The substituted model, when any, is what actually ran: stats, cost,
    // and history are attributed to it.
    let model_id = outcome
        .substituted_model
        .as_ref()
        .map(|s| s.model_id.clone())
        .unwrap_or_else(|| config.model.model_id.clone());
    let display_name = outcome
        .substituted_model
        .as_ref()
        .map(|s| s.display_name.clone())
        .unwrap_or_else(|| config.model.display_name.clone());

    let mut stats = adapter.token_stats(config, outcome.usage.as_ref(), &query);
    stats.first_response_secs = first_response.unwrap_or(0.0);
    stats.total_secs = start.elapsed().as_secs_f64();

    let descriptor = models::resolve(&model_id, Some(custom));
    let cost = models::cost(&descriptor, &stats);
    let stats_line = render_stats_line(&display_name, config.model.temperature, &stats);

    if let Some(store) = history {
        let item = HistoryItem {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            action_id: config.request.action_id.clone(),
            model_id,
            query: query.clone(),
            had_attachment: attachment.is_some(),
            response: response.clone(),
            stats,
            stats_line: stats_line.clone(),
        };
        // Best-effort on both success and failure.
        if let Err(e) = store.append(item) {
            tracing::warn!("failed to record history entry: {}", e);
        }
    }

    tracing::debug!(?phase, total_secs = stats.total_secs, "request finished");
    Ok(RunOutcome {
        response,
        stats,
        cost,
        stats_line,
        substituted_model: switched,
        error,
    })
}
