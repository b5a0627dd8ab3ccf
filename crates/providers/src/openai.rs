//! OpenAI backend adapter, plus the OpenAI-compatible gateway variant.
//!
//! Reasoning models (o-series) carry parameter quirks: no system role, a
//! different output-length parameter, a mandated temperature, and no image
//! input. The adapter absorbs all of them, swapping in the vision-capable
//! sibling when an image arrives for a reasoning model. Gateways reuse the
//! same request assembly but issue one non-streaming call.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use shared::config::RequestConfig;
use shared::models;
use shared::stats::{estimate_tokens, UsageMetadata};
use shared::stream::StreamChunk;

use crate::adapter::{regular_file, Attachment, ProviderAdapter, SendOutcome, SubstitutedModel};
use crate::sse::SseParser;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Flat per-image token surcharge used by the character-based counter.
const IMAGE_TOKEN_SURCHARGE: u64 = 765;

/// Defaults applied when re-routing to the vision sibling.
const VISION_FALLBACK_MAX_TOKENS: u32 = 4096;
const VISION_FALLBACK_TEMPERATURE: f32 = 0.7;

/// o-series ids never accept a system role and mandate temperature 1.
const REASONING_TEMPERATURE: f32 = 1.0;

fn is_reasoning_model(model_id: &str) -> bool {
    ["o1", "o3", "o4"].iter().any(|p| model_id.starts_with(p))
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
    #[serde(default)]
    completion_tokens_details: Option<CompletionDetails>,
}

#[derive(Debug, Deserialize)]
struct CompletionDetails {
    #[serde(default)]
    reasoning_tokens: u64,
}

impl OpenAiUsage {
    fn normalized(&self) -> UsageMetadata {
        UsageMetadata {
            prompt_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
            reasoning_tokens: self
                .completion_tokens_details
                .as_ref()
                .map(|d| d.reasoning_tokens)
                .unwrap_or(0),
            total_tokens: self.total_tokens,
        }
    }
}

// ── Request planning ─────────────────────────────────────────────────

/// Everything decided before the network call: final model, message list,
/// sampling parameters, and whether a substitution happened. Kept separate
/// from I/O so the branchy parts stay testable.
#[derive(Debug)]
pub(crate) struct RequestPlan {
    pub model_id: String,
    pub reasoning: bool,
    pub messages: Vec<serde_json::Value>,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub substituted: Option<SubstitutedModel>,
}

pub(crate) fn plan_request(
    config: &RequestConfig,
    query: &str,
    attachment: Option<&Attachment>,
) -> RequestPlan {
    let mut model_id = config.model.model_id.clone();
    let mut max_output_tokens = config.model.max_output_tokens;
    let mut temperature = config.model.temperature;
    let mut substituted = None;

    // Reasoning models cannot process images; re-route to the vision
    // sibling with that model's own defaults.
    if is_reasoning_model(&model_id) && attachment.is_some() {
        let sibling = models::resolve(models::VISION_FALLBACK_MODEL, None);
        model_id = sibling.id.clone();
        max_output_tokens = VISION_FALLBACK_MAX_TOKENS;
        temperature = VISION_FALLBACK_TEMPERATURE;
        substituted = Some(SubstitutedModel {
            model_id: sibling.id,
            display_name: format!("{} (vision fallback)", sibling.display_name),
        });
    }

    let reasoning = is_reasoning_model(&model_id);
    let system_prompt = config.model.system_prompt.as_str();

    let mut messages = Vec::new();
    if !reasoning && !system_prompt.is_empty() {
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
    }

    // The o-series rejects system-role messages: fold the system prompt
    // into the user turn instead.
    let user_text = if reasoning && !system_prompt.is_empty() {
        format!("{}\n\n---\n\n{}", system_prompt, query)
    } else {
        query.to_string()
    };

    let user_content = match attachment {
        Some(Attachment::Inline { data_url, .. }) => serde_json::json!([
            { "type": "text", "text": user_text },
            { "type": "image_url", "image_url": { "url": data_url } },
        ]),
        _ => serde_json::Value::String(user_text),
    };
    messages.push(serde_json::json!({ "role": "user", "content": user_content }));

    if reasoning {
        RequestPlan {
            model_id,
            reasoning,
            messages,
            max_output_tokens,
            temperature: REASONING_TEMPERATURE,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            substituted,
        }
    } else {
        RequestPlan {
            model_id,
            reasoning,
            messages,
            max_output_tokens,
            temperature,
            top_p: config.model.top_p,
            frequency_penalty: config.model.frequency_penalty,
            presence_penalty: config.model.presence_penalty,
            substituted,
        }
    }
}

fn request_body(plan: &RequestPlan, stream: bool) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": plan.model_id,
        "messages": plan.messages,
        "temperature": plan.temperature,
    });
    if stream {
        body["stream"] = serde_json::Value::Bool(true);
        // Required to receive usage counters on the final streamed chunk.
        body["stream_options"] = serde_json::json!({ "include_usage": true });
    }
    if plan.reasoning {
        body["max_completion_tokens"] = plan.max_output_tokens.into();
    } else {
        body["max_tokens"] = plan.max_output_tokens.into();
        if let Some(top_p) = plan.top_p {
            body["top_p"] = top_p.into();
        }
        if let Some(penalty) = plan.frequency_penalty {
            body["frequency_penalty"] = penalty.into();
        }
        if let Some(penalty) = plan.presence_penalty {
            body["presence_penalty"] = penalty.into();
        }
    }
    body
}

// ── Client ───────────────────────────────────────────────────────────

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
    /// Gateways that lack incremental streaming run with this off and
    /// deliver the whole response as one synthetic chunk.
    streaming: bool,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: Option<&str>, streaming: bool) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            streaming,
        }
    }

    async fn error_for(resp: reqwest::Response) -> anyhow::Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail: String = body.chars().take(800).collect();
        if detail.trim().is_empty() {
            anyhow!("openai error: {}", status)
        } else {
            anyhow!("openai error: {}\n{}", status, detail)
        }
    }

    async fn post_completions(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Self::error_for(resp).await);
        }
        Ok(resp)
    }

    async fn send_streaming(
        &self,
        plan: &RequestPlan,
        tx: &UnboundedSender<StreamChunk>,
        outcome: &mut SendOutcome,
    ) -> Result<()> {
        let resp = self.post_completions(&request_body(plan, true)).await?;

        let mut parser = SseParser::new();
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| anyhow!("stream read error: {}", e))?;
            for event in parser.feed(&bytes) {
                if event.is_done_sentinel() {
                    return Ok(());
                }
                let parsed: StreamResponse = match serde_json::from_str(&event.data) {
                    Ok(parsed) => parsed,
                    Err(_) => continue,
                };
                if let Some(usage) = &parsed.usage {
                    outcome.usage = Some(usage.normalized());
                }
                if let Some(choice) = parsed.choices.first() {
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            let _ = tx.send(StreamChunk::Text(content.clone()));
                        }
                    }
                    if let Some(reason) = &choice.finish_reason {
                        outcome.finish_reason = Some(reason.clone());
                    }
                }
            }
        }
        Ok(())
    }

    async fn send_unary(
        &self,
        plan: &RequestPlan,
        tx: &UnboundedSender<StreamChunk>,
        outcome: &mut SendOutcome,
    ) -> Result<()> {
        let resp = self.post_completions(&request_body(plan, false)).await?;
        let parsed: ChatResponse = resp.json().await?;

        if let Some(usage) = &parsed.usage {
            outcome.usage = Some(usage.normalized());
        }
        if let Some(choice) = parsed.choices.first() {
            outcome.finish_reason = choice.finish_reason.clone();
            if let Some(text) = choice.message.as_ref().and_then(|m| m.content.clone()) {
                if !text.is_empty() {
                    let _ = tx.send(StreamChunk::Text(text));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiClient {
    /// Images only: there is no upload channel for this backend in scope,
    /// so anything else yields no attachment.
    async fn prepare_attachment(&self, path: Option<&Path>) -> Result<Option<Attachment>> {
        let Some(path) = regular_file(path) else {
            return Ok(None);
        };
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        if !mime_type.starts_with("image/") {
            tracing::debug!("skipping non-image attachment {}", path.display());
            return Ok(None);
        }
        let bytes = std::fs::read(path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(Some(Attachment::Inline {
            data_url: format!("data:{};base64,{}", mime_type, encoded),
            mime_type,
        }))
    }

    async fn send_request(
        &self,
        config: &RequestConfig,
        query: &str,
        attachment: Option<&Attachment>,
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<SendOutcome> {
        let plan = plan_request(config, query, attachment);
        if let Some(substituted) = &plan.substituted {
            tracing::info!(
                "image attachment: substituting {} for {}",
                substituted.model_id,
                config.model.model_id
            );
            let _ = tx.send(StreamChunk::ModelSwitched {
                model: substituted.model_id.clone(),
                display_name: substituted.display_name.clone(),
            });
        }

        let mut outcome = SendOutcome {
            substituted_model: plan.substituted.clone(),
            ..Default::default()
        };
        if self.streaming {
            self.send_streaming(&plan, &tx, &mut outcome).await?;
        } else {
            self.send_unary(&plan, &tx, &mut outcome).await?;
        }

        let _ = tx.send(StreamChunk::Done {
            finish_reason: outcome.finish_reason.clone(),
        });
        Ok(outcome)
    }

    /// No counting endpoint exists for this backend; always the character
    /// estimate, plus a flat surcharge per image attachment.
    async fn count_tokens(
        &self,
        config: &RequestConfig,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<u64> {
        let mut tokens = estimate_tokens(&config.model.system_prompt) + estimate_tokens(text);
        if attachment.map(|a| a.is_image()).unwrap_or(false) {
            tokens += IMAGE_TOKEN_SURCHARGE;
        }
        Ok(tokens)
    }
}
