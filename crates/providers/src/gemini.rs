//! Gemini backend adapter.
//!
//! Attachments go through the vendor file store (upload, then poll until the
//! remote processing state settles); generation streams over SSE with the
//! full generation config sent on every call.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use shared::config::RequestConfig;
use shared::models;
use shared::stats::{estimate_tokens, UsageMetadata};
use shared::stream::StreamChunk;

use crate::adapter::{regular_file, Attachment, ProviderAdapter, SendOutcome};
use crate::sse::SseParser;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

const BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Remote file processing is polled at 1 s intervals, bounded so a stuck
/// job fails the attachment instead of stalling the request forever.
const UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(1);
const UPLOAD_POLL_LIMIT: u32 = 60;

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<SafetySetting>>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
enum Part {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "fileData", rename_all = "camelCase")]
    FileData { file_uri: String, mime_type: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    include_thoughts: bool,
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// Response parts may carry keys beyond `text` (thought markers, function
/// calls); anything without text is ignored.
#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    thoughts_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

impl GeminiUsage {
    fn normalized(&self) -> UsageMetadata {
        UsageMetadata {
            prompt_tokens: self.prompt_token_count,
            output_tokens: self.candidates_token_count,
            reasoning_tokens: self.thoughts_token_count,
            total_tokens: self.total_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: u64,
}

// ── Client ───────────────────────────────────────────────────────────

pub struct GeminiClient {
    http: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            api_key: api_key.to_string(),
        }
    }

    fn build_request(
        config: &RequestConfig,
        query: &str,
        attachment: Option<&Attachment>,
    ) -> GenerateRequest {
        let mut parts = vec![Part::Text(query.to_string())];
        if let Some(Attachment::Remote { uri, mime_type }) = attachment {
            parts.push(Part::FileData {
                file_uri: uri.clone(),
                mime_type: mime_type.clone(),
            });
        }

        let system_instruction = if config.model.system_prompt.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part::Text(config.model.system_prompt.clone())],
            })
        };

        GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction,
            generation_config: GenerationConfig {
                max_output_tokens: config.model.max_output_tokens,
                temperature: config.model.temperature,
                top_p: config.model.top_p,
                top_k: config.model.top_k,
                frequency_penalty: config.model.frequency_penalty,
                presence_penalty: config.model.presence_penalty,
                thinking_config: config.model.reasoning.map(|r| ThinkingConfig {
                    include_thoughts: r.include_thoughts,
                    thinking_budget: r.thinking_budget,
                }),
            },
            safety_settings: config.model.safety.as_ref().map(|settings| {
                settings
                    .iter()
                    .map(|s| SafetySetting {
                        category: s.category.clone(),
                        threshold: s.threshold.clone(),
                    })
                    .collect()
            }),
        }
    }

    async fn error_for(resp: reqwest::Response) -> anyhow::Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let detail: String = body.chars().take(800).collect();
        if detail.trim().is_empty() {
            anyhow!("gemini error: {}", status)
        } else {
            anyhow!("gemini error: {}\n{}", status, detail)
        }
    }

    async fn fetch_file(&self, name: &str) -> Result<RemoteFile> {
        let url = format!("{}/v1beta/{}?key={}", BASE_URL, name, self.api_key);
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for(resp).await);
        }
        Ok(resp.json().await?)
    }

    /// Upload a file to vendor storage and wait for remote processing.
    async fn upload(&self, path: &Path) -> Result<Attachment> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        let bytes = std::fs::read(path)?;

        let metadata = serde_json::json!({ "file": { "displayName": file_name } });
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime_type)?,
            );

        let url = format!("{}/upload/v1beta/files?key={}", BASE_URL, self.api_key);
        let resp = self.http.post(url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for(resp).await);
        }
        let uploaded: UploadResponse = resp.json().await?;

        let mut file = uploaded.file;
        let mut attempts = 0;
        while file.state.as_deref() == Some("PROCESSING") {
            attempts += 1;
            if attempts > UPLOAD_POLL_LIMIT {
                return Err(anyhow!("file processing did not finish in time"));
            }
            tokio::time::sleep(UPLOAD_POLL_INTERVAL).await;
            file = self.fetch_file(&file.name).await?;
        }
        if file.state.as_deref() == Some("FAILED") {
            return Err(anyhow!("file processing failed"));
        }

        match (file.uri, file.mime_type) {
            (Some(uri), Some(mime_type)) => Ok(Attachment::Remote { uri, mime_type }),
            _ => Err(anyhow!("upload response missing file uri")),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiClient {
    async fn prepare_attachment(&self, path: Option<&Path>) -> Result<Option<Attachment>> {
        let Some(path) = regular_file(path) else {
            return Ok(None);
        };
        Ok(Some(self.upload(path).await?))
    }

    async fn send_request(
        &self,
        config: &RequestConfig,
        query: &str,
        attachment: Option<&Attachment>,
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<SendOutcome> {
        let body = Self::build_request(config, query, attachment);
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            BASE_URL,
            models::network_id(&config.model.model_id),
            self.api_key
        );

        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Self::error_for(resp).await);
        }

        let mut parser = SseParser::new();
        let mut stream = resp.bytes_stream();
        let mut outcome = SendOutcome::default();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| anyhow!("stream read error: {}", e))?;
            for event in parser.feed(&bytes) {
                let parsed: GenerateChunk = match serde_json::from_str(&event.data) {
                    Ok(parsed) => parsed,
                    Err(_) => continue,
                };
                if let Some(usage) = &parsed.usage_metadata {
                    outcome.usage = Some(usage.normalized());
                }
                if let Some(candidate) = parsed.candidates.first() {
                    if let Some(content) = &candidate.content {
                        for part in &content.parts {
                            if let Some(text) = &part.text {
                                if !text.is_empty() {
                                    let _ = tx.send(StreamChunk::Text(text.clone()));
                                }
                            }
                        }
                    }
                    if let Some(reason) = &candidate.finish_reason {
                        outcome.finish_reason = Some(reason.clone());
                    }
                }
            }
        }

        let _ = tx.send(StreamChunk::Done {
            finish_reason: outcome.finish_reason.clone(),
        });
        Ok(outcome)
    }

    async fn count_tokens(
        &self,
        config: &RequestConfig,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<u64> {
        let mut parts = vec![Part::Text(text.to_string())];
        if let Some(Attachment::Remote { uri, mime_type }) = attachment {
            parts.push(Part::FileData {
                file_uri: uri.clone(),
                mime_type: mime_type.clone(),
            });
        }
        let body = serde_json::json!({
            "contents": [Content { role: Some("user".to_string()), parts }]
        });
        let url = format!(
            "{}/v1beta/models/{}:countTokens?key={}",
            BASE_URL,
            models::network_id(&config.model.model_id),
            self.api_key
        );

        // The dedicated endpoint is best-effort; any failure silently
        // degrades to the character estimate.
        let counted: Result<CountTokensResponse> = async {
            let resp = self.http.post(url).json(&body).send().await?;
            if !resp.status().is_success() {
                return Err(Self::error_for(resp).await);
            }
            Ok(resp.json().await?)
        }
        .await;

        match counted {
            Ok(response) => Ok(response.total_tokens),
            Err(e) => {
                tracing::debug!("countTokens failed, using estimate: {}", e);
                Ok(estimate_tokens(text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::config::{
        ModelParams, ReasoningConfig, RequestContext, SafetySetting as ConfigSafety, UiOptions,
    };
    use shared::models::Provider;

    fn config(model_id: &str, reasoning: Option<ReasoningConfig>) -> RequestConfig {
        RequestConfig {
            provider: Provider::Gemini,
            request: RequestContext {
                action_id: "ask".into(),
                query: "hello".into(),
                primary_language: "English".into(),
                attachment_path: None,
            },
            model: ModelParams {
                system_prompt: "be brief".into(),
                model_id: model_id.into(),
                display_name: "test".into(),
                max_output_tokens: 32_000,
                temperature: 0.3,
                gemini_api_key: "k".into(),
                openai_api_key: String::new(),
                openai_base_url: None,
                top_k: Some(0),
                top_p: Some(0.95),
                frequency_penalty: Some(0.0),
                presence_penalty: Some(0.0),
                reasoning,
                safety: Some(ConfigSafety::block_none()),
            },
            ui: UiOptions {
                placeholder: String::new(),
                allow_paste: true,
                use_selected_text: true,
            },
            chat: None,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let cfg = config(
            "gemini-2.5-flash-preview-04-17__thinking",
            Some(ReasoningConfig {
                include_thoughts: false,
                thinking_budget: 2000,
            }),
        );
        let body = GeminiClient::build_request(&cfg, "translate this", None);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "translate this");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 32_000);
        assert_eq!(json["generationConfig"]["thinkingConfig"]["thinkingBudget"], 2000);
        assert_eq!(json["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[test]
    fn test_attachment_becomes_file_data_part() {
        let cfg = config("gemini-2.0-flash", None);
        let attachment = Attachment::Remote {
            uri: "https://files/abc".into(),
            mime_type: "image/png".into(),
        };
        let body = GeminiClient::build_request(&cfg, "what is this", Some(&attachment));
        let json = serde_json::to_value(&body).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["fileData"]["fileUri"], "https://files/abc");
        assert_eq!(parts[1]["fileData"]["mimeType"], "image/png");
    }

    #[test]
    fn test_no_thinking_config_for_standard_models() {
        let cfg = config("gemini-2.0-flash", None);
        let body = GeminiClient::build_request(&cfg, "q", None);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn test_usage_normalization() {
        let usage = GeminiUsage {
            prompt_token_count: 10,
            candidates_token_count: 20,
            thoughts_token_count: 5,
            total_token_count: 35,
        };
        let normalized = usage.normalized();
        assert_eq!(normalized.prompt_tokens, 10);
        assert_eq!(normalized.output_tokens, 20);
        assert_eq!(normalized.reasoning_tokens, 5);
        assert_eq!(normalized.total_tokens, 35);
    }
}
