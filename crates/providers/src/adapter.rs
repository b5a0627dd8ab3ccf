//! The provider capability interface.
//!
//! One implementation per backend normalizes attachment handling, streaming,
//! and usage-metadata shapes; nothing outside `factory` branches on provider
//! identity.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;

use shared::config::RequestConfig;
use shared::stats::{estimate_tokens, RequestStats, UsageMetadata};
use shared::stream::StreamChunk;

/// A prepared attachment, ready to travel with a request.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Uploaded to the provider's file storage; referenced by URI.
    Remote { uri: String, mime_type: String },
    /// Inlined as a base64 data URL (image-only backends).
    Inline { data_url: String, mime_type: String },
}

impl Attachment {
    pub fn mime_type(&self) -> &str {
        match self {
            Attachment::Remote { mime_type, .. } => mime_type,
            Attachment::Inline { mime_type, .. } => mime_type,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type().starts_with("image/")
    }
}

/// Recorded when an adapter had to swap the requested model for a sibling
/// (e.g. reasoning model + image attachment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutedModel {
    pub model_id: String,
    pub display_name: String,
}

/// What a completed `send_request` reports back, beyond the streamed text.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub usage: Option<UsageMetadata>,
    pub finish_reason: Option<String>,
    pub substituted_model: Option<SubstitutedModel>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Turn a local file into something the backend accepts. `None` when
    /// the path is absent, missing, not a regular file, or unsupported by
    /// the backend. Failures degrade to `None` at the caller's discretion.
    async fn prepare_attachment(&self, path: Option<&Path>) -> Result<Option<Attachment>>;

    /// Stream one generation. Text deltas go into `tx` as they arrive; the
    /// returned outcome carries final usage and any model substitution.
    /// Single in-flight call, no internal buffering; dropping the receiver
    /// abandons the stream.
    async fn send_request(
        &self,
        config: &RequestConfig,
        query: &str,
        attachment: Option<&Attachment>,
        tx: UnboundedSender<StreamChunk>,
    ) -> Result<SendOutcome>;

    /// Normalize provider usage into a stats record, estimating when the
    /// backend reported nothing.
    fn token_stats(
        &self,
        config: &RequestConfig,
        usage: Option<&UsageMetadata>,
        query: &str,
    ) -> RequestStats {
        match usage {
            Some(usage) => stats_from_usage(&config.model.system_prompt, usage),
            None => estimated_stats(&config.model.system_prompt, query),
        }
    }

    /// Count tokens for arbitrary text plus an optional attachment.
    async fn count_tokens(
        &self,
        config: &RequestConfig,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> Result<u64>;
}

/// Stats derived from authoritative usage counters. The user-only input
/// figure is always prompt-total minus an estimated system-prompt count;
/// no backend reports it directly, so it is clamped and approximate.
pub(crate) fn stats_from_usage(system_prompt: &str, usage: &UsageMetadata) -> RequestStats {
    let system_tokens = estimate_tokens(system_prompt);
    RequestStats {
        prompt_tokens: usage.prompt_tokens,
        user_input_tokens: usage.prompt_tokens.saturating_sub(system_tokens),
        reasoning_tokens: usage.reasoning_tokens,
        total_tokens: usage.total_tokens,
        first_response_secs: 0.0,
        total_secs: 0.0,
    }
}

/// Full fallback when the provider omitted usage data entirely.
pub(crate) fn estimated_stats(system_prompt: &str, query: &str) -> RequestStats {
    let system_tokens = estimate_tokens(system_prompt);
    let user_tokens = estimate_tokens(query);
    RequestStats {
        prompt_tokens: system_tokens + user_tokens,
        user_input_tokens: user_tokens,
        reasoning_tokens: 0,
        total_tokens: system_tokens + user_tokens,
        first_response_secs: 0.0,
        total_secs: 0.0,
    }
}

/// Shared filesystem guard for attachment paths.
pub(crate) fn regular_file(path: Option<&Path>) -> Option<&Path> {
    let path = path?;
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_from_usage_clamps_user_input() {
        // 40-char system prompt -> 10 estimated tokens.
        let usage = UsageMetadata {
            prompt_tokens: 25,
            output_tokens: 5,
            reasoning_tokens: 0,
            total_tokens: 30,
        };
        let stats = stats_from_usage(&"x".repeat(40), &usage);
        assert_eq!(stats.prompt_tokens, 25);
        assert_eq!(stats.user_input_tokens, 15);

        // Estimated system tokens exceed the reported total: clamp to zero
        // instead of going negative.
        let stats = stats_from_usage(&"x".repeat(400), &usage);
        assert_eq!(stats.user_input_tokens, 0);
    }

    #[test]
    fn test_estimated_stats_uses_char_ratio() {
        let stats = estimated_stats(&"s".repeat(8), &"q".repeat(12));
        assert_eq!(stats.user_input_tokens, 3);
        assert_eq!(stats.prompt_tokens, 5);
        assert_eq!(stats.total_tokens, 5);
        assert_eq!(stats.reasoning_tokens, 0);
    }

    #[test]
    fn test_regular_file_guard() {
        assert!(regular_file(None).is_none());
        assert!(regular_file(Some(Path::new("/no/such/file"))).is_none());

        let dir = tempfile::tempdir().unwrap();
        assert!(regular_file(Some(dir.path())).is_none());

        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hi").unwrap();
        assert!(regular_file(Some(&file)).is_some());
    }
}
