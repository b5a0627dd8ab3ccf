//! Request configuration: everything one command invocation needs to reach
//! a provider, built fresh per invocation and never mutated concurrently.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::models::Provider;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{provider} API key is required for this model; set it in settings")]
    MissingCredential { provider: &'static str },
    #[error("a custom base URL is required for gateway models")]
    MissingBaseUrl,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// How a command was invoked: direct argument, fallback text (piped or
/// pre-filled input), and an optional attachment carried through launch
/// context (e.g. a fresh screenshot).
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub query: Option<String>,
    pub fallback_text: Option<String>,
    pub attachment_file: Option<PathBuf>,
}

impl Invocation {
    /// The effective user prompt: explicit argument wins over fallback text.
    pub fn user_prompt(&self) -> String {
        self.query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .or(self.fallback_text.as_deref())
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub action_id: String,
    pub query: String,
    pub primary_language: String,
    pub attachment_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub include_thoughts: bool,
    pub thinking_budget: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySetting {
    pub category: String,
    pub threshold: String,
}

impl SafetySetting {
    /// The permissive set sent with every Gemini request.
    pub fn block_none() -> Vec<SafetySetting> {
        [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    pub system_prompt: String,
    pub model_id: String,
    /// User-facing name, possibly carrying the custom-prompt glyph.
    pub display_name: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub gemini_api_key: String,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub reasoning: Option<ReasoningConfig>,
    pub safety: Option<Vec<SafetySetting>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiOptions {
    pub placeholder: String,
    pub allow_paste: bool,
    pub use_selected_text: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChatOptions {
    pub history_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub provider: Provider,
    pub request: RequestContext,
    pub model: ModelParams,
    pub ui: UiOptions,
    pub chat: Option<ChatOptions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_precedence() {
        let invocation = Invocation {
            query: Some("direct".into()),
            fallback_text: Some("piped".into()),
            attachment_file: None,
        };
        assert_eq!(invocation.user_prompt(), "direct");

        let invocation = Invocation {
            query: Some("   ".into()),
            fallback_text: Some("piped".into()),
            attachment_file: None,
        };
        assert_eq!(invocation.user_prompt(), "piped");

        assert_eq!(Invocation::default().user_prompt(), "");
    }

    #[test]
    fn test_block_none_covers_all_categories() {
        let safety = SafetySetting::block_none();
        assert_eq!(safety.len(), 4);
        assert!(safety.iter().all(|s| s.threshold == "BLOCK_NONE"));
    }
}
