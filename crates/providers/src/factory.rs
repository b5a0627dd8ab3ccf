//! Adapter construction: the single seam that switches on the provider tag.

use shared::config::{ConfigError, RequestConfig};
use shared::models::Provider;

use crate::adapter::ProviderAdapter;
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;

/// Build the adapter matching a config's provider tag, failing fast when
/// the corresponding credential is blank. Everything downstream of this
/// call is provider-agnostic.
pub fn create_adapter(config: &RequestConfig) -> Result<Box<dyn ProviderAdapter>, ConfigError> {
    match config.provider {
        Provider::Gemini => {
            let key = config.model.gemini_api_key.trim();
            if key.is_empty() {
                return Err(ConfigError::MissingCredential { provider: "Gemini" });
            }
            Ok(Box::new(GeminiClient::new(key)))
        }
        Provider::OpenAi => {
            let key = config.model.openai_api_key.trim();
            if key.is_empty() {
                return Err(ConfigError::MissingCredential { provider: "OpenAI" });
            }
            Ok(Box::new(OpenAiClient::new(
                key,
                config.model.openai_base_url.as_deref(),
                true,
            )))
        }
        Provider::Gateway => {
            let key = config.model.openai_api_key.trim();
            if key.is_empty() {
                return Err(ConfigError::MissingCredential { provider: "OpenAI" });
            }
            let base_url = config
                .model
                .openai_base_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or(ConfigError::MissingBaseUrl)?;
            // Gateways lack incremental streaming: one unary call, one
            // synthetic chunk.
            Ok(Box::new(OpenAiClient::new(key, Some(base_url), false)))
        }
    }
}
