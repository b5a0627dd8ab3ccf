//! Model registry.
//!
//! Static table of every model the commands ship with, plus best-effort
//! synthesis of descriptors for user-supplied custom model names.
//! Prices are USD per 1M tokens.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::stats::RequestStats;

/// Default model when preferences carry no override.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-04-17";

/// Vision-capable sibling that reasoning models fall back to when an image
/// attachment is present (reasoning models cannot process images).
pub const VISION_FALLBACK_MODEL: &str = "gpt-4o";

/// Suffix marking the reasoning variant of a model that shares its network
/// id with the standard variant. Stripped before any API call.
pub const THINKING_SUFFIX: &str = "__thinking";

/// Conservative per-1M prices assumed for unregistered custom models.
const CUSTOM_DEFAULT_INPUT_PRICE: f64 = 1.0;
const CUSTOM_DEFAULT_OUTPUT_PRICE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
    /// OpenAI-compatible gateway (custom base URL, may lack streaming).
    Gateway,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Gateway => "gateway",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    /// USD per 1M prompt tokens.
    pub input_price: f64,
    /// USD per 1M output tokens.
    pub output_price: f64,
    /// USD per 1M output tokens when the response spent reasoning tokens.
    pub output_price_thinking: f64,
    /// Maximum reasoning tokens the model may spend. Zero means the model
    /// is not reasoning-capable.
    pub thinking_budget: u32,
    pub provider: Provider,
    pub supports_vision: bool,
}

impl ModelDescriptor {
    pub fn is_reasoning(&self) -> bool {
        self.thinking_budget > 0
    }
}

/// Optional user-configured price override for a custom model.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomPricing {
    pub input_price: Option<f64>,
    pub output_price: Option<f64>,
}

fn known(
    id: &str,
    display_name: &str,
    input_price: f64,
    output_price: f64,
    output_price_thinking: f64,
    thinking_budget: u32,
    provider: Provider,
    supports_vision: bool,
) -> (String, ModelDescriptor) {
    (
        id.to_string(),
        ModelDescriptor {
            id: id.to_string(),
            display_name: display_name.to_string(),
            input_price,
            output_price,
            output_price_thinking,
            thinking_budget,
            provider,
            supports_vision,
        },
    )
}

static REGISTRY: LazyLock<HashMap<String, ModelDescriptor>> = LazyLock::new(|| {
    use Provider::{Gemini, OpenAi};
    HashMap::from([
        known("gemini-2.0-flash-lite", "2.0 Flash-Lite", 0.075, 0.3, 0.3, 0, Gemini, true),
        known("gemini-2.0-flash", "2.0 Flash", 0.1, 0.4, 0.4, 0, Gemini, true),
        known(
            "gemini-2.5-flash-preview-04-17",
            "2.5 Flash",
            0.15,
            0.6,
            3.5,
            0,
            Gemini,
            true,
        ),
        known(
            "gemini-2.5-flash-preview-04-17__thinking",
            "2.5 Flash Thinking",
            0.15,
            0.6,
            3.5,
            2000,
            Gemini,
            true,
        ),
        known(
            "gemini-2.5-pro-preview-05-06",
            "2.5 Pro",
            1.25,
            10.0,
            10.0,
            4000,
            Gemini,
            true,
        ),
        known("gpt-4.1", "GPT-4.1", 2.0, 8.0, 8.0, 0, OpenAi, true),
        known("gpt-4o", "GPT-4o", 2.5, 10.0, 10.0, 0, OpenAi, true),
        known("o4-mini", "o4-mini (Reasoning)", 1.1, 4.4, 4.4, 100_000, OpenAi, false),
    ])
});

/// Look up a registered model by exact id.
pub fn lookup(model_id: &str) -> Option<&'static ModelDescriptor> {
    REGISTRY.get(model_id)
}

/// Infer the provider for an unregistered model name from common naming
/// conventions. Best-effort classifier, not authoritative: chat-completions
/// style names win, everything else defaults to Gemini.
pub fn infer_provider(model_name: &str) -> Provider {
    let name = model_name.to_lowercase();
    const OPENAI_MARKERS: [&str; 7] =
        ["gpt", "o1", "chatgpt", "claude", "llama", "mistral", "azure"];
    if OPENAI_MARKERS.iter().any(|m| name.contains(m)) {
        return Provider::OpenAi;
    }
    Provider::Gemini
}

/// Resolve a model name to a descriptor.
///
/// Known ids return the registry entry. Unknown ids get a synthesized
/// descriptor: inferred provider, user price overrides where supplied
/// (conservative defaults otherwise), and optimistic vision support.
pub fn resolve(model_id: &str, custom: Option<CustomPricing>) -> ModelDescriptor {
    if let Some(descriptor) = lookup(model_id) {
        return descriptor.clone();
    }

    let pricing = custom.unwrap_or_default();
    let input_price = pricing.input_price.unwrap_or(CUSTOM_DEFAULT_INPUT_PRICE);
    let output_price = pricing.output_price.unwrap_or(CUSTOM_DEFAULT_OUTPUT_PRICE);
    ModelDescriptor {
        id: model_id.to_string(),
        display_name: model_id.to_string(),
        input_price,
        output_price,
        output_price_thinking: output_price,
        thinking_budget: 0,
        provider: infer_provider(model_id),
        supports_vision: true,
    }
}

/// The model id sent over the wire: the reasoning-variant suffix is a local
/// annotation and must never reach the API.
pub fn network_id(model_id: &str) -> &str {
    model_id.strip_suffix(THINKING_SUFFIX).unwrap_or(model_id)
}

/// Monetary cost of one completed request.
///
/// Output tokens are everything past the prompt. The thinking-tier output
/// price applies only when reasoning tokens were actually spent and the
/// tier has a nonzero price.
pub fn cost(descriptor: &ModelDescriptor, stats: &RequestStats) -> f64 {
    let output_tokens = stats.total_tokens.saturating_sub(stats.prompt_tokens);
    let output_price = if stats.reasoning_tokens > 0 && descriptor.output_price_thinking > 0.0 {
        descriptor.output_price_thinking
    } else {
        descriptor.output_price
    };
    (stats.prompt_tokens as f64 / 1e6) * descriptor.input_price
        + (output_tokens as f64 / 1e6) * output_price
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(prompt: u64, reasoning: u64, total: u64) -> RequestStats {
        RequestStats {
            prompt_tokens: prompt,
            user_input_tokens: 0,
            reasoning_tokens: reasoning,
            total_tokens: total,
            first_response_secs: 0.0,
            total_secs: 0.0,
        }
    }

    #[test]
    fn test_known_models_keep_static_provider_and_sane_prices() {
        for (id, descriptor) in REGISTRY.iter() {
            assert_eq!(&descriptor.id, id);
            assert!(descriptor.input_price >= 0.0);
            assert!(descriptor.output_price >= 0.0);
            assert!(descriptor.output_price_thinking >= 0.0);
            assert_eq!(resolve(id, None).provider, descriptor.provider);
        }
        assert_eq!(lookup("gpt-4o").unwrap().provider, Provider::OpenAi);
        assert_eq!(
            lookup("gemini-2.0-flash").unwrap().provider,
            Provider::Gemini
        );
    }

    #[test]
    fn test_provider_inference_for_custom_names() {
        assert_eq!(infer_provider("gpt-5-turbo"), Provider::OpenAi);
        assert_eq!(infer_provider("o1-preview"), Provider::OpenAi);
        assert_eq!(infer_provider("Azure-Deployment-1"), Provider::OpenAi);
        assert_eq!(infer_provider("my-custom-model"), Provider::Gemini);
    }

    #[test]
    fn test_custom_model_synthesis() {
        let descriptor = resolve("my-custom-model", None);
        assert_eq!(descriptor.provider, Provider::Gemini);
        assert!(descriptor.supports_vision);
        assert_eq!(descriptor.input_price, CUSTOM_DEFAULT_INPUT_PRICE);
        assert_eq!(descriptor.thinking_budget, 0);

        let priced = resolve(
            "my-custom-model",
            Some(CustomPricing {
                input_price: Some(0.25),
                output_price: None,
            }),
        );
        assert_eq!(priced.input_price, 0.25);
        assert_eq!(priced.output_price, CUSTOM_DEFAULT_OUTPUT_PRICE);
    }

    #[test]
    fn test_network_id_strips_thinking_suffix() {
        assert_eq!(
            network_id("gemini-2.5-flash-preview-04-17__thinking"),
            "gemini-2.5-flash-preview-04-17"
        );
        assert_eq!(network_id("gpt-4.1"), "gpt-4.1");
    }

    #[test]
    fn test_cost_arithmetic() {
        let descriptor = ModelDescriptor {
            id: "m".into(),
            display_name: "m".into(),
            input_price: 1.0,
            output_price: 2.0,
            output_price_thinking: 4.0,
            thinking_budget: 0,
            provider: Provider::Gemini,
            supports_vision: false,
        };

        // 100 prompt + 50 output, no reasoning: standard output tier.
        let c = cost(&descriptor, &stats(100, 0, 150));
        let expected = (100.0 / 1e6) * 1.0 + (50.0 / 1e6) * 2.0;
        assert!((c - expected).abs() < 1e-12);

        // Reasoning tokens spent: thinking tier price applies.
        let c = cost(&descriptor, &stats(100, 10, 150));
        let expected = (100.0 / 1e6) * 1.0 + (50.0 / 1e6) * 4.0;
        assert!((c - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cost_thinking_tier_ignored_when_unpriced() {
        let mut descriptor = resolve("gpt-4.1", None);
        descriptor.output_price_thinking = 0.0;
        let c = cost(&descriptor, &stats(100, 10, 150));
        let expected = (100.0 / 1e6) * descriptor.input_price
            + (50.0 / 1e6) * descriptor.output_price;
        assert!((c - expected).abs() < 1e-12);
    }
}
