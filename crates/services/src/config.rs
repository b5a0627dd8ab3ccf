//! Request-config construction.
//!
//! Merges preferences, the composed system prompt, and the invoking
//! command's metadata into one normalized descriptor, routed through a
//! provider-specific builder. Preferences are read once by the caller and
//! passed down; nothing here touches globals.

use shared::commands::{self, CMD_CHAT};
use shared::config::{
    ChatOptions, ConfigError, Invocation, ModelParams, ReasoningConfig, RequestConfig,
    RequestContext, SafetySetting, UiOptions,
};
use shared::models::{self, CustomPricing, Provider};
use shared::settings::Preferences;

use crate::prompt;

/// Output ceiling for utility commands and the ceilings the provider
/// builders apply.
const UTILITY_MAX_TOKENS: u32 = 4096;
const GEMINI_MAX_TOKENS: u32 = 32_000;
const OPENAI_MAX_TOKENS: u32 = 4_000;
const OPENAI_REASONING_MAX_TOKENS: u32 = 16_000;

/// Annotation glyph marking that a custom prompt file is in use.
const CUSTOM_PROMPT_GLYPH: &str = "\u{1f4ad} ";

pub fn custom_pricing(prefs: &Preferences) -> CustomPricing {
    CustomPricing {
        input_price: prefs.custom_model_input_price,
        output_price: prefs.custom_model_output_price,
    }
}

/// The model a command resolves to: custom model beats the global default,
/// a per-command override beats both unless it is the "default" sentinel.
pub fn effective_model(action_id: &str, prefs: &Preferences) -> String {
    let custom = prefs.custom_model.trim();
    let global = if !custom.is_empty() {
        custom.to_lowercase()
    } else if prefs.default_model.trim().is_empty() {
        models::DEFAULT_MODEL.to_string()
    } else {
        prefs.default_model.trim().to_string()
    };

    match prefs.command_models.get(action_id).map(|m| m.trim()) {
        Some(per_command) if !per_command.is_empty() && per_command != "default" => {
            per_command.to_string()
        }
        _ => global,
    }
}

fn resolve_provider(model_id: &str, prefs: &Preferences) -> Provider {
    let provider = models::resolve(model_id, Some(custom_pricing(prefs))).provider;
    // A custom base URL routes OpenAI-style models through the gateway.
    if provider == Provider::OpenAi && !prefs.openai_base_url.trim().is_empty() {
        return Provider::Gateway;
    }
    provider
}

fn check_credential(provider: Provider, prefs: &Preferences) -> Result<(), ConfigError> {
    match provider {
        Provider::Gemini => {
            if prefs.gemini_api_key.trim().is_empty() {
                return Err(ConfigError::MissingCredential { provider: "Gemini" });
            }
        }
        Provider::OpenAi | Provider::Gateway => {
            if prefs.openai_api_key.trim().is_empty() {
                return Err(ConfigError::MissingCredential { provider: "OpenAI" });
            }
        }
    }
    Ok(())
}

fn base_url(prefs: &Preferences) -> Option<String> {
    let url = prefs.openai_base_url.trim();
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

fn request_context(
    action_id: &str,
    invocation: &Invocation,
    prefs: &Preferences,
) -> RequestContext {
    RequestContext {
        action_id: action_id.to_string(),
        query: invocation.user_prompt(),
        primary_language: prefs.primary_language.clone(),
        attachment_path: invocation.attachment_file.clone(),
    }
}

fn ui_options(action_id: &str) -> UiOptions {
    let placeholder = commands::get(action_id)
        .map(|c| c.placeholder)
        .unwrap_or_default();
    UiOptions {
        placeholder: placeholder.to_string(),
        allow_paste: true,
        use_selected_text: true,
    }
}

/// Minimal configuration for commands that never need a composed prompt
/// (token counting, history, stats).
fn build_utility(
    action_id: &str,
    invocation: &Invocation,
    prefs: &Preferences,
    provider: Provider,
    model_id: String,
) -> RequestConfig {
    let descriptor = models::resolve(&model_id, Some(custom_pricing(prefs)));
    RequestConfig {
        provider,
        request: request_context(action_id, invocation, prefs),
        model: ModelParams {
            system_prompt: String::new(),
            model_id,
            display_name: descriptor.display_name,
            max_output_tokens: UTILITY_MAX_TOKENS,
            temperature: prefs.parsed_temperature(),
            gemini_api_key: prefs.gemini_api_key.trim().to_string(),
            openai_api_key: prefs.openai_api_key.trim().to_string(),
            openai_base_url: base_url(prefs),
            top_k: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            reasoning: None,
            safety: None,
        },
        ui: ui_options(action_id),
        chat: None,
    }
}

fn build_gemini(
    action_id: &str,
    invocation: &Invocation,
    prefs: &Preferences,
    model_id: String,
    system_prompt: prompt::ComposedPrompt,
) -> RequestConfig {
    let descriptor = models::resolve(&model_id, Some(custom_pricing(prefs)));
    let glyph = if system_prompt.custom { CUSTOM_PROMPT_GLYPH } else { "" };
    let reasoning = descriptor.is_reasoning().then(|| ReasoningConfig {
        include_thoughts: false,
        thinking_budget: descriptor.thinking_budget,
    });

    RequestConfig {
        provider: Provider::Gemini,
        request: request_context(action_id, invocation, prefs),
        model: ModelParams {
            system_prompt: system_prompt.text,
            display_name: format!("{}{}", glyph, descriptor.display_name),
            model_id,
            max_output_tokens: GEMINI_MAX_TOKENS,
            temperature: prefs.parsed_temperature(),
            gemini_api_key: prefs.gemini_api_key.trim().to_string(),
            openai_api_key: prefs.openai_api_key.trim().to_string(),
            openai_base_url: base_url(prefs),
            top_k: Some(0),
            top_p: Some(0.95),
            frequency_penalty: Some(0.0),
            presence_penalty: Some(0.0),
            reasoning,
            safety: Some(SafetySetting::block_none()),
        },
        ui: ui_options(action_id),
        chat: None,
    }
}

fn build_openai(
    action_id: &str,
    invocation: &Invocation,
    prefs: &Preferences,
    provider: Provider,
    model_id: String,
    system_prompt: prompt::ComposedPrompt,
) -> RequestConfig {
    let descriptor = models::resolve(&model_id, Some(custom_pricing(prefs)));
    let glyph = if system_prompt.custom { CUSTOM_PROMPT_GLYPH } else { "" };
    // The o-series both by registry flag and by naming convention.
    let is_reasoning = descriptor.is_reasoning()
        || ["o1", "o3", "o4"].iter().any(|p| model_id.starts_with(p));
    let reasoning = (is_reasoning && descriptor.thinking_budget > 0).then(|| ReasoningConfig {
        include_thoughts: false,
        thinking_budget: descriptor.thinking_budget,
    });

    RequestConfig {
        provider,
        request: request_context(action_id, invocation, prefs),
        model: ModelParams {
            system_prompt: system_prompt.text,
            display_name: format!("{}{}", glyph, descriptor.display_name),
            model_id,
            max_output_tokens: if is_reasoning {
                OPENAI_REASONING_MAX_TOKENS
            } else {
                OPENAI_MAX_TOKENS
            },
            // Reasoning models mandate temperature 1.
            temperature: if is_reasoning { 1.0 } else { prefs.parsed_temperature() },
            gemini_api_key: prefs.gemini_api_key.trim().to_string(),
            openai_api_key: prefs.openai_api_key.trim().to_string(),
            openai_base_url: base_url(prefs),
            top_k: None,
            top_p: (!is_reasoning).then_some(0.95),
            frequency_penalty: (!is_reasoning).then_some(0.0),
            presence_penalty: (!is_reasoning).then_some(0.0),
            reasoning,
            safety: None,
        },
        ui: ui_options(action_id),
        chat: None,
    }
}

/// Build the full request configuration for one command invocation.
pub fn build(
    action_id: &str,
    invocation: &Invocation,
    prefs: &Preferences,
) -> Result<RequestConfig, ConfigError> {
    if commands::get(action_id).is_none() {
        return Err(ConfigError::UnknownCommand(action_id.to_string()));
    }

    let model_id = effective_model(action_id, prefs);
    let provider = resolve_provider(&model_id, prefs);
    check_credential(provider, prefs)?;

    if commands::is_utility(action_id) {
        return Ok(build_utility(action_id, invocation, prefs, provider, model_id));
    }

    let fallback = commands::default_prompt(action_id, prefs);
    let system_prompt = prompt::compose(action_id, prefs, fallback.as_deref());

    let mut config = match provider {
        Provider::Gemini => build_gemini(action_id, invocation, prefs, model_id, system_prompt),
        Provider::OpenAi | Provider::Gateway => {
            build_openai(action_id, invocation, prefs, provider, model_id, system_prompt)
        }
    };

    if action_id == CMD_CHAT {
        config.chat = Some(ChatOptions {
            history_window: prefs.chat_history_window,
        });
    }

    Ok(config)
}

/// Per-command tuning applied right after construction, before first use:
/// the sampling and input-source tweaks individual commands carry.
pub fn apply_command_overrides(config: &mut RequestConfig) {
    use shared::commands::*;
    match config.request.action_id.as_str() {
        CMD_TRANSLATE => config.model.temperature = 0.7,
        CMD_FRIENDLY => config.model.temperature = 0.9,
        CMD_SHORTER | CMD_LONGER | CMD_REPHRASE => {
            if config.model.top_p.is_some() {
                config.model.top_p = Some(0.9);
            }
        }
        CMD_ASK | CMD_PROMPT_BUILDER | CMD_CHAT | CMD_SCR_EXPLAIN | CMD_SCR_MARKDOWN
        | CMD_SCR_TRANSLATE => {
            config.ui.use_selected_text = false;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::commands::{
        CMD_ASK, CMD_CHAT, CMD_COUNT_TOKENS, CMD_HISTORY, CMD_STATS, CMD_TRANSLATE,
    };

    fn prefs() -> Preferences {
        let mut prefs = Preferences::default();
        prefs.gemini_api_key = "g-key".into();
        prefs.openai_api_key = "sk-key".into();
        // Point the prompt dir somewhere empty so built-in prompts apply.
        prefs.prompt_dir = "/nonexistent-prompt-dir".into();
        prefs
    }

    fn invocation(query: &str) -> Invocation {
        Invocation {
            query: Some(query.into()),
            fallback_text: None,
            attachment_file: None,
        }
    }

    #[test]
    fn test_missing_credential_fails_fast() {
        let mut p = prefs();
        p.gemini_api_key = String::new();
        let err = build(CMD_ASK, &invocation("q"), &p).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { provider: "Gemini" }));

        let mut p = prefs();
        p.openai_api_key = "  ".into();
        p.default_model = "gpt-4.1".into();
        let err = build(CMD_ASK, &invocation("q"), &p).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { provider: "OpenAI" }));
    }

    #[test]
    fn test_model_resolution_precedence() {
        let mut p = prefs();
        assert_eq!(effective_model(CMD_ASK, &p), models::DEFAULT_MODEL);

        p.custom_model = "My-Custom-Model".into();
        assert_eq!(effective_model(CMD_ASK, &p), "my-custom-model");

        p.command_models.insert(CMD_ASK.into(), "gpt-4.1".into());
        assert_eq!(effective_model(CMD_ASK, &p), "gpt-4.1");

        p.command_models.insert(CMD_ASK.into(), "default".into());
        assert_eq!(effective_model(CMD_ASK, &p), "my-custom-model");
    }

    #[test]
    fn test_utility_commands_skip_prompt_composition() {
        let p = prefs();
        for action in [CMD_COUNT_TOKENS, CMD_HISTORY, CMD_STATS] {
            let config = build(action, &invocation("text"), &p).unwrap();
            assert_eq!(config.model.system_prompt, "");
            assert_eq!(config.model.max_output_tokens, UTILITY_MAX_TOKENS);
            assert!(config.model.reasoning.is_none());
            assert!(config.model.safety.is_none());
            assert!((config.model.temperature - 0.3).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_gemini_config_shape() {
        let p = prefs();
        let config = build(CMD_ASK, &invocation("hello"), &p).unwrap();
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.model.max_output_tokens, GEMINI_MAX_TOKENS);
        assert_eq!(config.model.top_k, Some(0));
        assert!(config.model.safety.is_some());
        assert!(config.model.system_prompt.contains("Language Policy"));
    }

    #[test]
    fn test_openai_reasoning_config_shape() {
        let mut p = prefs();
        p.default_model = "o4-mini".into();
        let config = build(CMD_ASK, &invocation("hello"), &p).unwrap();
        assert_eq!(config.provider, Provider::OpenAi);
        assert_eq!(config.model.max_output_tokens, OPENAI_REASONING_MAX_TOKENS);
        assert_eq!(config.model.temperature, 1.0);
        assert!(config.model.top_p.is_none());
        let reasoning = config.model.reasoning.expect("reasoning config expected");
        assert_eq!(reasoning.thinking_budget, 100_000);
    }

    #[test]
    fn test_gateway_routing_with_base_url() {
        let mut p = prefs();
        p.default_model = "gpt-4.1".into();
        p.openai_base_url = "https://gateway.local/v1api".into();
        let config = build(CMD_ASK, &invocation("hello"), &p).unwrap();
        assert_eq!(config.provider, Provider::Gateway);
        assert_eq!(
            config.model.openai_base_url.as_deref(),
            Some("https://gateway.local/v1api")
        );

        // Gemini models are unaffected by the base URL.
        p.default_model = "gemini-2.0-flash".into();
        let config = build(CMD_ASK, &invocation("hello"), &p).unwrap();
        assert_eq!(config.provider, Provider::Gemini);
    }

    #[test]
    fn test_chat_carries_history_window() {
        let mut p = prefs();
        p.chat_history_window = 25;
        let config = build(CMD_CHAT, &invocation("hi"), &p).unwrap();
        assert_eq!(config.chat.unwrap().history_window, 25);

        let config = build(CMD_ASK, &invocation("hi"), &p).unwrap();
        assert!(config.chat.is_none());
    }

    #[test]
    fn test_custom_prompt_annotates_display_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ask.md"), "Own prompt.").unwrap();
        let mut p = prefs();
        p.prompt_dir = dir.path().to_string_lossy().to_string();

        let config = build(CMD_ASK, &invocation("q"), &p).unwrap();
        assert!(config.model.display_name.starts_with(CUSTOM_PROMPT_GLYPH));
    }

    #[test]
    fn test_command_overrides() {
        let p = prefs();
        let mut config = build(CMD_TRANSLATE, &invocation("hola"), &p).unwrap();
        apply_command_overrides(&mut config);
        assert!((config.model.temperature - 0.7).abs() < f32::EPSILON);

        let mut config = build(CMD_ASK, &invocation("q"), &p).unwrap();
        apply_command_overrides(&mut config);
        assert!(!config.ui.use_selected_text);
    }

    #[test]
    fn test_translate_end_to_end_prompt() {
        let mut p = prefs();
        p.primary_language = "Spanish".into();
        p.secondary_language = "English".into();

        let config = build(CMD_TRANSLATE, &invocation("Hello world"), &p).unwrap();
        assert!(config
            .model
            .system_prompt
            .contains("in SPANISH then translate it to ENGLISH"));
        assert!(config.model.system_prompt.contains("translate the following text to SPANISH"));
        assert_eq!(config.request.query, "Hello world");
        assert_eq!(config.request.action_id, CMD_TRANSLATE);
    }

    #[test]
    fn test_unknown_command_rejected() {
        let err = build("bogus", &invocation("q"), &prefs()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCommand(_)));
    }
}
