//! User preferences: one closed struct with documented defaults per field,
//! persisted as JSON under the platform config directory.
//!
//! Preferences are read once at the top of a command invocation and passed
//! explicitly down the builder chain.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

fn default_primary_language() -> String {
    "English".to_string()
}

fn default_secondary_language() -> String {
    "Spanish".to_string()
}

fn default_model() -> String {
    crate::models::DEFAULT_MODEL.to_string()
}

fn default_prompt_dir() -> String {
    "~/.config/promptdock/prompts".to_string()
}

fn default_chat_history_window() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// Language fixed-language commands answer in.
    #[serde(default = "default_primary_language")]
    pub primary_language: String,
    /// Second language of the translate/grammar pair.
    #[serde(default = "default_secondary_language")]
    pub secondary_language: String,
    /// Global default model id.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Non-empty custom model id beats `default_model`.
    #[serde(default)]
    pub custom_model: String,
    /// Optional per-1M price overrides for the custom model.
    #[serde(default)]
    pub custom_model_input_price: Option<f64>,
    #[serde(default)]
    pub custom_model_output_price: Option<f64>,
    /// Per-command model override; the literal "default" means "use the
    /// global model".
    #[serde(default)]
    pub command_models: HashMap<String, String>,
    /// Sampling temperature as entered by the user; parsed with a 0.3
    /// fallback on blank or unparseable input.
    #[serde(default)]
    pub temperature: String,
    /// Directory of per-command prompt files (`<action>.md`), `~` allowed.
    #[serde(default = "default_prompt_dir")]
    pub prompt_dir: String,
    #[serde(default)]
    pub gemini_api_key: String,
    #[serde(default)]
    pub openai_api_key: String,
    /// Custom base URL routes OpenAI-provider models through the
    /// OpenAI-compatible gateway adapter.
    #[serde(default)]
    pub openai_base_url: String,
    /// How many past chat messages travel with each chat turn.
    #[serde(default = "default_chat_history_window")]
    pub chat_history_window: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            primary_language: default_primary_language(),
            secondary_language: default_secondary_language(),
            default_model: default_model(),
            custom_model: String::new(),
            custom_model_input_price: None,
            custom_model_output_price: None,
            command_models: HashMap::new(),
            temperature: String::new(),
            prompt_dir: default_prompt_dir(),
            gemini_api_key: String::new(),
            openai_api_key: String::new(),
            openai_base_url: String::new(),
            chat_history_window: default_chat_history_window(),
        }
    }
}

impl Preferences {
    /// Sampling temperature with the documented 0.3 fallback.
    pub fn parsed_temperature(&self) -> f32 {
        let trimmed = self.temperature.trim();
        if trimmed.is_empty() {
            return 0.3;
        }
        trimmed.parse().unwrap_or(0.3)
    }

    /// Upper-cased primary language for prompt interpolation.
    pub fn primary_language_upper(&self) -> String {
        let lang = self.primary_language.trim();
        if lang.is_empty() {
            "ENGLISH".to_string()
        } else {
            lang.to_uppercase()
        }
    }

    pub fn secondary_language_upper(&self) -> String {
        let lang = self.secondary_language.trim();
        if lang.is_empty() {
            "SPANISH".to_string()
        } else {
            lang.to_uppercase()
        }
    }
}

/// App config directory (`<platform config dir>/promptdock`).
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("promptdock"))
}

pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("settings.json"))
}

pub fn load_from(path: &std::path::Path) -> Option<Preferences> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Load settings from disk or return defaults.
pub fn load_or_default() -> Preferences {
    settings_path()
        .and_then(|p| load_from(&p))
        .unwrap_or_default()
}

/// Best-effort save; failures are logged, not fatal.
pub fn save(preferences: &Preferences) {
    let Some(path) = settings_path() else {
        return;
    };
    save_to(preferences, &path);
}

pub fn save_to(preferences: &Preferences, path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(preferences) {
        Ok(json) => {
            if let Err(e) = std::fs::write(path, json) {
                tracing::warn!("failed to save settings: {}", e);
            }
        }
        Err(e) => tracing::warn!("failed to serialize settings: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_fallback() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.parsed_temperature(), 0.3);
        prefs.temperature = "  ".into();
        assert_eq!(prefs.parsed_temperature(), 0.3);
        prefs.temperature = "not-a-number".into();
        assert_eq!(prefs.parsed_temperature(), 0.3);
        prefs.temperature = "0.7".into();
        assert_eq!(prefs.parsed_temperature(), 0.7);
    }

    #[test]
    fn test_language_uppercasing() {
        let mut prefs = Preferences::default();
        prefs.primary_language = "french".into();
        assert_eq!(prefs.primary_language_upper(), "FRENCH");
        prefs.primary_language = "  ".into();
        assert_eq!(prefs.primary_language_upper(), "ENGLISH");
    }

    #[test]
    fn test_settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut prefs = Preferences::default();
        prefs.gemini_api_key = "k-123".into();
        prefs
            .command_models
            .insert("translate".into(), "gpt-4.1".into());
        save_to(&prefs, &path);

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.gemini_api_key, "k-123");
        assert_eq!(loaded.command_models["translate"], "gpt-4.1");
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"gemini_api_key":"abc"}"#).unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.gemini_api_key, "abc");
        assert_eq!(loaded.default_model, crate::models::DEFAULT_MODEL);
        assert_eq!(loaded.chat_history_window, 10);
    }
}
