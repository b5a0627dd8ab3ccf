//! Persistent chat transcript.
//!
//! One JSON array of messages under the config dir. Each outbound turn
//! carries the last `history_window` messages as conversational context,
//! folded into the user content as a dialog block.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use shared::settings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    /// "user" | "assistant"
    pub role: String,
    pub content: String,
    pub timestamp_ms: i64,
}

impl ChatMessage {
    pub fn new(role: &str, content: &str, timestamp_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.to_string(),
            content: content.to_string(),
            timestamp_ms,
        }
    }
}

pub struct ChatStore {
    path: PathBuf,
}

impl ChatStore {
    pub fn open_default() -> Result<Self> {
        let dir = settings::config_dir().ok_or_else(|| anyhow!("no config directory"))?;
        Ok(Self::with_path(dir.join("chat.json")))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Vec<ChatMessage> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    pub fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(messages)?)?;
        Ok(())
    }

    pub fn append(&self, message: ChatMessage) -> Result<()> {
        let mut messages = self.load();
        messages.push(message);
        self.save(&messages)
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The last `window` messages, oldest first.
pub fn window(messages: &[ChatMessage], window: usize) -> &[ChatMessage] {
    let start = messages.len().saturating_sub(window);
    &messages[start..]
}

/// Fold prior turns into a dialog block the model reads as context.
pub fn transcript_block(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let mut block = String::from("Previous conversation:\n");
    for message in messages {
        let speaker = if message.role == "assistant" { "Assistant" } else { "User" };
        block.push_str(&format!("{}: {}\n", speaker, message.content));
    }
    block
}

/// The full user turn sent to the provider: context block plus the new
/// message.
pub fn build_turn(messages: &[ChatMessage], window_size: usize, new_message: &str) -> String {
    let context = transcript_block(window(messages, window_size));
    if context.is_empty() {
        new_message.to_string()
    } else {
        format!("{}\nUser: {}", context, new_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: &str, content: &str) -> ChatMessage {
        ChatMessage::new(role, content, 0)
    }

    #[test]
    fn test_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChatStore::with_path(dir.path().join("chat.json"));

        store.append(message("user", "hello")).unwrap();
        store.append(message("assistant", "hi there")).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].role, "assistant");

        store.clear().unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_window_takes_most_recent() {
        let messages: Vec<ChatMessage> = (0..5)
            .map(|i| message("user", &format!("m{}", i)))
            .collect();
        let windowed = window(&messages, 2);
        assert_eq!(windowed.len(), 2);
        assert_eq!(windowed[0].content, "m3");
        assert_eq!(windowed[1].content, "m4");

        assert_eq!(window(&messages, 10).len(), 5);
    }

    #[test]
    fn test_build_turn_with_and_without_context() {
        assert_eq!(build_turn(&[], 10, "first"), "first");

        let messages = vec![message("user", "hello"), message("assistant", "hi")];
        let turn = build_turn(&messages, 10, "how are you?");
        assert!(turn.starts_with("Previous conversation:\n"));
        assert!(turn.contains("User: hello"));
        assert!(turn.contains("Assistant: hi"));
        assert!(turn.ends_with("User: how are you?"));
    }
}
