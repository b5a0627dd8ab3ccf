//! Usage accounting types: normalized provider usage, per-request stats,
//! and the append-only history record.

use serde::{Deserialize, Serialize};

/// Characters-per-token ratio used whenever a provider omits usage data.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Usage counters normalized across provider-specific metadata shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
}

/// Final accounting for one completed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestStats {
    /// All input tokens (system prompt + user query), provider-reported.
    pub prompt_tokens: u64,
    /// Estimated user-only input tokens: prompt total minus an estimated
    /// system-prompt count, clamped at zero. Approximate, never
    /// billing-grade.
    pub user_input_tokens: u64,
    pub reasoning_tokens: u64,
    pub total_tokens: u64,
    pub first_response_secs: f64,
    pub total_secs: f64,
}

/// One completed request in the local log. Written once, never edited;
/// cost is recomputed from `(model_id, stats)` on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub timestamp_ms: i64,
    pub action_id: String,
    pub model_id: String,
    pub query: String,
    #[serde(default)]
    pub had_attachment: bool,
    pub response: String,
    pub stats: RequestStats,
    pub stats_line: String,
}

/// Fixed 4:1 characters-per-token estimate, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(CHARS_PER_TOKEN)
}

/// Human-readable stats footer shown under every response.
pub fn render_stats_line(display_name: &str, temperature: f32, stats: &RequestStats) -> String {
    format!(
        "{}; {}°; Time: {:.1} sec; P:{} + I:{} + T:{} ~ {} tokens",
        display_name,
        temperature,
        stats.total_secs,
        stats.prompt_tokens,
        stats.user_input_tokens,
        stats.reasoning_tokens,
        stats.total_tokens,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_stats_line_format() {
        let stats = RequestStats {
            prompt_tokens: 120,
            user_input_tokens: 80,
            reasoning_tokens: 0,
            total_tokens: 200,
            first_response_secs: 0.4,
            total_secs: 2.35,
        };
        let line = render_stats_line("2.5 Flash", 0.3, &stats);
        assert_eq!(line, "2.5 Flash; 0.3°; Time: 2.3 sec; P:120 + I:80 + T:0 ~ 200 tokens");
    }
}
