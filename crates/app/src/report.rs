//! Read-only rendering of the history list and the stats report.

use chrono::{Local, TimeZone};

use services::stats;
use shared::models::CustomPricing;
use shared::stats::HistoryItem;

/// "7 August, 14:05" style timestamp for list rows.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).earliest() {
        Some(dt) => dt.format("%-d %B, %H:%M").to_string(),
        None => "unknown time".to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// The history list: newest first, one block per entry with the recorded
/// stats footer and the recomputed cost.
pub fn render_history(items: &[HistoryItem], limit: usize, custom: CustomPricing) -> String {
    if items.is_empty() {
        return "History is empty.".to_string();
    }

    let mut out = String::new();
    for item in items.iter().take(limit) {
        let action = shared::commands::get(&item.action_id)
            .map(|c| c.name)
            .unwrap_or(item.action_id.as_str());
        out.push_str(&format!(
            "[{}] {} ({}){}\n  Q: {}\n  A: {}\n  {} | ${:.4}\n\n",
            format_timestamp(item.timestamp_ms),
            action,
            item.model_id,
            if item.had_attachment { " +file" } else { "" },
            truncate(&item.query, 120),
            truncate(&item.response, 200),
            item.stats_line,
            stats::item_cost(item, custom),
        ));
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    out.push_str(&stats::render_summary_line(items, now_ms));
    out.push('\n');
    out
}

pub fn render_stats(items: &[HistoryItem], custom: CustomPricing) -> String {
    stats::render_report(items, custom, Local::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::stats::RequestStats;

    fn item(query: &str) -> HistoryItem {
        HistoryItem {
            timestamp_ms: 0,
            action_id: "ask".into(),
            model_id: "gemini-2.0-flash".into(),
            query: query.into(),
            had_attachment: false,
            response: "a response".into(),
            stats: RequestStats::default(),
            stats_line: "line".into(),
        }
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(
            render_history(&[], 20, CustomPricing::default()),
            "History is empty."
        );
    }

    #[test]
    fn test_history_respects_limit() {
        let items: Vec<HistoryItem> = (0..5).map(|i| item(&format!("q{}", i))).collect();
        let rendered = render_history(&items, 2, CustomPricing::default());
        assert!(rendered.contains("q0"));
        assert!(rendered.contains("q1"));
        assert!(!rendered.contains("q2"));
        assert!(rendered.contains("Total 5."));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }
}
