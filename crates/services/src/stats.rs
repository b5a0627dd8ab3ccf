//! Read-only aggregation over the request history.
//!
//! Groups by trailing time window, calendar bucket, command, or model, and
//! derives per-group counts, cost, and token figures. Cost is recomputed
//! from the pricing table on every read; it is never stored on the items.

use chrono::{DateTime, Datelike, Duration, Local, TimeZone};
use std::collections::BTreeMap;

use shared::models::{self, CustomPricing};
use shared::stats::HistoryItem;

pub const MS_PER_HOUR: i64 = 60 * 60 * 1000;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
pub const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;
pub const MS_PER_MONTH: i64 = 30 * MS_PER_DAY;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GroupStats {
    pub count: usize,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub avg_tokens: f64,
    pub avg_latency_secs: f64,
}

/// Cost of one recorded request, derived from the pricing table.
pub fn item_cost(item: &HistoryItem, custom: CustomPricing) -> f64 {
    let descriptor = models::resolve(&item.model_id, Some(custom));
    models::cost(&descriptor, &item.stats)
}

pub fn aggregate<'a, I>(items: I, custom: CustomPricing) -> GroupStats
where
    I: IntoIterator<Item = &'a HistoryItem>,
{
    let mut stats = GroupStats::default();
    let mut total_latency = 0.0;
    for item in items {
        stats.count += 1;
        stats.total_cost += item_cost(item, custom);
        stats.total_tokens += item.stats.total_tokens;
        total_latency += item.stats.total_secs;
    }
    if stats.count > 0 {
        stats.avg_tokens = stats.total_tokens as f64 / stats.count as f64;
        stats.avg_latency_secs = total_latency / stats.count as f64;
    }
    stats
}

/// Entries whose age relative to `now_ms` is within the trailing window.
pub fn trailing<'a>(
    items: &'a [HistoryItem],
    window_ms: i64,
    now_ms: i64,
) -> impl Iterator<Item = &'a HistoryItem> {
    items
        .iter()
        .filter(move |item| now_ms - item.timestamp_ms <= window_ms)
}

pub fn group_by_action(items: &[HistoryItem]) -> BTreeMap<String, Vec<&HistoryItem>> {
    let mut groups: BTreeMap<String, Vec<&HistoryItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.action_id.clone()).or_default().push(item);
    }
    groups
}

pub fn group_by_model(items: &[HistoryItem]) -> BTreeMap<String, Vec<&HistoryItem>> {
    let mut groups: BTreeMap<String, Vec<&HistoryItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.model_id.clone()).or_default().push(item);
    }
    groups
}

// ── Calendar buckets ─────────────────────────────────────────────────

pub fn start_of_day(now: DateTime<Local>) -> i64 {
    let midnight = now.date_naive().and_hms_opt(0, 0, 0).expect("midnight");
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}

pub fn start_of_yesterday(now: DateTime<Local>) -> i64 {
    start_of_day(now - Duration::days(1))
}

/// Monday 00:00 of the current week.
pub fn start_of_week(now: DateTime<Local>) -> i64 {
    let days_back = now.weekday().num_days_from_monday() as i64;
    start_of_day(now - Duration::days(days_back))
}

pub fn start_of_month(now: DateTime<Local>) -> i64 {
    let first = now
        .date_naive()
        .with_day(1)
        .expect("first of month")
        .and_hms_opt(0, 0, 0)
        .expect("midnight");
    Local
        .from_local_datetime(&first)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| now.timestamp_millis())
}

fn between<'a>(
    items: &'a [HistoryItem],
    from_ms: i64,
    to_ms: Option<i64>,
) -> Vec<&'a HistoryItem> {
    items
        .iter()
        .filter(|item| {
            item.timestamp_ms >= from_ms && to_ms.map(|to| item.timestamp_ms < to).unwrap_or(true)
        })
        .collect()
}

// ── Rendering ────────────────────────────────────────────────────────

pub fn render_group(title: &str, stats: &GroupStats) -> String {
    if stats.count == 0 {
        return format!("### {}\n\nNo data for this period or category.\n", title);
    }
    format!(
        "### {}\n\n\
         * Requests: {}\n\
         * Total cost: ${:.4}\n\
         * Total tokens: {}\n\
         * Average tokens per request: {:.0}\n\
         * Response time: ~{:.2} sec\n",
        title,
        stats.count,
        stats.total_cost,
        stats.total_tokens,
        stats.avg_tokens,
        stats.avg_latency_secs,
    )
}

/// The full stats report: overall, calendar buckets, then per-command and
/// per-model sections ordered by request count.
pub fn render_report(items: &[HistoryItem], custom: CustomPricing, now: DateTime<Local>) -> String {
    let today = start_of_day(now);
    let yesterday = start_of_yesterday(now);
    let week = start_of_week(now);
    let month = start_of_month(now);

    let mut sections = vec![
        render_group("Overall statistics", &aggregate(items, custom)),
        render_group("For today", &aggregate(between(items, today, None), custom)),
        render_group(
            "For yesterday",
            &aggregate(between(items, yesterday, Some(today)), custom),
        ),
        render_group("For this week", &aggregate(between(items, week, None), custom)),
        render_group("For this month", &aggregate(between(items, month, None), custom)),
    ];

    let mut by_action: Vec<(String, GroupStats)> = group_by_action(items)
        .into_iter()
        .map(|(action, group)| (action, aggregate(group.into_iter(), custom)))
        .collect();
    by_action.sort_by(|a, b| b.1.count.cmp(&a.1.count));
    for (action, stats) in by_action {
        let name = shared::commands::get(&action)
            .map(|c| c.name)
            .unwrap_or(action.as_str());
        sections.push(render_group(&format!("Command: {}", name), &stats));
    }

    let mut by_model: Vec<(String, GroupStats)> = group_by_model(items)
        .into_iter()
        .map(|(model, group)| (model, aggregate(group.into_iter(), custom)))
        .collect();
    by_model.sort_by(|a, b| b.1.count.cmp(&a.1.count));
    for (model, stats) in by_model {
        sections.push(render_group(&format!("Model: {}", model), &stats));
    }

    sections.join("\n")
}

/// One-line summary shown in the history footer.
pub fn render_summary_line(items: &[HistoryItem], now_ms: i64) -> String {
    let hour = trailing(items, MS_PER_HOUR, now_ms).count();
    let day = trailing(items, MS_PER_DAY, now_ms).count();
    let week = trailing(items, MS_PER_WEEK, now_ms).count();
    let month = trailing(items, MS_PER_MONTH, now_ms).count();
    format!(
        "History: {}/h, {}/today, {}/week, {}/month. Total {}.",
        hour,
        day,
        week,
        month,
        items.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::stats::RequestStats;

    fn item(timestamp_ms: i64, action: &str, model: &str, total_tokens: u64) -> HistoryItem {
        HistoryItem {
            timestamp_ms,
            action_id: action.into(),
            model_id: model.into(),
            query: "q".into(),
            had_attachment: false,
            response: "r".into(),
            stats: RequestStats {
                prompt_tokens: total_tokens / 2,
                user_input_tokens: total_tokens / 4,
                reasoning_tokens: 0,
                total_tokens,
                first_response_secs: 0.5,
                total_secs: 2.0,
            },
            stats_line: String::new(),
        }
    }

    #[test]
    fn test_aggregate_basics() {
        let items = vec![
            item(0, "ask", "gpt-4.1", 100),
            item(0, "ask", "gpt-4.1", 300),
        ];
        let stats = aggregate(&items, CustomPricing::default());
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_tokens, 400);
        assert!((stats.avg_tokens - 200.0).abs() < 1e-9);
        assert!((stats.avg_latency_secs - 2.0).abs() < 1e-9);

        // gpt-4.1: input 2.0, output 8.0 per 1M; each item is 50 in + 50 out.
        let per_item = (50.0 / 1e6) * 2.0 + (50.0 / 1e6) * 8.0;
        let expected = per_item * 2.0;
        assert!((stats.total_cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_windows() {
        let now = 100 * MS_PER_DAY;
        let items = vec![
            item(now - MS_PER_HOUR / 2, "ask", "m", 10),
            item(now - 2 * MS_PER_HOUR, "ask", "m", 10),
            item(now - 2 * MS_PER_DAY, "ask", "m", 10),
            item(now - 40 * MS_PER_DAY, "ask", "m", 10),
        ];
        assert_eq!(trailing(&items, MS_PER_HOUR, now).count(), 1);
        assert_eq!(trailing(&items, MS_PER_DAY, now).count(), 2);
        assert_eq!(trailing(&items, MS_PER_WEEK, now).count(), 3);
        assert_eq!(trailing(&items, MS_PER_MONTH, now).count(), 3);
        assert_eq!(render_summary_line(&items, now), "History: 1/h, 2/today, 3/week, 3/month. Total 4.");
    }

    #[test]
    fn test_grouping() {
        let items = vec![
            item(0, "ask", "a-model", 10),
            item(1, "translate", "a-model", 10),
            item(2, "ask", "b-model", 10),
        ];
        let by_action = group_by_action(&items);
        assert_eq!(by_action["ask"].len(), 2);
        assert_eq!(by_action["translate"].len(), 1);

        let by_model = group_by_model(&items);
        assert_eq!(by_model["a-model"].len(), 2);
        assert_eq!(by_model["b-model"].len(), 1);
    }

    #[test]
    fn test_calendar_buckets_order() {
        let now = Local::now();
        let today = start_of_day(now);
        assert!(start_of_yesterday(now) < today);
        assert!(start_of_week(now) <= today);
        assert!(start_of_month(now) <= today);
        assert!(today <= now.timestamp_millis());
    }

    #[test]
    fn test_render_group_empty_and_filled() {
        let empty = render_group("Today", &GroupStats::default());
        assert!(empty.contains("No data"));

        let items = vec![item(0, "ask", "gpt-4.1", 100)];
        let rendered = render_group("Today", &aggregate(&items, CustomPricing::default()));
        assert!(rendered.contains("* Requests: 1"));
        assert!(rendered.contains("Total tokens: 100"));
    }
}
