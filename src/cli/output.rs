//! Output formatting for CLI commands

use chrono_tz::Tz;
use serde::Serialize;

use crate::event::{Event, NotificationRule};
use crate::notification::DispatchReport;
use crate::report::ReportSummary;

/// Pretty JSON; falls back to `{}` if serialization fails
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

/// 单行事件
pub fn format_event_line(event: &Event, tz: Tz) -> String {
    let begin = event.timestamp_utc_begin.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S");
    let end = event
        .timestamp_utc_end
        .map(|end| end.with_timezone(&tz).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let ack = if event.acknowledged { "✓" } else { " " };
    format!(
        "#{:<5} {} {} → {:<8} {:<12} {:<24} {}",
        event.id, ack, begin, end, event.event_type, event.ups_name, event.raw_message
    )
}

pub fn format_rule_line(rule: &NotificationRule) -> String {
    let state = if rule.enabled { "启用" } else { "禁用" };
    let channel = rule.channel_ref.as_deref().unwrap_or("(所有启用的渠道)");
    format!("{:<13} {}  {}", rule.event_type, state, channel)
}

/// 渠道分发结果
pub fn format_dispatch(report: &DispatchReport) -> String {
    if let Some(reason) = &report.skipped {
        return format!("  未发送通知: {}", reason);
    }
    report
        .results
        .iter()
        .map(|r| {
            let mark = if r.success { "✅" } else { "❌" };
            format!("  {} {} ({}): {}", mark, r.channel, r.kind, r.message)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 报表文本
pub fn format_summary(summary: &ReportSummary, tz: Tz) -> String {
    let window = &summary.window;
    let mut lines = vec![
        format!(
            "报表 ({}): {} ~ {} [{}]",
            window.period_type,
            window.from_utc.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            window.to_utc.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            tz
        ),
        format!("事件总数: {}（未确认 {}）", summary.total_events, summary.unacknowledged),
        format!(
            "电池供电: {} 次，共 {}",
            summary.battery_episodes,
            format_seconds(summary.seconds_on_battery)
        ),
    ];

    if !summary.open_episodes.is_empty() {
        lines.push(format!("仍在电池供电: {}", summary.open_episodes.join(", ")));
    }

    if !summary.counts.is_empty() {
        lines.push("按类型:".to_string());
        for (code, count) in &summary.counts {
            lines.push(format!("  {:<13} {}", code, count));
        }
    }
    lines.join("\n")
}

/// `3725` → `1h 2m 5s`
pub fn format_seconds(seconds: i64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}
