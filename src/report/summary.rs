//! 报表汇总

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::window::ReportWindow;
use crate::event::{Event, EventCode};

/// 一个窗口内的事件汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub window: ReportWindow,
    pub total_events: usize,
    pub unacknowledged: usize,
    pub counts: BTreeMap<EventCode, usize>,
    /// 窗口内开始的 ONBATT 次数
    pub battery_episodes: usize,
    /// 电池供电总秒数（截断到窗口结束）
    pub seconds_on_battery: i64,
    /// 窗口结束时仍未恢复市电的设备
    pub open_episodes: Vec<String>,
}

impl ReportSummary {
    /// 汇总 `events`；不在窗口内的事件会被忽略
    pub fn from_events(window: ReportWindow, events: &[Event]) -> Self {
        let mut summary = Self {
            window,
            total_events: 0,
            unacknowledged: 0,
            counts: BTreeMap::new(),
            battery_episodes: 0,
            seconds_on_battery: 0,
            open_episodes: Vec::new(),
        };

        for event in events.iter().filter(|e| window.contains(e.timestamp_utc_begin)) {
            summary.total_events += 1;
            if !event.acknowledged {
                summary.unacknowledged += 1;
            }
            *summary.counts.entry(event.event_type).or_insert(0) += 1;

            if event.event_type == EventCode::Onbatt {
                summary.battery_episodes += 1;
                summary.seconds_on_battery += clipped_seconds(event, window.to_utc);
                if event.timestamp_utc_end.map_or(true, |end| end > window.to_utc)
                    && !summary.open_episodes.contains(&event.ups_name)
                {
                    summary.open_episodes.push(event.ups_name.clone());
                }
            }
        }

        summary
    }

    pub fn count(&self, code: EventCode) -> usize {
        self.counts.get(&code).copied().unwrap_or(0)
    }
}

fn clipped_seconds(event: &Event, to: DateTime<Utc>) -> i64 {
    let end = event.timestamp_utc_end.map_or(to, |end| end.min(to));
    (end - event.timestamp_utc_begin).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NewEvent;
    use crate::report::window::PeriodType;

    fn window() -> ReportWindow {
        ReportWindow {
            from_utc: "2024-03-14T00:00:00Z".parse().unwrap(),
            to_utc: "2024-03-15T00:00:00Z".parse().unwrap(),
            period_type: PeriodType::Yesterday,
        }
    }

    fn event(id: u64, code: EventCode, begin: &str, end: Option<&str>) -> Event {
        let mut event = NewEvent {
            timestamp_utc_begin: begin.parse().unwrap(),
            ups_name: "ups@localhost".to_string(),
            event_type: code,
            raw_message: String::new(),
            source_ip: None,
        }
        .into_event(id);
        event.timestamp_utc_end = end.map(|e| e.parse().unwrap());
        event
    }

    #[test]
    fn test_counts_and_unacknowledged() {
        let mut acked = event(2, EventCode::Online, "2024-03-14T10:10:00Z", None);
        acked.acknowledged = true;
        let events = vec![
            event(1, EventCode::Onbatt, "2024-03-14T10:00:00Z", Some("2024-03-14T10:10:00Z")),
            acked,
            event(3, EventCode::Lowbatt, "2024-03-14T11:00:00Z", None),
        ];

        let summary = ReportSummary::from_events(window(), &events);
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.unacknowledged, 2);
        assert_eq!(summary.count(EventCode::Onbatt), 1);
        assert_eq!(summary.count(EventCode::Fsd), 0);
        assert_eq!(summary.battery_episodes, 1);
        assert_eq!(summary.seconds_on_battery, 600);
        assert!(summary.open_episodes.is_empty());
    }

    #[test]
    fn test_open_episode_is_clipped_to_window_end() {
        let events = vec![
            event(1, EventCode::Onbatt, "2024-03-14T23:00:00Z", None),
            event(2, EventCode::Onbatt, "2024-03-14T22:00:00Z", Some("2024-03-15T02:00:00Z")),
        ];

        let summary = ReportSummary::from_events(window(), &events);
        assert_eq!(summary.battery_episodes, 2);
        assert_eq!(summary.seconds_on_battery, 3600 + 7200);
        assert_eq!(summary.open_episodes, vec!["ups@localhost".to_string()]);
    }

    #[test]
    fn test_events_outside_window_are_ignored() {
        let events = vec![event(1, EventCode::Onbatt, "2024-03-15T00:00:00Z", None)];
        let summary = ReportSummary::from_events(window(), &events);
        assert_eq!(summary.total_events, 0);
        assert_eq!(summary.seconds_on_battery, 0);
    }
}
