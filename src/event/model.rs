//! 事件与通知规则记录

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::code::EventCode;

/// 一次 UPS 状态变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// 存储分配的 ID（单调递增）
    pub id: u64,
    pub timestamp_utc: DateTime<Utc>,
    pub timestamp_utc_begin: DateTime<Utc>,
    /// 事件结束时间（例如市电恢复时关闭 ONBATT）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc_end: Option<DateTime<Utc>>,
    pub ups_name: String,
    pub event_type: EventCode,
    pub raw_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Event {
    pub fn is_open(&self) -> bool {
        self.timestamp_utc_end.is_none()
    }
}

/// 待写入的事件（尚无 ID）
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub timestamp_utc_begin: DateTime<Utc>,
    pub ups_name: String,
    pub event_type: EventCode,
    pub raw_message: String,
    pub source_ip: Option<String>,
}

impl NewEvent {
    /// 由存储层分配 ID 后生成完整事件
    pub fn into_event(self, id: u64) -> Event {
        Event {
            id,
            timestamp_utc: self.timestamp_utc_begin,
            timestamp_utc_begin: self.timestamp_utc_begin,
            timestamp_utc_end: None,
            ups_name: self.ups_name,
            event_type: self.event_type,
            raw_message: self.raw_message,
            source_ip: self.source_ip,
            acknowledged: false,
        }
    }
}

/// 事件类型 → 通知渠道的规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub event_type: EventCode,
    pub enabled: bool,
    /// 渠道配置 ID；为空时发送到所有启用的渠道
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_ref: Option<String>,
}

impl NotificationRule {
    /// 初始化时使用的默认规则（禁用）
    pub fn disabled(event_type: EventCode) -> Self {
        Self {
            event_type,
            enabled: false,
            channel_ref: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_into_event_defaults() {
        let now = Utc::now();
        let event = NewEvent {
            timestamp_utc_begin: now,
            ups_name: "ups@localhost".to_string(),
            event_type: EventCode::Onbatt,
            raw_message: "UPS ups@localhost on battery".to_string(),
            source_ip: None,
        }
        .into_event(7);

        assert_eq!(event.id, 7);
        assert_eq!(event.timestamp_utc, now);
        assert_eq!(event.timestamp_utc_begin, now);
        assert!(event.is_open());
        assert!(!event.acknowledged);
    }

    #[test]
    fn test_event_backward_compat() {
        // 旧记录没有 end / source_ip / acknowledged 字段
        let json = r#"{"id":1,"timestamp_utc":"2024-03-14T10:00:00Z","timestamp_utc_begin":"2024-03-14T10:00:00Z","ups_name":"ups@localhost","event_type":"ONLINE","raw_message":"x"}"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, EventCode::Online);
        assert!(event.source_ip.is_none());
        assert!(!event.acknowledged);
    }
}
