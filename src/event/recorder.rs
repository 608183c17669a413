//! 事件记录 - 写入存储并尽力推送给 UI

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::code::EventCode;
use super::model::{Event, NewEvent};
use crate::notification::realtime::RealtimePush;
use crate::store::{Storage, StoreError};

/// 实时推送的 topic
pub const REALTIME_TOPIC: &str = "ups_event";

/// 默认推送超时
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// 事件记录器
pub struct EventRecorder {
    storage: Arc<dyn Storage>,
    push: Arc<dyn RealtimePush>,
    push_timeout: Duration,
}

impl EventRecorder {
    pub fn new(storage: Arc<dyn Storage>, push: Arc<dyn RealtimePush>) -> Self {
        Self {
            storage,
            push,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }

    /// 设置推送超时
    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// 写入事件
    ///
    /// 存储失败直接返回 `StoreError`，不重试；写入成功后的推送和
    /// ONBATT 关闭失败只记日志。
    pub async fn record(
        &self,
        ups_id: &str,
        event_code: EventCode,
        raw_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Event, StoreError> {
        let event = self.storage.insert_event(NewEvent {
            timestamp_utc_begin: now,
            ups_name: ups_id.to_string(),
            event_type: event_code,
            raw_message: raw_message.to_string(),
            source_ip: source_ip_from_ups_id(ups_id),
        })?;

        info!(
            id = event.id,
            ups = %event.ups_name,
            event_type = %event.event_type,
            "UPS event recorded"
        );

        if event_code == EventCode::Online {
            self.close_battery_episode(ups_id, now);
        }

        self.publish(&event).await;
        Ok(event)
    }

    /// 市电恢复：关闭该 UPS 最近一次未结束的 ONBATT
    fn close_battery_episode(&self, ups_id: &str, now: DateTime<Utc>) {
        let result = self
            .storage
            .latest_open_event(ups_id, EventCode::Onbatt)
            .and_then(|open| match open {
                Some(open) => self.storage.close_event(open.id, now).map(Some),
                None => Ok(None),
            });

        match result {
            Ok(Some(closed)) => debug!(id = closed.id, ups = %ups_id, "Closed on-battery episode"),
            Ok(None) => {}
            Err(e) => warn!(ups = %ups_id, error = %e, "Failed to close on-battery episode"),
        }
    }

    /// 推送到实时渠道，超时或失败都吞掉
    async fn publish(&self, event: &Event) {
        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to encode realtime payload");
                return;
            }
        };

        let push = Arc::clone(&self.push);
        // 超时后任务仍在后台运行，HttpPush 的客户端超时限制它的寿命
        let task = tokio::task::spawn_blocking(move || push.publish(REALTIME_TOPIC, &payload));

        match tokio::time::timeout(self.push_timeout, task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(id = event.id, error = %e, "Realtime push failed"),
            Ok(Err(e)) => warn!(id = event.id, error = %e, "Realtime push task panicked"),
            Err(_) => warn!(id = event.id, timeout = ?self.push_timeout, "Realtime push timed out"),
        }
    }
}

/// `ups@192.168.1.5:3493` → `192.168.1.5`；host 不是 IP 字面量时返回 None
pub fn source_ip_from_ups_id(ups_id: &str) -> Option<String> {
    let (_, host) = ups_id.split_once('@')?;
    let host = host.trim_end_matches(':');

    if let Some(rest) = host.strip_prefix('[') {
        let inner = rest.split(']').next()?;
        return inner.parse::<IpAddr>().ok().map(|ip| ip.to_string());
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(ip.to_string());
    }
    let (h, port) = host.rsplit_once(':')?;
    if !port.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    h.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::realtime::NoopPush;
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingPush {
        calls: AtomicUsize,
    }

    impl RealtimePush for FailingPush {
        fn publish(&self, _topic: &str, _payload: &serde_json::Value) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("ui offline"))
        }
    }

    struct SlowPush;

    impl RealtimePush for SlowPush {
        fn publish(&self, _topic: &str, _payload: &serde_json::Value) -> anyhow::Result<()> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_record_sets_timestamps_and_defaults() {
        let store = Arc::new(MemoryStore::new());
        let recorder = EventRecorder::new(store.clone(), Arc::new(NoopPush));

        let now = at("2024-03-14T10:00:00Z");
        let event = recorder
            .record("ups@10.0.0.2", EventCode::Onbatt, "UPS ups@10.0.0.2 on battery", now)
            .await
            .unwrap();

        assert_eq!(event.timestamp_utc, now);
        assert_eq!(event.timestamp_utc_begin, now);
        assert!(event.timestamp_utc_end.is_none());
        assert!(!event.acknowledged);
        assert_eq!(event.source_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(store.recent_events(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let push = Arc::new(FailingPush {
            calls: AtomicUsize::new(0),
        });
        let recorder = EventRecorder::new(store.clone(), push.clone());

        let result = recorder
            .record("ups@localhost", EventCode::Lowbatt, "battery is low", Utc::now())
            .await;

        assert!(result.is_ok());
        assert_eq!(push.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_push_does_not_block_past_timeout() {
        let store = Arc::new(MemoryStore::new());
        let recorder = EventRecorder::new(store, Arc::new(SlowPush))
            .with_push_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        recorder
            .record("ups@localhost", EventCode::Onbatt, "on battery", Utc::now())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_online_closes_open_battery_episode() {
        let store = Arc::new(MemoryStore::new());
        let recorder = EventRecorder::new(store.clone(), Arc::new(NoopPush));

        let onbatt = recorder
            .record("ups@localhost", EventCode::Onbatt, "on battery", at("2024-03-14T10:00:00Z"))
            .await
            .unwrap();
        recorder
            .record("ups@localhost", EventCode::Online, "on line power", at("2024-03-14T10:12:00Z"))
            .await
            .unwrap();

        let events = store.recent_events(10).unwrap();
        let closed = events.iter().find(|e| e.id == onbatt.id).unwrap();
        assert_eq!(closed.timestamp_utc_end, Some(at("2024-03-14T10:12:00Z")));
    }

    #[test]
    fn test_source_ip_from_ups_id() {
        assert_eq!(source_ip_from_ups_id("ups@127.0.0.1").as_deref(), Some("127.0.0.1"));
        assert_eq!(source_ip_from_ups_id("ups@192.168.1.5:3493").as_deref(), Some("192.168.1.5"));
        assert_eq!(source_ip_from_ups_id("ups@[::1]:3493").as_deref(), Some("::1"));
        assert_eq!(source_ip_from_ups_id("ups@localhost"), None);
        assert_eq!(source_ip_from_ups_id("no-host"), None);
    }
}
