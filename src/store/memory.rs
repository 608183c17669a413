//! 进程内存储

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{Storage, StoreError};
use crate::event::{Event, EventCode, NewEvent, NotificationRule};
use crate::notification::channel::ChannelConfig;

#[derive(Default)]
struct MemoryState {
    events: Vec<Event>,
    rules: BTreeMap<EventCode, NotificationRule>,
    next_id: u64,
}

/// 进程内存储（测试、dry-run）
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    channels: Vec<ChannelConfig>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channels(channels: Vec<ChannelConfig>) -> Self {
        Self {
            state: Mutex::default(),
            channels,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn update_event<F>(&self, id: u64, f: F) -> Result<Event, StoreError>
    where
        F: FnOnce(&mut Event),
    {
        let mut state = self.lock()?;
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))?;
        f(event);
        Ok(event.clone())
    }
}

impl Storage for MemoryStore {
    fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let event = event.into_event(state.next_id);
        state.events.push(event.clone());
        Ok(event)
    }

    fn close_event(&self, id: u64, end: DateTime<Utc>) -> Result<Event, StoreError> {
        self.update_event(id, |e| e.timestamp_utc_end = Some(end))
    }

    fn latest_open_event(&self, ups_name: &str, event_type: EventCode) -> Result<Option<Event>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .events
            .iter()
            .rev()
            .find(|e| e.ups_name == ups_name && e.event_type == event_type && e.is_open())
            .cloned())
    }

    fn acknowledge(&self, id: u64) -> Result<Event, StoreError> {
        self.update_event(id, |e| e.acknowledged = true)
    }

    fn events_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .events
            .iter()
            .filter(|e| e.timestamp_utc_begin >= from && e.timestamp_utc_begin < to)
            .cloned()
            .collect())
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        let state = self.lock()?;
        let start = state.events.len().saturating_sub(limit);
        Ok(state.events[start..].to_vec())
    }

    fn get_rule(&self, event_type: EventCode) -> Result<Option<NotificationRule>, StoreError> {
        Ok(self.lock()?.rules.get(&event_type).cloned())
    }

    fn insert_rule(&self, rule: NotificationRule) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.rules.contains_key(&rule.event_type) {
            return Err(StoreError::Conflict(format!(
                "rule for {} already exists",
                rule.event_type
            )));
        }
        state.rules.insert(rule.event_type, rule);
        Ok(())
    }

    fn update_rule(&self, rule: NotificationRule) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        match state.rules.get_mut(&rule.event_type) {
            Some(existing) => {
                *existing = rule;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("rule for {}", rule.event_type))),
        }
    }

    fn list_rules(&self) -> Result<Vec<NotificationRule>, StoreError> {
        Ok(self.lock()?.rules.values().cloned().collect())
    }

    fn get_channel_config(&self, channel_ref: &str) -> Result<Option<ChannelConfig>, StoreError> {
        Ok(self.channels.iter().find(|c| c.id == channel_ref).cloned())
    }

    fn list_channel_configs(&self) -> Result<Vec<ChannelConfig>, StoreError> {
        Ok(self.channels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event(ups: &str, code: EventCode, at: &str) -> NewEvent {
        NewEvent {
            timestamp_utc_begin: at.parse().unwrap(),
            ups_name: ups.to_string(),
            event_type: code,
            raw_message: format!("{} {}", ups, code),
            source_ip: None,
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let store = MemoryStore::new();
        let a = store.insert_event(new_event("ups@a", EventCode::Onbatt, "2024-01-01T00:00:00Z")).unwrap();
        let b = store.insert_event(new_event("ups@a", EventCode::Online, "2024-01-01T00:05:00Z")).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_duplicate_rule_is_rejected() {
        let store = MemoryStore::new();
        store.insert_rule(NotificationRule::disabled(EventCode::Onbatt)).unwrap();
        let err = store.insert_rule(NotificationRule::disabled(EventCode::Onbatt)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn test_latest_open_event_and_close() {
        let store = MemoryStore::new();
        let ev = store.insert_event(new_event("ups@a", EventCode::Onbatt, "2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(
            store.latest_open_event("ups@a", EventCode::Onbatt).unwrap().map(|e| e.id),
            Some(ev.id)
        );

        store.close_event(ev.id, "2024-01-01T00:10:00Z".parse().unwrap()).unwrap();
        assert!(store.latest_open_event("ups@a", EventCode::Onbatt).unwrap().is_none());
    }

    #[test]
    fn test_events_between_is_half_open() {
        let store = MemoryStore::new();
        store.insert_event(new_event("ups@a", EventCode::Onbatt, "2024-01-01T00:00:00Z")).unwrap();
        store.insert_event(new_event("ups@a", EventCode::Online, "2024-01-02T00:00:00Z")).unwrap();

        let events = store
            .events_between(
                "2024-01-01T00:00:00Z".parse().unwrap(),
                "2024-01-02T00:00:00Z".parse().unwrap(),
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventCode::Onbatt);
    }

    #[test]
    fn test_acknowledge_unknown_id() {
        let store = MemoryStore::new();
        assert!(matches!(store.acknowledge(42), Err(StoreError::NotFound(_))));
    }
}
