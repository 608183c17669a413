//! 文件存储 - 数据目录下的 JSONL 事件 + JSON 规则
//!
//! - `events.jsonl`：每行一个事件，追加写入
//! - `events.seq`：已分配的最大事件 ID，重写事件文件后 ID 也不会回退
//! - `rules.json`：通知规则数组
//! - `store.lock`：所有读写都在这个文件上加锁（写独占、读共享）

use chrono::{DateTime, Utc};
use fs2::FileExt;
use regex::Regex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

use super::{Storage, StoreError};
use crate::event::{Event, EventCode, NewEvent, NotificationRule};
use crate::notification::channel::ChannelConfig;

const EVENTS_FILE: &str = "events.jsonl";
const RULES_FILE: &str = "rules.json";
const LOCK_FILE: &str = "store.lock";
const SEQ_FILE: &str = "events.seq";

/// 半行里残留的 `"id":N`
fn torn_line_id(line: &str) -> Option<u64> {
    static ID: OnceLock<Option<Regex>> = OnceLock::new();
    ID.get_or_init(|| Regex::new(r#""id"\s*:\s*(\d+)"#).ok())
        .as_ref()?
        .captures(line)?
        .get(1)?
        .as_str()
        .parse()
        .ok()
}

/// 持有期间保持文件锁
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// 文件存储
pub struct FileStore {
    dir: PathBuf,
    channels: Vec<ChannelConfig>,
}

impl FileStore {
    /// 打开（必要时创建）数据目录
    pub fn open(dir: impl Into<PathBuf>, channels: Vec<ChannelConfig>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, channels })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    fn rules_path(&self) -> PathBuf {
        self.dir.join(RULES_FILE)
    }

    fn seq_path(&self) -> PathBuf {
        self.dir.join(SEQ_FILE)
    }

    fn lock_exclusive(&self) -> Result<StoreLock, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(StoreLock { file })
    }

    fn lock_shared(&self) -> Result<StoreLock, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.dir.join(LOCK_FILE))?;
        file.lock_shared()?;
        Ok(StoreLock { file })
    }

    /// 读取全部事件（调用方需持有锁）
    ///
    /// 无法解析的行（例如写入中途断电留下的半行）直接跳过。
    fn read_events(&self) -> Result<Vec<Event>, StoreError> {
        Ok(self.scan_events()?.0)
    }

    /// 读取全部事件，同时返回文件中出现过的最大 ID（包括半行里的 ID）
    fn scan_events(&self) -> Result<(Vec<Event>, u64), StoreError> {
        let path = self.events_path();
        if !path.exists() {
            return Ok((Vec::new(), 0));
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut events = Vec::new();
        let mut max_id = 0;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => {
                    max_id = max_id.max(event.id);
                    events.push(event);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable line in events file");
                    if let Some(id) = torn_line_id(&line) {
                        max_id = max_id.max(id);
                    }
                }
            }
        }
        Ok((events, max_id))
    }

    fn read_seq(&self) -> Result<u64, StoreError> {
        let path = self.seq_path();
        if !path.exists() {
            return Ok(0);
        }
        Ok(fs::read_to_string(&path)?.trim().parse().unwrap_or(0))
    }

    fn write_seq(&self, id: u64) -> Result<(), StoreError> {
        let path = self.seq_path();
        let temp_path = path.with_extension("seq.tmp");
        fs::write(&temp_path, id.to_string())?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// 整体重写事件文件：先写临时文件再原子替换（调用方需持有独占锁）
    fn write_events(&self, events: &[Event]) -> Result<(), StoreError> {
        let path = self.events_path();
        let temp_path = path.with_extension("tmp");
        {
            let mut temp_file = File::create(&temp_path)?;
            for event in events {
                writeln!(temp_file, "{}", serde_json::to_string(event)?)?;
            }
            temp_file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn read_rules(&self) -> Result<Vec<NotificationRule>, StoreError> {
        let path = self.rules_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_rules(&self, rules: &[NotificationRule]) -> Result<(), StoreError> {
        let path = self.rules_path();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(rules)?)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn update_event<F>(&self, id: u64, f: F) -> Result<Event, StoreError>
    where
        F: FnOnce(&mut Event),
    {
        let _lock = self.lock_exclusive()?;
        let mut events = self.read_events()?;
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("event {}", id)))?;
        f(event);
        let updated = event.clone();
        self.write_events(&events)?;
        Ok(updated)
    }
}

/// 空文件视为以换行结尾
fn ends_with_newline(file: &mut File) -> Result<bool, StoreError> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl Storage for FileStore {
    fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let _lock = self.lock_exclusive()?;

        let (_, max_id) = self.scan_events()?;
        let next_id = max_id.max(self.read_seq()?) + 1;
        let event = event.into_event(next_id);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(self.events_path())?;

        // 上次写入被中断时文件可能以半行结尾，先补上换行，新记录必须独占一行
        let mut line = String::new();
        if !ends_with_newline(&mut file)? {
            line.push('\n');
        }
        line.push_str(&serde_json::to_string(&event)?);
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        self.write_seq(next_id)?;

        Ok(event)
    }

    fn close_event(&self, id: u64, end: DateTime<Utc>) -> Result<Event, StoreError> {
        self.update_event(id, |e| e.timestamp_utc_end = Some(end))
    }

    fn latest_open_event(&self, ups_name: &str, event_type: EventCode) -> Result<Option<Event>, StoreError> {
        let _lock = self.lock_shared()?;
        Ok(self
            .read_events()?
            .into_iter()
            .rev()
            .find(|e| e.ups_name == ups_name && e.event_type == event_type && e.is_open()))
    }

    fn acknowledge(&self, id: u64) -> Result<Event, StoreError> {
        self.update_event(id, |e| e.acknowledged = true)
    }

    fn events_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        let _lock = self.lock_shared()?;
        let mut events: Vec<Event> = self
            .read_events()?
            .into_iter()
            .filter(|e| e.timestamp_utc_begin >= from && e.timestamp_utc_begin < to)
            .collect();
        events.sort_by_key(|e| e.id);
        Ok(events)
    }

    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        let _lock = self.lock_shared()?;
        let mut events = self.read_events()?;
        events.sort_by_key(|e| e.id);
        let start = events.len().saturating_sub(limit);
        Ok(events.split_off(start))
    }

    fn get_rule(&self, event_type: EventCode) -> Result<Option<NotificationRule>, StoreError> {
        let _lock = self.lock_shared()?;
        Ok(self
            .read_rules()?
            .into_iter()
            .find(|r| r.event_type == event_type))
    }

    fn insert_rule(&self, rule: NotificationRule) -> Result<(), StoreError> {
        let _lock = self.lock_exclusive()?;
        let mut rules = self.read_rules()?;
        if rules.iter().any(|r| r.event_type == rule.event_type) {
            return Err(StoreError::Conflict(format!(
                "rule for {} already exists",
                rule.event_type
            )));
        }
        rules.push(rule);
        self.write_rules(&rules)
    }

    fn update_rule(&self, rule: NotificationRule) -> Result<(), StoreError> {
        let _lock = self.lock_exclusive()?;
        let mut rules = self.read_rules()?;
        let existing = rules
            .iter_mut()
            .find(|r| r.event_type == rule.event_type)
            .ok_or_else(|| StoreError::NotFound(format!("rule for {}", rule.event_type)))?;
        *existing = rule;
        self.write_rules(&rules)
    }

    fn list_rules(&self) -> Result<Vec<NotificationRule>, StoreError> {
        let _lock = self.lock_shared()?;
        let mut rules = self.read_rules()?;
        rules.sort_by_key(|r| r.event_type);
        Ok(rules)
    }

    fn get_channel_config(&self, channel_ref: &str) -> Result<Option<ChannelConfig>, StoreError> {
        Ok(self.channels.iter().find(|c| c.id == channel_ref).cloned())
    }

    fn list_channel_configs(&self) -> Result<Vec<ChannelConfig>, StoreError> {
        Ok(self.channels.clone())
    }
}
