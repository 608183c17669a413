//! 事件与规则存储
//!
//! 核心只通过 `Storage` trait 读写，具体实现：
//! - `FileStore`：数据目录下的 JSONL 事件文件 + JSON 规则文件（带文件锁）
//! - `MemoryStore`：进程内存储，用于测试和 dry-run

pub mod file;
pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::event::{Event, EventCode, NewEvent, NotificationRule};
use crate::notification::channel::ChannelConfig;

pub use file::FileStore;
pub use memory::MemoryStore;

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    /// 唯一约束冲突（例如同一事件类型的第二条规则）
    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// 存储契约
pub trait Storage: Send + Sync {
    /// 写入事件并分配 ID（单条原子写入）
    fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError>;

    /// 设置事件结束时间
    fn close_event(&self, id: u64, end: DateTime<Utc>) -> Result<Event, StoreError>;

    /// 指定 UPS、指定类型的最近一条未关闭事件
    fn latest_open_event(&self, ups_name: &str, event_type: EventCode) -> Result<Option<Event>, StoreError>;

    /// 标记事件已确认
    fn acknowledge(&self, id: u64) -> Result<Event, StoreError>;

    /// 开始时间落在 `[from, to)` 的事件，按 ID 升序
    fn events_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Event>, StoreError>;

    /// 最近 N 条事件，按 ID 升序
    fn recent_events(&self, limit: usize) -> Result<Vec<Event>, StoreError>;

    fn get_rule(&self, event_type: EventCode) -> Result<Option<NotificationRule>, StoreError>;

    /// 插入规则；同一事件类型已存在时返回 `Conflict`，不覆盖
    fn insert_rule(&self, rule: NotificationRule) -> Result<(), StoreError>;

    /// 更新已有规则；不存在时返回 `NotFound`
    fn update_rule(&self, rule: NotificationRule) -> Result<(), StoreError>;

    fn list_rules(&self) -> Result<Vec<NotificationRule>, StoreError>;

    fn get_channel_config(&self, channel_ref: &str) -> Result<Option<ChannelConfig>, StoreError>;

    fn list_channel_configs(&self) -> Result<Vec<ChannelConfig>, StoreError>;
}

/// 为每个已知事件类型初始化一条禁用的规则
///
/// 幂等：已存在的规则保持不变，返回新插入的条数。
pub fn seed_rules(storage: &dyn Storage) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for code in EventCode::KNOWN {
        if storage.get_rule(code)?.is_some() {
            continue;
        }
        storage.insert_rule(NotificationRule::disabled(code))?;
        inserted += 1;
    }

    if inserted > 0 {
        info!(inserted, "Seeded notification rules");
    }
    Ok(inserted)
}
