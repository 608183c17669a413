//! 通知渠道 trait 与渠道配置

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use crate::event::{get_severity, Event, EventCode, Severity};
use crate::secret::{Secret, SecretError};

/// 发送给渠道的上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelContext {
    /// 事件 ID
    pub event_id: u64,
    /// UPS 设备标识
    pub ups_name: String,
    /// upsmon 原始消息
    pub message: String,
    /// 严重程度
    pub severity: Severity,
    /// 事件开始时间
    pub timestamp: DateTime<Utc>,
    /// 来源 IP
    pub source_ip: Option<String>,
}

impl ChannelContext {
    pub fn from_event(event: &Event) -> Self {
        Self {
            event_id: event.id,
            ups_name: event.ups_name.clone(),
            message: event.raw_message.clone(),
            severity: get_severity(event.event_type),
            timestamp: event.timestamp_utc_begin,
            source_ip: event.source_ip.clone(),
        }
    }

    /// 标题：`[UPS][ONBATT] ups@localhost`
    pub fn title(&self, event_type: EventCode) -> String {
        format!("[UPS][{}] {}", event_type, self.ups_name)
    }

    /// 纯文本正文
    pub fn body(&self, event_type: EventCode) -> String {
        format!(
            "UPS: {}\nEvent: {}\nSeverity: {}\nMessage: {}\nTime: {}",
            self.ups_name,
            event_type,
            self.severity,
            self.message,
            self.timestamp.to_rfc3339()
        )
    }
}

/// 渠道发送成功时的响应
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelResponse {
    pub message: String,
    pub status_code: Option<u16>,
}

impl ChannelResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// 渠道发送错误（只影响当前渠道）
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("SMTP error: {0}")]
    Mail(String),

    #[error("invalid channel configuration: {0}")]
    Config(String),

    #[error("secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("channel '{0}' is disabled")]
    Disabled(String),

    #[error("channel task failed: {0}")]
    Task(String),
}

impl ChannelError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ChannelError::Status { status, .. } => Some(*status),
            ChannelError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// 通知渠道能力：mail / webhook / push 都实现这一个 trait
pub trait ChannelSender: Send + Sync {
    /// 渠道配置 ID（用于日志和结果）
    fn name(&self) -> &str;

    /// 渠道类型：`mail` / `webhook` / `push`
    fn kind(&self) -> &str;

    /// 同步发送（阻塞），超时由 dispatcher 控制
    fn send(&self, event_type: EventCode, context: &ChannelContext) -> Result<ChannelResponse, ChannelError>;
}

/// 单个渠道的发送结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResult {
    pub channel: String,
    pub kind: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ChannelResult {
    pub fn sent(channel: &str, kind: &str, response: ChannelResponse) -> Self {
        Self {
            channel: channel.to_string(),
            kind: kind.to_string(),
            success: true,
            message: response.message,
            status_code: response.status_code,
        }
    }

    pub fn failed(channel: &str, kind: &str, error: &ChannelError) -> Self {
        Self {
            channel: channel.to_string(),
            kind: kind.to_string(),
            success: false,
            message: error.to_string(),
            status_code: error.status_code(),
        }
    }
}

// ---------------------------------------------------------------------------
// 渠道配置
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// 一个已配置的通知渠道
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelKind {
    Mail(MailSettings),
    Webhook(WebhookSettings),
    Push(PushSettings),
}

impl ChannelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Mail(_) => "mail",
            ChannelKind::Webhook(_) => "webhook",
            ChannelKind::Push(_) => "push",
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailSettings {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// STARTTLS；关闭时使用明文 SMTP（仅限本地中继）
    #[serde(default = "default_true")]
    pub starttls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    pub from: String,
    pub to: Vec<String>,
}

/// webhook 载荷格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormat {
    /// 通用 JSON
    #[default]
    Generic,
    /// Slack incoming webhook：`{"text": ...}`
    Slack,
    /// Discord webhook：`{"content": ...}`
    Discord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSettings {
    pub url: String,
    #[serde(default)]
    pub format: WebhookFormat,
    /// Bearer token
    #[serde(default)]
    pub token: Option<Secret>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushProvider {
    #[default]
    Ntfy,
    Gotify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSettings {
    #[serde(default)]
    pub provider: PushProvider,
    pub server_url: String,
    /// ntfy topic
    #[serde(default)]
    pub topic: Option<String>,
    /// ntfy access token / gotify app token
    #[serde(default)]
    pub token: Option<Secret>,
}
