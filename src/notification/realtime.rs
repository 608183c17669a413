//! 实时推送 - 把新事件推给已连接的 UI（尽力而为）

use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// 实时推送配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// 接收推送的 URL（例如 UI 服务的 `/api/push`）
    pub url: String,
    /// 超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    500
}

/// 实时推送能力
///
/// 失败只记录日志，不会影响事件写入。
pub trait RealtimePush: Send + Sync {
    fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<()>;
}

/// 未配置实时推送时使用
pub struct NoopPush;

impl RealtimePush for NoopPush {
    fn publish(&self, topic: &str, _payload: &serde_json::Value) -> Result<()> {
        debug!(topic, "Realtime push disabled, dropping message");
        Ok(())
    }
}

#[derive(Serialize)]
struct PushEnvelope<'a> {
    topic: &'a str,
    payload: &'a serde_json::Value,
}

/// 通过 HTTP POST 推送
pub struct HttpPush {
    url: String,
    timeout: Duration,
}

impl HttpPush {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            url: config.url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl RealtimePush for HttpPush {
    fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<()> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let response = client
            .post(&self.url)
            .json(&PushEnvelope { topic, payload })
            .send()?;

        if !response.status().is_success() {
            return Err(anyhow!("realtime endpoint returned {}", response.status()));
        }
        debug!(topic, url = %self.url, "Realtime push delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_config_default_timeout() {
        let config: RealtimeConfig = serde_json::from_str(r#"{"url":"http://localhost:5000/push"}"#).unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(HttpPush::new(&config).timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_noop_push_never_fails() {
        assert!(NoopPush.publish("ups_event", &serde_json::json!({"id": 1})).is_ok());
    }
}
