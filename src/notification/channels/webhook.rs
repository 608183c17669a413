//! Webhook 渠道
//!
//! 通过 HTTP POST 发送，支持通用 JSON、Slack、Discord 三种载荷格式。

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::event::EventCode;
use crate::notification::channel::{
    ChannelContext, ChannelError, ChannelResponse, ChannelSender, WebhookFormat, WebhookSettings,
};
use crate::secret::{reveal_optional, SecretKey};

/// 响应体最多保留的长度
const MAX_BODY_LENGTH: usize = 512;

/// 通用 JSON 载荷
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookPayload {
    pub event_id: u64,
    pub event_type: String,
    pub ups_name: String,
    pub severity: String,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}

/// Webhook 渠道
pub struct WebhookChannel {
    id: String,
    client: Client,
    settings: WebhookSettings,
    token: Option<String>,
}

impl WebhookChannel {
    /// 创建渠道；token 在这里解密，之后只保存在内存
    pub fn new(
        id: &str,
        settings: WebhookSettings,
        key: Option<&SecretKey>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        if settings.url.trim().is_empty() {
            return Err(ChannelError::Config("webhook url is required".to_string()));
        }

        let token = reveal_optional(settings.token.as_ref(), key)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            id: id.to_string(),
            client,
            settings,
            token,
        })
    }

    /// 按格式生成载荷
    pub fn render_body(format: WebhookFormat, event_type: EventCode, context: &ChannelContext) -> serde_json::Value {
        match format {
            WebhookFormat::Generic => json!(WebhookPayload {
                event_id: context.event_id,
                event_type: event_type.to_string(),
                ups_name: context.ups_name.clone(),
                severity: context.severity.to_string(),
                message: context.message.clone(),
                timestamp: context.timestamp.to_rfc3339(),
                source_ip: context.source_ip.clone(),
            }),
            WebhookFormat::Slack => json!({
                "text": format!("*{}*\n{}", context.title(event_type), context.message),
            }),
            WebhookFormat::Discord => json!({
                "content": format!("**{}**\n{}", context.title(event_type), context.message),
            }),
        }
    }
}

impl ChannelSender for WebhookChannel {
    fn name(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "webhook"
    }

    fn send(&self, event_type: EventCode, context: &ChannelContext) -> Result<ChannelResponse, ChannelError> {
        let body = Self::render_body(self.settings.format, event_type, context);

        let mut request = self.client.post(&self.settings.url).json(&body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        for (name, value) in &self.settings.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send()?;
        let status = response.status();
        let text = response.text().unwrap_or_default();

        if status.is_success() {
            debug!(channel = %self.id, status = status.as_u16(), "Webhook delivered");
            Ok(ChannelResponse::new(format!("webhook accepted ({})", status)).with_status(status.as_u16()))
        } else {
            warn!(channel = %self.id, status = status.as_u16(), "Webhook returned non-success status");
            Err(ChannelError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_BODY_LENGTH),
            })
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use crate::secret::Secret;
    use std::collections::BTreeMap;

    fn context() -> ChannelContext {
        ChannelContext {
            event_id: 3,
            ups_name: "ups@localhost".to_string(),
            message: "UPS ups@localhost on battery".to_string(),
            severity: Severity::High,
            timestamp: "2024-03-14T10:00:00Z".parse().unwrap(),
            source_ip: None,
        }
    }

    fn settings(url: &str) -> WebhookSettings {
        WebhookSettings {
            url: url.to_string(),
            format: WebhookFormat::Generic,
            token: None,
            headers: BTreeMap::new(),
        }
    }

    #[test]
    fn test_generic_payload() {
        let body = WebhookChannel::render_body(WebhookFormat::Generic, EventCode::Onbatt, &context());
        assert_eq!(body["event_type"], "ONBATT");
        assert_eq!(body["ups_name"], "ups@localhost");
        assert_eq!(body["severity"], "HIGH");
        assert!(body.get("source_ip").is_none());
    }

    #[test]
    fn test_chat_payload_shapes() {
        let slack = WebhookChannel::render_body(WebhookFormat::Slack, EventCode::Onbatt, &context());
        assert!(slack["text"].as_str().unwrap().contains("[UPS][ONBATT]"));

        let discord = WebhookChannel::render_body(WebhookFormat::Discord, EventCode::Onbatt, &context());
        assert!(discord["content"].as_str().unwrap().starts_with("**[UPS][ONBATT]"));
    }

    #[test]
    fn test_webhook_requires_url() {
        let result = WebhookChannel::new("hook", settings(""), None, Duration::from_secs(5));
        assert!(matches!(result, Err(ChannelError::Config(_))));
    }

    #[test]
    fn test_webhook_token_requires_key() {
        let key = SecretKey::derive("k");
        let mut with_token = settings("http://localhost:9/hook");
        with_token.token = Some(Secret::conceal("t0ken", &key).unwrap());

        let missing = WebhookChannel::new("hook", with_token.clone(), None, Duration::from_secs(5));
        assert!(matches!(missing, Err(ChannelError::Secret(_))));

        let ok = WebhookChannel::new("hook", with_token, Some(&key), Duration::from_secs(5)).unwrap();
        assert_eq!(ok.token.as_deref(), Some("t0ken"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long message", 10), "this is...");
    }
}
