//! 推送渠道（ntfy / Gotify）

use reqwest::blocking::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::event::EventCode;
use crate::notification::channel::{
    ChannelContext, ChannelError, ChannelResponse, ChannelSender, PushProvider, PushSettings,
};
use crate::secret::{reveal_optional, SecretKey};

/// 推送渠道
pub struct PushChannel {
    id: String,
    client: Client,
    settings: PushSettings,
    token: Option<String>,
}

impl PushChannel {
    pub fn new(
        id: &str,
        settings: PushSettings,
        key: Option<&SecretKey>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        match settings.provider {
            PushProvider::Ntfy if settings.topic.as_deref().unwrap_or("").is_empty() => {
                return Err(ChannelError::Config("ntfy push needs a topic".to_string()));
            }
            PushProvider::Gotify if settings.token.is_none() => {
                return Err(ChannelError::Config("gotify push needs an app token".to_string()));
            }
            _ => {}
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

    /// 目标 URL
    pub fn endpoint(&self) -> String {
        let base = self.settings.server_url.trim_end_matches('/');
        match self.settings.provider {
            PushProvider::Ntfy => format!("{}/{}", base, self.settings.topic.as_deref().unwrap_or_default()),
            PushProvider::Gotify => format!("{}/message", base),
        }
    }
}

impl ChannelSender for PushChannel {
    fn name(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "push"
    }

    fn send(&self, event_type: EventCode, context: &ChannelContext) -> Result<ChannelResponse, ChannelError> {
        let priority = context.severity.push_priority();
        let title = context.title(event_type);

        let request = match self.settings.provider {
            PushProvider::Ntfy => {
                let mut request = self
                    .client
                    .post(self.endpoint())
                    .header("Title", title)
                    .header("Priority", priority.to_string())
                    .header("Tags", event_type.as_str().to_ascii_lowercase())
                    .body(context.message.clone());
                if let Some(token) = &self.token {
                    request = request.header("Authorization", format!("Bearer {}", token));
                }
                request
            }
            PushProvider::Gotify => self
                .client
                .post(self.endpoint())
                .header("X-Gotify-Key", self.token.clone().unwrap_or_default())
                .json(&json!({
                    "title": title,
                    "message": context.message,
                    "priority": priority,
                })),
        };

        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            debug!(channel = %self.id, status = status.as_u16(), "Push delivered");
            Ok(ChannelResponse::new(format!("push accepted ({})", status)).with_status(status.as_u16()))
        } else {
            Err(ChannelError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ntfy(topic: Option<&str>) -> PushSettings {
        PushSettings {
            provider: PushProvider::Ntfy,
            server_url: "https://ntfy.sh/".to_string(),
            topic: topic.map(str::to_string),
            token: None,
        }
    }

    #[test]
    fn test_ntfy_endpoint() {
        let channel = PushChannel::new("phone", ntfy(Some("ups-alerts")), None, Duration::from_secs(5)).unwrap();
        assert_eq!(channel.endpoint(), "https://ntfy.sh/ups-alerts");
        assert_eq!(channel.kind(), "push");
    }

    #[test]
    fn test_ntfy_requires_topic() {
        let result = PushChannel::new("phone", ntfy(None), None, Duration::from_secs(5));
        assert!(matches!(result, Err(ChannelError::Config(_))));
    }

    #[test]
    fn test_gotify_requires_token() {
        let settings = PushSettings {
            provider: PushProvider::Gotify,
            server_url: "https://gotify.local".to_string(),
            topic: None,
            token: None,
        };
        let result = PushChannel::new("gotify", settings, None, Duration::from_secs(5));
        assert!(matches!(result, Err(ChannelError::Config(_))));
    }
}
