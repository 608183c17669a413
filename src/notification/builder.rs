//! 渠道构建 - 根据渠道配置创建具体的 `ChannelSender`

use std::sync::Arc;
use std::time::Duration;

use super::channel::{ChannelConfig, ChannelError, ChannelKind, ChannelSender};
use super::channels::{MailChannel, PushChannel, WebhookChannel};
use crate::secret::SecretKey;

/// 渠道工厂
///
/// `create` 在 dispatcher 的阻塞任务里调用（阻塞 HTTP 客户端不能在 async 上下文里创建）。
pub trait SenderFactory: Send + Sync {
    fn create(&self, config: &ChannelConfig) -> Result<Arc<dyn ChannelSender>, ChannelError>;
}

/// 默认工厂：mail / webhook / push
pub struct ChannelBuilder {
    timeout: Duration,
    secret_key: Option<SecretKey>,
}

impl ChannelBuilder {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            secret_key: None,
        }
    }

    /// 单个渠道的发送超时
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 解密渠道凭据使用的密钥
    pub fn secret_key(mut self, key: Option<SecretKey>) -> Self {
        self.secret_key = key;
        self
    }
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SenderFactory for ChannelBuilder {
    fn create(&self, config: &ChannelConfig) -> Result<Arc<dyn ChannelSender>, ChannelError> {
        if !config.enabled {
            return Err(ChannelError::Disabled(config.id.clone()));
        }

        let key = self.secret_key.as_ref();
        let sender: Arc<dyn ChannelSender> = match &config.kind {
            ChannelKind::Mail(settings) => Arc::new(MailChannel::new(&config.id, settings, key, self.timeout)?),
            ChannelKind::Webhook(settings) => {
                Arc::new(WebhookChannel::new(&config.id, settings.clone(), key, self.timeout)?)
            }
            ChannelKind::Push(settings) => {
                Arc::new(PushChannel::new(&config.id, settings.clone(), key, self.timeout)?)
            }
        };
        Ok(sender)
    }
}
