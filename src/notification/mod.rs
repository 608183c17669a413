//! 通知层 - 事件落库之后的渠道分发与实时推送
//!
//! # 设计目标
//! 1. 统一接口：mail / webhook / push 都实现 `ChannelSender` trait
//! 2. 渠道隔离：每个渠道独立执行、独立超时，失败只记录在自己的结果里
//! 3. 规则路由：`NotificationDispatcher` 按事件类型的规则决定发送到哪些渠道
//! 4. 实时推送：`RealtimePush` 只做尽力而为的推送，不影响事件记录
//!
//! # 使用示例
//! ```ignore
//! use ups_monitor::notification::{ChannelBuilder, NotificationDispatcher};
//!
//! let factory = Arc::new(ChannelBuilder::new().secret_key(key));
//! let dispatcher = NotificationDispatcher::new(storage, factory);
//! let report = dispatcher.dispatch(&event).await;
//! ```

pub mod builder;
pub mod channel;
pub mod channels;
pub mod dispatcher;
pub mod realtime;

pub use builder::{ChannelBuilder, SenderFactory};
pub use channel::{
    ChannelConfig, ChannelContext, ChannelError, ChannelKind, ChannelResponse, ChannelResult, ChannelSender,
    MailSettings, PushProvider, PushSettings, WebhookFormat, WebhookSettings,
};
pub use dispatcher::{DispatchReport, NotificationDispatcher, DEFAULT_CHANNEL_TIMEOUT};
pub use realtime::{HttpPush, NoopPush, RealtimeConfig, RealtimePush};
