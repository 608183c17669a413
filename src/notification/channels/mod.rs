//! 具体渠道实现

pub mod mail;
pub mod push;
pub mod webhook;

pub use mail::MailChannel;
pub use push::PushChannel;
pub use webhook::{WebhookChannel, WebhookPayload};
