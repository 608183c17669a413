//! 邮件渠道（SMTP）

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tracing::info;

use crate::event::EventCode;
use crate::notification::channel::{ChannelContext, ChannelError, ChannelResponse, ChannelSender, MailSettings};
use crate::secret::{reveal_optional, SecretKey};

/// 邮件渠道
pub struct MailChannel {
    id: String,
    transport: SmtpTransport,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl MailChannel {
    pub fn new(
        id: &str,
        settings: &MailSettings,
        key: Option<&SecretKey>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        if settings.to.is_empty() {
            return Err(ChannelError::Config("mail channel needs at least one recipient".to_string()));
        }

        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| ChannelError::Config(format!("invalid from address: {}", e)))?;
        let to = settings
            .to
            .iter()
            .map(|addr| {
                addr.parse::<Mailbox>()
                    .map_err(|e| ChannelError::Config(format!("invalid recipient {}: {}", addr, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = if settings.starttls {
            SmtpTransport::starttls_relay(&settings.smtp_host)
                .map_err(|e| ChannelError::Mail(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&settings.smtp_host)
        };
        builder = builder.port(settings.smtp_port).timeout(Some(timeout));

        let password = reveal_optional(settings.password.as_ref(), key)?;
        if let (Some(user), Some(pass)) = (&settings.username, password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass));
        }

        Ok(Self {
            id: id.to_string(),
            transport: builder.build(),
            from,
            to,
        })
    }

    fn build_message(&self, event_type: EventCode, context: &ChannelContext) -> Result<Message, ChannelError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(context.title(event_type))
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder
            .body(context.body(event_type))
            .map_err(|e| ChannelError::Mail(e.to_string()))
    }
}

impl ChannelSender for MailChannel {
    fn name(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        "mail"
    }

    fn send(&self, event_type: EventCode, context: &ChannelContext) -> Result<ChannelResponse, ChannelError> {
        let message = self.build_message(event_type, context)?;
        let response = self
            .transport
            .send(&message)
            .map_err(|e| ChannelError::Mail(e.to_string()))?;

        let code = response.code().to_string();
        info!(channel = %self.id, recipients = self.to.len(), code = %code, "Mail sent");
        Ok(ChannelResponse::new(format!(
            "mail accepted by SMTP server ({} recipient(s), code {})",
            self.to.len(),
            code
        )))
    }
}
