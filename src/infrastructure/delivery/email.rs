use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::{
    application::services::delivery::{DeliveryAdapter, DeliveryError},
    domain::models::{NotificationKind, NotificationPayload},
};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// SMTP delivery over a plain connection; local relays and test inboxes
/// do not speak TLS.
pub struct EmailAdapter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailAdapter {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Arc<dyn DeliveryAdapter>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|err| anyhow::anyhow!("invalid smtp sender address: {err}"))?;

        Ok(Arc::new(Self {
            transport: builder.build(),
            from,
        }) as Arc<dyn DeliveryAdapter>)
    }
}

#[async_trait]
impl DeliveryAdapter for EmailAdapter {
    fn kind(&self) -> NotificationKind {
        NotificationKind::Email
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let NotificationPayload::Email {
            email,
            subject,
            body,
        } = payload
        else {
            return Err(DeliveryError::Permanent(anyhow::anyhow!(
                "email adapter received a non-email payload"
            )));
        };

        let to = email.parse::<Mailbox>().map_err(|err| {
            DeliveryError::Permanent(anyhow::anyhow!("invalid recipient address {email}: {err}"))
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.clone())
            .map_err(|err| {
                DeliveryError::Permanent(anyhow::anyhow!("failed to build message: {err}"))
            })?;

        self.transport.send(message).await.map_err(|err| {
            if err.is_permanent() {
                DeliveryError::Permanent(err.into())
            } else {
                DeliveryError::Transient(err.into())
            }
        })?;

        Ok(())
    }
}
