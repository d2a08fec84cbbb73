use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    application::services::delivery::{DeliveryAdapter, DeliveryError},
    domain::models::{NotificationKind, NotificationPayload},
};

pub struct TelegramAdapter {
    http: Client,
    base_url: String,
    bot_token: String,
}

impl TelegramAdapter {
    pub fn new(bot_token: String) -> Arc<dyn DeliveryAdapter> {
        Arc::new(Self {
            http: Client::builder()
                .user_agent("notification-service/telegram")
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build telegram client"),
            base_url: "https://api.telegram.org".to_string(),
            bot_token,
        }) as Arc<dyn DeliveryAdapter>
    }
}

#[async_trait]
impl DeliveryAdapter for TelegramAdapter {
    fn kind(&self) -> NotificationKind {
        NotificationKind::Telegram
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let NotificationPayload::Telegram { chat_id, body } = payload else {
            return Err(DeliveryError::Permanent(anyhow::anyhow!(
                "telegram adapter received a non-telegram payload"
            )));
        };

        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let request_body = serde_json::json!({
            "chat_id": chat_id,
            "text": body,
        });

        let response = self
            .http
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| DeliveryError::Transient(err.into()))?;

        let payload: TelegramApiResponse = response
            .json()
            .await
            .map_err(|err| DeliveryError::Transient(err.into()))?;

        if !payload.ok {
            let description = payload
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            let err = anyhow::anyhow!("telegram api error: {description}");
            // 4xx answers (bad chat id, blocked bot) will not heal on
            // retry; throttling and server errors may.
            return Err(match payload.error_code {
                Some(code) if (400..500).contains(&code) && code != 429 => {
                    DeliveryError::Permanent(err)
                }
                _ => DeliveryError::Transient(err),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse {
    ok: bool,
    description: Option<String>,
    #[serde(rename = "error_code")]
    error_code: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mismatched_payload_kind_is_permanent() {
        let adapter = TelegramAdapter::new("token".to_string());
        let payload = NotificationPayload::Email {
            email: "a@b".to_string(),
            subject: "S".to_string(),
            body: "B".to_string(),
        };

        let err = adapter.deliver(&payload).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Permanent(_)));
    }
}
