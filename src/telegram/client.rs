//! Telegram Bot API transport
//!
//! Implements [`ChatTransport`] over HTTPS with long polling.

use super::api::*;
use crate::chat::{
    ChannelId, ChatTransport, InboundEvent, MessageId, PersistedHandle, PinnedMessage,
    ReplyOption, TransportError, TransportResult,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Extra HTTP time on top of the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Telegram Bot API transport
pub struct TelegramTransport {
    http: reqwest::Client,
    base: String,
    poll_timeout: Duration,
    /// Next `getUpdates` offset
    offset: Mutex<i64>,
}

impl TelegramTransport {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> TransportResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + POLL_GRACE)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout,
            offset: Mutex::new(0),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> TransportResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(params)
            .send()
            .await
            .map_err(|e| {
                // reqwest errors can include the URL, which carries the token
                TransportError::Network(e.without_url().to_string())
            })?;

        let body: ApiResponse<R> = response
            .json()
            .await
            .map_err(|e| TransportError::Protocol(e.without_url().to_string()))?;

        if body.ok {
            return body
                .result
                .ok_or_else(|| TransportError::Protocol(format!("{} returned no result", method)));
        }

        let description = body.description.unwrap_or_default();
        match body.error_code {
            Some(400) => Err(TransportError::Rejected(description)),
            Some(code) if code >= 500 || code == 429 => {
                Err(TransportError::Network(format!("{}: {}", code, description)))
            }
            _ => Err(TransportError::Protocol(description)),
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn get_pinned(&self, channel: ChannelId) -> TransportResult<Option<PinnedMessage>> {
        let chat: Chat = self.call("getChat", &json!({ "chat_id": channel.0 })).await?;
        Ok(chat.pinned_message.map(|message| PinnedMessage {
            handle: PersistedHandle {
                channel,
                message: MessageId(message.message_id),
            },
            content: message.text.unwrap_or_default(),
        }))
    }

    async fn create_pinned(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> TransportResult<PersistedHandle> {
        let message: Message = self
            .call("sendMessage", &json!({ "chat_id": channel.0, "text": content }))
            .await?;
        let handle = PersistedHandle {
            channel,
            message: MessageId(message.message_id),
        };

        let _: bool = self
            .call(
                "pinChatMessage",
                &json!({
                    "chat_id": channel.0,
                    "message_id": message.message_id,
                    "disable_notification": true,
                }),
            )
            .await?;
        debug!(channel = %channel, message = %handle.message, "state message pinned");
        Ok(handle)
    }

    async fn update_pinned(&self, handle: PersistedHandle, content: &str) -> TransportResult<()> {
        let edited: TransportResult<serde_json::Value> = self
            .call(
                "editMessageText",
                &json!({
                    "chat_id": handle.channel.0,
                    "message_id": handle.message.0,
                    "text": content,
                }),
            )
            .await;

        match edited {
            Ok(_) => Ok(()),
            Err(TransportError::Rejected(description))
                if description.contains("message is not modified") =>
            {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn unpin(&self, handle: PersistedHandle) -> TransportResult<()> {
        let _: bool = self
            .call(
                "unpinChatMessage",
                &json!({ "chat_id": handle.channel.0, "message_id": handle.message.0 }),
            )
            .await?;
        Ok(())
    }

    async fn send_reply(
        &self,
        channel: ChannelId,
        text: &str,
        options: &[ReplyOption],
    ) -> TransportResult<MessageId> {
        let mut params = json!({ "chat_id": channel.0, "text": text });
        if !options.is_empty() {
            let keyboard = InlineKeyboardMarkup::from_options(options);
            params["reply_markup"] = serde_json::to_value(keyboard)
                .map_err(|e| TransportError::Protocol(e.to_string()))?;
        }
        let message: Message = self.call("sendMessage", &params).await?;
        Ok(MessageId(message.message_id))
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> TransportResult<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": channel.0, "message_id": message.0 }),
            )
            .await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> TransportResult<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }

    async fn next_events(&self) -> TransportResult<Vec<InboundEvent>> {
        let mut offset = self.offset.lock().await;
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &json!({
                    "offset": *offset,
                    "timeout": self.poll_timeout.as_secs(),
                    "allowed_updates": ["message", "callback_query"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            *offset = last + 1;
        }

        let received = updates.len();
        let events: Vec<InboundEvent> = updates
            .into_iter()
            .filter_map(Update::into_event)
            .collect();
        if events.len() < received {
            debug!(skipped = received - events.len(), "ignored non-actionable updates");
        }
        Ok(events)
    }
}

impl std::fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The base URL embeds the bot token
        f.debug_struct("TelegramTransport")
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

/// Validate a bot token's `<id>:<secret>` shape
pub fn check_token(token: &str) -> Result<(), String> {
    let (id, secret) = token
        .split_once(':')
        .ok_or_else(|| "bot token must look like <id>:<secret>".to_string())?;
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return Err("bot token id must be numeric".to_string());
    }
    if secret.len() < 20 {
        return Err("bot token secret is too short".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_parses() {
        let body: ApiResponse<serde_json::Value> = serde_json::from_str(
            r#"{"ok":false,"error_code":400,
                "description":"Bad Request: message to edit not found"}"#,
        )
        .unwrap();
        assert!(!body.ok);
        assert_eq!(body.error_code, Some(400));
    }

    #[test]
    fn test_base_url_embeds_token() {
        let transport =
            TelegramTransport::new("https://api.telegram.org/", "1:abc", Duration::from_secs(30))
                .unwrap();
        assert_eq!(transport.base, "https://api.telegram.org/bot1:abc");
        assert!(!format!("{:?}", transport).contains("1:abc"));
    }

    #[test]
    fn test_check_token() {
        assert!(check_token("123456:ABCdefGhIJKlmNoPQRsTUVwxyZ012345").is_ok());
        assert!(check_token("no-colon").is_err());
        assert!(check_token("abc:ABCdefGhIJKlmNoPQRsTUVwxyZ").is_err());
        assert!(check_token("123:short").is_err());
    }
}
