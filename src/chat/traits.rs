//! Chat Transport Trait Abstractions
//!
//! The conversation core only talks to the chat through [`ChatTransport`].
//! Tests use `MockTransport`, production uses `TelegramTransport`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat identifier. Scopes exactly one user's conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identifier within a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// End-user identifier (used for the allow-list)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Handle of the pinned message holding a chat's conversation state.
///
/// Not stable over a session's lifetime: a rejected edit replaces the
/// message, so callers always keep the latest handle they were given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersistedHandle {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// Pinned message as read back from the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedMessage {
    pub handle: PersistedHandle,
    pub content: String,
}

/// Inline button attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOption {
    /// Text shown on the button
    pub label: String,
    /// Payload delivered back in [`EventKind::Button`]
    pub data: String,
}

impl ReplyOption {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Kind of chat the event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-on-one chat with the bot
    Private,
    /// Group, supergroup or channel
    Group,
}

/// Message a pressed button was attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonOrigin {
    pub message: MessageId,
    pub text: String,
    pub options: Vec<ReplyOption>,
}

/// Payload of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Plain text message (commands are parsed later by the router)
    Text { message: MessageId, text: String },

    /// Inline button press
    Button {
        callback_id: String,
        data: String,
        origin: Option<ButtonOrigin>,
    },
}

/// Inbound event from the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub channel: ChannelId,
    pub sender: UserId,
    pub chat_kind: ChatKind,
    pub kind: EventKind,
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Chat transport errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The chat refused the operation (message gone, not modified, too long)
    #[error("Rejected by chat: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Chat transport abstraction
///
/// Implementations must be cheap to share across chat workers.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    /// Read the currently pinned message of a chat
    async fn get_pinned(&self, channel: ChannelId) -> TransportResult<Option<PinnedMessage>>;

    /// Send `content` as a new message and pin it silently
    async fn create_pinned(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> TransportResult<PersistedHandle>;

    /// Replace the text of an existing pinned message
    ///
    /// Returns [`TransportError::Rejected`] if the message no longer exists,
    /// was changed externally or the content exceeds the chat's limits.
    async fn update_pinned(&self, handle: PersistedHandle, content: &str) -> TransportResult<()>;

    /// Unpin a message (it stays in the history)
    async fn unpin(&self, handle: PersistedHandle) -> TransportResult<()>;

    /// Send a reply, optionally with inline buttons
    async fn send_reply(
        &self,
        channel: ChannelId,
        text: &str,
        options: &[ReplyOption],
    ) -> TransportResult<MessageId>;

    /// Delete a message from the chat
    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> TransportResult<()>;

    /// Acknowledge a button press so the client stops its spinner
    async fn acknowledge(&self, _callback_id: &str) -> TransportResult<()> {
        Ok(())
    }

    /// Receive the next batch of inbound events (long polling)
    async fn next_events(&self) -> TransportResult<Vec<InboundEvent>>;
}
