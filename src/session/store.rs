//! Pinned-message state store
//!
//! Each chat's state is a JSON document in a message pinned in that chat.
//! Loading always yields a usable state: a pin that cannot be read or
//! decoded is replaced by a fresh identity state. Saving edits the pinned message and
//! falls back to creating a new one when the edit is refused.

use super::bounded;
use super::state::{ConversationState, StateError};
use crate::chat::{ChannelId, ChatTransport, PersistedHandle, TransportError};
use crate::crypto::FieldCodec;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// State store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chat transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("State encoding failed: {0}")]
    State(#[from] StateError),
}

/// Conversation state store backed by pinned chat messages
pub struct StateStore<T: ChatTransport> {
    transport: Arc<T>,
    codec: Arc<FieldCodec>,
    call_timeout: Duration,
}

impl<T: ChatTransport> StateStore<T> {
    pub fn new(transport: Arc<T>, codec: Arc<FieldCodec>, call_timeout: Duration) -> Self {
        Self {
            transport,
            codec,
            call_timeout,
        }
    }

    /// Load a chat's state, creating the identity state if there is none.
    ///
    /// A failed read (including a timeout) is treated like a missing pin;
    /// only a failed create is reported.
    pub async fn load_or_create(
        &self,
        channel: ChannelId,
    ) -> StoreResult<(ConversationState, PersistedHandle)> {
        let read = bounded(
            self.call_timeout,
            self.transport.get_pinned(channel),
            TransportError::Timeout,
        )
        .await;
        let pinned = match read {
            Ok(pinned) => pinned,
            Err(e) => {
                warn!(
                    channel = %channel,
                    error = %e,
                    "pinned state could not be read, starting over"
                );
                None
            }
        };

        if let Some(pinned) = pinned {
            match ConversationState::decode(&pinned.content, &self.codec) {
                Ok(state) => {
                    debug!(channel = %channel, status = ?state.status, "state loaded");
                    return Ok((state, pinned.handle));
                }
                Err(e) => {
                    warn!(
                        channel = %channel,
                        error = %e,
                        "pinned state is unreadable, starting over"
                    );
                    self.unpin_best_effort(pinned.handle).await;
                }
            }
        }

        let state = ConversationState::identity();
        let content = state.encode(&self.codec)?;
        let handle = self.create(channel, &content).await?;
        info!(channel = %channel, "new conversation state created");
        Ok((state, handle))
    }

    /// Persist `state`, returning the handle to use from now on.
    ///
    /// If the edit is refused the old message is unpinned (best effort) and
    /// a new one is created; only a failed create is reported.
    pub async fn save(
        &self,
        state: &ConversationState,
        handle: PersistedHandle,
    ) -> StoreResult<PersistedHandle> {
        let content = state.encode(&self.codec)?;

        let updated = bounded(
            self.call_timeout,
            self.transport.update_pinned(handle, &content),
            TransportError::Timeout,
        )
        .await;

        match updated {
            Ok(()) => {
                debug!(channel = %handle.channel, status = ?state.status, "state saved");
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    channel = %handle.channel,
                    error = %e,
                    "state message could not be edited, replacing it"
                );
                self.unpin_best_effort(handle).await;
                self.create(handle.channel, &content).await
            }
        }
    }

    async fn create(&self, channel: ChannelId, content: &str) -> StoreResult<PersistedHandle> {
        let handle = bounded(
            self.call_timeout,
            self.transport.create_pinned(channel, content),
            TransportError::Timeout,
        )
        .await?;
        Ok(handle)
    }

    async fn unpin_best_effort(&self, handle: PersistedHandle) {
        let result = bounded(
            self.call_timeout,
            self.transport.unpin(handle),
            TransportError::Timeout,
        )
        .await;
        if let Err(e) = result {
            debug!(channel = %handle.channel, error = %e, "unpin failed, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MockTransport;
    use crate::session::ClientStatus;

    fn store(transport: &MockTransport) -> StateStore<MockTransport> {
        StateStore::new(
            Arc::new(transport.clone()),
            Arc::new(FieldCodec::new(&[7u8; 32]).unwrap()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_fresh_chat_gets_identity_state() {
        let transport = MockTransport::new();
        let store = store(&transport);
        let channel = ChannelId(1);

        let (state, handle) = store.load_or_create(channel).await.unwrap();

        assert_eq!(state, ConversationState::identity());
        assert_eq!(transport.pinned(channel).unwrap().handle, handle);
        assert_eq!(transport.calls().create_pinned, 1);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let transport = MockTransport::new();
        let store = store(&transport);
        let channel = ChannelId(1);

        let first = store.load_or_create(channel).await.unwrap();
        let second = store.load_or_create(channel).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls().create_pinned, 1);
    }

    #[tokio::test]
    async fn test_garbage_pin_is_replaced() {
        let transport = MockTransport::new();
        let store = store(&transport);
        let channel = ChannelId(1);
        let old = transport.seed_pinned(channel, "my shopping list");

        let (state, handle) = store.load_or_create(channel).await.unwrap();

        assert_eq!(state.status, ClientStatus::Unauthorized);
        assert_ne!(handle, old);
        assert_eq!(transport.unpinned(), vec![old]);
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_identity() {
        let transport = MockTransport::new();
        transport.fail_reads(true);
        let store = store(&transport);
        let channel = ChannelId(1);

        let (state, handle) = store.load_or_create(channel).await.unwrap();

        assert_eq!(state, ConversationState::identity());
        assert_eq!(transport.calls().create_pinned, 1);
        assert_eq!(transport.pinned(channel).unwrap().handle, handle);
    }

    #[tokio::test]
    async fn test_read_failure_with_failed_create_propagates() {
        let transport = MockTransport::new();
        transport.fail_reads(true);
        transport.fail_creates(true);
        let store = store(&transport);

        let result = store.load_or_create(ChannelId(1)).await;

        assert!(matches!(result, Err(StoreError::Transport(_))));
    }

    #[tokio::test]
    async fn test_save_edits_in_place() {
        let transport = MockTransport::new();
        let store = store(&transport);
        let channel = ChannelId(1);
        let (state, handle) = store.load_or_create(channel).await.unwrap();

        let next = state.with_status(ClientStatus::SetEmail);
        let saved = store.save(&next, handle).await.unwrap();

        assert_eq!(saved, handle);
        let (reloaded, _) = store.load_or_create(channel).await.unwrap();
        assert_eq!(reloaded.status, ClientStatus::SetEmail);
    }

    #[tokio::test]
    async fn test_rejected_edit_creates_exactly_one_message() {
        let transport = MockTransport::new();
        let store = store(&transport);
        let channel = ChannelId(1);
        let (state, handle) = store.load_or_create(channel).await.unwrap();
        transport.reject_updates(true);
        transport.reset_calls();

        let next = state.with_status(ClientStatus::SetEmail);
        let saved = store.save(&next, handle).await.unwrap();

        assert_ne!(saved, handle);
        assert_eq!(transport.calls().create_pinned, 1);
        assert_eq!(transport.calls().update_pinned, 1);
        assert_eq!(transport.pinned(channel).unwrap().handle, saved);
    }

    #[tokio::test]
    async fn test_failed_create_after_rejected_edit_propagates() {
        let transport = MockTransport::new();
        let store = store(&transport);
        let (state, handle) = store.load_or_create(ChannelId(1)).await.unwrap();
        transport.reject_updates(true);
        transport.fail_creates(true);

        let result = store.save(&state, handle).await;

        assert!(matches!(result, Err(StoreError::Transport(_))));
    }
}
