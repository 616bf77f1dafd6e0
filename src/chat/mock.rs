//! Mock Chat Transport for Testing
//!
//! Keeps pinned messages, replies and deletions in memory and counts the
//! persistence calls so tests can assert on exact call sequences.

use super::traits::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock chat transport for testing
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_message_id: i64,
    pinned: HashMap<ChannelId, PinnedMessage>,
    messages: HashMap<(ChannelId, MessageId), String>,
    replies: Vec<SentReply>,
    deleted: Vec<(ChannelId, MessageId)>,
    acknowledged: Vec<String>,
    unpinned: Vec<PersistedHandle>,
    incoming: Vec<InboundEvent>,
    calls: CallCounts,
    reject_updates: bool,
    fail_creates: bool,
    fail_reads: bool,
}

/// Number of calls per persistence operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_pinned: usize,
    pub create_pinned: usize,
    pub update_pinned: usize,
    pub unpin: usize,
}

/// Reply captured by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub channel: ChannelId,
    pub message: MessageId,
    pub text: String,
    pub options: Vec<ReplyOption>,
}

impl MockTransport {
    /// Create new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(state: &mut MockState) -> MessageId {
        state.next_message_id += 1;
        MessageId(state.next_message_id)
    }

    /// Pin a message with arbitrary content, as if left by an earlier run
    pub fn seed_pinned(&self, channel: ChannelId, content: &str) -> PersistedHandle {
        let mut state = self.state.lock().unwrap();
        let message = Self::next_id(&mut state);
        let handle = PersistedHandle { channel, message };
        state
            .messages
            .insert((channel, message), content.to_string());
        state.pinned.insert(
            channel,
            PinnedMessage {
                handle,
                content: content.to_string(),
            },
        );
        handle
    }

    /// Remove the pin without going through the transport API
    pub fn remove_pin(&self, channel: ChannelId) {
        self.state.lock().unwrap().pinned.remove(&channel);
    }

    /// Make every `update_pinned` call fail with `Rejected`
    pub fn reject_updates(&self, reject: bool) {
        self.state.lock().unwrap().reject_updates = reject;
    }

    /// Make every `create_pinned` call fail
    pub fn fail_creates(&self, fail: bool) {
        self.state.lock().unwrap().fail_creates = fail;
    }

    /// Make every `get_pinned` call fail with a network error
    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    /// Queue an inbound event for `next_events`
    pub fn push_event(&self, event: InboundEvent) {
        self.state.lock().unwrap().incoming.push(event);
    }

    /// Currently pinned message of a chat
    pub fn pinned(&self, channel: ChannelId) -> Option<PinnedMessage> {
        self.state.lock().unwrap().pinned.get(&channel).cloned()
    }

    /// Replies sent so far, in order
    pub fn replies(&self) -> Vec<SentReply> {
        self.state.lock().unwrap().replies.clone()
    }

    /// Text of the last reply sent to a chat
    pub fn last_reply(&self, channel: ChannelId) -> Option<SentReply> {
        self.state
            .lock()
            .unwrap()
            .replies
            .iter()
            .rev()
            .find(|reply| reply.channel == channel)
            .cloned()
    }

    /// Messages deleted so far
    pub fn deleted(&self) -> Vec<(ChannelId, MessageId)> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// Callback ids acknowledged so far
    pub fn acknowledged(&self) -> Vec<String> {
        self.state.lock().unwrap().acknowledged.clone()
    }

    /// Handles unpinned so far
    pub fn unpinned(&self) -> Vec<PersistedHandle> {
        self.state.lock().unwrap().unpinned.clone()
    }

    /// Persistence call counters
    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    /// Reset counters, keeping messages and pins
    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls = CallCounts::default();
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn get_pinned(&self, channel: ChannelId) -> TransportResult<Option<PinnedMessage>> {
        let mut state = self.state.lock().unwrap();
        state.calls.get_pinned += 1;
        if state.fail_reads {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        Ok(state.pinned.get(&channel).cloned())
    }

    async fn create_pinned(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> TransportResult<PersistedHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_pinned += 1;
        if state.fail_creates {
            return Err(TransportError::Network("send failed".to_string()));
        }

        let message = Self::next_id(&mut state);
        let handle = PersistedHandle { channel, message };
        state
            .messages
            .insert((channel, message), content.to_string());
        state.pinned.insert(
            channel,
            PinnedMessage {
                handle,
                content: content.to_string(),
            },
        );
        Ok(handle)
    }

    async fn update_pinned(&self, handle: PersistedHandle, content: &str) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.update_pinned += 1;
        if state.reject_updates {
            return Err(TransportError::Rejected("message can't be edited".to_string()));
        }

        let key = (handle.channel, handle.message);
        if !state.messages.contains_key(&key) {
            return Err(TransportError::Rejected("message to edit not found".to_string()));
        }
        state.messages.insert(key, content.to_string());
        if let Some(pinned) = state.pinned.get_mut(&handle.channel) {
            if pinned.handle == handle {
                pinned.content = content.to_string();
            }
        }
        Ok(())
    }

    async fn unpin(&self, handle: PersistedHandle) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.unpin += 1;
        state.unpinned.push(handle);
        let is_current = state
            .pinned
            .get(&handle.channel)
            .map(|pinned| pinned.handle == handle)
            .unwrap_or(false);
        if is_current {
            state.pinned.remove(&handle.channel);
        }
        Ok(())
    }

    async fn send_reply(
        &self,
        channel: ChannelId,
        text: &str,
        options: &[ReplyOption],
    ) -> TransportResult<MessageId> {
        let mut state = self.state.lock().unwrap();
        let message = Self::next_id(&mut state);
        state.messages.insert((channel, message), text.to_string());
        state.replies.push(SentReply {
            channel,
            message,
            text: text.to_string(),
            options: options.to_vec(),
        });
        Ok(message)
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        state.messages.remove(&(channel, message));
        state.deleted.push((channel, message));
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> TransportResult<()> {
        self.state
            .lock()
            .unwrap()
            .acknowledged
            .push(callback_id.to_string());
        Ok(())
    }

    async fn next_events(&self) -> TransportResult<Vec<InboundEvent>> {
        let events: Vec<InboundEvent> = self.state.lock().unwrap().incoming.drain(..).collect();
        if events.is_empty() {
            // Stand-in for the long-poll wait
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        Ok(events)
    }
}
