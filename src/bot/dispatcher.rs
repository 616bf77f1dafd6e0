//! Event dispatcher
//!
//! Per event: load the chat's state once, run one handler, persist at most
//! once (and only if the state changed), then run the chat effects.

use super::commands::classify;
use super::handlers::{self, Effect, HandlerContext, Transition};
use super::messages;
use super::routes::route;
use super::settings::BotSettings;
use super::workers::EventHandler;
use crate::anki::AccountApi;
use crate::chat::{ChatTransport, EventKind, InboundEvent, PersistedHandle, TransportError};
use crate::crypto::FieldCodec;
use crate::session::{bounded, ConversationState, StateStore, StoreError};
use crate::translation::Translator;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of a dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Event handled; the state and handle as persisted afterwards
    Handled {
        state: ConversationState,
        handle: PersistedHandle,
    },
    /// Event from a chat or user the bot does not serve
    Ignored,
}

/// Routes inbound events through the conversation handlers
pub struct Dispatcher<T: ChatTransport, A: AccountApi, L: Translator> {
    transport: Arc<T>,
    store: StateStore<T>,
    account: Arc<A>,
    translator: Arc<L>,
    settings: BotSettings,
}

impl<T: ChatTransport, A: AccountApi, L: Translator> Dispatcher<T, A, L> {
    pub fn new(
        transport: Arc<T>,
        codec: Arc<FieldCodec>,
        account: Arc<A>,
        translator: Arc<L>,
        settings: BotSettings,
    ) -> Self {
        let store = StateStore::new(transport.clone(), codec, settings.call_timeout());
        Self {
            transport,
            store,
            account,
            translator,
            settings,
        }
    }

    /// Handle one event to completion
    pub async fn dispatch(&self, event: InboundEvent) -> Result<Dispatched, StoreError> {
        if !self.settings.is_allowed(&event) {
            debug!(channel = %event.channel, "ignoring event from unserved chat");
            return Ok(Dispatched::Ignored);
        }
        let channel = event.channel;

        let (state, handle) = match self.store.load_or_create(channel).await {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(channel = %channel, error = %e, "could not load conversation state");
                let mut fallback = Vec::new();
                if let EventKind::Button { callback_id, .. } = &event.kind {
                    fallback.push(Effect::Acknowledge(callback_id.clone()));
                }
                fallback.push(Effect::Reply {
                    text: messages::SAVE_FAILED.to_string(),
                    options: Vec::new(),
                });
                self.apply(channel, fallback).await;
                return Err(e);
            }
        };

        let input = classify(&event.kind);
        let selected = route(&input, state.status);
        debug!(channel = %channel, status = ?state.status, route = ?selected, "dispatching");

        let mut ctx = HandlerContext {
            store: &self.store,
            account: &*self.account,
            translator: &*self.translator,
            settings: &self.settings,
            handle,
            persisted: state.clone(),
        };
        let Transition { state, mut effects } =
            handlers::handle(&mut ctx, selected, state, &event).await;

        if let EventKind::Button { callback_id, .. } = &event.kind {
            effects.insert(0, Effect::Acknowledge(callback_id.clone()));
        }

        if state == ctx.persisted {
            self.apply(channel, effects).await;
            return Ok(Dispatched::Handled {
                state,
                handle: ctx.handle,
            });
        }

        match self.store.save(&state, ctx.handle).await {
            Ok(handle) => {
                debug!(channel = %channel, status = ?state.status, "transition persisted");
                self.apply(channel, effects).await;
                Ok(Dispatched::Handled { state, handle })
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "could not persist transition");
                // Replies would describe a step that never happened
                let mut kept: Vec<Effect> = effects
                    .into_iter()
                    .filter(|effect| !matches!(effect, Effect::Reply { .. }))
                    .collect();
                kept.push(Effect::Reply {
                    text: messages::SAVE_FAILED.to_string(),
                    options: Vec::new(),
                });
                self.apply(channel, kept).await;
                Err(e)
            }
        }
    }

    /// Run effects in order; a failed effect is logged and skipped
    async fn apply(&self, channel: crate::chat::ChannelId, effects: Vec<Effect>) {
        let limit = self.settings.call_timeout();
        for effect in effects {
            let result = match &effect {
                Effect::Reply { text, options } => bounded(
                    limit,
                    self.transport.send_reply(channel, text, options),
                    TransportError::Timeout,
                )
                .await
                .map(|_| ()),
                Effect::Delete(message) => {
                    bounded(
                        limit,
                        self.transport.delete_message(channel, *message),
                        TransportError::Timeout,
                    )
                    .await
                }
                Effect::Acknowledge(callback_id) => {
                    bounded(
                        limit,
                        self.transport.acknowledge(callback_id),
                        TransportError::Timeout,
                    )
                    .await
                }
            };
            if let Err(e) = result {
                warn!(channel = %channel, ?effect, error = %e, "chat effect failed");
            }
        }
    }
}

#[async_trait]
impl<T: ChatTransport, A: AccountApi, L: Translator> EventHandler for Dispatcher<T, A, L> {
    async fn handle(&self, event: InboundEvent) {
        let channel = event.channel;
        if let Err(e) = self.dispatch(event).await {
            error!(channel = %channel, error = %e, "event dropped");
        }
    }
}
