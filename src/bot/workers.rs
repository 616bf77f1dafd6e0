//! Per-chat workers
//!
//! Events of one chat are handled strictly in arrival order by a single
//! task; different chats run concurrently. A worker exits after an idle
//! period. Submission and exit both happen under the registry lock, so an
//! event is never queued to a worker that is already gone.

use crate::chat::{ChannelId, InboundEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Consumer of a chat's events
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: InboundEvent);
}

type Registry = Arc<Mutex<HashMap<ChannelId, UnboundedSender<InboundEvent>>>>;

/// Registry of per-chat workers
pub struct ChannelWorkers<H: EventHandler> {
    handler: Arc<H>,
    idle_timeout: Duration,
    senders: Registry,
}

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<ChannelId, UnboundedSender<InboundEvent>>> {
    // A panicking worker cannot leave the map half-updated
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<H: EventHandler> ChannelWorkers<H> {
    pub fn new(handler: Arc<H>, idle_timeout: Duration) -> Self {
        Self {
            handler,
            idle_timeout,
            senders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue an event for its chat, starting the chat's worker if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, event: InboundEvent) {
        let channel = event.channel;
        let mut senders = lock(&self.senders);

        let event = match senders.get(&channel) {
            Some(sender) => match sender.send(event) {
                Ok(()) => return,
                // Worker died (panicked handler); start a new one
                Err(mpsc::error::SendError(event)) => {
                    warn!(channel = %channel, "chat worker vanished, restarting");
                    event
                }
            },
            None => event,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(event).is_err() {
            return;
        }
        senders.insert(channel, sender);
        drop(senders);

        debug!(channel = %channel, "chat worker started");
        tokio::spawn(run_worker(
            channel,
            receiver,
            self.handler.clone(),
            self.senders.clone(),
            self.idle_timeout,
        ));
    }

    /// Number of chats with a live worker
    pub fn active(&self) -> usize {
        lock(&self.senders).len()
    }
}

async fn run_worker<H: EventHandler>(
    channel: ChannelId,
    mut receiver: UnboundedReceiver<InboundEvent>,
    handler: Arc<H>,
    senders: Registry,
    idle_timeout: Duration,
) {
    loop {
        let event = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => {
                let pending = {
                    let mut senders = lock(&senders);
                    match receiver.try_recv() {
                        Ok(event) => Some(event),
                        Err(_) => {
                            senders.remove(&channel);
                            None
                        }
                    }
                };
                match pending {
                    Some(event) => event,
                    None => break,
                }
            }
        };
        handler.handle(event).await;
    }
    debug!(channel = %channel, "chat worker stopped");
}
