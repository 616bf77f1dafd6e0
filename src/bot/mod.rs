//! Anker conversation bot
//!
//! Polls the chat transport and hands every event to the worker of its
//! chat. Workers run the [`Dispatcher`], which drives the conversation
//! state machine:
//!
//! ```text
//! Unauthorized -> SetEmail -> SetSecret -> Authorized
//!                                           |- SelectDeck     -> Authorized
//!                                           |- CreateDeck     -> Authorized
//!                                           `- SelectLanguage -> Authorized
//! ```

pub mod commands;
pub mod dispatcher;
pub mod handlers;
pub mod messages;
pub mod routes;
pub mod settings;
pub mod workers;

pub use commands::{parse_command, parse_email, ButtonAction, Command, Input};
pub use dispatcher::{Dispatched, Dispatcher};
pub use handlers::{Effect, Transition};
pub use routes::{route, Route};
pub use settings::{BotSettings, DEFAULT_NOTE_TYPE};
pub use workers::{ChannelWorkers, EventHandler};

use crate::anki::AccountApi;
use crate::chat::{ChatTransport, TransportResult};
use crate::crypto::FieldCodec;
use crate::translation::Translator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Pause after a failed poll
const POLL_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Anker bot
pub struct AnkerBot<T: ChatTransport, A: AccountApi, L: Translator> {
    transport: Arc<T>,
    workers: ChannelWorkers<Dispatcher<T, A, L>>,
}

impl<T: ChatTransport, A: AccountApi, L: Translator> AnkerBot<T, A, L> {
    pub fn new(
        transport: Arc<T>,
        codec: Arc<FieldCodec>,
        account: Arc<A>,
        translator: Arc<L>,
        settings: BotSettings,
    ) -> Self {
        let idle_timeout = settings.worker_idle_timeout;
        let dispatcher = Dispatcher::new(transport.clone(), codec, account, translator, settings);
        Self {
            transport,
            workers: ChannelWorkers::new(Arc::new(dispatcher), idle_timeout),
        }
    }

    /// Poll and dispatch until `shutdown` resolves
    pub async fn run_until<S>(&self, shutdown: S) -> TransportResult<()>
    where
        S: Future<Output = ()>,
    {
        info!("Anker bot started");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(active_chats = self.workers.active(), "Shutdown requested, stopping");
                    return Ok(());
                }
                polled = self.transport.next_events() => match polled {
                    Ok(events) => {
                        for event in events {
                            self.workers.submit(event);
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "polling failed, retrying");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                },
            }
        }
    }

    /// Poll and dispatch until Ctrl-C
    pub async fn run(&self) -> TransportResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
