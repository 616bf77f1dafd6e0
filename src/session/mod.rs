//! Conversation sessions
//!
//! - `state`: the per-chat conversation state and its pinned-message layout
//! - `store`: loading and saving that state through the chat transport
//! - `guard`: running account calls with session recovery and bounded retries

pub mod guard;
pub mod state;
pub mod store;

pub use guard::{CallGuard, GuardError, GuardPolicy, Guarded, DEFAULT_MAX_ATTEMPTS};
pub use state::{ClientStatus, ConversationState, PersistedState, SetupStep, StateError};
pub use store::{StateStore, StoreError, StoreResult};

use std::future::Future;
use std::time::Duration;

/// Await `operation` for at most `limit`, mapping expiry through `on_timeout`
pub(crate) async fn bounded<T, E, Fut>(
    limit: Duration,
    operation: Fut,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
