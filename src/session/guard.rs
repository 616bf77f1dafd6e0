//! Resilient account calls
//!
//! Every account call made on behalf of a chat goes through [`CallGuard`]:
//! - An expired session is renewed once per call from the stored
//!   credentials, and the renewed session is persisted before the retry
//! - Any other failure is retried immediately, up to a fixed number of
//!   attempts in total
//! - Each attempt is bounded by the call timeout
//!
//! The guard hands back the state and handle it ended with, so the caller
//! always continues from what is actually persisted.

use super::bounded;
use super::state::ConversationState;
use super::store::{StateStore, StoreError};
use crate::anki::{AccountApi, AccountError, AccountResult, AccountSession};
use crate::chat::{ChatTransport, PersistedHandle};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Total attempts per guarded call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Limits applied to guarded calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Upper bound of a single account call
    pub call_timeout: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: Duration::from_secs(20),
        }
    }
}

/// Why a guarded call gave up
#[derive(Debug, Error)]
pub enum GuardError {
    /// The session expired and could not be renewed (or expired again)
    #[error("Could not resume the account session: {0}")]
    CouldNotResume(AccountError),

    #[error("Account call failed after {attempts} attempts: {last}")]
    FailedAfterRetries { attempts: u32, last: AccountError },

    /// The renewed session could not be persisted
    #[error("Could not persist the renewed session: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a guarded call
#[derive(Debug)]
pub struct Guarded<R> {
    /// State after the call, equal to what is persisted if `renewed`
    pub state: ConversationState,
    pub handle: PersistedHandle,
    /// A renewed session was persisted during the call
    pub renewed: bool,
    pub result: Result<R, GuardError>,
}

fn finish<R>(
    state: ConversationState,
    handle: PersistedHandle,
    renewed: bool,
    result: Result<R, GuardError>,
) -> Guarded<R> {
    Guarded {
        state,
        handle,
        renewed,
        result,
    }
}

/// Runs account calls for one chat
pub struct CallGuard<'a, T: ChatTransport, A: AccountApi> {
    store: &'a StateStore<T>,
    account: &'a A,
    policy: GuardPolicy,
}

impl<'a, T: ChatTransport, A: AccountApi> CallGuard<'a, T, A> {
    pub fn new(store: &'a StateStore<T>, account: &'a A, policy: GuardPolicy) -> Self {
        Self {
            store,
            account,
            policy,
        }
    }

    /// Run `operation` with the chat's session.
    ///
    /// `operation` is invoked once per attempt with the current session.
    /// At most `max_attempts` invocations and one renewal happen per call.
    pub async fn call<R, F, Fut>(
        &self,
        state: ConversationState,
        handle: PersistedHandle,
        mut operation: F,
    ) -> Guarded<R>
    where
        F: FnMut(AccountSession) -> Fut,
        Fut: Future<Output = AccountResult<R>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = state;
        let mut handle = handle;
        let mut renewed = false;
        let mut attempts = 0u32;

        loop {
            let session = match state.account_session.clone() {
                Some(session) => session,
                None if renewed => {
                    return finish(
                        state,
                        handle,
                        renewed,
                        Err(GuardError::CouldNotResume(AccountError::AuthorizationExpired)),
                    );
                }
                None => {
                    match self.renew(&state, handle).await {
                        Ok((next_state, next_handle)) => {
                            state = next_state;
                            handle = next_handle;
                            renewed = true;
                            continue;
                        }
                        Err(e) => return finish(state, handle, renewed, Err(e)),
                    }
                }
            };

            attempts += 1;
            let outcome = bounded(
                self.policy.call_timeout,
                operation(session),
                AccountError::Timeout,
            )
            .await;

            match outcome {
                Ok(value) => return finish(state, handle, renewed, Ok(value)),
                Err(AccountError::AuthorizationExpired) if renewed => {
                    warn!(channel = %handle.channel, "session expired again right after renewal");
                    return finish(
                        state,
                        handle,
                        renewed,
                        Err(GuardError::CouldNotResume(AccountError::AuthorizationExpired)),
                    );
                }
                Err(AccountError::AuthorizationExpired) => {
                    match self.renew(&state, handle).await {
                        Ok((next_state, next_handle)) => {
                            state = next_state;
                            handle = next_handle;
                            renewed = true;
                        }
                        Err(e) => return finish(state, handle, renewed, Err(e)),
                    }
                }
                Err(e) if attempts >= max_attempts => {
                    warn!(channel = %handle.channel, attempts, error = %e, "account call gave up");
                    return finish(
                        state,
                        handle,
                        renewed,
                        Err(GuardError::FailedAfterRetries { attempts, last: e }),
                    );
                }
                Err(e) => {
                    warn!(
                        channel = %handle.channel,
                        attempt = attempts,
                        max_attempts,
                        error = %e,
                        "account call failed, retrying"
                    );
                }
            }

            if attempts >= max_attempts {
                // Renewal used up the last attempt
                return finish(
                    state,
                    handle,
                    renewed,
                    Err(GuardError::FailedAfterRetries {
                        attempts,
                        last: AccountError::AuthorizationExpired,
                    }),
                );
            }
        }
    }

    /// Log in again with the stored credentials and persist the new session.
    ///
    /// On failure nothing is persisted and the caller keeps its old state.
    async fn renew(
        &self,
        state: &ConversationState,
        handle: PersistedHandle,
    ) -> Result<(ConversationState, PersistedHandle), GuardError> {
        if !state.has_credentials() {
            return Err(GuardError::CouldNotResume(AccountError::AuthFailed(
                "no stored credentials".to_string(),
            )));
        }

        let session = bounded(
            self.policy.call_timeout,
            self.account
                .authenticate(&state.account_email, &state.account_secret),
            AccountError::Timeout,
        )
        .await
        .map_err(|e| {
            warn!(channel = %handle.channel, error = %e, "session renewal failed");
            GuardError::CouldNotResume(e)
        })?;

        let renewed = state.with_session(session);
        let handle = self.store.save(&renewed, handle).await?;
        info!(channel = %handle.channel, "account session renewed");
        Ok((renewed, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anki::{DeckInfo, MockAccountApi};
    use crate::chat::{ChannelId, MockTransport};
    use crate::crypto::FieldCodec;
    use crate::session::ClientStatus;
    use std::sync::Arc;

    struct Fixture {
        transport: MockTransport,
        account: MockAccountApi,
        store: StateStore<MockTransport>,
    }

    fn fixture() -> Fixture {
        let transport = MockTransport::new();
        let store = StateStore::new(
            Arc::new(transport.clone()),
            Arc::new(FieldCodec::new(&[3u8; 32]).unwrap()),
            Duration::from_secs(5),
        );
        Fixture {
            transport,
            account: MockAccountApi::with_account("a@b.com", "pw"),
            store,
        }
    }

    async fn authorized(fx: &Fixture) -> (ConversationState, PersistedHandle) {
        let (state, handle) = fx.store.load_or_create(ChannelId(1)).await.unwrap();
        let state = state
            .with_email("a@b.com")
            .with_secret("pw")
            .with_session(fx.account.issue_session("a@b.com"))
            .with_status(ClientStatus::Authorized);
        let handle = fx.store.save(&state, handle).await.unwrap();
        (state, handle)
    }

    fn policy() -> GuardPolicy {
        GuardPolicy {
            max_attempts: 5,
            call_timeout: Duration::from_secs(5),
        }
    }

    async fn list_decks(
        fx: &Fixture,
        state: ConversationState,
        handle: PersistedHandle,
    ) -> Guarded<Vec<DeckInfo>> {
        let guard = CallGuard::new(&fx.store, &fx.account, policy());
        let account = &fx.account;
        guard
            .call(state, handle, |session| async move {
                account
                    .list_decks_and_note_types(&session)
                    .await
                    .map(|(decks, _)| decks)
            })
            .await
    }

    #[tokio::test]
    async fn test_success_needs_one_call() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.reset_calls();

        let guarded = list_decks(&fx, state.clone(), handle).await;

        assert!(guarded.result.is_ok());
        assert!(!guarded.renewed);
        assert_eq!(guarded.state, state);
        assert_eq!(fx.account.calls().total(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_is_renewed_and_persisted() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.expire_sessions();
        fx.account.reset_calls();

        let guarded = list_decks(&fx, state.clone(), handle).await;

        assert!(guarded.result.is_ok());
        assert!(guarded.renewed);
        assert_ne!(guarded.state.account_session, state.account_session);
        assert_eq!(fx.account.calls().authenticate, 1);
        assert_eq!(fx.account.calls().list_decks_and_note_types, 2);

        let (persisted, _) = fx.store.load_or_create(ChannelId(1)).await.unwrap();
        assert_eq!(persisted.account_session, guarded.state.account_session);
    }

    #[tokio::test]
    async fn test_second_expiry_gives_up() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.fail_always(Some(AccountError::AuthorizationExpired));
        fx.account.reset_calls();

        let guarded = list_decks(&fx, state, handle).await;

        assert!(matches!(
            guarded.result,
            Err(GuardError::CouldNotResume(AccountError::AuthorizationExpired))
        ));
        assert_eq!(fx.account.calls().authenticate, 1);
        assert_eq!(fx.account.calls().list_decks_and_note_types, 2);
    }

    #[tokio::test]
    async fn test_failed_renewal_keeps_old_state() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.expire_sessions();
        fx.account.add_account("a@b.com", "changed-password");

        let guarded = list_decks(&fx, state.clone(), handle).await;

        assert!(matches!(
            guarded.result,
            Err(GuardError::CouldNotResume(AccountError::AuthFailed(_)))
        ));
        assert!(!guarded.renewed);
        assert_eq!(guarded.state, state);
        assert_eq!(guarded.handle, handle);
    }

    #[tokio::test]
    async fn test_transient_failures_are_bounded() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.fail_always(Some(AccountError::Network("down".to_string())));
        fx.account.reset_calls();

        let guarded = list_decks(&fx, state, handle).await;

        assert!(matches!(
            guarded.result,
            Err(GuardError::FailedAfterRetries { attempts: 5, .. })
        ));
        assert_eq!(fx.account.calls().total(), 5);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.queue_failure(AccountError::Network("flaky".to_string()));
        fx.account.queue_failure(AccountError::Timeout(Duration::from_secs(1)));
        fx.account.reset_calls();

        let guarded = list_decks(&fx, state, handle).await;

        assert!(guarded.result.is_ok());
        assert_eq!(fx.account.calls().list_decks_and_note_types, 3);
    }

    #[tokio::test]
    async fn test_missing_session_is_renewed_first() {
        let fx = fixture();
        let (state, handle) = fx.store.load_or_create(ChannelId(1)).await.unwrap();
        let state = state
            .with_email("a@b.com")
            .with_secret("pw")
            .with_status(ClientStatus::Authorized);

        let guarded = list_decks(&fx, state, handle).await;

        assert!(guarded.result.is_ok());
        assert!(guarded.renewed);
        assert_eq!(fx.account.calls().authenticate, 1);
        assert_eq!(fx.account.calls().list_decks_and_note_types, 1);
    }

    #[tokio::test]
    async fn test_missing_credentials_cannot_resume() {
        let fx = fixture();
        let (state, handle) = fx.store.load_or_create(ChannelId(1)).await.unwrap();

        let guarded = list_decks(&fx, state, handle).await;

        assert!(matches!(guarded.result, Err(GuardError::CouldNotResume(_))));
        assert_eq!(fx.account.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_unpersistable_renewal_reports_store_error() {
        let fx = fixture();
        let (state, handle) = authorized(&fx).await;
        fx.account.expire_sessions();
        fx.transport.reject_updates(true);
        fx.transport.fail_creates(true);

        let guarded = list_decks(&fx, state.clone(), handle).await;

        assert!(matches!(guarded.result, Err(GuardError::Store(_))));
        assert_eq!(guarded.state, state);
    }
}
