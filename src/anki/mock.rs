//! Mock Anki account for testing
//!
//! Issues numbered sessions, can expire them on demand and can inject
//! failures into the data calls. Every call is counted.

use super::traits::*;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock account API for testing
#[derive(Clone, Default)]
pub struct MockAccountApi {
    state: Arc<Mutex<MockAccountState>>,
}

#[derive(Default)]
struct MockAccountState {
    accounts: HashMap<String, String>,
    live_sessions: HashSet<String>,
    next_session: u64,
    decks: Vec<DeckInfo>,
    note_types: Vec<NoteTypeInfo>,
    fields: Vec<FieldInfo>,
    cards: Vec<(DeckInfo, NoteTypeInfo, Vec<String>)>,
    queued_failures: VecDeque<AccountError>,
    persistent_failure: Option<AccountError>,
    calls: AccountCalls,
}

/// Number of calls per account operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountCalls {
    pub authenticate: usize,
    pub list_decks_and_note_types: usize,
    pub list_fields: usize,
    pub add_card: usize,
    pub create_deck: usize,
}

impl AccountCalls {
    /// Calls made with a session (everything except login)
    pub fn data_calls(&self) -> usize {
        self.list_decks_and_note_types + self.list_fields + self.add_card + self.create_deck
    }

    /// All calls including login
    pub fn total(&self) -> usize {
        self.authenticate + self.data_calls()
    }
}

impl MockAccountApi {
    /// Create new mock account API
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock preloaded with one account, a "Basic" note type with
    /// Front/Back fields and no decks
    pub fn with_account(email: &str, secret: &str) -> Self {
        let api = Self::new();
        api.add_account(email, secret);
        api.set_note_types(vec![NoteTypeInfo {
            note_id: 1,
            note_name: "Basic (and reversed card)".to_string(),
        }]);
        api.set_fields(vec![
            FieldInfo {
                field_name: "Front".to_string(),
                order: 0,
            },
            FieldInfo {
                field_name: "Back".to_string(),
                order: 1,
            },
        ]);
        api
    }

    /// Register credentials accepted by `authenticate`
    pub fn add_account(&self, email: &str, secret: &str) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_string(), secret.to_string());
    }

    pub fn set_decks(&self, decks: Vec<DeckInfo>) {
        self.state.lock().unwrap().decks = decks;
    }

    pub fn set_note_types(&self, note_types: Vec<NoteTypeInfo>) {
        self.state.lock().unwrap().note_types = note_types;
    }

    pub fn set_fields(&self, fields: Vec<FieldInfo>) {
        self.state.lock().unwrap().fields = fields;
    }

    /// Issue a live session without going through `authenticate`
    pub fn issue_session(&self, email: &str) -> AccountSession {
        let mut state = self.state.lock().unwrap();
        Self::new_session(&mut state, email)
    }

    /// Invalidate every session issued so far
    pub fn expire_sessions(&self) {
        self.state.lock().unwrap().live_sessions.clear();
    }

    /// Fail the next data call with `error`
    pub fn queue_failure(&self, error: AccountError) {
        self.state.lock().unwrap().queued_failures.push_back(error);
    }

    /// Fail every data call with `error` until cleared
    pub fn fail_always(&self, error: Option<AccountError>) {
        self.state.lock().unwrap().persistent_failure = error;
    }

    /// Cards added so far as (deck, note type, field values)
    pub fn cards(&self) -> Vec<(DeckInfo, NoteTypeInfo, Vec<String>)> {
        self.state.lock().unwrap().cards.clone()
    }

    pub fn decks(&self) -> Vec<DeckInfo> {
        self.state.lock().unwrap().decks.clone()
    }

    pub fn calls(&self) -> AccountCalls {
        self.state.lock().unwrap().calls
    }

    pub fn reset_calls(&self) {
        self.state.lock().unwrap().calls = AccountCalls::default();
    }

    fn new_session(state: &mut MockAccountState, email: &str) -> AccountSession {
        state.next_session += 1;
        let token = format!("session-{}", state.next_session);
        state.live_sessions.insert(token.clone());
        AccountSession {
            username: email.to_string(),
            token: token.clone(),
            usernet_token: format!("usernet-{}", state.next_session),
            card_token: format!("csrf-{}", state.next_session),
        }
    }

    fn check(state: &mut MockAccountState, session: &AccountSession) -> AccountResult<()> {
        if let Some(error) = &state.persistent_failure {
            return Err(error.clone());
        }
        if let Some(error) = state.queued_failures.pop_front() {
            return Err(error);
        }
        if !state.live_sessions.contains(&session.token) {
            return Err(AccountError::AuthorizationExpired);
        }
        Ok(())
    }
}

#[async_trait]
impl AccountApi for MockAccountApi {
    async fn authenticate(&self, email: &str, secret: &str) -> AccountResult<AccountSession> {
        let mut state = self.state.lock().unwrap();
        state.calls.authenticate += 1;
        match state.accounts.get(email) {
            Some(expected) if expected == secret => Ok(Self::new_session(&mut state, email)),
            _ => Err(AccountError::AuthFailed(format!("bad credentials for {}", email))),
        }
    }

    async fn list_decks_and_note_types(
        &self,
        session: &AccountSession,
    ) -> AccountResult<(Vec<DeckInfo>, Vec<NoteTypeInfo>)> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_decks_and_note_types += 1;
        Self::check(&mut state, session)?;
        Ok((state.decks.clone(), state.note_types.clone()))
    }

    async fn list_fields(
        &self,
        session: &AccountSession,
        _note_type: &NoteTypeInfo,
    ) -> AccountResult<Vec<FieldInfo>> {
        let mut state = self.state.lock().unwrap();
        state.calls.list_fields += 1;
        Self::check(&mut state, session)?;
        Ok(state.fields.clone())
    }

    async fn add_card(
        &self,
        session: &AccountSession,
        deck: &DeckInfo,
        note_type: &NoteTypeInfo,
        fields: &[FieldInfo],
        card: &CardContent,
    ) -> AccountResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.add_card += 1;
        Self::check(&mut state, session)?;
        state
            .cards
            .push((deck.clone(), note_type.clone(), card.field_values(fields)));
        Ok(())
    }

    async fn create_deck(&self, session: &AccountSession, name: &str) -> AccountResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.create_deck += 1;
        Self::check(&mut state, session)?;
        let deck_id = state.decks.iter().map(|d| d.deck_id).max().unwrap_or(0) + 1;
        state.decks.push(DeckInfo {
            deck_id,
            deck_name: name.to_string(),
        });
        Ok(())
    }
}
