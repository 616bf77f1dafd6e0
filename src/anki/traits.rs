//! Anki Account Trait Abstractions
//!
//! Everything returned here is opaque to the conversation core: it is
//! serialized into the pinned state message and handed back to the API.
//! The core only reads deck ids, note-type names and field layout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Logged-in account session (cookie tokens and CSRF token)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSession {
    pub username: String,
    /// `ankiweb` cookie for the main site
    pub token: String,
    /// `ankiweb` cookie for the editor domain
    pub usernet_token: String,
    /// CSRF token of the card editor
    pub card_token: String,
}

/// Deck reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckInfo {
    pub deck_id: i64,
    pub deck_name: String,
}

/// Note type reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTypeInfo {
    pub note_id: i64,
    pub note_name: String,
}

/// Field of a note type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_name: String,
    pub order: u32,
}

/// Content of a new card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub front_text: String,
    pub back_text: String,
}

impl CardContent {
    /// Field values in note-type order: `Front`/`Back` get the card text,
    /// every other field stays empty.
    pub fn field_values(&self, fields: &[FieldInfo]) -> Vec<String> {
        let mut ordered: Vec<&FieldInfo> = fields.iter().collect();
        ordered.sort_by_key(|field| field.order);
        ordered
            .into_iter()
            .map(|field| match field.field_name.as_str() {
                "Front" => self.front_text.clone(),
                "Back" => self.back_text.clone(),
                _ => String::new(),
            })
            .collect()
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;

/// Account API errors
///
/// `AuthorizationExpired` is the one kind the call guard recovers from by
/// logging in again; everything except `AuthFailed` is treated as transient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// Credentials were refused at login
    #[error("Login failed: {0}")]
    AuthFailed(String),

    /// The stored session is no longer accepted
    #[error("Session expired")]
    AuthorizationExpired,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Anki account abstraction
#[async_trait]
pub trait AccountApi: Send + Sync + 'static {
    /// Log in and obtain a fresh session
    async fn authenticate(&self, email: &str, secret: &str) -> AccountResult<AccountSession>;

    /// List decks and note types of the account
    async fn list_decks_and_note_types(
        &self,
        session: &AccountSession,
    ) -> AccountResult<(Vec<DeckInfo>, Vec<NoteTypeInfo>)>;

    /// List the fields of a note type
    async fn list_fields(
        &self,
        session: &AccountSession,
        note_type: &NoteTypeInfo,
    ) -> AccountResult<Vec<FieldInfo>>;

    /// Add a card to a deck
    async fn add_card(
        &self,
        session: &AccountSession,
        deck: &DeckInfo,
        note_type: &NoteTypeInfo,
        fields: &[FieldInfo],
        card: &CardContent,
    ) -> AccountResult<()>;

    /// Create a new deck
    async fn create_deck(&self, session: &AccountSession, name: &str) -> AccountResult<()>;
}
