//! Per-chat conversation state
//!
//! `ConversationState` is the whole durable memory of the bot for one chat.
//! It is rebuilt from the pinned state message on every event, changed with
//! the `with_*` helpers below and written back once per event.

use crate::anki::{AccountSession, DeckInfo, NoteTypeInfo};
use crate::crypto::{CodecError, FieldCodec};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Step of the conversation the chat is in.
///
/// Persisted as its ordinal. The ordinals are fixed; an ordinal this build
/// does not know makes the whole record unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ClientStatus {
    /// No account yet, waiting for `/login`
    Unauthorized,
    /// Waiting for the account email
    SetEmail,
    /// Waiting for the account password
    SetSecret,
    /// Deck buttons were offered
    SelectDeck,
    /// Waiting for the name of a new deck
    CreateDeck,
    /// Logged in, words become cards
    Authorized,
    /// Language buttons were offered
    SelectLanguage,
}

impl ClientStatus {
    /// Every status, in ordinal order
    pub const ALL: [ClientStatus; 7] = [
        ClientStatus::Unauthorized,
        ClientStatus::SetEmail,
        ClientStatus::SetSecret,
        ClientStatus::SelectDeck,
        ClientStatus::CreateDeck,
        ClientStatus::Authorized,
        ClientStatus::SelectLanguage,
    ];

    pub fn ordinal(self) -> u8 {
        match self {
            ClientStatus::Unauthorized => 1,
            ClientStatus::SetEmail => 2,
            ClientStatus::SetSecret => 3,
            ClientStatus::SelectDeck => 4,
            ClientStatus::CreateDeck => 5,
            ClientStatus::Authorized => 6,
            ClientStatus::SelectLanguage => 7,
        }
    }

    /// `Authorized` and its sub-branches
    pub fn is_authorized(self) -> bool {
        matches!(
            self,
            ClientStatus::Authorized
                | ClientStatus::SelectDeck
                | ClientStatus::CreateDeck
                | ClientStatus::SelectLanguage
        )
    }
}

/// Ordinal that no [`ClientStatus`] maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unknown client status ordinal {0}")]
pub struct UnknownStatus(pub u8);

impl TryFrom<u8> for ClientStatus {
    type Error = UnknownStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ClientStatus::ALL
            .into_iter()
            .find(|status| status.ordinal() == value)
            .ok_or(UnknownStatus(value))
    }
}

impl From<ClientStatus> for u8 {
    fn from(status: ClientStatus) -> Self {
        status.ordinal()
    }
}

/// Setup step still missing before words can become cards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    ChooseDeck,
    ChooseLanguages,
}

/// Conversation state of one chat
#[derive(Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub status: ClientStatus,
    pub account_email: String,
    /// Plaintext in memory, encrypted in the pinned message
    pub account_secret: String,
    pub language_from: String,
    pub language_to: String,
    pub account_session: Option<AccountSession>,
    pub selected_deck: Option<DeckInfo>,
    pub selected_note_type: Option<NoteTypeInfo>,
}

impl fmt::Debug for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationState")
            .field("status", &self.status)
            .field("account_email", &self.account_email)
            .field(
                "account_secret",
                &if self.account_secret.is_empty() { "" } else { "<redacted>" },
            )
            .field("language_from", &self.language_from)
            .field("language_to", &self.language_to)
            .field("has_session", &self.account_session.is_some())
            .field("selected_deck", &self.selected_deck)
            .field("selected_note_type", &self.selected_note_type)
            .finish()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::identity()
    }
}

impl ConversationState {
    /// State of a chat the bot has never seen
    pub fn identity() -> Self {
        Self {
            status: ClientStatus::Unauthorized,
            account_email: String::new(),
            account_secret: String::new(),
            language_from: String::new(),
            language_to: String::new(),
            account_session: None,
            selected_deck: None,
            selected_note_type: None,
        }
    }

    pub fn with_status(&self, status: ClientStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    pub fn with_email(&self, email: impl Into<String>) -> Self {
        Self {
            account_email: email.into(),
            ..self.clone()
        }
    }

    pub fn with_secret(&self, secret: impl Into<String>) -> Self {
        Self {
            account_secret: secret.into(),
            ..self.clone()
        }
    }

    pub fn with_session(&self, session: AccountSession) -> Self {
        Self {
            account_session: Some(session),
            ..self.clone()
        }
    }

    pub fn with_deck(&self, deck: DeckInfo) -> Self {
        Self {
            selected_deck: Some(deck),
            ..self.clone()
        }
    }

    pub fn with_note_type(&self, note_type: Option<NoteTypeInfo>) -> Self {
        Self {
            selected_note_type: note_type,
            ..self.clone()
        }
    }

    /// Clear both languages together so a half-chosen pair never survives
    pub fn without_languages(&self) -> Self {
        Self {
            language_from: String::new(),
            language_to: String::new(),
            ..self.clone()
        }
    }

    pub fn with_language_from(&self, language: impl Into<String>) -> Self {
        Self {
            language_from: language.into(),
            ..self.clone()
        }
    }

    pub fn with_language_to(&self, language: impl Into<String>) -> Self {
        Self {
            language_to: language.into(),
            ..self.clone()
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.account_email.is_empty() && !self.account_secret.is_empty()
    }

    pub fn has_languages(&self) -> bool {
        !self.language_from.is_empty() && !self.language_to.is_empty()
    }

    /// First setup step still missing, if any
    pub fn missing_setup(&self) -> Option<SetupStep> {
        if self.selected_deck.is_none() {
            Some(SetupStep::ChooseDeck)
        } else if !self.has_languages() {
            Some(SetupStep::ChooseLanguages)
        } else {
            None
        }
    }

    /// Convert to the on-chat record, encrypting the secret
    pub fn to_persisted(&self, codec: &FieldCodec) -> Result<PersistedState, CodecError> {
        Ok(PersistedState {
            state: self.status,
            account_email: self.account_email.clone(),
            account_secret: codec.encrypt(&self.account_secret)?,
            language_from: self.language_from.clone(),
            language_to: self.language_to.clone(),
            account_session: self.account_session.clone(),
            selected_deck: self.selected_deck.clone(),
            selected_note_type: self.selected_note_type.clone(),
        })
    }

    /// Rebuild from the on-chat record. An undecryptable secret becomes empty.
    pub fn from_persisted(record: PersistedState, codec: &FieldCodec) -> Self {
        Self {
            status: record.state,
            account_secret: codec.decrypt(&record.account_secret),
            account_email: record.account_email,
            language_from: record.language_from,
            language_to: record.language_to,
            account_session: record.account_session,
            selected_deck: record.selected_deck,
            selected_note_type: record.selected_note_type,
        }
    }

    /// Serialize into the text of the pinned message
    pub fn encode(&self, codec: &FieldCodec) -> Result<String, StateError> {
        let record = self.to_persisted(codec)?;
        serde_json::to_string(&record).map_err(|e| StateError::Encode(e.to_string()))
    }

    /// Parse the text of the pinned message
    pub fn decode(content: &str, codec: &FieldCodec) -> Result<Self, StateError> {
        let record: PersistedState =
            serde_json::from_str(content).map_err(|e| StateError::Decode(e.to_string()))?;
        Ok(Self::from_persisted(record, codec))
    }
}

/// Layout of the pinned state message.
///
/// Scalar keys are always present; a missing secret is `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub state: ClientStatus,
    pub account_email: String,
    pub account_secret: String,
    pub language_from: String,
    pub language_to: String,
    pub account_session: Option<AccountSession>,
    pub selected_deck: Option<DeckInfo>,
    pub selected_note_type: Option<NoteTypeInfo>,
}

/// State (de)serialization errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to encrypt state: {0}")]
    Codec(#[from] CodecError),

    #[error("Failed to encode state: {0}")]
    Encode(String),

    #[error("Failed to decode state: {0}")]
    Decode(String),
}
