//! Anki account access
//!
//! Provides:
//! - The [`AccountApi`] abstraction used by the conversation core
//! - An AnkiWeb client speaking the website's form and JSON endpoints
//! - A mock account for tests

pub mod mock;
pub mod traits;
pub mod web;

pub use mock::{AccountCalls, MockAccountApi};
pub use traits::{
    AccountApi, AccountError, AccountResult, AccountSession, CardContent, DeckInfo, FieldInfo,
    NoteTypeInfo,
};
pub use web::AnkiWebClient;
