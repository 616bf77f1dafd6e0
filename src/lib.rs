//! Anker - Telegram bot for Anki flashcards
//!
//! Looks up translations of a word and saves the chosen pair as a card in
//! the user's AnkiWeb deck.
//!
//! Key principles:
//! - NO database: each chat keeps its state in one pinned message
//! - Account secrets leave the process only encrypted
//! - One worker per chat, so events of a chat apply in order
//! - AnkiWeb calls retry a bounded number of times and re-login once

pub mod anki;
pub mod bot;
pub mod chat;
pub mod crypto;
pub mod session;
pub mod telegram;
pub mod translation;
