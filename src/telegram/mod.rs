//! Telegram transport
//!
//! The production [`ChatTransport`](crate::chat::ChatTransport): Bot API
//! long polling for events, inline keyboards for reply options and a pinned
//! message per chat for the conversation state.

pub mod api;
pub mod client;

pub use client::{check_token, TelegramTransport, DEFAULT_API_URL};
