//! Runtime settings of the conversation core

use crate::chat::{ChatKind, InboundEvent, UserId};
use crate::session::GuardPolicy;
use std::time::Duration;

/// Note type picked on deck selection when the account has it
pub const DEFAULT_NOTE_TYPE: &str = "Basic (and reversed card)";

/// Settings shared by every chat
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Users served; empty serves everyone
    pub allowed_users: Vec<UserId>,
    /// Language codes offered as buttons
    pub languages: Vec<String>,
    pub default_note_type: String,
    pub guard: GuardPolicy,
    /// Translation candidates offered per word
    pub max_candidates: usize,
    /// Idle period after which a chat worker exits
    pub worker_idle_timeout: Duration,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            allowed_users: Vec::new(),
            languages: vec!["en".to_string(), "de".to_string(), "fi".to_string()],
            default_note_type: DEFAULT_NOTE_TYPE.to_string(),
            guard: GuardPolicy::default(),
            max_candidates: 8,
            worker_idle_timeout: Duration::from_secs(600),
        }
    }
}

impl BotSettings {
    pub fn call_timeout(&self) -> Duration {
        self.guard.call_timeout
    }

    /// Only private chats of allowed users are served
    pub fn is_allowed(&self, event: &InboundEvent) -> bool {
        event.chat_kind == ChatKind::Private
            && (self.allowed_users.is_empty() || self.allowed_users.contains(&event.sender))
    }

    pub fn supports_language(&self, code: &str) -> bool {
        self.languages.iter().any(|language| language == code)
    }
}
