//! Translation backends
//!
//! The bot offers translation candidates for a word; the user picks one
//! and it becomes the back of the card.

pub mod cache;
pub mod libre;
pub mod mock;
pub mod traits;

pub use cache::CachedTranslator;
pub use libre::LibreTranslateClient;
pub use mock::MockTranslator;
pub use traits::{
    Candidate, PartOfSpeech, Translation, TranslationError, TranslationResult, Translator,
};
