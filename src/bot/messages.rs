//! User-facing texts
//!
//! Failures reach the user only through the fixed texts below; error
//! details stay in the logs.

use crate::session::{GuardError, SetupStep};

pub const WELCOME: &str = "Hi! I turn words into Anki cards.\n\n\
     First connect your AnkiWeb account with /login. Your password is \
     encrypted before it is stored, and only in the message I pin in this \
     chat. Please don't unpin that message: it holds everything I remember \
     about our conversation.";

pub const REQUIRE_LOGIN: &str = "Use /login first so I can access your Anki account.";
pub const ASK_EMAIL: &str = "Send me the email of your AnkiWeb account.";
pub const EMAIL_MISSPELLED: &str =
    "The email seems to be misspelled. Could you please send it again?";
pub const ASK_SECRET: &str = "Send me your AnkiWeb password. \
    I'll delete your message right away and keep it only encrypted.";
pub const EMAIL_FIRST: &str = "Please send the email first.";
pub const SECRET_EMPTY: &str = "No password seems to be found. Could you please send it again?";
pub const LOGIN_FAILED: &str =
    "I couldn't log in with this password. Send me another one or call /login again.";
pub const LOGIN_UNREACHABLE: &str =
    "I couldn't reach AnkiWeb. Please send the password again in a moment.";

pub const CHOOSE_DECK: &str = "Choose a deck for new cards:";
pub const NO_DECKS: &str = "Your account has no decks yet. Create one with /add_deck.";
pub const DECK_NOT_FOUND: &str =
    "I can't find this deck anymore. Use /decks to see the current list.";
pub const USE_DECK_BUTTONS: &str =
    "Please pick a deck from the buttons above, or /add_deck to create one.";
pub const NO_NOTE_TYPES: &str = "Your account has no note types, so I can't make cards yet.";
pub const ASK_DECK_NAME: &str = "Send me a name for the new deck.";
pub const DECK_NAME_EMPTY: &str = "The deck name can't be empty. Send me a name for the new deck.";
pub const DECK_CREATED_UNLISTED: &str =
    "The deck was created, but I couldn't select it. Choose it with /decks.";

pub const ASK_LANGUAGE_FROM: &str = "Which language do you translate from?";
pub const ASK_LANGUAGE_TO: &str = "Which language do you translate to?";
pub const UNSUPPORTED_LANGUAGE: &str =
    "I don't know this language. Please pick one of the buttons.";
pub const SAME_LANGUAGE: &str = "Please choose a different language to translate to.";

pub const PICK_TRANSLATION: &str = "Pick a translation to make a card:";
pub const NO_TRANSLATIONS: &str = "I couldn't find translations for this word.";
pub const TRANSLATION_FAILED: &str = "I couldn't translate this word right now. Please try again.";
pub const UNSUPPORTED_PAIR: &str =
    "This language pair isn't supported by the translator. Choose others with /lang.";

pub const STALE_BUTTON: &str = "This button is no longer active.";
pub const COULD_NOT_RESUME: &str =
    "I couldn't resume your AnkiWeb session. Please /login again.";
pub const TRY_AGAIN: &str = "AnkiWeb didn't respond. Please try again later.";
pub const SAVE_FAILED: &str = "Something went wrong while saving your progress. Please try again.";

/// Reply for a guarded call that gave up
pub fn guard_failure(error: &GuardError) -> &'static str {
    match error {
        GuardError::CouldNotResume(_) => COULD_NOT_RESUME,
        GuardError::FailedAfterRetries { .. } => TRY_AGAIN,
        GuardError::Store(_) => SAVE_FAILED,
    }
}

/// What to do next, given the missing setup step
pub fn next_step(missing: Option<SetupStep>) -> &'static str {
    match missing {
        Some(SetupStep::ChooseDeck) => {
            "All is good! Now choose a deck with /decks, or create one with /add_deck."
        }
        Some(SetupStep::ChooseLanguages) => "All is good! Now choose the languages with /lang.",
        None => "All is good! Send me a word to make a card.",
    }
}

pub fn deck_selected(deck_name: &str) -> String {
    format!("New cards go to \"{}\".", deck_name)
}

pub fn languages_selected(from: &str, to: &str) -> String {
    format!(
        "Translating from {} to {}.",
        language_label(from),
        language_label(to)
    )
}

pub fn card_added(deck_name: &str, front: &str, back: &str) -> String {
    format!("Card added to \"{}\": {} \u{2192} {}", deck_name, front, back)
}

/// Button label of a language code
pub fn language_label(code: &str) -> String {
    match code {
        "en" => "English".to_string(),
        "de" => "Deutsch".to_string(),
        "fi" => "Suomi".to_string(),
        "fr" => "Fran\u{e7}ais".to_string(),
        "es" => "Espa\u{f1}ol".to_string(),
        "ru" => "\u{420}\u{443}\u{441}\u{441}\u{43a}\u{438}\u{439}".to_string(),
        other => other.to_uppercase(),
    }
}
