//! Routing table
//!
//! Pure mapping from (input, conversation step) to the handler that runs.
//! Every combination has a route; inputs a step does not expect fall back
//! to a reply that leaves the state alone.

use super::commands::{ButtonAction, Command, Input};
use crate::session::ClientStatus;

/// Handler selected for an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Start,
    Help,
    Login,
    ListDecks,
    BeginCreateDeck,
    BeginLanguageSelection,
    SubmitEmail(String),
    SubmitSecret(String),
    SubmitDeckName(String),
    SubmitLanguage(String),
    TranslateWord(String),
    ChooseDeck(i64),
    CreateCard(usize),
    /// Text while deck buttons are pending
    RemindDeckButtons,
    /// The step needs a login first
    RequireLogin,
    /// Button that does not apply to the current step
    StaleButton,
}

/// Pick the handler for `input` in step `status`
pub fn route(input: &Input, status: ClientStatus) -> Route {
    use ClientStatus::*;

    match input {
        Input::Command(command) => match command {
            Command::Start => Route::Start,
            Command::Help => Route::Help,
            Command::Login => Route::Login,
            Command::Decks if status.is_authorized() => Route::ListDecks,
            Command::AddDeck if status.is_authorized() => Route::BeginCreateDeck,
            Command::Lang if status.is_authorized() => Route::BeginLanguageSelection,
            Command::Decks | Command::AddDeck | Command::Lang => Route::RequireLogin,
            // Unknown commands are plain text (passwords may start with a slash)
            Command::Unknown(text) => route(&Input::Text(text.clone()), status),
        },

        Input::Text(text) => match status {
            Unauthorized => Route::RequireLogin,
            SetEmail => Route::SubmitEmail(text.clone()),
            SetSecret => Route::SubmitSecret(text.clone()),
            SelectDeck => Route::RemindDeckButtons,
            CreateDeck => Route::SubmitDeckName(text.clone()),
            SelectLanguage => Route::SubmitLanguage(text.clone()),
            Authorized => Route::TranslateWord(text.clone()),
        },

        Input::Button(_) if !status.is_authorized() => Route::RequireLogin,
        Input::Button(action) => match (action, status) {
            (ButtonAction::SelectDeck(id), Authorized | SelectDeck) => Route::ChooseDeck(*id),
            (ButtonAction::SelectLanguage(code), SelectLanguage) => {
                Route::SubmitLanguage(code.clone())
            }
            (ButtonAction::PickTranslation(index), Authorized) => Route::CreateCard(*index),
            _ => Route::StaleButton,
        },
    }
}
