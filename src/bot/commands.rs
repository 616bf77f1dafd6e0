//! Inbound input parsing
//!
//! Text messages are either commands (`/login`) or free text whose meaning
//! depends on the conversation step. Button payloads are `kind:value`.

use crate::chat::EventKind;

/// Bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Greeting and pin setup
    Start,

    /// Start (or restart) the login flow
    Login,

    /// Offer the account's decks as buttons
    Decks,

    /// Create a new deck
    AddDeck,

    /// Choose the language pair
    Lang,

    /// Show help
    Help,

    /// Anything starting with `/` that is not a known command (full text)
    Unknown(String),
}

/// Parsed inline button payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// `deck:<id>`
    SelectDeck(i64),

    /// `lang:<code>`
    SelectLanguage(String),

    /// `card:<index>` of a translation candidate
    PickTranslation(usize),

    /// Payload from an older build or a foreign message
    Unknown(String),
}

impl ButtonAction {
    /// Payload carried by the button
    pub fn data(&self) -> String {
        match self {
            ButtonAction::SelectDeck(id) => format!("deck:{}", id),
            ButtonAction::SelectLanguage(code) => format!("lang:{}", code),
            ButtonAction::PickTranslation(index) => format!("card:{}", index),
            ButtonAction::Unknown(data) => data.clone(),
        }
    }
}

/// Input after parsing, independent of the conversation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Text(String),
    Button(ButtonAction),
}

/// Parse a command.
///
/// Accepts the `/cmd@BotName` form Telegram uses in menus. Arguments after
/// the command are ignored; every flow asks for its values step by step.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let word = text.split_whitespace().next().unwrap_or(text);
    let name = word.split('@').next().unwrap_or(word);

    let command = match name.to_lowercase().as_str() {
        "/start" => Command::Start,
        "/login" => Command::Login,
        "/decks" => Command::Decks,
        "/add_deck" => Command::AddDeck,
        "/lang" => Command::Lang,
        "/help" => Command::Help,
        _ => Command::Unknown(text.to_string()),
    };
    Some(command)
}

/// Parse a button payload
pub fn parse_button(data: &str) -> ButtonAction {
    let unknown = || ButtonAction::Unknown(data.to_string());
    let Some((kind, value)) = data.split_once(':') else {
        return unknown();
    };

    match kind {
        "deck" => value
            .parse()
            .map(ButtonAction::SelectDeck)
            .unwrap_or_else(|_| unknown()),
        "lang" if !value.is_empty() => ButtonAction::SelectLanguage(value.to_lowercase()),
        "card" => value
            .parse()
            .map(ButtonAction::PickTranslation)
            .unwrap_or_else(|_| unknown()),
        _ => unknown(),
    }
}

/// Classify an event payload
pub fn classify(kind: &EventKind) -> Input {
    match kind {
        EventKind::Text { text, .. } => match parse_command(text) {
            Some(command) => Input::Command(command),
            None => Input::Text(text.trim().to_string()),
        },
        EventKind::Button { data, .. } => Input::Button(parse_button(data)),
    }
}

/// Extract an email address from `Name <a@b.c>` or a bare address
pub fn parse_email(text: &str) -> Option<String> {
    let text = text.trim();
    let address = match (text.rfind('<'), text.rfind('>')) {
        (Some(start), Some(end)) if start < end => &text[start + 1..end],
        (None, None) => text,
        _ => return None,
    };
    let address = address.trim();
    if address.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = address.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    valid.then(|| address.to_string())
}

/// Help text
pub fn help_text() -> &'static str {
    "Anker turns words into Anki cards.\n\n\
     /login - connect your AnkiWeb account\n\
     /decks - choose the deck new cards go to\n\
     /add_deck - create a new deck and use it\n\
     /lang - choose the languages you translate between\n\
     /help - show this message\n\n\
     Once everything is set up, send me a word and pick a translation."
}
