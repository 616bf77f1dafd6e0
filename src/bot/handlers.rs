//! Conversation handlers
//!
//! A handler gets the context, the event and the loaded state and returns a
//! [`Transition`]: the next state plus the chat effects to run. Handlers
//! never write the state themselves; only the guard persists a renewed
//! session mid-event, and the dispatcher tracks that through
//! [`HandlerContext::persisted`].

use super::commands::parse_email;
use super::messages;
use super::routes::Route;
use super::settings::BotSettings;
use crate::anki::{
    AccountApi, AccountError, AccountResult, AccountSession, CardContent, DeckInfo, NoteTypeInfo,
};
use crate::chat::{ChatTransport, EventKind, InboundEvent, MessageId, PersistedHandle, ReplyOption};
use crate::session::{bounded, CallGuard, ClientStatus, ConversationState, GuardError, StateStore};
use crate::translation::{TranslationError, Translator};
use std::future::Future;
use tracing::{debug, info, warn};

/// Chat side effect, executed after the state is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Reply {
        text: String,
        options: Vec<ReplyOption>,
    },
    Delete(MessageId),
    Acknowledge(String),
}

/// Result of a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ConversationState,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn to(state: ConversationState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.reply_with(text, Vec::new())
    }

    pub fn reply_with(mut self, text: impl Into<String>, options: Vec<ReplyOption>) -> Self {
        self.effects.push(Effect::Reply {
            text: text.into(),
            options,
        });
        self
    }

    pub fn delete(mut self, message: MessageId) -> Self {
        self.effects.push(Effect::Delete(message));
        self
    }
}

/// Everything a handler may use for one event
pub struct HandlerContext<'a, T: ChatTransport, A: AccountApi, L: Translator> {
    pub store: &'a StateStore<T>,
    pub account: &'a A,
    pub translator: &'a L,
    pub settings: &'a BotSettings,
    /// Latest handle of the chat's state message
    pub handle: PersistedHandle,
    /// Last state known to be persisted
    pub persisted: ConversationState,
}

impl<'a, T: ChatTransport, A: AccountApi, L: Translator> HandlerContext<'a, T, A, L> {
    /// Run an account call through the guard, tracking what it persisted
    async fn guarded<R, F, Fut>(
        &mut self,
        state: ConversationState,
        operation: F,
    ) -> (ConversationState, Result<R, GuardError>)
    where
        F: FnMut(AccountSession) -> Fut,
        Fut: Future<Output = AccountResult<R>>,
    {
        let guard = CallGuard::new(self.store, self.account, self.settings.guard);
        let guarded = guard.call(state, self.handle, operation).await;
        self.handle = guarded.handle;
        if guarded.renewed {
            self.persisted = guarded.state.clone();
        }
        (guarded.state, guarded.result)
    }

    async fn list_decks_and_note_types(
        &mut self,
        state: ConversationState,
    ) -> (
        ConversationState,
        Result<(Vec<DeckInfo>, Vec<NoteTypeInfo>), GuardError>,
    ) {
        let account = self.account;
        self.guarded(state, |session| async move {
            account.list_decks_and_note_types(&session).await
        })
        .await
    }
}

/// Run the handler selected by `route`
pub async fn handle<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    route: Route,
    state: ConversationState,
    event: &InboundEvent,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    match route {
        Route::Start => Transition::to(state).reply(messages::WELCOME),
        Route::Help => Transition::to(state).reply(super::commands::help_text()),
        Route::Login => Transition::to(state.with_status(ClientStatus::SetEmail))
            .reply(messages::ASK_EMAIL),
        Route::RequireLogin => Transition::to(state).reply(messages::REQUIRE_LOGIN),
        Route::StaleButton => Transition::to(state).reply(messages::STALE_BUTTON),
        Route::RemindDeckButtons => Transition::to(state).reply(messages::USE_DECK_BUTTONS),
        Route::SubmitEmail(text) => submit_email(state, &text),
        Route::SubmitSecret(text) => {
            let message = match &event.kind {
                EventKind::Text { message, .. } => Some(*message),
                EventKind::Button { .. } => None,
            };
            submit_secret(ctx, state, message, &text).await
        }
        Route::ListDecks => list_decks(ctx, state).await,
        Route::ChooseDeck(deck_id) => choose_deck(ctx, state, deck_id).await,
        Route::BeginCreateDeck => Transition::to(state.with_status(ClientStatus::CreateDeck))
            .reply(messages::ASK_DECK_NAME),
        Route::SubmitDeckName(name) => submit_deck_name(ctx, state, &name).await,
        Route::BeginLanguageSelection => begin_language_selection(ctx.settings, state),
        Route::SubmitLanguage(code) => submit_language(ctx.settings, state, &code),
        Route::TranslateWord(word) => translate_word(ctx, state, &word).await,
        Route::CreateCard(index) => {
            let origin = match &event.kind {
                EventKind::Button { origin, .. } => origin.as_ref(),
                EventKind::Text { .. } => None,
            };
            let picked = origin.and_then(|origin| {
                let data = super::commands::ButtonAction::PickTranslation(index).data();
                let option = origin.options.iter().find(|option| option.data == data)?;
                let front = origin.text.lines().next()?.trim().to_string();
                Some(CardContent {
                    front_text: front,
                    back_text: option.label.clone(),
                })
            });
            match picked {
                Some(card) if !card.front_text.is_empty() => create_card(ctx, state, card).await,
                _ => Transition::to(state).reply(messages::STALE_BUTTON),
            }
        }
    }
}

fn submit_email(state: ConversationState, text: &str) -> Transition {
    match parse_email(text) {
        Some(email) => Transition::to(
            state
                .with_email(email)
                .with_status(ClientStatus::SetSecret),
        )
        .reply(messages::ASK_SECRET),
        None => Transition::to(state).reply(messages::EMAIL_MISSPELLED),
    }
}

async fn submit_secret<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    state: ConversationState,
    message: Option<MessageId>,
    text: &str,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    // The password leaves the chat before anything else happens
    let deleted = |transition: Transition| match message {
        Some(message) => transition.delete(message),
        None => transition,
    };

    if state.account_email.is_empty() {
        return deleted(Transition::to(state.with_status(ClientStatus::SetEmail)))
            .reply(messages::EMAIL_FIRST);
    }
    let secret = text.trim();
    if secret.is_empty() {
        return deleted(Transition::to(state)).reply(messages::SECRET_EMPTY);
    }

    let login = bounded(
        ctx.settings.call_timeout(),
        ctx.account.authenticate(&state.account_email, secret),
        AccountError::Timeout,
    )
    .await;

    match login {
        Ok(session) => {
            info!(channel = %ctx.handle.channel, "account connected");
            let next = state
                .with_secret(secret)
                .with_session(session)
                .with_status(ClientStatus::Authorized);
            let hint = messages::next_step(next.missing_setup());
            deleted(Transition::to(next)).reply(hint)
        }
        Err(AccountError::AuthFailed(reason)) => {
            debug!(channel = %ctx.handle.channel, %reason, "login refused");
            deleted(Transition::to(state)).reply(messages::LOGIN_FAILED)
        }
        Err(e) => {
            warn!(channel = %ctx.handle.channel, error = %e, "login failed");
            deleted(Transition::to(state)).reply(messages::LOGIN_UNREACHABLE)
        }
    }
}

fn deck_buttons(decks: &[DeckInfo]) -> Vec<ReplyOption> {
    decks
        .iter()
        .map(|deck| {
            ReplyOption::new(
                deck.deck_name.clone(),
                super::commands::ButtonAction::SelectDeck(deck.deck_id).data(),
            )
        })
        .collect()
}

async fn list_decks<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    state: ConversationState,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    let (state, listed) = ctx.list_decks_and_note_types(state).await;
    match listed {
        Ok((decks, _)) if decks.is_empty() => {
            Transition::to(state.with_status(ClientStatus::Authorized)).reply(messages::NO_DECKS)
        }
        Ok((decks, _)) => Transition::to(state.with_status(ClientStatus::SelectDeck))
            .reply_with(messages::CHOOSE_DECK, deck_buttons(&decks)),
        Err(e) => {
            warn!(channel = %ctx.handle.channel, error = %e, "listing decks failed");
            Transition::to(state).reply(messages::guard_failure(&e))
        }
    }
}

/// Note type for new cards: the configured one, else a "Basic" one, else any
pub fn pick_note_type(note_types: &[NoteTypeInfo], preferred: &str) -> Option<NoteTypeInfo> {
    note_types
        .iter()
        .find(|note_type| note_type.note_name == preferred)
        .or_else(|| {
            note_types
                .iter()
                .find(|note_type| note_type.note_name.starts_with("Basic"))
        })
        .or_else(|| note_types.first())
        .cloned()
}

fn select_deck(
    settings: &BotSettings,
    state: ConversationState,
    deck: DeckInfo,
    note_types: &[NoteTypeInfo],
) -> Transition {
    let note_type = pick_note_type(note_types, &settings.default_note_type);
    let next = state
        .with_deck(deck.clone())
        .with_note_type(note_type.clone())
        .with_status(ClientStatus::Authorized);

    let mut transition =
        Transition::to(next.clone()).reply(messages::deck_selected(&deck.deck_name));
    if note_type.is_none() {
        transition = transition.reply(messages::NO_NOTE_TYPES);
    } else if let Some(missing) = next.missing_setup() {
        transition = transition.reply(messages::next_step(Some(missing)));
    }
    transition
}

async fn choose_deck<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    state: ConversationState,
    deck_id: i64,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    let (state, listed) = ctx.list_decks_and_note_types(state).await;
    match listed {
        Ok((decks, note_types)) => match decks.into_iter().find(|deck| deck.deck_id == deck_id) {
            Some(deck) => {
                info!(channel = %ctx.handle.channel, deck_id, "deck selected");
                select_deck(ctx.settings, state, deck, &note_types)
            }
            None => Transition::to(state).reply(messages::DECK_NOT_FOUND),
        },
        Err(e) => {
            warn!(channel = %ctx.handle.channel, error = %e, "deck selection failed");
            Transition::to(state).reply(messages::guard_failure(&e))
        }
    }
}

async fn submit_deck_name<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    state: ConversationState,
    name: &str,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    let name = name.trim();
    if name.is_empty() {
        return Transition::to(state).reply(messages::DECK_NAME_EMPTY);
    }

    let account = ctx.account;
    let (state, created) = ctx
        .guarded(state, |session| async move {
            account.create_deck(&session, name).await
        })
        .await;
    if let Err(e) = created {
        warn!(channel = %ctx.handle.channel, error = %e, "deck creation failed");
        return Transition::to(state).reply(messages::guard_failure(&e));
    }
    info!(channel = %ctx.handle.channel, deck = %name, "deck created");

    let (state, listed) = ctx.list_decks_and_note_types(state).await;
    let created_deck = listed.as_ref().ok().and_then(|(decks, _)| {
        decks.iter().rev().find(|deck| deck.deck_name == name).cloned()
    });
    match (created_deck, listed) {
        (Some(deck), Ok((_, note_types))) => select_deck(ctx.settings, state, deck, &note_types),
        _ => Transition::to(state.with_status(ClientStatus::Authorized))
            .reply(messages::DECK_CREATED_UNLISTED),
    }
}

fn language_buttons(settings: &BotSettings, exclude: &str) -> Vec<ReplyOption> {
    settings
        .languages
        .iter()
        .filter(|code| code.as_str() != exclude)
        .map(|code| {
            ReplyOption::new(
                messages::language_label(code),
                super::commands::ButtonAction::SelectLanguage(code.clone()).data(),
            )
        })
        .collect()
}

fn begin_language_selection(settings: &BotSettings, state: ConversationState) -> Transition {
    Transition::to(
        state
            .without_languages()
            .with_status(ClientStatus::SelectLanguage),
    )
    .reply_with(messages::ASK_LANGUAGE_FROM, language_buttons(settings, ""))
}

fn submit_language(settings: &BotSettings, state: ConversationState, code: &str) -> Transition {
    let code = code.trim().to_lowercase();
    if !settings.supports_language(&code) {
        let exclude = state.language_from.clone();
        return Transition::to(state)
            .reply_with(messages::UNSUPPORTED_LANGUAGE, language_buttons(settings, &exclude));
    }

    if state.language_from.is_empty() {
        let buttons = language_buttons(settings, &code);
        return Transition::to(state.with_language_from(code))
            .reply_with(messages::ASK_LANGUAGE_TO, buttons);
    }
    if state.language_from == code {
        let buttons = language_buttons(settings, &code);
        return Transition::to(state).reply_with(messages::SAME_LANGUAGE, buttons);
    }

    let next = state
        .with_language_to(code)
        .with_status(ClientStatus::Authorized);
    let selected = messages::languages_selected(&next.language_from, &next.language_to);
    let mut transition = Transition::to(next.clone()).reply(selected);
    if let Some(missing) = next.missing_setup() {
        transition = transition.reply(messages::next_step(Some(missing)));
    }
    transition
}

async fn translate_word<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    state: ConversationState,
    word: &str,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    if let Some(missing) = state.missing_setup() {
        return Transition::to(state).reply(messages::next_step(Some(missing)));
    }
    let word = word.trim();

    let translated = bounded(
        ctx.settings.call_timeout(),
        ctx.translator
            .translate(&state.language_from, &state.language_to, word),
        TranslationError::Timeout,
    )
    .await;

    match translated {
        Ok(translation) if translation.candidates.is_empty() => {
            Transition::to(state).reply(messages::NO_TRANSLATIONS)
        }
        Ok(translation) => {
            let options = translation
                .candidates
                .iter()
                .take(ctx.settings.max_candidates.max(1))
                .enumerate()
                .map(|(index, candidate)| {
                    ReplyOption::new(
                        candidate.to_string(),
                        super::commands::ButtonAction::PickTranslation(index).data(),
                    )
                })
                .collect();
            let text = format!("{}\n\n{}", translation.word, messages::PICK_TRANSLATION);
            Transition::to(state).reply_with(text, options)
        }
        Err(TranslationError::UnsupportedPair { from, to }) => {
            debug!(channel = %ctx.handle.channel, %from, %to, "unsupported language pair");
            Transition::to(state).reply(messages::UNSUPPORTED_PAIR)
        }
        Err(e) => {
            warn!(channel = %ctx.handle.channel, error = %e, "translation failed");
            Transition::to(state).reply(messages::TRANSLATION_FAILED)
        }
    }
}

async fn create_card<T, A, L>(
    ctx: &mut HandlerContext<'_, T, A, L>,
    state: ConversationState,
    card: CardContent,
) -> Transition
where
    T: ChatTransport,
    A: AccountApi,
    L: Translator,
{
    let (deck, note_type) = match (state.selected_deck.clone(), state.selected_note_type.clone()) {
        (Some(deck), Some(note_type)) => (deck, note_type),
        (None, _) => {
            let hint = messages::next_step(state.missing_setup());
            return Transition::to(state).reply(hint);
        }
        (Some(_), None) => return Transition::to(state).reply(messages::NO_NOTE_TYPES),
    };

    let account = ctx.account;
    let fields_note_type = &note_type;
    let (state, fields) = ctx
        .guarded(state, |session| async move {
            account.list_fields(&session, fields_note_type).await
        })
        .await;
    let fields = match fields {
        Ok(fields) => fields,
        Err(e) => {
            warn!(channel = %ctx.handle.channel, error = %e, "listing fields failed");
            return Transition::to(state).reply(messages::guard_failure(&e));
        }
    };

    let (deck_ref, note_type_ref, fields_ref, card_ref) = (&deck, &note_type, &fields, &card);
    let (state, added) = ctx
        .guarded(state, |session| async move {
            account
                .add_card(&session, deck_ref, note_type_ref, fields_ref, card_ref)
                .await
        })
        .await;

    match added {
        Ok(()) => {
            info!(channel = %ctx.handle.channel, deck_id = deck.deck_id, "card added");
            Transition::to(state).reply(messages::card_added(
                &deck.deck_name,
                &card.front_text,
                &card.back_text,
            ))
        }
        Err(e) => {
            warn!(channel = %ctx.handle.channel, error = %e, "adding card failed");
            Transition::to(state).reply(messages::guard_failure(&e))
        }
    }
}
