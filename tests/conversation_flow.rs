//! End-to-end conversation scenarios against the in-memory mocks
//!
//! Every test drives the dispatcher with chat events and checks what a user
//! would see (replies, buttons, deleted messages) together with the pinned
//! state message and the number of AnkiWeb calls.

use anker::anki::{DeckInfo, MockAccountApi};
use anker::bot::messages;
use anker::bot::{BotSettings, Dispatched, Dispatcher};
use anker::chat::{
    ButtonOrigin, ChannelId, ChatKind, EventKind, InboundEvent, MessageId, MockTransport, UserId,
};
use anker::crypto::FieldCodec;
use anker::session::{ClientStatus, ConversationState};
use anker::translation::MockTranslator;
use std::sync::Arc;

const CHAT: ChannelId = ChannelId(7);
const EMAIL: &str = "a@b.com";
const SECRET: &str = "correct horse battery staple";

struct Harness {
    transport: MockTransport,
    account: MockAccountApi,
    translator: MockTranslator,
    codec: Arc<FieldCodec>,
    dispatcher: Dispatcher<MockTransport, MockAccountApi, MockTranslator>,
    next_message: i64,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(BotSettings::default())
    }

    fn with_settings(settings: BotSettings) -> Self {
        let transport = MockTransport::new();
        let account = MockAccountApi::with_account(EMAIL, SECRET);
        let translator = MockTranslator::new();
        let codec = Arc::new(FieldCodec::new(&[3u8; 32]).unwrap());
        let dispatcher = Dispatcher::new(
            Arc::new(transport.clone()),
            codec.clone(),
            Arc::new(account.clone()),
            Arc::new(translator.clone()),
            settings,
        );
        Self {
            transport,
            account,
            translator,
            codec,
            dispatcher,
            next_message: 10_000,
        }
    }

    async fn send(&mut self, text: &str) -> ConversationState {
        self.next_message += 1;
        let event = InboundEvent {
            channel: CHAT,
            sender: UserId(CHAT.0),
            chat_kind: ChatKind::Private,
            kind: EventKind::Text {
                message: MessageId(self.next_message),
                text: text.to_string(),
            },
        };
        expect_handled(self.dispatcher.dispatch(event).await.unwrap())
    }

    /// Press the button carrying `data` on the last reply that offered it
    async fn press(&mut self, data: &str) -> ConversationState {
        let reply = self
            .transport
            .replies()
            .into_iter()
            .rev()
            .find(|reply| reply.options.iter().any(|option| option.data == data))
            .unwrap_or_else(|| panic!("no reply offers button {}", data));
        self.next_message += 1;
        let event = InboundEvent {
            channel: CHAT,
            sender: UserId(CHAT.0),
            chat_kind: ChatKind::Private,
            kind: EventKind::Button {
                callback_id: format!("cb{}", self.next_message),
                data: data.to_string(),
                origin: Some(ButtonOrigin {
                    message: reply.message,
                    text: reply.text,
                    options: reply.options,
                }),
            },
        };
        expect_handled(self.dispatcher.dispatch(event).await.unwrap())
    }

    fn last_text(&self) -> String {
        self.transport.last_reply(CHAT).unwrap().text
    }

    fn persisted(&self) -> ConversationState {
        let pinned = self.transport.pinned(CHAT).unwrap();
        ConversationState::decode(&pinned.content, &self.codec).unwrap()
    }

    async fn log_in(&mut self) {
        self.send("/login").await;
        self.send(EMAIL).await;
        self.send(SECRET).await;
    }
}

fn expect_handled(outcome: Dispatched) -> ConversationState {
    match outcome {
        Dispatched::Handled { state, .. } => state,
        Dispatched::Ignored => panic!("event was ignored"),
    }
}

fn german_deck() -> DeckInfo {
    DeckInfo {
        deck_id: 42,
        deck_name: "German".to_string(),
    }
}

#[tokio::test]
async fn test_first_contact_pins_identity_state() {
    let mut harness = Harness::new();

    let state = harness.send("/start").await;

    assert_eq!(state, ConversationState::identity());
    assert_eq!(state.status, ClientStatus::Unauthorized);
    assert_eq!(harness.transport.calls().create_pinned, 1);
    assert_eq!(harness.persisted(), ConversationState::identity());
    assert_eq!(harness.last_text(), messages::WELCOME);
}

#[tokio::test]
async fn test_login_flow_reaches_authorized() {
    let mut harness = Harness::new();
    harness.send("/start").await;
    let pinned = harness.transport.pinned(CHAT).unwrap().handle;

    let state = harness.send("/login").await;
    assert_eq!(state.status, ClientStatus::SetEmail);
    assert_eq!(harness.last_text(), messages::ASK_EMAIL);

    let state = harness.send("Alice <a@b.com>").await;
    assert_eq!(state.status, ClientStatus::SetSecret);
    assert_eq!(state.account_email, EMAIL);

    let state = harness.send(SECRET).await;
    assert_eq!(state.status, ClientStatus::Authorized);
    assert_eq!(state.account_secret, SECRET);
    assert!(state.account_session.is_some());
    assert_eq!(harness.account.calls().authenticate, 1);

    // Same pinned message, edited in place
    assert_eq!(harness.transport.pinned(CHAT).unwrap().handle, pinned);
    assert_eq!(harness.transport.calls().create_pinned, 1);

    // Password message removed, secret stored only encrypted
    assert_eq!(harness.transport.deleted().len(), 1);
    let content = harness.transport.pinned(CHAT).unwrap().content;
    assert!(!content.contains(SECRET));
    assert_eq!(harness.persisted().account_secret, SECRET);
}

#[tokio::test]
async fn test_misspelled_email_keeps_asking() {
    let mut harness = Harness::new();
    harness.send("/login").await;

    let state = harness.send("not-an-email").await;

    assert_eq!(state.status, ClientStatus::SetEmail);
    assert!(state.account_email.is_empty());
    assert_eq!(harness.last_text(), messages::EMAIL_MISSPELLED);
}

#[tokio::test]
async fn test_wrong_password_stays_in_secret_step() {
    let mut harness = Harness::new();
    harness.send("/login").await;
    harness.send(EMAIL).await;

    let state = harness.send("hunter2").await;

    assert_eq!(state.status, ClientStatus::SetSecret);
    assert!(state.account_secret.is_empty());
    assert_eq!(harness.last_text(), messages::LOGIN_FAILED);
    assert_eq!(harness.transport.deleted().len(), 1);
}

#[tokio::test]
async fn test_password_starting_with_slash_is_not_a_command() {
    let mut harness = Harness::new();
    let secret = "/start-of-secret";
    harness.account.add_account("c@d.org", secret);
    harness.send("/login").await;
    harness.send("c@d.org").await;

    let state = harness.send(secret).await;

    assert_eq!(state.status, ClientStatus::Authorized);
    assert_eq!(state.account_secret, secret);
}

#[tokio::test]
async fn test_commands_need_login() {
    let mut harness = Harness::new();

    for command in ["/decks", "/add_deck", "/lang"] {
        let state = harness.send(command).await;
        assert_eq!(state.status, ClientStatus::Unauthorized);
        assert_eq!(harness.last_text(), messages::REQUIRE_LOGIN);
    }
    assert_eq!(harness.account.calls().total(), 0);
}

#[tokio::test]
async fn test_deck_button_selects_deck_with_one_call() {
    let mut harness = Harness::new();
    harness.account.set_decks(vec![german_deck()]);
    harness.log_in().await;
    harness.send("/decks").await;
    harness.account.reset_calls();

    let state = harness.press("deck:42").await;

    assert_eq!(state.status, ClientStatus::Authorized);
    assert_eq!(state.selected_deck, Some(german_deck()));
    assert!(state.selected_note_type.is_some());
    assert_eq!(harness.account.calls().total(), 1);
    assert_eq!(harness.persisted().selected_deck, Some(german_deck()));
    assert_eq!(harness.transport.acknowledged().len(), 1);
}

#[tokio::test]
async fn test_no_decks_points_to_deck_creation() {
    let mut harness = Harness::new();
    harness.log_in().await;

    let state = harness.send("/decks").await;

    assert_eq!(state.status, ClientStatus::Authorized);
    assert_eq!(harness.last_text(), messages::NO_DECKS);
}

#[tokio::test]
async fn test_create_deck_selects_it() {
    let mut harness = Harness::new();
    harness.log_in().await;

    let state = harness.send("/add_deck").await;
    assert_eq!(state.status, ClientStatus::CreateDeck);

    let state = harness.send("Finnish verbs").await;

    assert_eq!(state.status, ClientStatus::Authorized);
    let deck = state.selected_deck.unwrap();
    assert_eq!(deck.deck_name, "Finnish verbs");
    assert_eq!(harness.account.decks().len(), 1);
}

#[tokio::test]
async fn test_expired_session_is_renewed_transparently() {
    let mut harness = Harness::new();
    harness.account.set_decks(vec![german_deck()]);
    harness.log_in().await;
    let before = harness.persisted().account_session.unwrap();
    harness.account.expire_sessions();
    harness.account.reset_calls();

    let state = harness.send("/decks").await;

    assert_eq!(state.status, ClientStatus::SelectDeck);
    assert_eq!(harness.account.calls().authenticate, 1);
    let after = harness.persisted().account_session.unwrap();
    assert_ne!(before, after);
}

#[tokio::test]
async fn test_full_flow_from_login_to_card() {
    let mut harness = Harness::new();
    harness.account.set_decks(vec![german_deck()]);
    harness
        .translator
        .add("de", "en", "Beruf", &["profession", "occupation"]);

    harness.send("/start").await;
    harness.log_in().await;
    harness.send("/decks").await;
    harness.press("deck:42").await;

    let state = harness.send("/lang").await;
    assert_eq!(state.status, ClientStatus::SelectLanguage);
    harness.press("lang:de").await;
    let state = harness.press("lang:en").await;
    assert_eq!(state.status, ClientStatus::Authorized);
    assert_eq!(state.language_from, "de");
    assert_eq!(state.language_to, "en");

    harness.send("Beruf").await;
    let offer = harness.transport.last_reply(CHAT).unwrap();
    assert!(offer.text.starts_with("Beruf"));
    assert_eq!(offer.options.len(), 2);

    let state = harness.press("card:0").await;

    assert_eq!(state.status, ClientStatus::Authorized);
    let cards = harness.account.cards();
    assert_eq!(cards.len(), 1);
    let (deck, _, values) = &cards[0];
    assert_eq!(deck, &german_deck());
    assert_eq!(values, &vec!["Beruf".to_string(), "profession".to_string()]);
    assert_eq!(
        harness.last_text(),
        messages::card_added("German", "Beruf", "profession")
    );
    assert_eq!(harness.transport.calls().create_pinned, 1);
}

#[tokio::test]
async fn test_word_before_setup_gets_hint() {
    let mut harness = Harness::new();
    harness.log_in().await;

    harness.send("Beruf").await;

    assert_eq!(harness.translator.calls(), 0);
    assert_eq!(
        harness.last_text(),
        messages::next_step(Some(anker::session::SetupStep::ChooseDeck))
    );
}

#[tokio::test]
async fn test_button_from_old_step_is_stale() {
    let mut harness = Harness::new();
    harness.log_in().await;
    harness.send("/lang").await;
    harness.press("lang:de").await;
    harness.press("lang:en").await;

    // The language keyboard is still on screen but the step is over
    let state = harness.press("lang:fi").await;

    assert_eq!(state.language_to, "en");
    assert_eq!(harness.last_text(), messages::STALE_BUTTON);
}

#[tokio::test]
async fn test_unserved_users_are_ignored() {
    let settings = BotSettings {
        allowed_users: vec![UserId(1)],
        ..BotSettings::default()
    };
    let harness = Harness::with_settings(settings);

    let outcome = harness
        .dispatcher
        .dispatch(InboundEvent {
            channel: CHAT,
            sender: UserId(CHAT.0),
            chat_kind: ChatKind::Private,
            kind: EventKind::Text {
                message: MessageId(1),
                text: "/start".to_string(),
            },
        })
        .await
        .unwrap();

    assert_eq!(outcome, Dispatched::Ignored);
    assert!(harness.transport.replies().is_empty());
    assert_eq!(harness.transport.calls().get_pinned, 0);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let mut harness = Harness::new();
    harness.account.set_decks(vec![german_deck()]);
    harness.log_in().await;
    harness.send("/decks").await;
    harness.press("deck:42").await;

    // A new dispatcher over the same chat reads the pinned state back
    let restarted = Dispatcher::new(
        Arc::new(harness.transport.clone()),
        harness.codec.clone(),
        Arc::new(harness.account.clone()),
        Arc::new(harness.translator.clone()),
        BotSettings::default(),
    );
    let state = expect_handled(
        restarted
            .dispatch(InboundEvent {
                channel: CHAT,
                sender: UserId(CHAT.0),
                chat_kind: ChatKind::Private,
                kind: EventKind::Text {
                    message: MessageId(1),
                    text: "/help".to_string(),
                },
            })
            .await
            .unwrap(),
    );

    assert_eq!(state.status, ClientStatus::Authorized);
    assert_eq!(state.selected_deck, Some(german_deck()));
    assert_eq!(state.account_secret, SECRET);
}
