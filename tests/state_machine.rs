//! State machine properties: every status answers every input, account
//! calls stay bounded, and persistence failures are handled without losing
//! the chat.

use anker::anki::{AccountError, DeckInfo, MockAccountApi};
use anker::bot::messages;
use anker::bot::{BotSettings, Dispatched, Dispatcher};
use anker::chat::{
    ChannelId, ChatKind, EventKind, InboundEvent, MessageId, MockTransport, UserId,
};
use anker::crypto::FieldCodec;
use anker::session::{ClientStatus, ConversationState};
use anker::translation::MockTranslator;
use std::sync::Arc;

const CHAT: ChannelId = ChannelId(21);

struct Fixture {
    transport: MockTransport,
    account: MockAccountApi,
    codec: Arc<FieldCodec>,
    dispatcher: Dispatcher<MockTransport, MockAccountApi, MockTranslator>,
}

fn fixture() -> Fixture {
    let transport = MockTransport::new();
    let account = MockAccountApi::with_account("a@b.com", "pw");
    account.set_decks(vec![DeckInfo {
        deck_id: 42,
        deck_name: "German".to_string(),
    }]);
    let codec = Arc::new(FieldCodec::new(&[5u8; 32]).unwrap());
    let dispatcher = Dispatcher::new(
        Arc::new(transport.clone()),
        codec.clone(),
        Arc::new(account.clone()),
        Arc::new(MockTranslator::new()),
        BotSettings::default(),
    );
    Fixture {
        transport,
        account,
        codec,
        dispatcher,
    }
}

/// Logged-in state with a deck and languages, moved to `status`
fn seeded_state(fixture: &Fixture, status: ClientStatus) -> ConversationState {
    let deck = DeckInfo {
        deck_id: 42,
        deck_name: "German".to_string(),
    };
    ConversationState::identity()
        .with_email("a@b.com")
        .with_secret("pw")
        .with_session(fixture.account.issue_session("a@b.com"))
        .with_deck(deck)
        .with_note_type(None)
        .with_language_from("de")
        .with_language_to("en")
        .with_status(status)
}

fn seed(fixture: &Fixture, state: &ConversationState) {
    let content = state.encode(&fixture.codec).unwrap();
    fixture.transport.seed_pinned(CHAT, &content);
}

fn text(body: &str) -> InboundEvent {
    InboundEvent {
        channel: CHAT,
        sender: UserId(CHAT.0),
        chat_kind: ChatKind::Private,
        kind: EventKind::Text {
            message: MessageId(500),
            text: body.to_string(),
        },
    }
}

fn button(data: &str) -> InboundEvent {
    InboundEvent {
        channel: CHAT,
        sender: UserId(CHAT.0),
        chat_kind: ChatKind::Private,
        kind: EventKind::Button {
            callback_id: "cb".to_string(),
            data: data.to_string(),
            origin: None,
        },
    }
}

fn inputs() -> Vec<InboundEvent> {
    vec![
        text("/start"),
        text("/login"),
        text("/decks"),
        text("/add_deck"),
        text("/lang"),
        text("/help"),
        text("/frobnicate"),
        text("Beruf"),
        text("someone@example.com"),
        text("de"),
        button("deck:42"),
        button("deck:7"),
        button("lang:de"),
        button("card:0"),
        button("nonsense"),
    ]
}

#[tokio::test]
async fn test_every_status_answers_every_input() {
    for status in ClientStatus::ALL {
        for event in inputs() {
            let fixture = fixture();
            seed(&fixture, &seeded_state(&fixture, status));
            let is_button = matches!(event.kind, EventKind::Button { .. });
            let description = format!("{:?} in {:?}", event.kind, status);

            let outcome = fixture.dispatcher.dispatch(event).await;

            match outcome {
                Ok(Dispatched::Handled { state, .. }) => {
                    assert!(ClientStatus::ALL.contains(&state.status), "{}", description);
                    let pinned = fixture.transport.pinned(CHAT).unwrap();
                    let persisted =
                        ConversationState::decode(&pinned.content, &fixture.codec).unwrap();
                    assert_eq!(persisted, state, "{}", description);
                }
                other => panic!("{}: unexpected outcome {:?}", description, other),
            }
            assert!(!fixture.transport.replies().is_empty(), "{}", description);
            if is_button {
                assert_eq!(fixture.transport.acknowledged().len(), 1, "{}", description);
            }
            assert_eq!(fixture.transport.calls().create_pinned, 0, "{}", description);
        }
    }
}

#[tokio::test]
async fn test_unauthorized_never_calls_account() {
    for event in inputs() {
        let fixture = fixture();

        fixture.dispatcher.dispatch(event).await.unwrap();

        assert_eq!(fixture.account.calls().total(), 0);
    }
}

#[tokio::test]
async fn test_persistent_failure_stops_after_five_attempts() {
    let fixture = fixture();
    let state = seeded_state(&fixture, ClientStatus::Authorized);
    seed(&fixture, &state);
    fixture.account.fail_always(Some(AccountError::Network("502".to_string())));

    let outcome = fixture.dispatcher.dispatch(text("/decks")).await.unwrap();

    assert_eq!(fixture.account.calls().list_decks_and_note_types, 5);
    assert_eq!(fixture.account.calls().authenticate, 0);
    assert_eq!(
        fixture.transport.last_reply(CHAT).unwrap().text,
        messages::TRY_AGAIN
    );
    match outcome {
        Dispatched::Handled { state: after, .. } => assert_eq!(after, state),
        Dispatched::Ignored => panic!("event was ignored"),
    }
}

#[tokio::test]
async fn test_second_expiry_gives_up_after_one_renewal() {
    let fixture = fixture();
    seed(&fixture, &seeded_state(&fixture, ClientStatus::Authorized));
    fixture.account.queue_failure(AccountError::AuthorizationExpired);
    fixture.account.queue_failure(AccountError::AuthorizationExpired);

    fixture.dispatcher.dispatch(text("/decks")).await.unwrap();

    let calls = fixture.account.calls();
    assert_eq!(calls.authenticate, 1);
    assert_eq!(calls.list_decks_and_note_types, 2);
    assert_eq!(
        fixture.transport.last_reply(CHAT).unwrap().text,
        messages::COULD_NOT_RESUME
    );
}

#[tokio::test]
async fn test_rejected_edit_creates_exactly_one_replacement() {
    let fixture = fixture();
    seed(&fixture, &ConversationState::identity());
    fixture.transport.reject_updates(true);

    fixture.dispatcher.dispatch(text("/login")).await.unwrap();

    assert_eq!(fixture.transport.calls().create_pinned, 1);
    assert_eq!(fixture.transport.unpinned().len(), 1);
    let pinned = fixture.transport.pinned(CHAT).unwrap();
    let persisted = ConversationState::decode(&pinned.content, &fixture.codec).unwrap();
    assert_eq!(persisted.status, ClientStatus::SetEmail);
}

#[tokio::test]
async fn test_unreadable_chat_starts_over_from_identity() {
    let fixture = fixture();
    fixture.transport.fail_reads(true);

    let outcome = fixture.dispatcher.dispatch(text("/start")).await.unwrap();

    match outcome {
        Dispatched::Handled { state, handle } => {
            assert_eq!(state, ConversationState::identity());
            assert_eq!(fixture.transport.pinned(CHAT).unwrap().handle, handle);
        }
        Dispatched::Ignored => panic!("event was ignored"),
    }
    assert_eq!(fixture.transport.calls().create_pinned, 1);
    assert_eq!(
        fixture.transport.last_reply(CHAT).unwrap().text,
        messages::WELCOME
    );
}

#[tokio::test]
async fn test_unpersistable_chat_gets_notice() {
    let fixture = fixture();
    fixture.transport.fail_reads(true);
    fixture.transport.fail_creates(true);

    let result = fixture.dispatcher.dispatch(text("/start")).await;

    assert!(result.is_err());
    assert_eq!(
        fixture.transport.last_reply(CHAT).unwrap().text,
        messages::SAVE_FAILED
    );
}

#[tokio::test]
async fn test_corrupt_pin_is_replaced_with_identity() {
    let fixture = fixture();
    let old = fixture.transport.seed_pinned(CHAT, "{\"status\": 99}");

    let outcome = fixture.dispatcher.dispatch(text("/help")).await.unwrap();

    match outcome {
        Dispatched::Handled { state, handle } => {
            assert_eq!(state, ConversationState::identity());
            assert_ne!(handle, old);
        }
        Dispatched::Ignored => panic!("event was ignored"),
    }
    assert_eq!(fixture.transport.unpinned(), vec![old]);
    assert_eq!(fixture.transport.calls().create_pinned, 1);
}
