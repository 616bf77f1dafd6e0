//! Telegram Bot API wire types
//!
//! Only the fields the bot reads or writes are modelled.

use crate::chat::{
    ButtonOrigin, ChannelId, ChatKind, EventKind, InboundEvent, MessageId, ReplyOption, UserId,
};
use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<u16>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    /// Only present in `getChat` responses
    pub pinned_message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardMarkup {
    /// One button per row
    pub fn from_options(options: &[ReplyOption]) -> Self {
        Self {
            inline_keyboard: options
                .iter()
                .map(|option| {
                    vec![InlineKeyboardButton {
                        text: option.label.clone(),
                        callback_data: Some(option.data.clone()),
                    }]
                })
                .collect(),
        }
    }

    pub fn options(&self) -> Vec<ReplyOption> {
        self.inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| {
                let data = button.callback_data.clone()?;
                Some(ReplyOption::new(button.text.clone(), data))
            })
            .collect()
    }
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.kind == "private" {
        ChatKind::Private
    } else {
        ChatKind::Group
    }
}

impl Update {
    /// Convert into an inbound event; updates the bot does not act on
    /// (edits, stickers, service messages) give `None`
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            let origin = ButtonOrigin {
                message: MessageId(message.message_id),
                text: message.text.clone().unwrap_or_default(),
                options: message
                    .reply_markup
                    .as_ref()
                    .map(InlineKeyboardMarkup::options)
                    .unwrap_or_default(),
            };
            return Some(InboundEvent {
                channel: ChannelId(message.chat.id),
                sender: UserId(query.from.id),
                chat_kind: chat_kind(&message.chat),
                kind: EventKind::Button {
                    callback_id: query.id,
                    data: query.data.unwrap_or_default(),
                    origin: Some(origin),
                },
            });
        }

        let message = self.message?;
        let text = message.text?;
        let sender = message.from.as_ref().map(|user| user.id)?;
        Some(InboundEvent {
            channel: ChannelId(message.chat.id),
            sender: UserId(sender),
            chat_kind: chat_kind(&message.chat),
            kind: EventKind::Text {
                message: MessageId(message.message_id),
                text,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_update_becomes_text_event() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":10,"message":{"message_id":5,"from":{"id":77,"is_bot":false},
                "chat":{"id":77,"type":"private"},"date":0,"text":"/login"}}"#,
        )
        .unwrap();

        let event = update.into_event().unwrap();
        assert_eq!(event.channel, ChannelId(77));
        assert_eq!(event.sender, UserId(77));
        assert_eq!(event.chat_kind, ChatKind::Private);
        assert_eq!(
            event.kind,
            EventKind::Text {
                message: MessageId(5),
                text: "/login".to_string()
            }
        );
    }

    #[test]
    fn test_callback_update_carries_origin() {
        let update: Update = serde_json::from_str(
            r#"{"update_id":11,"callback_query":{"id":"cb1","from":{"id":77},
                "message":{"message_id":9,"chat":{"id":77,"type":"private"},"date":0,
                    "text":"Beruf\n\nPick a translation to make a card:",
                    "reply_markup":{"inline_keyboard":[[
                        {"text":"profession","callback_data":"card:0"}]]}},
                "data":"card:0"}}"#,
        )
        .unwrap();

        let event = update.into_event().unwrap();
        match event.kind {
            EventKind::Button {
                callback_id,
                data,
                origin,
            } => {
                assert_eq!(callback_id, "cb1");
                assert_eq!(data, "card:0");
                let origin = origin.unwrap();
                assert_eq!(origin.options, vec![ReplyOption::new("profession", "card:0")]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_group_and_non_text_updates() {
        let group: Update = serde_json::from_str(
            r#"{"update_id":12,"message":{"message_id":1,"from":{"id":1},
                "chat":{"id":-100,"type":"supergroup"},"date":0,"text":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(group.into_event().unwrap().chat_kind, ChatKind::Group);

        let sticker: Update = serde_json::from_str(
            r#"{"update_id":13,"message":{"message_id":2,"from":{"id":1},
                "chat":{"id":1,"type":"private"},"date":0,"sticker":{}}}"#,
        )
        .unwrap();
        assert!(sticker.into_event().is_none());
    }

    #[test]
    fn test_keyboard_layout_is_one_button_per_row() {
        let markup = InlineKeyboardMarkup::from_options(&[
            ReplyOption::new("German", "deck:1"),
            ReplyOption::new("Finnish", "deck:2"),
        ]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.options().len(), 2);
    }
}
