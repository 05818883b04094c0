// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of Telegram updates into transport-neutral events.

use chatlet_core::{ChatId, ChatKind, ChatRef, InboundEvent, Sender, UserId};
use teloxide::prelude::*;
use teloxide::types::{Chat, Document, User};

/// Largest document the adapter downloads. Scripts are plain text.
pub const MAX_DOCUMENT_BYTES: u32 = 1024 * 1024;

pub fn chat_ref(chat: &Chat) -> ChatRef {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    };
    ChatRef {
        id: ChatId(chat.id.0),
        kind,
    }
}

pub fn sender(user: &User) -> Sender {
    Sender {
        id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
    }
}

/// A text message as an event. Messages without a sender are skipped.
pub fn text_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let from = msg.from.as_ref()?;
    Some(InboundEvent::Text {
        chat: chat_ref(&msg.chat),
        sender: sender(from),
        text: text.to_string(),
    })
}

/// The document attached to a message, if it is small enough to fetch.
pub fn script_document(msg: &Message) -> Option<&Document> {
    let doc = msg.document()?;
    (doc.file.size <= MAX_DOCUMENT_BYTES).then_some(doc)
}

/// Build a document event from a message and the downloaded body.
pub fn document_event(msg: &Message, filename: String, bytes: Vec<u8>) -> Option<InboundEvent> {
    let from = msg.from.as_ref()?;
    Some(InboundEvent::Document {
        chat: chat_ref(&msg.chat),
        sender: sender(from),
        filename,
        bytes,
    })
}

/// A button press as an event.
///
/// Presses on inline-mode messages carry no chat, and game buttons carry no
/// data; neither can reach a script.
pub fn callback_event(query: &CallbackQuery) -> Option<InboundEvent> {
    let payload = query.data.clone()?;
    let chat = query.message.as_ref()?.chat();
    Some(InboundEvent::Callback {
        chat: chat_ref(chat),
        sender: sender(&query.from),
        query_id: query.id.0.clone(),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_json(id: u64, username: Option<&str>) -> serde_json::Value {
        let mut user = serde_json::json!({
            "id": id,
            "is_bot": false,
            "first_name": "Test",
        });
        if let Some(name) = username {
            user["username"] = serde_json::json!(name);
        }
        user
    }

    fn make_message(chat: serde_json::Value, from: Option<serde_json::Value>) -> serde_json::Value {
        let mut json = serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": chat,
        });
        if let Some(from) = from {
            json["from"] = from;
        }
        json
    }

    fn private_chat(id: i64) -> serde_json::Value {
        serde_json::json!({ "id": id, "type": "private", "first_name": "Test" })
    }

    fn group_chat() -> serde_json::Value {
        serde_json::json!({ "id": -100123i64, "type": "supergroup", "title": "Test Group" })
    }

    fn text_message(chat: serde_json::Value, from: Option<serde_json::Value>, text: &str) -> Message {
        let mut json = make_message(chat, from);
        json["text"] = serde_json::json!(text);
        serde_json::from_value(json).expect("failed to deserialize mock message")
    }

    #[test]
    fn private_text_maps_to_event() {
        let msg = text_message(private_chat(42), Some(user_json(42, Some("alice"))), "/ping");
        match text_event(&msg) {
            Some(InboundEvent::Text { chat, sender, text }) => {
                assert_eq!(chat.id, ChatId(42));
                assert_eq!(chat.kind, ChatKind::Private);
                assert_eq!(sender.id, UserId(42));
                assert_eq!(sender.username.as_deref(), Some("alice"));
                assert_eq!(text, "/ping");
            }
            other => panic!("expected text event, got {other:?}"),
        }
    }

    #[test]
    fn supergroup_kind_is_preserved() {
        let msg = text_message(group_chat(), Some(user_json(7, None)), "hi");
        let event = text_event(&msg).unwrap();
        assert_eq!(event.chat().kind, ChatKind::Supergroup);
        assert_eq!(event.chat().id, ChatId(-100123));
        assert_eq!(event.sender().username, None);
    }

    #[test]
    fn messages_without_sender_are_skipped() {
        let msg = text_message(private_chat(1), None, "hi");
        assert!(text_event(&msg).is_none());
    }

    #[test]
    fn small_documents_are_accepted() {
        let mut json = make_message(private_chat(1), Some(user_json(1, None)));
        json["document"] = serde_json::json!({
            "file_id": "abc",
            "file_unique_id": "u1",
            "file_name": "ping.txt",
            "file_size": 120,
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        let doc = script_document(&msg).unwrap();
        assert_eq!(doc.file_name.as_deref(), Some("ping.txt"));

        let event = document_event(&msg, "ping.txt".into(), b"code".to_vec()).unwrap();
        assert_eq!(event.kind_str(), "document");
    }

    #[test]
    fn oversized_documents_are_skipped() {
        let mut json = make_message(private_chat(1), Some(user_json(1, None)));
        json["document"] = serde_json::json!({
            "file_id": "abc",
            "file_unique_id": "u1",
            "file_name": "huge.txt",
            "file_size": MAX_DOCUMENT_BYTES + 1,
        });
        let msg: Message = serde_json::from_value(json).unwrap();
        assert!(script_document(&msg).is_none());
    }

    #[test]
    fn callback_query_maps_to_event() {
        let mut message = make_message(group_chat(), Some(user_json(99, Some("bot"))));
        message["text"] = serde_json::json!("Vote:");
        let json = serde_json::json!({
            "id": "4382",
            "from": user_json(5, Some("bob")),
            "message": message,
            "chat_instance": "123",
            "data": "vote:yes",
        });
        let query: CallbackQuery = serde_json::from_value(json).unwrap();
        match callback_event(&query) {
            Some(InboundEvent::Callback {
                chat,
                sender,
                query_id,
                payload,
            }) => {
                assert_eq!(chat.id, ChatId(-100123));
                assert_eq!(sender.id, UserId(5));
                assert_eq!(query_id, "4382");
                assert_eq!(payload, "vote:yes");
            }
            other => panic!("expected callback event, got {other:?}"),
        }
    }

    #[test]
    fn callback_without_data_is_skipped() {
        let json = serde_json::json!({
            "id": "1",
            "from": user_json(5, None),
            "chat_instance": "123",
            "inline_message_id": "abc",
        });
        let query: CallbackQuery = serde_json::from_value(json).unwrap();
        assert!(callback_event(&query).is_none());
    }
}
