// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of raw Telegram messages into engine-facing events.
//!
//! This is where all platform-specific provenance sniffing lives: the engine
//! only ever sees the boolean flags, never a teloxide type.

use chrono::{DateTime, Utc};
use teloxide::types::{Message, MessageOrigin};

use sweepguard_core::{ChatEvent, ContentType};

/// Whether the message lives in a group or supergroup.
///
/// Private chats and channels are out of scope; channel posts come with
/// their own moderation surface.
pub fn is_group(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

/// Flatten a Telegram message into the provenance flags the eligibility
/// filter consumes. One event per message; media-group children each carry
/// their own message id and normalize independently.
pub fn normalize(msg: &Message) -> ChatEvent {
    ChatEvent {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender_is_bot: msg.from.as_ref().is_some_and(|user| user.is_bot),
        via_bot: msg.via_bot.is_some(),
        forwarded_bot_origin: has_bot_forward_origin(msg),
        content_type: content_type_of(msg),
        event_time: event_time(msg),
    }
}

/// The message was forwarded from a bot account or a channel.
///
/// Hidden-user origins stay ineligible: the original sender withheld their
/// identity and there is no way to tell bots from humans there.
fn has_bot_forward_origin(msg: &Message) -> bool {
    match msg.forward_origin() {
        Some(MessageOrigin::User { sender_user, .. }) => sender_user.is_bot,
        Some(MessageOrigin::Channel { .. }) => true,
        Some(MessageOrigin::Chat { .. }) | Some(MessageOrigin::HiddenUser { .. }) | None => false,
    }
}

fn content_type_of(msg: &Message) -> ContentType {
    if msg.sticker().is_some() {
        ContentType::Sticker
    } else if msg.animation().is_some() {
        ContentType::Animation
    } else if msg.photo().is_some() {
        ContentType::Photo
    } else if msg.video().is_some() {
        ContentType::Video
    } else if msg.voice().is_some() {
        ContentType::Voice
    } else if msg.document().is_some() {
        ContentType::Document
    } else if msg.text().is_some() {
        ContentType::Text
    } else {
        ContentType::Other
    }
}

fn event_time(msg: &Message) -> DateTime<Utc> {
    msg.date
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn message(mut extra: Value) -> Message {
        let mut base = json!({
            "message_id": 42,
            "date": 1_764_000_000,
            "chat": {"id": -1001234567890_i64, "type": "supergroup", "title": "test group"},
            "from": {"id": 1111, "is_bot": false, "first_name": "Ada"},
            "text": "hello"
        });
        base.as_object_mut()
            .unwrap()
            .append(extra.as_object_mut().unwrap());
        serde_json::from_value(base).expect("valid message fixture")
    }

    #[test]
    fn plain_human_text_normalizes_with_no_flags() {
        let event = normalize(&message(json!({})));
        assert_eq!(event.chat_id, -1001234567890);
        assert_eq!(event.message_id, 42);
        assert!(!event.sender_is_bot);
        assert!(!event.via_bot);
        assert!(!event.forwarded_bot_origin);
        assert_eq!(event.content_type, ContentType::Text);
    }

    #[test]
    fn bot_sender_is_flagged() {
        let event = normalize(&message(json!({
            "from": {"id": 2222, "is_bot": true, "first_name": "Spam", "username": "spam_bot"}
        })));
        assert!(event.sender_is_bot);
    }

    #[test]
    fn via_bot_is_flagged() {
        let event = normalize(&message(json!({
            "via_bot": {"id": 3333, "is_bot": true, "first_name": "Inline", "username": "inline_bot"}
        })));
        assert!(event.via_bot);
    }

    #[test]
    fn forward_from_bot_user_is_flagged() {
        let event = normalize(&message(json!({
            "forward_origin": {
                "type": "user",
                "date": 1_764_000_000,
                "sender_user": {"id": 4444, "is_bot": true, "first_name": "Fwd", "username": "fwd_bot"}
            }
        })));
        assert!(event.forwarded_bot_origin);
    }

    #[test]
    fn forward_from_human_is_not_flagged() {
        let event = normalize(&message(json!({
            "forward_origin": {
                "type": "user",
                "date": 1_764_000_000,
                "sender_user": {"id": 5555, "is_bot": false, "first_name": "Eve"}
            }
        })));
        assert!(!event.forwarded_bot_origin);
    }

    #[test]
    fn forward_from_channel_is_flagged() {
        let event = normalize(&message(json!({
            "forward_origin": {
                "type": "channel",
                "date": 1_764_000_000,
                "chat": {"id": -1009876543210_i64, "type": "channel", "title": "ads"},
                "message_id": 7
            }
        })));
        assert!(event.forwarded_bot_origin);
    }

    #[test]
    fn hidden_user_forward_is_not_flagged() {
        let event = normalize(&message(json!({
            "forward_origin": {
                "type": "hidden_user",
                "date": 1_764_000_000,
                "sender_user_name": "Someone"
            }
        })));
        assert!(!event.forwarded_bot_origin);
    }

    #[test]
    fn sticker_message_classifies_as_sticker() {
        let mut fixture = json!({
            "sticker": {
                "file_id": "CAACAgI",
                "file_unique_id": "AgAD",
                "type": "regular",
                "width": 512,
                "height": 512,
                "is_animated": false,
                "is_video": false
            }
        });
        // Sticker messages carry no text field.
        let mut base = json!({
            "message_id": 43,
            "date": 1_764_000_000,
            "chat": {"id": -1001234567890_i64, "type": "supergroup", "title": "test group"},
            "from": {"id": 1111, "is_bot": false, "first_name": "Ada"}
        });
        base.as_object_mut()
            .unwrap()
            .append(fixture.as_object_mut().unwrap());
        let msg: Message = serde_json::from_value(base).unwrap();
        assert_eq!(normalize(&msg).content_type, ContentType::Sticker);
    }

    #[test]
    fn group_filter_accepts_groups_and_rejects_private() {
        let group = message(json!({}));
        assert!(is_group(&group));

        let private: Message = serde_json::from_value(json!({
            "message_id": 1,
            "date": 1_764_000_000,
            "chat": {"id": 1111, "type": "private", "first_name": "Ada"},
            "from": {"id": 1111, "is_bot": false, "first_name": "Ada"},
            "text": "dm"
        }))
        .unwrap();
        assert!(!is_group(&private));
    }
}
