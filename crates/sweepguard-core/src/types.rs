// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Sweepguard engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Platform chat identifier. Negative for Telegram groups and supergroups.
pub type ChatId = i64;

/// Platform message identifier, unique within a chat.
pub type MsgId = i32;

/// Coarse content classification of an observed message.
///
/// The engine only distinguishes stickers from everything else; the remaining
/// variants exist for logging and future filter rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
    Text,
    Sticker,
    Photo,
    Video,
    Document,
    Voice,
    Animation,
    Other,
}

/// Why a message was scheduled for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ScheduleKind {
    /// Bot-authored, bot-relayed, or bot-forwarded content.
    BotContent,
    /// Sticker content, eligible regardless of sender.
    Sticker,
}

/// A normalized, platform-agnostic view of one observed chat message.
///
/// The transport adapter produces exactly one event per message (media-group
/// children each get their own) carrying the provenance signals the
/// eligibility filter needs. How `forwarded_bot_origin` is detected is the
/// transport's business; the engine only consumes the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub chat_id: ChatId,
    pub message_id: MsgId,
    /// The direct sender is a bot account.
    pub sender_is_bot: bool,
    /// The message was sent through an inline bot.
    pub via_bot: bool,
    /// The message was forwarded from a bot or channel origin.
    pub forwarded_bot_origin: bool,
    pub content_type: ContentType,
    pub event_time: DateTime<Utc>,
}

/// Everything the transport hands to the service loop.
///
/// Membership variants come from the platform's own "bot added / removed"
/// updates and feed the protected-chat cache and store directly, without
/// waiting for the next periodic refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A message was observed in some chat.
    Message(ChatEvent),
    /// This bot gained member or admin status in the chat.
    MembershipGranted(ChatId),
    /// This bot was kicked from or left the chat.
    MembershipRevoked(ChatId),
}

/// A durable mirror of one pending deletion, for crash recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub chat_id: ChatId,
    pub message_id: MsgId,
    /// Wall-clock time the deletion is due.
    pub due_at: DateTime<Utc>,
    /// Records past this point are purged instead of restored.
    pub expires_at: DateTime<Utc>,
    pub attempt: u32,
}
