// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eligibility rules for scheduled deletion.
//!
//! Stickers are always eligible, whoever sent them. Everything else is
//! eligible only with bot provenance: a bot sender, an inline-bot relay, or a
//! bot/channel forward origin. Human non-sticker content is never scheduled.
//!
//! Media-group children arrive as independent events and are classified
//! independently; the group relationship carries no special handling.

use sweepguard_core::{ChatEvent, ContentType, ScheduleKind};

/// Classify an observed message. `None` means the message is left alone.
///
/// Chat protection is checked by the caller against the protected-chat cache;
/// this function looks only at sender and content signals.
pub fn classify(event: &ChatEvent) -> Option<ScheduleKind> {
    if event.content_type == ContentType::Sticker {
        return Some(ScheduleKind::Sticker);
    }

    if event.sender_is_bot || event.via_bot || event.forwarded_bot_origin {
        return Some(ScheduleKind::BotContent);
    }

    None
}
