// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits for the membership store and the optional pending-deletion mirror.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::SweepError;
use crate::types::{ChatId, MsgId, PendingRecord};

/// Access to the durable set of protected chats.
///
/// Reads come only from the cache refresh task; per-message intake never
/// touches the store. Writes happen on platform membership updates.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// All chat ids with an active protection subscription.
    async fn list_active_protected_chats(&self) -> Result<HashSet<ChatId>, SweepError>;

    /// Record that the bot gained or lost membership in a chat.
    async fn set_chat_active(&self, chat_id: ChatId, active: bool) -> Result<(), SweepError>;
}

/// Durable mirror of pending deletions for crash recovery.
///
/// Write and delete failures must degrade to in-memory-only operation - the
/// engine logs and continues, it never blocks scheduling on the store.
#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Insert or update the record keyed by (chat_id, message_id).
    async fn upsert(&self, record: &PendingRecord) -> Result<(), SweepError>;

    /// Remove the record for a resolved deletion.
    async fn remove(&self, chat_id: ChatId, message_id: MsgId) -> Result<(), SweepError>;

    /// Up to `limit` unexpired records, most recently due first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<PendingRecord>, SweepError>;

    /// Delete records whose TTL has lapsed. Returns the number purged.
    async fn purge_expired(&self) -> Result<u64, SweepError>;
}
