// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the MembershipStore and PendingStore traits.

use std::collections::HashSet;

use async_trait::async_trait;

use sweepguard_config::StorageConfig;
use sweepguard_core::{ChatId, MembershipStore, MsgId, PendingRecord, PendingStore, SweepError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store serving both the membership reads (cache refresh) and
/// the pending-deletion mirror (crash recovery).
///
/// Both concerns share one [`Database`] handle; tokio-rusqlite serializes all
/// access through its single background thread.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database at the configured path and run migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, SweepError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self { db })
    }

    /// Access the underlying database handle (admin tooling, tests).
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Checkpoint and close the database.
    pub async fn close(&self) -> Result<(), SweepError> {
        self.db.close().await
    }
}

#[async_trait]
impl MembershipStore for SqliteStore {
    async fn list_active_protected_chats(&self) -> Result<HashSet<ChatId>, SweepError> {
        queries::protected_chats::list_active(&self.db).await
    }

    async fn set_chat_active(&self, chat_id: ChatId, active: bool) -> Result<(), SweepError> {
        let status = if active { "active" } else { "inactive" };
        queries::protected_chats::set_status(&self.db, chat_id, status).await
    }
}

#[async_trait]
impl PendingStore for SqliteStore {
    async fn upsert(&self, record: &PendingRecord) -> Result<(), SweepError> {
        queries::pending_deletes::upsert(&self.db, record).await
    }

    async fn remove(&self, chat_id: ChatId, message_id: MsgId) -> Result<(), SweepError> {
        queries::pending_deletes::remove(&self.db, chat_id, message_id).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<PendingRecord>, SweepError> {
        queries::pending_deletes::list_recent(&self.db, limit).await
    }

    async fn purge_expired(&self) -> Result<u64, SweepError> {
        queries::pending_deletes::purge_expired(&self.db).await
    }
}
