// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries against the protected-chat membership table.

use std::collections::HashSet;

use rusqlite::params;

use sweepguard_core::SweepError;

use crate::database::{Database, map_tr_err};

/// All chat ids whose subscription is currently active.
pub async fn list_active(db: &Database) -> Result<HashSet<i64>, SweepError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chat_id FROM protected_chats WHERE subscription_status = 'active'",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            let mut ids = HashSet::new();
            for row in rows {
                ids.insert(row?);
            }
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert a chat's subscription status. Used by admin tooling and tests.
pub async fn set_status(db: &Database, chat_id: i64, status: &str) -> Result<(), SweepError> {
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO protected_chats (chat_id, subscription_status)
                 VALUES (?1, ?2)
                 ON CONFLICT (chat_id) DO UPDATE SET
                     subscription_status = excluded.subscription_status,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![chat_id, status],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chats.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn only_active_chats_are_listed() {
        let (db, _dir) = setup_db().await;

        set_status(&db, -100, "active").await.unwrap();
        set_status(&db, -200, "expired").await.unwrap();
        set_status(&db, -300, "active").await.unwrap();

        let active = list_active(&db).await.unwrap();
        assert_eq!(active, HashSet::from([-100, -300]));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn revoking_removes_from_active_set() {
        let (db, _dir) = setup_db().await;

        set_status(&db, -100, "active").await.unwrap();
        assert!(list_active(&db).await.unwrap().contains(&-100));

        set_status(&db, -100, "revoked").await.unwrap();
        assert!(!list_active(&db).await.unwrap().contains(&-100));

        db.close().await.unwrap();
    }
}
