// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queries against the crash-recovery mirror of pending deletions.
//!
//! Timestamps are stored as RFC 3339 strings with millisecond precision,
//! which sort lexicographically, so `ORDER BY due_at` works on TEXT.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;

use sweepguard_core::{PendingRecord, SweepError};

use crate::database::{Database, map_tr_err};

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, rusqlite::types::FromSqlError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
}

/// Insert or refresh the record keyed by (chat_id, message_id).
pub async fn upsert(db: &Database, record: &PendingRecord) -> Result<(), SweepError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO pending_deletes (chat_id, message_id, due_at, expires_at, attempt)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (chat_id, message_id) DO UPDATE SET
                     due_at = excluded.due_at,
                     expires_at = excluded.expires_at,
                     attempt = excluded.attempt,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    record.chat_id,
                    record.message_id,
                    encode_ts(record.due_at),
                    encode_ts(record.expires_at),
                    record.attempt,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the record for a resolved deletion. Missing rows are a no-op.
pub async fn remove(db: &Database, chat_id: i64, message_id: i32) -> Result<(), SweepError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM pending_deletes WHERE chat_id = ?1 AND message_id = ?2",
                params![chat_id, message_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Up to `limit` unexpired records, most recently due first.
///
/// Newest-first favors messages whose deletion is still relevant when the
/// backlog exceeds the restore limit.
pub async fn list_recent(db: &Database, limit: usize) -> Result<Vec<PendingRecord>, SweepError> {
    let now = encode_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT chat_id, message_id, due_at, expires_at, attempt
                 FROM pending_deletes
                 WHERE expires_at > ?1
                 ORDER BY due_at DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![now, limit as i64], |row| {
                Ok(PendingRecord {
                    chat_id: row.get(0)?,
                    message_id: row.get(1)?,
                    due_at: decode_ts(&row.get::<_, String>(2)?)?,
                    expires_at: decode_ts(&row.get::<_, String>(3)?)?,
                    attempt: row.get(4)?,
                })
            })?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete records whose TTL has lapsed. Returns the number purged.
pub async fn purge_expired(db: &Database) -> Result<u64, SweepError> {
    let now = encode_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let purged = conn.execute(
                "DELETE FROM pending_deletes WHERE expires_at <= ?1",
                params![now],
            )?;
            Ok(purged as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pending.db");
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn record(chat_id: i64, message_id: i32, due_in_secs: i64) -> PendingRecord {
        let due_at = Utc::now() + Duration::seconds(due_in_secs);
        PendingRecord {
            chat_id,
            message_id,
            due_at,
            expires_at: due_at + Duration::hours(24),
            attempt: 0,
        }
    }

    #[tokio::test]
    async fn upsert_then_list_round_trips() {
        let (db, _dir) = setup_db().await;

        let rec = record(-100, 1, 35);
        upsert(&db, &rec).await.unwrap();

        let listed = list_recent(&db, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].chat_id, -100);
        assert_eq!(listed[0].message_id, 1);
        assert_eq!(listed[0].attempt, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_same_key_updates_attempt() {
        let (db, _dir) = setup_db().await;

        let mut rec = record(-100, 1, 35);
        upsert(&db, &rec).await.unwrap();
        rec.attempt = 3;
        upsert(&db, &rec).await.unwrap();

        let listed = list_recent(&db, 10).await.unwrap();
        assert_eq!(listed.len(), 1, "conflict should update, not duplicate");
        assert_eq!(listed[0].attempt, 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first_and_honors_limit() {
        let (db, _dir) = setup_db().await;

        for i in 0..50 {
            upsert(&db, &record(-100, i, i as i64)).await.unwrap();
        }

        let listed = list_recent(&db, 30).await.unwrap();
        assert_eq!(listed.len(), 30);
        // Latest due time first.
        assert_eq!(listed[0].message_id, 49);
        assert!(listed.windows(2).all(|w| w[0].due_at >= w[1].due_at));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_records_are_skipped_and_purgeable() {
        let (db, _dir) = setup_db().await;

        let mut expired = record(-100, 1, -7200);
        expired.expires_at = Utc::now() - Duration::hours(1);
        upsert(&db, &expired).await.unwrap();
        upsert(&db, &record(-100, 2, 35)).await.unwrap();

        let listed = list_recent(&db, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message_id, 2);

        let purged = purge_expired(&db).await.unwrap();
        assert_eq!(purged, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (db, _dir) = setup_db().await;

        upsert(&db, &record(-100, 1, 35)).await.unwrap();
        remove(&db, -100, 1).await.unwrap();
        remove(&db, -100, 1).await.unwrap();

        assert!(list_recent(&db, 10).await.unwrap().is_empty());
        db.close().await.unwrap();
    }
}
