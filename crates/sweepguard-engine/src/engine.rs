// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The auto-delete engine: intake, tick loop, chunk dispatch, recovery.
//!
//! One task owns the tick cadence; every due chunk is detached onto the task
//! tracker behind a semaphore, so a chat that is rate limited or slow never
//! holds back deletions elsewhere. The wheel mutex is the only shared state
//! and is never held across an await.
//!
//! Persistence is fire-and-forget: mutations go through a bounded queue into
//! a single writer task, and a full queue drops the mutation rather than
//! stalling the hot path. A dropped mutation costs at worst one redundant
//! delete call after a crash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use sweepguard_config::EngineConfig;
use sweepguard_core::{
    ChatEvent, ChatId, DeleteApi, MsgId, PendingRecord, PendingStore, ScheduleKind, SweepError,
};

use crate::cache::ProtectedChatCache;
use crate::eligibility;
use crate::metrics::EngineMetrics;
use crate::wheel::{TimingWheel, WheelEntry};
use crate::worker::{self, RetryPolicy};

/// How long in-flight chunks get to finish after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Mutation queue depth; beyond this, persistence drops writes.
const QUEUE_CAPACITY: usize = 8192;

/// Max mutations folded into one writer pass.
const WRITE_BATCH: usize = 500;

/// How often the writer purges expired records.
const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug)]
enum Mutation {
    Upsert(PendingRecord),
    Remove(ChatId, MsgId),
}

struct PersistHandle {
    tx: mpsc::Sender<Mutation>,
    rx: Mutex<Option<mpsc::Receiver<Mutation>>>,
    store: Arc<dyn PendingStore>,
    ttl: chrono::Duration,
    dropped: AtomicU64,
}

struct Settings {
    delay: Duration,
    tick: Duration,
    chunk_size: usize,
    restore_limit: usize,
    metrics_interval: Duration,
}

pub struct AutoDeleteEngine {
    settings: Settings,
    policy: RetryPolicy,
    wheel: Mutex<TimingWheel>,
    api: Arc<dyn DeleteApi>,
    cache: Arc<ProtectedChatCache>,
    metrics: Arc<EngineMetrics>,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    persist: Option<PersistHandle>,
}

impl AutoDeleteEngine {
    pub fn new(
        config: &EngineConfig,
        api: Arc<dyn DeleteApi>,
        cache: Arc<ProtectedChatCache>,
        store: Option<Arc<dyn PendingStore>>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let delay = Duration::from_secs(config.delete_delay_seconds);
        let tick = Duration::from_millis(config.tick_interval_ms);
        let policy = RetryPolicy {
            max_attempts: config.retry_attempts,
            base: Duration::from_secs_f64(config.retry_base_seconds),
            max: Duration::from_secs_f64(config.retry_max_seconds),
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        };

        // The ring must span the delete delay plus the worst-case backoff,
        // with some slack; entries beyond the span just wait extra passes.
        let horizon = delay + policy.max + Duration::from_secs(10);
        let slot_count =
            ((horizon.as_millis() / tick.as_millis().max(1)) as usize + 1).max(512);

        let persist = if config.persistence_enabled {
            store.map(|store| {
                let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
                PersistHandle {
                    tx,
                    rx: Mutex::new(Some(rx)),
                    store,
                    ttl: chrono::Duration::hours(config.persistence_ttl_hours as i64),
                    dropped: AtomicU64::new(0),
                }
            })
        } else {
            None
        };

        Arc::new(Self {
            settings: Settings {
                delay,
                tick,
                chunk_size: config.chunk_size,
                restore_limit: config.restore_limit,
                metrics_interval: Duration::from_secs(config.metrics_log_interval_seconds),
            },
            policy,
            wheel: Mutex::new(TimingWheel::new(tick, slot_count, Instant::now())),
            api,
            cache,
            metrics: Arc::new(EngineMetrics::default()),
            semaphore: Arc::new(Semaphore::new(config.worker_concurrency)),
            tracker: TaskTracker::new(),
            cancel,
            persist,
        })
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Keys currently in a non-terminal state.
    pub fn pending(&self) -> usize {
        self.wheel.lock().unwrap().pending()
    }

    /// Intake for one observed message. Synchronous and cheap: a cache load,
    /// the eligibility filter, and at most one wheel insert.
    pub fn handle_event(&self, event: &ChatEvent) {
        if !self.cache.is_protected(event.chat_id) {
            return;
        }
        let Some(kind) = eligibility::classify(event) else {
            return;
        };
        self.schedule(event.chat_id, event.message_id, kind);
    }

    /// Schedule one of the bot's own outbound messages for deletion.
    pub fn schedule_outbound(&self, chat_id: ChatId, message_id: MsgId) {
        if !self.cache.is_protected(chat_id) {
            return;
        }
        self.schedule(chat_id, message_id, ScheduleKind::BotContent);
    }

    fn schedule(&self, chat_id: ChatId, message_id: MsgId, kind: ScheduleKind) {
        let due_at = Instant::now() + self.settings.delay;
        let inserted = self.wheel.lock().unwrap().insert(WheelEntry {
            chat_id,
            message_id,
            due_at,
            attempt: 0,
        });
        if !inserted {
            debug!(chat_id, message_id, "already scheduled, ignoring");
            self.metrics.record_duplicate();
            return;
        }
        debug!(chat_id, message_id, %kind, "scheduled for deletion");
        self.metrics.record_scheduled(kind);
        self.persist_upsert(chat_id, message_id, 0, self.settings.delay);
    }

    /// Reload pending deletions from the store. Call once, before [`run`].
    ///
    /// Newest-first within the restore limit, so under backlog the freshest
    /// messages win. Overdue entries become due immediately and the attempt
    /// counter is clamped to leave at least one try.
    ///
    /// [`run`]: Self::run
    pub async fn restore(&self) -> Result<usize, SweepError> {
        let Some(persist) = &self.persist else {
            return Ok(0);
        };

        let purged = persist.store.purge_expired().await?;
        if purged > 0 {
            info!(purged, "purged expired pending records");
        }

        let records = persist.store.list_recent(self.settings.restore_limit).await?;
        let now_wall = Utc::now();
        let now = Instant::now();
        let max_attempt = self.policy.max_attempts.saturating_sub(1);

        let mut restored = 0usize;
        {
            let mut wheel = self.wheel.lock().unwrap();
            for record in records {
                let delay = (record.due_at - now_wall).to_std().unwrap_or(Duration::ZERO);
                let entry = WheelEntry {
                    chat_id: record.chat_id,
                    message_id: record.message_id,
                    due_at: now + delay,
                    attempt: record.attempt.min(max_attempt),
                };
                if wheel.insert(entry) {
                    restored += 1;
                }
            }
        }

        if restored > 0 {
            self.metrics.record_restored(restored as u64);
            info!(restored, "restored pending deletions");
        }
        Ok(restored)
    }

    /// Drive the engine until the cancellation token fires, then wind down:
    /// stop ticking, give in-flight chunks a bounded grace, drain the
    /// persistence queue.
    pub async fn run(self: Arc<Self>) {
        let flush = CancellationToken::new();
        let mut writer = None;
        if let Some(persist) = &self.persist {
            if let Some(rx) = persist.rx.lock().unwrap().take() {
                writer = Some(tokio::spawn(writer_loop(
                    Arc::clone(&persist.store),
                    rx,
                    flush.clone(),
                )));
            }
        }

        let mut summary = tokio::time::interval(self.settings.metrics_interval);
        summary.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        summary.reset();
        let mut next_tick = Instant::now() + self.settings.tick;

        info!(
            delay_secs = self.settings.delay.as_secs(),
            tick_ms = self.settings.tick.as_millis() as u64,
            chunk_size = self.settings.chunk_size,
            "auto-delete engine running"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_tick) => {
                    let now = Instant::now();
                    Arc::clone(&self).tick(now);
                    next_tick += self.settings.tick;
                    // A small backlog is caught up by firing immediately; a
                    // long stall re-anchors the cadence instead. The cursor
                    // still walks every slot, so nothing is skipped either
                    // way.
                    if now.saturating_duration_since(next_tick) > self.settings.tick * 3 {
                        next_tick = now + self.settings.tick;
                    }
                }
                _ = summary.tick() => {
                    self.metrics.log_summary(self.pending() as u64);
                }
            }
        }

        self.tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "in-flight chunks did not finish within grace");
        }

        flush.cancel();
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        self.metrics.log_summary(self.pending() as u64);
        info!("auto-delete engine stopped");
    }

    /// One scheduler step: drain the current slot and detach chunk tasks.
    fn tick(self: Arc<Self>, now: Instant) {
        let due = self.wheel.lock().unwrap().advance(now);
        self.metrics.set_pending(self.pending() as u64);
        if due.is_empty() {
            return;
        }

        // Group by chat in discovery order, then chunk within each chat.
        let mut order: Vec<ChatId> = Vec::new();
        let mut groups: HashMap<ChatId, Vec<WheelEntry>> = HashMap::new();
        for entry in due {
            groups
                .entry(entry.chat_id)
                .or_insert_with(|| {
                    order.push(entry.chat_id);
                    Vec::new()
                })
                .push(entry);
        }

        for chat_id in order {
            let Some(entries) = groups.remove(&chat_id) else {
                continue;
            };
            for chunk in entries.chunks(self.settings.chunk_size) {
                let chunk = chunk.to_vec();
                let engine = Arc::clone(&self);
                self.tracker.spawn(async move {
                    engine.process_chunk(chat_id, chunk).await;
                });
            }
        }
    }

    async fn process_chunk(self: Arc<Self>, chat_id: ChatId, chunk: Vec<WheelEntry>) {
        let Ok(_permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
            return;
        };

        let outcome = worker::delete_chunk(self.api.as_ref(), &self.policy, chat_id, chunk).await;

        if outcome.forbidden {
            // Stop-gap until the next cache refresh or membership update.
            self.cache.mark_inactive(chat_id);
        }

        {
            let mut wheel = self.wheel.lock().unwrap();
            for entry in &outcome.deleted {
                wheel.release(&entry.key());
            }
            for entry in &outcome.failed {
                wheel.release(&entry.key());
            }
            for (entry, _) in &outcome.retry {
                if wheel.contains(&entry.key()) {
                    wheel.requeue(*entry);
                }
            }
        }

        if !outcome.deleted.is_empty() {
            self.metrics.record_deleted(outcome.deleted.len() as u64);
            // Drift is measured against the moment the delete actually
            // resolved, not when the slot was drained.
            let resolved = Instant::now();
            for entry in &outcome.deleted {
                self.metrics
                    .record_drift(resolved.saturating_duration_since(entry.due_at).as_secs_f64());
                self.persist_remove(entry.chat_id, entry.message_id);
            }
        }
        if !outcome.failed.is_empty() {
            self.metrics.record_failed(outcome.failed.len() as u64);
            for entry in &outcome.failed {
                self.persist_remove(entry.chat_id, entry.message_id);
            }
        }
        for (entry, delay) in &outcome.retry {
            self.persist_upsert(entry.chat_id, entry.message_id, entry.attempt, *delay);
        }

        self.metrics.set_pending(self.pending() as u64);
    }

    fn persist_upsert(&self, chat_id: ChatId, message_id: MsgId, attempt: u32, due_in: Duration) {
        let Some(persist) = &self.persist else { return };
        let due_at = Utc::now()
            + chrono::Duration::from_std(due_in).unwrap_or_else(|_| chrono::Duration::zero());
        self.persist_send(Mutation::Upsert(PendingRecord {
            chat_id,
            message_id,
            due_at,
            expires_at: due_at + persist.ttl,
            attempt,
        }));
    }

    fn persist_remove(&self, chat_id: ChatId, message_id: MsgId) {
        if self.persist.is_some() {
            self.persist_send(Mutation::Remove(chat_id, message_id));
        }
    }

    fn persist_send(&self, mutation: Mutation) {
        let Some(persist) = &self.persist else { return };
        match persist.tx.try_send(mutation) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = persist.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % 500 == 0 {
                    warn!(dropped, "persistence queue full, dropping mutations");
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("persistence writer gone, mutation discarded");
            }
        }
    }
}

/// Single writer task: folds queued mutations into batches, purges expired
/// records hourly, and drains whatever is left when told to flush.
async fn writer_loop(
    store: Arc<dyn PendingStore>,
    mut rx: mpsc::Receiver<Mutation>,
    flush: CancellationToken,
) {
    let mut purge = tokio::time::interval(PURGE_INTERVAL);
    purge.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    purge.reset();

    loop {
        tokio::select! {
            _ = flush.cancelled() => break,
            _ = purge.tick() => {
                match store.purge_expired().await {
                    Ok(purged) if purged > 0 => info!(purged, "purged expired pending records"),
                    Ok(_) => {}
                    Err(error) => warn!(%error, "pending purge failed"),
                }
            }
            received = rx.recv() => {
                let Some(first) = received else { break };
                let mut batch = vec![first];
                while batch.len() < WRITE_BATCH {
                    match rx.try_recv() {
                        Ok(mutation) => batch.push(mutation),
                        Err(_) => break,
                    }
                }
                apply_batch(store.as_ref(), batch).await;
            }
        }
    }

    // Final drain: the engine stops sending before triggering the flush.
    rx.close();
    let mut batch = Vec::new();
    while let Ok(mutation) = rx.try_recv() {
        batch.push(mutation);
        if batch.len() >= WRITE_BATCH {
            apply_batch(store.as_ref(), std::mem::take(&mut batch)).await;
        }
    }
    if !batch.is_empty() {
        apply_batch(store.as_ref(), batch).await;
    }
    debug!("persistence writer drained");
}

async fn apply_batch(store: &dyn PendingStore, batch: Vec<Mutation>) {
    for mutation in batch {
        let result = match &mutation {
            Mutation::Upsert(record) => store.upsert(record).await,
            Mutation::Remove(chat_id, message_id) => store.remove(*chat_id, *message_id).await,
        };
        if let Err(error) = result {
            // Degrade to in-memory-only; never stall the queue on the store.
            warn!(%error, "persistence write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use sweepguard_core::{ApiFailure, MembershipStore};

    fn test_config() -> EngineConfig {
        EngineConfig {
            delete_delay_seconds: 1,
            tick_interval_ms: 200,
            chunk_size: 100,
            retry_attempts: 5,
            retry_base_seconds: 1.5,
            retry_max_seconds: 35.0,
            worker_concurrency: 4,
            request_timeout_seconds: 15,
            cache_refresh_seconds: 20,
            metrics_log_interval_seconds: 60,
            persistence_enabled: false,
            persistence_ttl_hours: 24,
            restore_limit: 20_000,
        }
    }

    struct NullApi;

    #[async_trait]
    impl DeleteApi for NullApi {
        async fn delete_messages(&self, _: i64, _: &[i32]) -> Result<(), ApiFailure> {
            Ok(())
        }
        async fn delete_message(&self, _: i64, _: i32) -> Result<(), ApiFailure> {
            Ok(())
        }
    }

    struct StaticMembership(HashSet<ChatId>);

    #[async_trait]
    impl MembershipStore for StaticMembership {
        async fn list_active_protected_chats(&self) -> Result<HashSet<ChatId>, SweepError> {
            Ok(self.0.clone())
        }
        async fn set_chat_active(&self, _: ChatId, _: bool) -> Result<(), SweepError> {
            Ok(())
        }
    }

    async fn protected_cache(chats: &[ChatId]) -> Arc<ProtectedChatCache> {
        let cache = Arc::new(ProtectedChatCache::new(Arc::new(StaticMembership(
            chats.iter().copied().collect(),
        ))));
        cache.refresh().await;
        cache
    }

    fn event(chat_id: i64, message_id: i32) -> ChatEvent {
        ChatEvent {
            chat_id,
            message_id,
            sender_is_bot: true,
            via_bot: false,
            forwarded_bot_origin: false,
            content_type: sweepguard_core::ContentType::Text,
            event_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unprotected_chat_is_ignored() {
        let cache = protected_cache(&[-100]).await;
        let engine = AutoDeleteEngine::new(
            &test_config(),
            Arc::new(NullApi),
            cache,
            None,
            CancellationToken::new(),
        );

        engine.handle_event(&event(-999, 1));
        assert_eq!(engine.pending(), 0);

        engine.handle_event(&event(-100, 1));
        assert_eq!(engine.pending(), 1);
    }

    #[tokio::test]
    async fn duplicate_events_schedule_once() {
        let cache = protected_cache(&[-100]).await;
        let engine = AutoDeleteEngine::new(
            &test_config(),
            Arc::new(NullApi),
            cache,
            None,
            CancellationToken::new(),
        );

        engine.handle_event(&event(-100, 1));
        engine.handle_event(&event(-100, 1));
        engine.schedule_outbound(-100, 1);
        assert_eq!(engine.pending(), 1);

        let snap = engine.metrics().snapshot(1);
        assert_eq!(snap.scheduled, 1);
        assert_eq!(snap.duplicate, 2);
    }

    #[tokio::test]
    async fn ineligible_human_message_is_not_scheduled() {
        let cache = protected_cache(&[-100]).await;
        let engine = AutoDeleteEngine::new(
            &test_config(),
            Arc::new(NullApi),
            cache,
            None,
            CancellationToken::new(),
        );

        let mut human = event(-100, 1);
        human.sender_is_bot = false;
        engine.handle_event(&human);
        assert_eq!(engine.pending(), 0);
    }

    #[tokio::test]
    async fn outbound_schedule_respects_protection() {
        let cache = protected_cache(&[-100]).await;
        let engine = AutoDeleteEngine::new(
            &test_config(),
            Arc::new(NullApi),
            cache,
            None,
            CancellationToken::new(),
        );

        engine.schedule_outbound(-999, 5);
        assert_eq!(engine.pending(), 0);
        engine.schedule_outbound(-100, 5);
        assert_eq!(engine.pending(), 1);
    }
}
