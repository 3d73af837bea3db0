// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory view of which chats are under protection.
//!
//! The hot path (`is_protected`) is a lock-free set load; the set is swapped
//! wholesale by a periodic refresh from the membership store. A failed
//! refresh keeps the last known good set so a storage hiccup never turns
//! into a burst of missed deletions.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sweepguard_core::{ChatId, MembershipStore};

pub struct ProtectedChatCache {
    chats: ArcSwap<HashSet<ChatId>>,
    store: Arc<dyn MembershipStore>,
}

impl ProtectedChatCache {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self {
            chats: ArcSwap::from_pointee(HashSet::new()),
            store,
        }
    }

    pub fn is_protected(&self, chat_id: ChatId) -> bool {
        self.chats.load().contains(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.chats.load().len()
    }

    /// Replace the set from the store. Keeps the current set on error.
    pub async fn refresh(&self) {
        match self.store.list_active_protected_chats().await {
            Ok(chats) => {
                debug!(count = chats.len(), "protected chat cache refreshed");
                self.chats.store(Arc::new(chats));
            }
            Err(error) => {
                warn!(%error, "protected chat refresh failed, keeping previous set");
            }
        }
    }

    /// Admit a chat immediately, ahead of the next refresh.
    pub fn mark_active(&self, chat_id: ChatId) {
        let current = self.chats.load();
        if current.contains(&chat_id) {
            return;
        }
        let mut next: HashSet<ChatId> = current.as_ref().clone();
        next.insert(chat_id);
        self.chats.store(Arc::new(next));
    }

    /// Evict a chat immediately, ahead of the next refresh.
    pub fn mark_inactive(&self, chat_id: ChatId) {
        let current = self.chats.load();
        if !current.contains(&chat_id) {
            return;
        }
        let mut next: HashSet<ChatId> = current.as_ref().clone();
        next.remove(&chat_id);
        self.chats.store(Arc::new(next));
    }

    /// Run the refresh loop until cancellation. The first refresh happens
    /// immediately so startup is never blind for a full interval.
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        self.refresh().await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.reset();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.refresh().await,
            }
        }
        debug!("protected chat refresh loop stopped");
    }
}
