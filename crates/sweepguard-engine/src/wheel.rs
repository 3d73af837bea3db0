// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size timing wheel with a dedup index.
//!
//! Entries are filed into ring slots by `floor(due_at / tick) mod N`, but a
//! slot may hold entries from different ring passes, so draining always
//! compares each entry's absolute due time against "now" and re-files
//! anything that is not actually due. Slot identity is a routing hint, never
//! a correctness argument; late ticks and backlog resolve on their own.
//!
//! The index holds every key in a non-terminal state, including entries that
//! are in flight with a worker, which is what makes `insert` idempotent
//! across the whole pending lifecycle. The wheel is not synchronized; the
//! engine wraps it in a single mutex shared with the drain path.

use std::collections::HashSet;

use tokio::time::Instant;

use sweepguard_core::{ChatId, MsgId};

/// Identity of a pending deletion across all non-terminal states.
pub(crate) type DedupKey = (ChatId, MsgId);

/// One scheduled deletion parked in the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WheelEntry {
    pub chat_id: ChatId,
    pub message_id: MsgId,
    pub due_at: Instant,
    pub attempt: u32,
}

impl WheelEntry {
    pub fn key(&self) -> DedupKey {
        (self.chat_id, self.message_id)
    }
}

pub(crate) struct TimingWheel {
    slots: Vec<Vec<WheelEntry>>,
    index: HashSet<DedupKey>,
    current_slot: usize,
    tick: std::time::Duration,
    epoch: Instant,
}

impl TimingWheel {
    /// `slot_count` must cover the longest horizon (delete delay plus max
    /// backoff) or entries beyond it simply wait extra ring passes.
    pub fn new(tick: std::time::Duration, slot_count: usize, epoch: Instant) -> Self {
        assert!(slot_count > 0, "slot_count must be positive");
        assert!(!tick.is_zero(), "tick must be positive");
        let mut wheel = Self {
            slots: (0..slot_count).map(|_| Vec::new()).collect(),
            index: HashSet::new(),
            current_slot: 0,
            tick,
            epoch,
        };
        wheel.current_slot = wheel.slot_for(epoch);
        wheel
    }

    fn slot_for(&self, due_at: Instant) -> usize {
        let since_epoch = due_at.saturating_duration_since(self.epoch);
        (since_epoch.as_millis() / self.tick.as_millis().max(1)) as usize % self.slots.len()
    }

    /// File a new entry. Returns `false` without touching the wheel when the
    /// key is already tracked in a non-terminal state.
    pub fn insert(&mut self, entry: WheelEntry) -> bool {
        if !self.index.insert(entry.key()) {
            return false;
        }
        let slot = self.slot_for(entry.due_at);
        self.slots[slot].push(entry);
        true
    }

    /// Re-file an entry whose key is already tracked (retry path). The caller
    /// must have drained the previous copy; the key stays in the index.
    pub fn requeue(&mut self, entry: WheelEntry) {
        debug_assert!(self.index.contains(&entry.key()));
        let slot = self.slot_for(entry.due_at);
        self.slots[slot].push(entry);
    }

    /// Resolve a key terminally, freeing it for future scheduling.
    /// Returns whether the key was tracked.
    pub fn release(&mut self, key: &DedupKey) -> bool {
        self.index.remove(key)
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.index.contains(key)
    }

    /// Number of keys in a non-terminal state (parked or in flight).
    pub fn pending(&self) -> usize {
        self.index.len()
    }

    /// Drain the current slot and step the cursor by one.
    ///
    /// Entries due by `now` (with half-a-tick rounding so ticker jitter does
    /// not hold a deletion for a full extra tick) are returned in discovery
    /// order; the rest are re-filed into the slot their absolute due time
    /// maps to. Entries whose key was released while parked are dropped.
    pub fn advance(&mut self, now: Instant) -> Vec<WheelEntry> {
        let parked = std::mem::take(&mut self.slots[self.current_slot]);
        self.current_slot = (self.current_slot + 1) % self.slots.len();

        let cutoff = now + self.tick / 2;
        let mut due = Vec::new();

        for entry in parked {
            if !self.index.contains(&entry.key()) {
                continue;
            }
            if entry.due_at <= cutoff {
                due.push(entry);
            } else {
                let slot = self.slot_for(entry.due_at);
                self.slots[slot].push(entry);
            }
        }

        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(200);

    fn entry(chat_id: i64, message_id: i32, due_at: Instant) -> WheelEntry {
        WheelEntry {
            chat_id,
            message_id,
            due_at,
            attempt: 0,
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        assert!(wheel.insert(entry(-100, 1, epoch + TICK)));
        assert!(!wheel.insert(entry(-100, 1, epoch + TICK * 5)));
        assert_eq!(wheel.pending(), 1);
    }

    #[tokio::test]
    async fn advance_returns_due_entries_only() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        wheel.insert(entry(-100, 1, epoch));
        assert_eq!(wheel.advance(epoch).len(), 1);
    }

    #[tokio::test]
    async fn not_yet_due_entry_in_drained_slot_is_refiled() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        // Lands two ticks ahead; draining the current slot must not yield it.
        wheel.insert(entry(-100, 1, epoch + TICK * 2));
        assert!(wheel.advance(epoch).is_empty());
        assert_eq!(wheel.pending(), 1, "entry stays tracked");

        // After stepping to its slot with time advanced, it comes out.
        assert!(wheel.advance(epoch + TICK).is_empty());
        let due = wheel.advance(epoch + TICK * 2);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].message_id, 1);
    }

    #[tokio::test]
    async fn slot_reuse_across_ring_passes_respects_absolute_time() {
        let epoch = Instant::now();
        // Tiny ring so one full pass is only 4 ticks.
        let mut wheel = TimingWheel::new(TICK, 4, epoch);

        // Due a full ring pass + 1 tick away: maps onto a near slot index.
        wheel.insert(entry(-100, 1, epoch + TICK * 5));

        // First pass over its slot must re-file, not fire early.
        let mut fired = Vec::new();
        for step in 0..6 {
            fired.extend(wheel.advance(epoch + TICK * step));
        }
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].message_id, 1);
    }

    #[tokio::test]
    async fn released_key_is_dropped_at_drain() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        wheel.insert(entry(-100, 1, epoch));
        assert!(wheel.release(&(-100, 1)));
        assert!(wheel.advance(epoch).is_empty());
        assert_eq!(wheel.pending(), 0);
    }

    #[tokio::test]
    async fn release_frees_key_for_rescheduling() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        wheel.insert(entry(-100, 1, epoch));
        wheel.release(&(-100, 1));
        assert!(wheel.insert(entry(-100, 1, epoch + TICK)));
    }

    #[tokio::test]
    async fn requeue_files_retry_without_new_key() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        wheel.insert(entry(-100, 1, epoch));
        let due = wheel.advance(epoch);
        assert_eq!(due.len(), 1);

        // Entry is in flight; key still tracked, so a retry can be re-filed.
        assert!(wheel.contains(&(-100, 1)));
        let mut retry = due[0];
        retry.due_at = epoch + TICK * 3;
        retry.attempt = 1;
        wheel.requeue(retry);

        assert!(wheel.advance(epoch + TICK).is_empty());
        assert!(wheel.advance(epoch + TICK * 2).is_empty());
        let redue = wheel.advance(epoch + TICK * 3);
        assert_eq!(redue.len(), 1);
        assert_eq!(redue[0].attempt, 1);
    }

    #[tokio::test]
    async fn half_tick_cutoff_fires_barely_future_entries() {
        let epoch = Instant::now();
        let mut wheel = TimingWheel::new(TICK, 512, epoch);

        wheel.insert(entry(-100, 1, epoch + TICK / 4));
        let due = wheel.advance(epoch);
        assert_eq!(due.len(), 1, "within half a tick counts as due");
    }
}
