// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine counters.
//!
//! Totals go two ways at once: into the `metrics` facade for the Prometheus
//! exporter, and into local atomics so the periodic summary line can be
//! logged without scraping anything. Drift (how late a deletion fired
//! relative to its due time) is windowed and resets on every summary.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge, histogram};
use tracing::info;

use sweepguard_core::ScheduleKind;

#[derive(Debug, Default)]
struct DriftWindow {
    sum: f64,
    max: f64,
    count: u64,
}

#[derive(Debug, Default)]
pub struct EngineMetrics {
    scheduled: AtomicU64,
    bot_content: AtomicU64,
    sticker: AtomicU64,
    duplicate: AtomicU64,
    deleted: AtomicU64,
    failed: AtomicU64,
    restored: AtomicU64,
    drift: Mutex<DriftWindow>,
}

/// One summary window, as logged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub scheduled: u64,
    pub bot_content: u64,
    pub sticker: u64,
    pub duplicate: u64,
    pub deleted: u64,
    pub failed: u64,
    pub restored: u64,
    pub pending: u64,
    pub drift_avg_secs: f64,
    pub drift_max_secs: f64,
    pub drift_samples: u64,
}

impl EngineMetrics {
    pub fn record_scheduled(&self, kind: ScheduleKind) {
        self.scheduled.fetch_add(1, Ordering::Relaxed);
        let label = match kind {
            ScheduleKind::BotContent => {
                self.bot_content.fetch_add(1, Ordering::Relaxed);
                "bot_content"
            }
            ScheduleKind::Sticker => {
                self.sticker.fetch_add(1, Ordering::Relaxed);
                "sticker"
            }
        };
        counter!("sweepguard_scheduled_total", "kind" => label).increment(1);
    }

    pub fn record_duplicate(&self) {
        self.duplicate.fetch_add(1, Ordering::Relaxed);
        counter!("sweepguard_duplicate_total").increment(1);
    }

    pub fn record_deleted(&self, count: u64) {
        self.deleted.fetch_add(count, Ordering::Relaxed);
        counter!("sweepguard_deleted_total").increment(count);
    }

    pub fn record_failed(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
        counter!("sweepguard_failed_total").increment(count);
    }

    pub fn record_restored(&self, count: u64) {
        self.restored.fetch_add(count, Ordering::Relaxed);
        counter!("sweepguard_restored_total").increment(count);
    }

    /// Seconds between a deletion's due time and the moment its chunk fired.
    pub fn record_drift(&self, secs: f64) {
        histogram!("sweepguard_drift_seconds").record(secs);
        let mut window = self.drift.lock().unwrap();
        window.sum += secs;
        window.count += 1;
        if secs > window.max {
            window.max = secs;
        }
    }

    pub fn set_pending(&self, pending: u64) {
        gauge!("sweepguard_pending").set(pending as f64);
    }

    /// Read the totals and reset the drift window.
    pub fn snapshot(&self, pending: u64) -> MetricsSnapshot {
        let window = std::mem::take(&mut *self.drift.lock().unwrap());
        let drift_avg_secs = if window.count > 0 {
            window.sum / window.count as f64
        } else {
            0.0
        };
        MetricsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            bot_content: self.bot_content.load(Ordering::Relaxed),
            sticker: self.sticker.load(Ordering::Relaxed),
            duplicate: self.duplicate.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            restored: self.restored.load(Ordering::Relaxed),
            pending,
            drift_avg_secs,
            drift_max_secs: window.max,
            drift_samples: window.count,
        }
    }

    pub fn log_summary(&self, pending: u64) {
        let snap = self.snapshot(pending);
        info!(
            scheduled = snap.scheduled,
            bot_content = snap.bot_content,
            sticker = snap.sticker,
            duplicate = snap.duplicate,
            deleted = snap.deleted,
            failed = snap.failed,
            restored = snap.restored,
            pending = snap.pending,
            drift_avg_secs = snap.drift_avg_secs,
            drift_max_secs = snap.drift_max_secs,
            drift_samples = snap.drift_samples,
            "engine summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduled_counts_split_by_kind() {
        let metrics = EngineMetrics::default();
        metrics.record_scheduled(ScheduleKind::BotContent);
        metrics.record_scheduled(ScheduleKind::BotContent);
        metrics.record_scheduled(ScheduleKind::Sticker);

        let snap = metrics.snapshot(0);
        assert_eq!(snap.scheduled, 3);
        assert_eq!(snap.bot_content, 2);
        assert_eq!(snap.sticker, 1);
    }

    #[test]
    fn drift_window_resets_on_snapshot() {
        let metrics = EngineMetrics::default();
        metrics.record_drift(0.2);
        metrics.record_drift(0.6);

        let first = metrics.snapshot(0);
        assert!((first.drift_avg_secs - 0.4).abs() < 1e-9);
        assert!((first.drift_max_secs - 0.6).abs() < 1e-9);
        assert_eq!(first.drift_samples, 2);

        let second = metrics.snapshot(0);
        assert_eq!(second.drift_avg_secs, 0.0);
        assert_eq!(second.drift_max_secs, 0.0);
        assert_eq!(second.drift_samples, 0);
    }

    #[test]
    fn totals_accumulate_across_snapshots() {
        let metrics = EngineMetrics::default();
        metrics.record_deleted(10);
        metrics.snapshot(0);
        metrics.record_deleted(5);
        metrics.record_failed(1);
        metrics.record_duplicate();

        let snap = metrics.snapshot(3);
        assert_eq!(snap.deleted, 15);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.duplicate, 1);
        assert_eq!(snap.pending, 3);
    }
}
