// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-protection auto-delete engine.
//!
//! Observed messages pass the eligibility filter, land in a deduplicated
//! timing wheel, and get deleted in per-chat chunks once their delay lapses.
//! Failures are classified into terminal and retryable; retries go back into
//! the wheel with exponential backoff. An optional SQLite-backed mirror makes
//! pending deletions survive restarts.

mod cache;
mod eligibility;
mod engine;
mod metrics;
mod wheel;
mod worker;

pub use cache::ProtectedChatCache;
pub use eligibility::classify;
pub use engine::AutoDeleteEngine;
pub use metrics::{EngineMetrics, MetricsSnapshot};
