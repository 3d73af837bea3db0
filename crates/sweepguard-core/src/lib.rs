// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sweepguard auto-delete engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types shared across the Sweepguard workspace. The transport and
//! storage adapters implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ApiFailure, SweepError};
pub use traits::{DeleteApi, MembershipStore, PendingStore};
pub use types::{ChatEvent, ChatId, ContentType, Inbound, MsgId, PendingRecord, ScheduleKind};
