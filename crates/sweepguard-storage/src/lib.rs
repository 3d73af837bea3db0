// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Sweepguard auto-delete engine.
//!
//! Provides the protected-chat membership table read by the cache refresh
//! task and the pending-deletion mirror used for crash recovery.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
