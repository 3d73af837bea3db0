// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits implemented by the transport and storage crates.

pub mod platform;
pub mod store;

pub use platform::DeleteApi;
pub use store::{MembershipStore, PendingStore};
