// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform delete API trait, implemented by the Telegram transport adapter.

use async_trait::async_trait;

use crate::error::ApiFailure;
use crate::types::{ChatId, MsgId};

/// Outbound deletion calls against the chat platform.
///
/// A batch call either deletes the whole chunk or fails as a unit with a
/// classified [`ApiFailure`]; on [`ApiFailure::BadRequest`] the worker falls
/// back to [`delete_message`](DeleteApi::delete_message) per id so individual
/// permanent failures can be isolated. Implementations must not retry
/// internally - backoff is owned by the engine.
#[async_trait]
pub trait DeleteApi: Send + Sync {
    /// Delete up to 100 messages from one chat in a single platform call.
    async fn delete_messages(&self, chat_id: ChatId, message_ids: &[MsgId])
    -> Result<(), ApiFailure>;

    /// Delete a single message.
    async fn delete_message(&self, chat_id: ChatId, message_id: MsgId) -> Result<(), ApiFailure>;
}
