// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunk deletion with retry classification.
//!
//! A chunk is one platform call for up to `chunk_size` messages of a single
//! chat. The worker never sleeps; retryable failures come back as
//! `(entry, delay)` pairs and the engine re-files them into the wheel, so
//! backoff for one chunk cannot stall any other chunk.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use sweepguard_core::{ApiFailure, ChatId, DeleteApi};

use crate::wheel::WheelEntry;

/// Retry knobs shared by every chunk, derived from the engine config once.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
    pub request_timeout: Duration,
}

/// What happened to each entry of a chunk.
#[derive(Debug, Default)]
pub(crate) struct DeleteOutcome {
    /// Terminally resolved as gone (deleted now or already absent).
    pub deleted: Vec<WheelEntry>,
    /// Terminally failed (permission lost, attempts exhausted, rejected).
    pub failed: Vec<WheelEntry>,
    /// To be re-filed into the wheel after the given delay.
    pub retry: Vec<(WheelEntry, Duration)>,
    /// At least one failure said the bot lost delete rights in this chat.
    pub forbidden: bool,
}

/// Exponential backoff with a floor of half a second, a server hint that can
/// only raise the delay, a hard ceiling, and up to 10% jitter on top.
pub(crate) fn compute_backoff(policy: &RetryPolicy, attempt: u32, hint: Option<Duration>) -> Duration {
    let exp = policy.base.as_secs_f64() * 2f64.powi(attempt as i32);
    let mut delay = hint.map_or(exp, |h| h.as_secs_f64().max(exp));
    delay = delay.clamp(0.5, policy.max.as_secs_f64().max(0.5));
    let jitter = rand::thread_rng().gen_range(0.0..=0.1);
    Duration::from_secs_f64(delay * (1.0 + jitter))
}

/// Delete one chunk of messages from a single chat.
///
/// The batch endpoint is tried first; a `BadRequest` on the batch falls back
/// to per-message deletes so one rejected id cannot sink its siblings.
pub(crate) async fn delete_chunk(
    api: &dyn DeleteApi,
    policy: &RetryPolicy,
    chat_id: ChatId,
    entries: Vec<WheelEntry>,
) -> DeleteOutcome {
    let mut outcome = DeleteOutcome::default();
    if entries.is_empty() {
        return outcome;
    }

    if entries.len() == 1 {
        let entry = entries[0];
        match call_single(api, policy, chat_id, entry.message_id).await {
            Ok(()) => outcome.deleted.push(entry),
            Err(failure) => classify(policy, entry, failure, &mut outcome),
        }
        return outcome;
    }

    let ids: Vec<_> = entries.iter().map(|e| e.message_id).collect();
    match call_batch(api, policy, chat_id, &ids).await {
        Ok(()) => outcome.deleted = entries,
        Err(ApiFailure::BadRequest(message)) => {
            debug!(chat_id, len = entries.len(), %message, "batch rejected, falling back to per-message deletes");
            for entry in entries {
                match call_single(api, policy, chat_id, entry.message_id).await {
                    Ok(()) => outcome.deleted.push(entry),
                    Err(failure) => classify(policy, entry, failure, &mut outcome),
                }
            }
        }
        Err(failure) => {
            for entry in entries {
                classify(policy, entry, failure.clone(), &mut outcome);
            }
        }
    }

    outcome
}

async fn call_batch(
    api: &dyn DeleteApi,
    policy: &RetryPolicy,
    chat_id: ChatId,
    ids: &[i32],
) -> Result<(), ApiFailure> {
    match tokio::time::timeout(policy.request_timeout, api.delete_messages(chat_id, ids)).await {
        Ok(result) => result,
        Err(_) => Err(ApiFailure::Transient("request timed out".into())),
    }
}

async fn call_single(
    api: &dyn DeleteApi,
    policy: &RetryPolicy,
    chat_id: ChatId,
    message_id: i32,
) -> Result<(), ApiFailure> {
    match tokio::time::timeout(policy.request_timeout, api.delete_message(chat_id, message_id)).await {
        Ok(result) => result,
        Err(_) => Err(ApiFailure::Transient("request timed out".into())),
    }
}

fn classify(policy: &RetryPolicy, entry: WheelEntry, failure: ApiFailure, outcome: &mut DeleteOutcome) {
    match failure {
        // The message is gone either way; that is the goal state.
        ApiFailure::AlreadyGone => outcome.deleted.push(entry),
        ApiFailure::Forbidden(reason) => {
            warn!(chat_id = entry.chat_id, message_id = entry.message_id, %reason, "delete forbidden");
            outcome.forbidden = true;
            outcome.failed.push(entry);
        }
        ApiFailure::BadRequest(reason) => {
            warn!(chat_id = entry.chat_id, message_id = entry.message_id, %reason, "delete rejected");
            outcome.failed.push(entry);
        }
        ApiFailure::RetryAfter(hint) => schedule_retry(policy, entry, Some(hint), outcome),
        ApiFailure::Transient(reason) => {
            debug!(chat_id = entry.chat_id, message_id = entry.message_id, %reason, "transient delete failure");
            schedule_retry(policy, entry, None, outcome);
        }
    }
}

fn schedule_retry(
    policy: &RetryPolicy,
    mut entry: WheelEntry,
    hint: Option<Duration>,
    outcome: &mut DeleteOutcome,
) {
    if entry.attempt + 1 >= policy.max_attempts {
        warn!(
            chat_id = entry.chat_id,
            message_id = entry.message_id,
            attempts = entry.attempt + 1,
            "retry budget exhausted"
        );
        outcome.failed.push(entry);
        return;
    }
    let delay = compute_backoff(policy, entry.attempt, hint);
    entry.attempt += 1;
    entry.due_at = Instant::now() + delay;
    outcome.retry.push((entry, delay));
}
