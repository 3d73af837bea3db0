// SPDX-FileCopyrightText: 2026 Sweepguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for the Sweepguard engine.
//!
//! Long-polls the Bot API via teloxide, normalizes group messages and
//! membership updates into [`Inbound`] events, and implements [`DeleteApi`]
//! on top of `deleteMessage`/`deleteMessages` with Telegram's error zoo
//! folded into the engine's failure classes.

pub mod handler;

use std::time::Duration;

use async_trait::async_trait;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMemberUpdated, MessageId};
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sweepguard_config::TelegramConfig;
use sweepguard_core::{ApiFailure, DeleteApi, Inbound, SweepError};

/// Depth of the transport-to-engine event channel.
const INBOUND_CAPACITY: usize = 1024;

/// Telegram transport: one long-polling dispatcher feeding the inbound
/// channel, plus the delete surface the engine's workers call.
pub struct TelegramTransport {
    bot: Bot,
    inbound_tx: mpsc::Sender<Inbound>,
}

impl TelegramTransport {
    /// Build the transport and the receiving end of its event stream.
    ///
    /// Requires `telegram.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<(Self, mpsc::Receiver<Inbound>), SweepError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SweepError::Config("telegram.bot_token is required".into()))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        Ok((
            Self {
                bot: Bot::new(token),
                inbound_tx,
            },
            inbound_rx,
        ))
    }

    /// The underlying teloxide bot (admin tooling, health checks).
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Long-poll until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let routes = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_edited_message().endpoint(on_message))
            .branch(Update::filter_my_chat_member().endpoint(on_membership));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), routes)
            .dependencies(dptree::deps![self.inbound_tx.clone()])
            .default_handler(|_| async {})
            .build();

        let shutdown = dispatcher.shutdown_token();
        tokio::spawn(async move {
            cancel.cancelled().await;
            if let Ok(pending) = shutdown.shutdown() {
                pending.await;
            }
        });

        info!("starting Telegram long polling");
        dispatcher.dispatch().await;
        info!("Telegram long polling stopped");
    }
}

async fn on_message(msg: Message, tx: mpsc::Sender<Inbound>) -> ResponseResult<()> {
    if !handler::is_group(&msg) {
        debug!(chat_id = msg.chat.id.0, "ignoring non-group message");
        return Ok(());
    }
    let event = handler::normalize(&msg);
    if tx.send(Inbound::Message(event)).await.is_err() {
        warn!("inbound channel closed, dropping message");
    }
    Ok(())
}

async fn on_membership(update: ChatMemberUpdated, tx: mpsc::Sender<Inbound>) -> ResponseResult<()> {
    if !(update.chat.is_group() || update.chat.is_supergroup()) {
        return Ok(());
    }
    let chat_id = update.chat.id.0;
    let inbound = if update.new_chat_member.is_present() {
        info!(chat_id, "bot added to group");
        Inbound::MembershipGranted(chat_id)
    } else {
        info!(chat_id, "bot removed from group");
        Inbound::MembershipRevoked(chat_id)
    };
    if tx.send(inbound).await.is_err() {
        warn!("inbound channel closed, dropping membership update");
    }
    Ok(())
}

#[async_trait]
impl DeleteApi for TelegramTransport {
    async fn delete_messages(&self, chat_id: i64, message_ids: &[i32]) -> Result<(), ApiFailure> {
        let ids: Vec<MessageId> = message_ids.iter().copied().map(MessageId).collect();
        self.bot
            .delete_messages(ChatId(chat_id), ids)
            .await
            .map(|_| ())
            .map_err(classify_request_error)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), ApiFailure> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map(|_| ())
            .map_err(classify_request_error)
    }
}

fn classify_request_error(error: RequestError) -> ApiFailure {
    match error {
        RequestError::RetryAfter(seconds) => ApiFailure::RetryAfter(seconds.duration()),
        RequestError::Api(api) => classify_api_error(api),
        RequestError::Network(err) => ApiFailure::Transient(err.to_string()),
        RequestError::Io(err) => ApiFailure::Transient(err.to_string()),
        other => ApiFailure::Transient(other.to_string()),
    }
}

fn classify_api_error(error: ApiError) -> ApiFailure {
    match error {
        ApiError::MessageToDeleteNotFound | ApiError::MessageIdInvalid => ApiFailure::AlreadyGone,
        // Too old or not ours; terminal, but lets a batch fall back so the
        // rest of the chunk still goes through.
        ApiError::MessageCantBeDeleted => {
            ApiFailure::BadRequest("message can't be deleted".into())
        }
        ApiError::BotKicked | ApiError::BotKickedFromSupergroup => {
            ApiFailure::Forbidden("bot was kicked from the chat".into())
        }
        ApiError::ChatNotFound => ApiFailure::Forbidden("chat not found".into()),
        ApiError::Unknown(text) => classify_unknown(text),
        other => ApiFailure::BadRequest(other.to_string()),
    }
}

/// Telegram surfaces plenty of errors only as free text; sort the known
/// phrasings into the right class and treat the rest as terminal.
fn classify_unknown(text: String) -> ApiFailure {
    let lower = text.to_lowercase();
    if let Some(secs) = parse_retry_after(&lower) {
        ApiFailure::RetryAfter(Duration::from_secs(secs))
    } else if lower.contains("message to delete not found")
        || lower.contains("message_id_invalid")
        || lower.contains("message identifier is not specified")
    {
        ApiFailure::AlreadyGone
    } else if lower.contains("not enough rights")
        || lower.contains("chat_write_forbidden")
        || lower.contains("bot is not a member")
        || lower.contains("forbidden")
    {
        ApiFailure::Forbidden(text)
    } else if lower.contains("timeout") || lower.contains("gateway") {
        ApiFailure::Transient(text)
    } else {
        ApiFailure::BadRequest(text)
    }
}

/// Flood-control errors sometimes arrive only as "... retry after N" text
/// rather than the structured variant.
fn parse_retry_after(lower: &str) -> Option<u64> {
    let (_, tail) = lower.split_once("retry after ")?;
    let digits = tail.split(|c: char| !c.is_ascii_digit()).next()?;
    digits.parse().ok()
}
