//! Long-polling loop that turns Telegram updates into handler calls.
//!
//! Updates from one batch are handled in arrival order, one at a time, so two
//! quick messages never load the same stale copy of the document.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cmd::{Command, Event, Handlers};
use crate::format::parse_done_callback;
use crate::telegram::{Messenger, TelegramClient, Update};

const MAX_BACKOFF_SECS: u64 = 60;

/// Where a handler's reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// New message in this chat.
    Chat(i64),
    /// Edit the message whose button was pressed, after acknowledging it.
    Callback { callback_id: String, chat_id: i64, message_id: i64 },
    /// Button press on a message we can no longer edit.
    CallbackDetached { callback_id: String, chat_id: i64 },
}

/// A routed update: who asked, what for, where to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub caller: i64,
    pub event: Event,
    pub target: ReplyTarget,
}

/// Map an update to an event. Updates the bot does not handle give `None`.
pub fn route(update: &Update) -> Option<Routed> {
    if let Some(cb) = &update.callback_query {
        let id = parse_done_callback(cb.data.as_deref()?)?;
        let target = match &cb.message {
            Some(msg) => ReplyTarget::Callback {
                callback_id: cb.id.clone(),
                chat_id: msg.chat.id,
                message_id: msg.message_id,
            },
            None => ReplyTarget::CallbackDetached { callback_id: cb.id.clone(), chat_id: cb.from.id },
        };
        return Some(Routed { caller: cb.from.id, event: Event::Complete(id), target });
    }

    let msg = update.message.as_ref()?;
    let caller = msg.from.as_ref()?.id;
    let text = msg.text.as_deref()?.trim();
    if text.is_empty() {
        return None;
    }
    let event = if text.starts_with('/') {
        Event::Command(Command::parse(text)?)
    } else {
        Event::Text(text.to_string())
    };
    Some(Routed { caller, event, target: ReplyTarget::Chat(msg.chat.id) })
}

/// Run one update to completion. Failures are logged, never propagated.
pub async fn process_update(update: Update, handlers: &Handlers, messenger: &dyn Messenger) {
    let Some(routed) = route(&update) else {
        debug!(update_id = update.update_id, "ignoring update");
        return;
    };
    if !handlers.allows(routed.caller) {
        debug!(caller = routed.caller, "ignoring unauthorized caller");
        return;
    }

    if let ReplyTarget::Callback { callback_id, .. } | ReplyTarget::CallbackDetached { callback_id, .. } =
        &routed.target
    {
        if let Err(e) = messenger.answer_callback(callback_id).await {
            warn!(error = %e, "failed to acknowledge button press");
        }
    }

    let Some(reply) = handlers.dispatch(routed.caller, &routed.event).await else {
        return;
    };
    let sent = match &routed.target {
        ReplyTarget::Chat(chat_id) | ReplyTarget::CallbackDetached { chat_id, .. } => {
            messenger.send(*chat_id, &reply).await
        }
        ReplyTarget::Callback { chat_id, message_id, .. } => {
            messenger.edit(*chat_id, *message_id, &reply.text).await
        }
    };
    if let Err(e) = sent {
        warn!(error = %e, "failed to deliver reply");
    }
}

/// Handle a batch in order and return the offset that acknowledges it.
pub async fn process_batch(
    updates: Vec<Update>,
    offset: i64,
    handlers: &Handlers,
    messenger: &dyn Messenger,
) -> i64 {
    let mut offset = offset;
    for update in updates {
        offset = offset.max(update.update_id + 1);
        process_update(update, handlers, messenger).await;
    }
    offset
}

/// Poll forever.
pub async fn run(telegram: Arc<TelegramClient>, handlers: Arc<Handlers>, poll_timeout_secs: u64) {
    let mut offset = 0;
    let mut backoff_secs = 2u64;
    info!("polling for updates");
    loop {
        let updates = match telegram.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => {
                backoff_secs = 2;
                updates
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed; retrying in {backoff_secs}s");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = backoff_secs.saturating_mul(2).min(MAX_BACKOFF_SECS);
                continue;
            }
        };

        offset = process_batch(updates, offset, &handlers, telegram.as_ref()).await;
    }
}
