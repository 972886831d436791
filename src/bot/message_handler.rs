//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, warn};

use crate::dialogue::EchoDialogue;
use crate::dispatcher::{OutboundMessage, TurnDispatcher};

use super::outbound::send_outbound;

/// Transport-level command that discards the conversation
pub const CLOSE_COMMAND: &str = "/stop";

async fn send_replies(bot: &Bot, chat_id: ChatId, replies: &[OutboundMessage]) {
    for reply in replies {
        if let Err(e) = send_outbound(bot, chat_id, reply).await {
            error!(user_id = %chat_id, error = %e, "Failed to send reply");
        }
    }
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    text: &str,
    dialogue: EchoDialogue,
    dispatcher: &TurnDispatcher,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");

    let mut session = dialogue.get_or_default().await?;
    if session.language_code.is_none() {
        session.language_code = msg
            .from
            .as_ref()
            .and_then(|user| user.language_code.clone());
    }

    if text == CLOSE_COMMAND {
        dialogue.exit().await?;
        let goodbye = dispatcher.close(session);
        send_replies(bot, msg.chat.id, &[goodbye]).await;
        return Ok(());
    }

    let outcome = dispatcher.handle_turn(&mut session, text).await;
    match outcome {
        Ok(turn) => {
            // State first: the next message must resume the new top frame
            dialogue.update(session).await?;
            send_replies(bot, msg.chat.id, &turn.replies).await;
        }
        Err(e) if e.is_recoverable() => {
            warn!(user_id = %msg.chat.id, error = %e, "Turn failed, keeping session");
            let notice = dispatcher.notice("error-internal", session.language_code.as_deref());
            dialogue.update(session).await?;
            send_replies(bot, msg.chat.id, &[notice]).await;
        }
        Err(e) => {
            error!(user_id = %msg.chat.id, error = %e, "Dialog invariant violated, discarding session");
            let language_code = session.language_code.clone();
            dialogue.exit().await?;
            let notice = dispatcher.notice("error-internal", language_code.as_deref());
            send_replies(bot, msg.chat.id, &[notice]).await;
        }
    }

    Ok(())
}

async fn handle_unsupported_message(
    bot: &Bot,
    msg: &Message,
    dispatcher: &TurnDispatcher,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");

    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());
    let hint = dispatcher.notice("unsupported-message", language_code);
    send_replies(bot, msg.chat.id, &[hint]).await;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    dialogue: EchoDialogue,
    dispatcher: Arc<TurnDispatcher>,
) -> Result<()> {
    match msg.text() {
        Some(text) => handle_text_message(&bot, &msg, text, dialogue, &dispatcher).await?,
        None => handle_unsupported_message(&bot, &msg, &dispatcher).await?,
    }

    Ok(())
}
