//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Feeds incoming messages to the turn dispatcher
//! - `outbound`: Renders dispatcher replies as Telegram messages
//! - `upload_store`: Uploads attachment bytes to Telegram and caches file ids

pub mod message_handler;
pub mod outbound;
pub mod upload_store;

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::attachment::FileAttachmentResolver;
use crate::dialog_config::DialogConfig;
use crate::dispatcher::TurnDispatcher;
use crate::localization::LocalizationManager;

pub use message_handler::{message_handler, CLOSE_COMMAND};
pub use outbound::{input_file, send_outbound};
pub use upload_store::TelegramUploadStore;

/// Wire localization, the attachment resolver and prompt settings into a dispatcher
pub fn build_turn_dispatcher(bot: &Bot, config: &DialogConfig) -> Result<Arc<TurnDispatcher>> {
    let messages = match &config.locales_dir {
        Some(dir) => LocalizationManager::with_resource_dir(dir)?,
        None => LocalizationManager::new()?,
    };

    let mut resolver = FileAttachmentResolver::new(config.attachments.clone());
    match config.upload_chat_id {
        Some(chat_id) => {
            info!(upload_chat_id = chat_id, "Uploaded attachments enabled");
            resolver = resolver.with_store(Arc::new(TelegramUploadStore::new(
                bot.clone(),
                ChatId(chat_id),
            )));
        }
        None => warn!("UPLOAD_CHAT_ID not set, uploaded attachments are unavailable"),
    }

    Ok(Arc::new(TurnDispatcher::new(
        Arc::new(messages),
        Arc::new(resolver),
        config.prompts.clone(),
    )))
}
