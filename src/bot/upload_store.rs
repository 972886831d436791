//! Telegram-backed attachment store
//!
//! Telegram has no upload-only endpoint, so files are sent once to a
//! dedicated chat and the returned file id is reused for every later send.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::attachment::{AttachmentStore, StoredFile};

pub struct TelegramUploadStore {
    bot: Bot,
    chat_id: ChatId,
    // file name -> Telegram file id and content type
    cache: Mutex<HashMap<String, StoredFile>>,
}

impl TelegramUploadStore {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AttachmentStore for TelegramUploadStore {
    async fn lookup(&self, name: &str) -> Option<StoredFile> {
        self.cache.lock().await.get(name).cloned()
    }

    async fn upload(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        if let Some(stored) = self.lookup(name).await {
            debug!(name, "Reusing uploaded file id");
            return Ok(stored.uri);
        }

        let file = InputFile::memory(bytes).file_name(name.to_string());
        let file_id = if content_type.starts_with("image/") {
            let sent = self.bot.send_photo(self.chat_id, file).await?;
            sent.photo()
                .and_then(|sizes| sizes.last())
                .map(|photo| photo.file.id.0.clone())
        } else {
            let sent = self.bot.send_document(self.chat_id, file).await?;
            sent.document().map(|document| document.file.id.0.clone())
        };
        let file_id = file_id.context("Telegram did not return a file id for the upload")?;

        info!(name, upload_chat_id = %self.chat_id, "Uploaded attachment to Telegram");
        self.cache.lock().await.insert(
            name.to_string(),
            StoredFile {
                uri: file_id.clone(),
                content_type: content_type.to_string(),
            },
        );
        Ok(file_id)
    }
}
