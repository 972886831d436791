//! Outbound rendering of dispatcher replies

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile};

use crate::attachment::{AttachmentDescriptor, ContentRef};
use crate::dispatcher::OutboundMessage;

/// Build the Telegram input file for an attachment
pub fn input_file(attachment: &AttachmentDescriptor) -> Result<InputFile> {
    match &attachment.content {
        ContentRef::Inline { .. } => {
            let bytes = attachment
                .inline_bytes()
                .context("Inline attachment is not valid base64")?;
            Ok(InputFile::memory(bytes).file_name(attachment.name.clone()))
        }
        ContentRef::Uploaded { uri } => Ok(InputFile::file_id(FileId(uri.clone()))),
        ContentRef::External { url } => {
            let url = reqwest::Url::parse(url)
                .with_context(|| format!("Invalid attachment URL: {url}"))?;
            Ok(InputFile::url(url))
        }
    }
}

/// Send one reply; image attachments go out as photos with the text as caption
pub async fn send_outbound(bot: &Bot, chat_id: ChatId, message: &OutboundMessage) -> Result<()> {
    let Some(attachment) = &message.attachment else {
        if let Some(text) = &message.text {
            bot.send_message(chat_id, text).await?;
        }
        return Ok(());
    };

    let file = input_file(attachment)?;
    if attachment.is_image() {
        let mut request = bot.send_photo(chat_id, file);
        if let Some(text) = &message.text {
            request = request.caption(text);
        }
        request.await?;
    } else {
        let mut request = bot.send_document(chat_id, file);
        if let Some(text) = &message.text {
            request = request.caption(text);
        }
        request.await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(content: ContentRef) -> AttachmentDescriptor {
        AttachmentDescriptor {
            name: "small-image.png".to_string(),
            content_type: "image/png".to_string(),
            content,
        }
    }

    #[test]
    fn test_inline_requires_base64() {
        let broken = descriptor(ContentRef::Inline {
            data: "***".to_string(),
        });
        assert!(input_file(&broken).is_err());

        let valid = descriptor(ContentRef::Inline {
            data: "iVBORw0KGgo=".to_string(),
        });
        assert!(input_file(&valid).is_ok());
    }

    #[test]
    fn test_external_requires_valid_url() {
        let broken = descriptor(ContentRef::External {
            url: "not a url".to_string(),
        });
        assert!(input_file(&broken).is_err());

        let valid = descriptor(ContentRef::External {
            url: "https://example.com/image.png".to_string(),
        });
        assert!(input_file(&valid).is_ok());
    }
}
